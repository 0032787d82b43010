use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Kitchen station an order currently sits at.
///
/// The forward sequence is `New → Prep → Oven → Ready → Completed`;
/// `Cancelled` is absorbing and reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Intake: taken at the register, not yet started.
    New,
    Prep,
    Oven,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Forward sequence, in station order. `Cancelled` is not part of it.
    pub const FORWARD: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::Prep,
        OrderStatus::Oven,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::Prep,
        OrderStatus::Oven,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Prep => "PREP",
            OrderStatus::Oven => "OVEN",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Position in the forward sequence, `None` for `Cancelled`.
    pub fn sequence_index(&self) -> Option<usize> {
        Self::FORWARD.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Pickup,
    Delivery,
    DineIn,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Pickup => "PICKUP",
            OrderType::Delivery => "DELIVERY",
            OrderType::DineIn => "DINE_IN",
        }
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PICKUP" => Ok(OrderType::Pickup),
            "DELIVERY" => Ok(OrderType::Delivery),
            "DINE_IN" => Ok(OrderType::DineIn),
            other => Err(format!("Unknown order type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
    PayAtRegister,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Online => "ONLINE",
            PaymentMethod::PayAtRegister => "PAY_AT_REGISTER",
        }
    }

    /// Everything except "pay at register" is settled when the order is taken.
    pub fn is_settled_up_front(&self) -> bool {
        !matches!(self, PaymentMethod::PayAtRegister)
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            "ONLINE" => Ok(PaymentMethod::Online),
            "PAY_AT_REGISTER" => Ok(PaymentMethod::PayAtRegister),
            other => Err(format!("Unknown payment method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub size: String,
    pub crust: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub notes: Option<String>,
    #[serde(default)]
    pub toppings: BTreeSet<String>,
}

/// Customer details copied onto the order when it is taken.
///
/// Never re-derived from a live customer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub order_type: OrderType,
    pub address: Option<String>,
    pub is_walk_in: bool,
}

impl CustomerSnapshot {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Walk-in")
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&OrderStatus::Oven).unwrap();
        assert_eq!(json, "\"OVEN\"");

        let parsed: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("ready".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
        assert_eq!(" PREP ".parse::<OrderStatus>().unwrap(), OrderStatus::Prep);
        assert!("BAKING".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_sequence_index() {
        assert_eq!(OrderStatus::New.sequence_index(), Some(0));
        assert_eq!(OrderStatus::Completed.sequence_index(), Some(4));
        assert_eq!(OrderStatus::Cancelled.sequence_index(), None);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&OrderStatus::Completed, &OrderStatus::Cancelled]);
    }

    #[test]
    fn test_pay_at_register_is_unsettled() {
        assert!(!PaymentMethod::PayAtRegister.is_settled_up_front());
        assert!(PaymentMethod::Card.is_settled_up_front());
        assert!(PaymentMethod::Cash.is_settled_up_front());
    }

    #[test]
    fn test_item_toppings_serialize_sorted() {
        let item = OrderItem {
            name: "Margherita".to_string(),
            size: "L".to_string(),
            crust: Some("thin".to_string()),
            price: dec!(12.50),
            quantity: 1,
            notes: None,
            toppings: ["olives", "basil", "mushrooms"].iter().map(|t| t.to_string()).collect(),
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["toppings"], serde_json::json!(["basil", "mushrooms", "olives"]));

        let back: OrderItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_walk_in_display_name() {
        let snapshot = CustomerSnapshot {
            name: None,
            phone: None,
            order_type: OrderType::DineIn,
            address: None,
            is_walk_in: true,
        };
        assert_eq!(snapshot.display_name(), "Walk-in");
    }
}
