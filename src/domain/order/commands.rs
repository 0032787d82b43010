use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{OrderItem, OrderStatus, OrderType, PaymentMethod};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Input taken at the register.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub order_type: OrderType,
    pub address: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub is_priority: bool,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub order_id: Uuid,
    pub new_status: OrderStatus,
    pub assigned_to: Option<String>,
    /// Status the caller last saw. A mismatch is reported as a conflict
    /// instead of being applied on top of someone else's change.
    pub expected_status: Option<OrderStatus>,
}

impl StatusChange {
    pub fn new(order_id: Uuid, new_status: OrderStatus) -> Self {
        Self {
            order_id,
            new_status,
            assigned_to: None,
            expected_status: None,
        }
    }

    pub fn assigned_to(mut self, staff: impl Into<String>) -> Self {
        self.assigned_to = Some(staff.into());
        self
    }

    pub fn expecting(mut self, status: OrderStatus) -> Self {
        self.expected_status = Some(status);
        self
    }
}

/// Partial update of everything except status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsUpdate {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub order_type: Option<OrderType>,
    pub address: Option<String>,
    pub items: Option<Vec<OrderItem>>,
    pub total_price: Option<Decimal>,
    pub is_priority: Option<bool>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverride {
    pub admin_id: String,
    pub order_id: Uuid,
    pub new_status: OrderStatus,
    pub reason: String,
    pub comment: String,
    pub assigned_to: Option<String>,
}
