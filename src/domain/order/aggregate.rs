use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::OrderDetailsUpdate;
use super::errors::OrderError;
use super::state_machine::is_valid_transition;
use super::value_objects::{CustomerSnapshot, OrderItem, OrderStatus, PaymentMethod};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

/// Ticket numbers cycle through `1..=DISPLAY_ID_CYCLE`.
pub const DISPLAY_ID_CYCLE: u32 = 50;

/// Next ticket number after `last` (0 when no order exists yet).
pub fn next_display_id(last: u32) -> u32 {
    (last % DISPLAY_ID_CYCLE) + 1
}

/// Current time truncated to microseconds, the finest precision every
/// backend round-trips.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub display_id: u32,

    pub status: OrderStatus,
    pub customer_snapshot: CustomerSnapshot,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,

    // Staff name only; not checked against any roster
    pub assigned_to: Option<String>,
    pub is_priority: bool,
    pub special_instructions: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,

    // Milestones, each set once on first entry to its status
    pub oven_entered_at: Option<DateTime<Utc>>,
    pub actual_ready_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Move to `next` if the state machine allows it, stamping milestones.
    ///
    /// This is the only code path that changes `status`.
    pub(crate) fn apply_transition(
        &mut self,
        next: OrderStatus,
        assigned_to: Option<String>,
    ) -> Result<(), OrderError> {
        if !is_valid_transition(self.status, next) {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                requested: next,
            });
        }

        self.status = next;
        if let Some(staff) = assigned_to {
            self.assigned_to = Some(staff);
        }
        self.touch();

        let stamp = self.updated_at;
        match next {
            OrderStatus::Oven => {
                self.oven_entered_at.get_or_insert(stamp);
            }
            OrderStatus::Ready => {
                self.actual_ready_at.get_or_insert(stamp);
            }
            OrderStatus::Completed => {
                self.completed_at.get_or_insert(stamp);
            }
            _ => {}
        }

        Ok(())
    }

    pub(crate) fn apply_details(&mut self, update: OrderDetailsUpdate) {
        let snapshot = &mut self.customer_snapshot;
        if let Some(name) = update.customer_name {
            snapshot.name = Some(name);
            snapshot.is_walk_in = false;
        }
        if let Some(phone) = update.customer_phone {
            snapshot.phone = Some(phone);
        }
        if let Some(order_type) = update.order_type {
            snapshot.order_type = order_type;
        }
        if let Some(address) = update.address {
            snapshot.address = Some(address);
        }
        if let Some(items) = update.items {
            self.items = items;
        }
        if let Some(total_price) = update.total_price {
            self.total_price = total_price;
        }
        if let Some(is_priority) = update.is_priority {
            self.is_priority = is_priority;
        }
        if let Some(instructions) = update.special_instructions {
            self.special_instructions = Some(instructions);
        }
        self.touch();
    }

    pub(crate) fn mark_paid(&mut self) {
        self.is_paid = true;
        self.touch();
    }

    /// Stamp `updated_at`, never equal to or earlier than the previous value.
    pub(crate) fn touch(&mut self) {
        let now = timestamp_now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
