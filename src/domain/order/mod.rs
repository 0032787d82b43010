// ============================================================================
// Order Domain - Business Logic for the kitchen order lifecycle
// ============================================================================
//
// - Value objects (OrderStatus, OrderItem, CustomerSnapshot)
// - State machine (legal status transitions)
// - Commands (CreateOrderInput, StatusChange, OrderDetailsUpdate)
// - Errors (OrderError enum)
// - Aggregate (Order record with lifecycle stamping)
// - Service (OrderService, the only mutation entry point)
//
// ============================================================================

pub mod value_objects;
pub mod state_machine;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod service;

// Re-export for convenience
pub use value_objects::*;
pub use state_machine::{is_valid_transition, is_valid_transition_str, next_statuses, transition_table};
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use service::*;
