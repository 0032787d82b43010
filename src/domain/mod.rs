// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Order lifecycle rules live here, separate from storage, messaging and the
// terminal actors that consume them.
//
// ============================================================================

pub mod order;
