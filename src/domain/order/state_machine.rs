use super::value_objects::OrderStatus;

// ============================================================================
// Order State Machine
// ============================================================================
//
//   NEW ──► PREP ──► OVEN ──► READY ──► COMPLETED
//    │        │        │        │
//    └────────┴────────┴────────┴──────► CANCELLED
//
// Single source of truth for legal status changes. Forward moves advance
// exactly one station. COMPLETED and CANCELLED have no outgoing edges.
//
// ============================================================================

/// Returns `true` if an order may move from `current` to `next`.
pub fn is_valid_transition(current: OrderStatus, next: OrderStatus) -> bool {
    if current == next {
        return false;
    }

    if next == OrderStatus::Cancelled {
        return !current.is_terminal();
    }

    match (current.sequence_index(), next.sequence_index()) {
        (Some(from), Some(to)) => to == from + 1,
        _ => false,
    }
}

/// String-level variant for values arriving from outside the type system.
/// Unknown statuses are never valid.
pub fn is_valid_transition_str(current: &str, next: &str) -> bool {
    match (current.parse::<OrderStatus>(), next.parse::<OrderStatus>()) {
        (Ok(current), Ok(next)) => is_valid_transition(current, next),
        _ => false,
    }
}

/// Legal targets from `current`, forward step first.
pub fn next_statuses(current: OrderStatus) -> Vec<OrderStatus> {
    OrderStatus::ALL
        .iter()
        .copied()
        .filter(|next| is_valid_transition(current, *next))
        .collect()
}

/// Every legal `(from, to)` edge.
pub fn transition_table() -> Vec<(OrderStatus, OrderStatus)> {
    OrderStatus::ALL
        .iter()
        .flat_map(|from| next_statuses(*from).into_iter().map(move |to| (*from, to)))
        .collect()
}
