// ============================================================================
// Actors Module
// ============================================================================
//
// One TerminalActor per station screen. Each owns its local cache and its
// polling schedule; the order lifecycle itself stays in OrderService.
//
// ============================================================================

mod terminal;

pub use terminal::{GetView, RecordLocal, RefreshNow, StopTerminal, TerminalActor, TerminalKind};
