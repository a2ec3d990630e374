//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every request handler.

use journal_core::{JournalService, ProgressionService, WeeklySummaryOrchestrator};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Saves and rewards submitted messages.
    pub journal: JournalService,
    pub progression: ProgressionService,
    pub summaries: WeeklySummaryOrchestrator,
    /// False when no AI key is configured; the latest-summary route then only
    /// reads what is already stored.
    pub generation_enabled: bool,
}
