//! Side effects that follow controller transitions

use services::SessionStore;
use shared::{ModeFilters, SessionState};
use std::io::Write;
use tracing::warn;
use tutor_host::{ConversationLog, TurnEvent, TurnObserver};

/// Keeps the last-session file current after every completed turn.
pub struct AutoSave {
    store: SessionStore,
}

impl AutoSave {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

impl TurnObserver for AutoSave {
    fn on_event(&mut self, event: &TurnEvent, log: &ConversationLog, filters: &ModeFilters) {
        if matches!(event, TurnEvent::Submitted) {
            return;
        }
        let state = SessionState {
            filters: *filters,
            turns: log.turns().to_vec(),
        };
        if let Err(e) = self.store.save_last(&state) {
            warn!(error = %e, "Auto-save failed");
        }
    }
}

/// Rings the terminal bell when a reply lands.
pub struct Bell;

impl TurnObserver for Bell {
    fn on_event(&mut self, event: &TurnEvent, _log: &ConversationLog, _filters: &ModeFilters) {
        if !matches!(event, TurnEvent::Submitted) {
            let mut out = std::io::stdout();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        }
    }
}
