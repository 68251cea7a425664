//! Composition session driving code entry, candidate paging and relate
//! previews for the numeric keypad.
//!
//! `ComposeSession` owns the composition state and processes each canonical
//! key event, returning responses the controller turns into output and UI
//! updates.

pub(crate) mod types;

mod commit;
mod key_handlers;
mod response;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use q9_core::dict::Dictionary;
use q9_core::script::ScriptMode;

pub use types::{
    CandidateSet, CompositionState, KeyResponse, Mode, SideEffects, Snapshot, Visibility,
    PAGE_SIZE,
};

/// Stateful keypad session. Touched only from the composition context.
pub struct ComposeSession {
    dict: Arc<dyn Dictionary>,
    state: CompositionState,
    visibility: Visibility,
    script: ScriptMode,
}

impl ComposeSession {
    pub fn new(dict: Arc<dyn Dictionary>) -> Self {
        Self {
            dict,
            state: CompositionState::Idle,
            visibility: Visibility::Shown,
            script: ScriptMode::Traditional,
        }
    }

    pub fn with_script(mut self, script: ScriptMode) -> Self {
        self.script = script;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn state(&self) -> &CompositionState {
        &self.state
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn script(&self) -> ScriptMode {
        self.script
    }

    pub fn is_composing(&self) -> bool {
        !matches!(self.state, CompositionState::Idle)
    }

    /// Digits entered so far (empty outside code entry).
    pub fn buffer(&self) -> &str {
        match &self.state {
            CompositionState::ComposingCode { buffer } => buffer,
            _ => "",
        }
    }

    /// Drop any pending composition.
    pub fn reset(&mut self) {
        self.state = CompositionState::Idle;
    }
}
