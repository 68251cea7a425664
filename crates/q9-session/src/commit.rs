use tracing::debug;

use super::types::{is_single_char, CandidateSet, CompositionState, KeyResponse};
use super::ComposeSession;

impl ComposeSession {
    /// Candidates for `code`. A miss is a normal outcome, not an error.
    pub(super) fn lookup_code(&self, code: &str) -> Option<CandidateSet> {
        let found = self.dict.lookup_by_code(code).and_then(CandidateSet::new);
        match &found {
            Some(candidates) => debug!(
                code,
                count = candidates.len(),
                pages = candidates.page_count(),
                "code hit"
            ),
            None => debug!(code, "code miss"),
        }
        found
    }

    /// Emit `selected` and decide what follows it.
    pub(super) fn select_candidate(&mut self, selected: String) -> KeyResponse {
        self.state = if is_single_char(&selected) {
            match self.dict.lookup_related(&selected) {
                Some(relates) if !relates.is_empty() => {
                    debug!(count = relates.len(), "relate preview");
                    CompositionState::RelatePreview { relates }
                }
                _ => CompositionState::Idle,
            }
        } else {
            CompositionState::Idle
        };
        KeyResponse::committed(selected)
    }
}
