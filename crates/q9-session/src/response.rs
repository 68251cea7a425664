use super::types::{slots, CompositionState, Snapshot, PAGE_SIZE};
use super::ComposeSession;

impl ComposeSession {
    /// Render-ready view of the current state.
    pub fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot {
            mode: self.state.mode(),
            slots: vec![None; PAGE_SIZE],
            visibility: self.visibility,
            script: self.script,
            ..Snapshot::default()
        };
        match &self.state {
            CompositionState::Idle => {}
            CompositionState::ComposingCode { buffer } => {
                snap.buffer = buffer.clone();
            }
            CompositionState::Selecting { candidates, page } => {
                snap.slots = candidates.page_slots(*page);
                snap.page = *page;
                snap.page_count = candidates.page_count();
            }
            CompositionState::RelatePreview { relates } => {
                snap.slots = slots(relates.iter());
            }
        }
        snap
    }
}
