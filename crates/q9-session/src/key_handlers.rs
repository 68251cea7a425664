use tracing::{debug, debug_span};

use q9_core::key::{KeyEvent, KeyKind};

use super::types::{
    is_immediate_code, next_page, CandidateSet, CompositionState, KeyResponse, MAX_CODE_LEN,
};
use super::ComposeSession;

impl ComposeSession {
    /// Process a key event. Returns a KeyResponse describing what the caller should do.
    pub fn handle_key(&mut self, event: KeyEvent) -> KeyResponse {
        let _span = debug_span!("handle_key", kind = ?event.kind).entered();

        let mut resp = match event.kind {
            KeyKind::ToggleVisibility => {
                self.visibility = self.visibility.toggled();
                debug!(visibility = ?self.visibility, "visibility toggled");
                let mut r = KeyResponse::consumed();
                r.side_effects.visibility = Some(self.visibility);
                r
            }

            KeyKind::ToggleScript => {
                self.script = self.script.toggled();
                debug!(script = self.script.label(), "output script toggled");
                let mut r = KeyResponse::consumed();
                r.side_effects.script = Some(self.script);
                r
            }

            // Hidden: the keypad belongs to the rest of the system.
            _ if !self.visibility.is_shown() => KeyResponse::not_consumed(),

            KeyKind::Dot => {
                self.reset();
                KeyResponse::consumed()
            }

            KeyKind::Digit(d) if d > 9 => {
                debug!(digit = d, "not a keypad digit, ignored");
                KeyResponse::not_consumed()
            }

            KeyKind::Digit(d) => self.handle_digit(d),
        };

        resp.snapshot = self.snapshot();
        debug!(mode = ?resp.snapshot.mode, commit = ?resp.commit, "handled");
        resp
    }

    fn handle_digit(&mut self, digit: u8) -> KeyResponse {
        match std::mem::take(&mut self.state) {
            CompositionState::Idle => self.append_digit(String::new(), digit),

            CompositionState::ComposingCode { buffer } => self.append_digit(buffer, digit),

            CompositionState::Selecting { candidates, page } if digit == 0 => {
                let page = next_page(page, candidates.page_count());
                self.state = CompositionState::Selecting { candidates, page };
                KeyResponse::consumed()
            }

            CompositionState::Selecting { candidates, page } => {
                let selected = candidates.get(page, digit).map(str::to_string);
                match selected {
                    Some(selected) => self.select_candidate(selected),
                    None => {
                        // Empty slot: keep the page as it was.
                        self.state = CompositionState::Selecting { candidates, page };
                        KeyResponse::consumed()
                    }
                }
            }

            CompositionState::RelatePreview { relates } if digit == 0 => {
                if let Some(candidates) = CandidateSet::new(relates) {
                    self.state = CompositionState::Selecting {
                        candidates,
                        page: 0,
                    };
                }
                KeyResponse::consumed()
            }

            // The preview shows relate words on 1-9, but pressing one only
            // cancels. Kept as observed; see DESIGN.md.
            CompositionState::RelatePreview { .. } => KeyResponse::consumed(),
        }
    }

    fn append_digit(&mut self, mut buffer: String, digit: u8) -> KeyResponse {
        buffer.push(char::from(b'0' + digit));
        self.state = if buffer.len() >= MAX_CODE_LEN {
            // A complete code: a miss ends the composition.
            self.lookup_code(&buffer)
                .map_or(CompositionState::Idle, |candidates| {
                    CompositionState::Selecting {
                        candidates,
                        page: 0,
                    }
                })
        } else if is_immediate_code(&buffer) {
            // Short codes resolve early; a miss keeps them as a prefix.
            match self.lookup_code(&buffer) {
                Some(candidates) => CompositionState::Selecting {
                    candidates,
                    page: 0,
                },
                None => CompositionState::ComposingCode { buffer },
            }
        } else {
            CompositionState::ComposingCode { buffer }
        };
        KeyResponse::consumed()
    }
}
