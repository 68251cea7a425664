use serde::Serialize;

use q9_core::script::ScriptMode;

/// Candidates shown per page; digits 1-9 address the slots.
pub const PAGE_SIZE: usize = 9;

/// Codes are at most three digits long.
pub(super) const MAX_CODE_LEN: usize = 3;

/// Data-file placeholder for an intentionally empty slot.
pub(super) const PLACEHOLDER: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Shown,
    Hidden,
}

impl Visibility {
    pub fn toggled(self) -> Self {
        match self {
            Self::Shown => Self::Hidden,
            Self::Hidden => Self::Shown,
        }
    }

    pub fn is_shown(self) -> bool {
        self == Self::Shown
    }
}

/// Ordered, paged candidate list. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    items: Vec<String>,
}

impl CandidateSet {
    /// Returns `None` for an empty list; an empty set has no pages to show.
    pub fn new(items: Vec<String>) -> Option<Self> {
        (!items.is_empty()).then_some(Self { items })
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(PAGE_SIZE)
    }

    /// Candidate under `slot` (1-9) on `page`, skipping placeholders.
    pub fn get(&self, page: usize, slot: u8) -> Option<&str> {
        if !(1..=PAGE_SIZE as u8).contains(&slot) {
            return None;
        }
        let index = page * PAGE_SIZE + slot as usize - 1;
        self.items
            .get(index)
            .map(String::as_str)
            .filter(|s| *s != PLACEHOLDER)
    }

    /// The nine slot labels for `page`; `None` marks an empty or placeholder slot.
    pub fn page_slots(&self, page: usize) -> Vec<Option<String>> {
        slots(self.items.iter().skip(page * PAGE_SIZE))
    }
}

pub(super) fn slots<'a>(items: impl Iterator<Item = &'a String>) -> Vec<Option<String>> {
    let mut out: Vec<Option<String>> = items
        .take(PAGE_SIZE)
        .map(|s| (s != PLACEHOLDER && !s.is_empty()).then(|| s.clone()))
        .collect();
    out.resize(PAGE_SIZE, None);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompositionState {
    #[default]
    Idle,
    /// One or two digits entered, awaiting more.
    ComposingCode { buffer: String },
    Selecting { candidates: CandidateSet, page: usize },
    /// Related words offered after a single-character selection.
    RelatePreview { relates: Vec<String> },
}

impl CompositionState {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Idle => Mode::Idle,
            Self::ComposingCode { .. } => Mode::Composing,
            Self::Selecting { .. } => Mode::Selecting,
            Self::RelatePreview { .. } => Mode::RelatePreview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    Composing,
    Selecting,
    RelatePreview,
}

/// Read-only view handed to the presenter after every event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Snapshot {
    pub mode: Mode,
    pub buffer: String,
    pub slots: Vec<Option<String>>,
    pub page: usize,
    pub page_count: usize,
    pub visibility: Visibility,
    pub script: ScriptMode,
}

/// Orthogonal side-effects that accompany a response.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SideEffects {
    /// New visibility, when it changed.
    pub visibility: Option<Visibility>,
    /// New output script, when it changed.
    pub script: Option<ScriptMode>,
}

/// Response from handle_key, returned to the controller.
#[derive(Debug)]
pub struct KeyResponse {
    pub consumed: bool,
    /// Candidate the user selected; to be delivered by the output injector.
    pub commit: Option<String>,
    pub side_effects: SideEffects,
    pub snapshot: Snapshot,
}

impl KeyResponse {
    pub(super) fn not_consumed() -> Self {
        Self {
            consumed: false,
            commit: None,
            side_effects: SideEffects::default(),
            snapshot: Snapshot::default(),
        }
    }

    pub(super) fn consumed() -> Self {
        Self {
            consumed: true,
            ..Self::not_consumed()
        }
    }

    pub(super) fn committed(text: String) -> Self {
        Self {
            commit: Some(text),
            ..Self::consumed()
        }
    }
}

/// `0`, or two digits ending in `0`, resolve without waiting for a third digit.
pub(super) fn is_immediate_code(buffer: &str) -> bool {
    let b = buffer.as_bytes();
    match b.len() {
        1 => b[0] == b'0',
        2 => b[1] == b'0',
        _ => false,
    }
}

pub(super) fn next_page(current: usize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (current + 1) % count
}

/// Whether `s` is exactly one Unicode scalar value.
pub(super) fn is_single_char(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some() && chars.next().is_none()
}
