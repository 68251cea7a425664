use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use q9_core::dict::{Dictionary, TableDictionary};
use q9_core::settings::DirectTyping;
use q9_session::Mode;

use super::*;
use crate::output::{OutputBackend, OutputError};

fn chars(s: &str) -> Vec<String> {
    s.chars().map(|c| c.to_string()).collect()
}

/// Table dictionary that counts `close` calls.
struct ClosingDict {
    inner: TableDictionary,
    closed: AtomicUsize,
}

impl Dictionary for ClosingDict {
    fn lookup_by_code(&self, code: &str) -> Option<Vec<String>> {
        self.inner.lookup_by_code(code)
    }

    fn lookup_related(&self, character: &str) -> Option<Vec<String>> {
        self.inner.lookup_related(character)
    }

    fn convert_script(&self, character: &str, to_simplified: bool) -> String {
        self.inner.convert_script(character, to_simplified)
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn make_dict() -> Arc<ClosingDict> {
    let mut inner = TableDictionary::new();
    inner.insert_code("011", chars("你好嗎"));
    inner.insert_code("123", chars("的"));
    inner.insert_relates("你", vec!["你們".into(), "你好".into()]);
    inner.insert_script_pair("嗎", "吗");
    Arc::new(ClosingDict {
        inner,
        closed: AtomicUsize::new(0),
    })
}

#[derive(Default)]
struct FakeState {
    sender: Option<EventSender>,
    gate: Option<CaptureGate>,
    starts: usize,
    stops: usize,
}

/// Adapter driven by the test: keys are "pressed" through the stored sender.
struct FakeCapture {
    state: Arc<Mutex<FakeState>>,
    failed: Arc<AtomicBool>,
    refuse: bool,
}

impl CaptureAdapter for FakeCapture {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn start(&mut self, sink: EventSender, gate: CaptureGate) -> Result<(), CaptureError> {
        let mut state = self.state.lock().unwrap();
        state.starts += 1;
        if self.refuse {
            return Err(CaptureError::DeviceNotFound("/dev/input/missing".into()));
        }
        if state.sender.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        state.sender = Some(sink);
        state.gate = Some(gate);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.sender.take().is_some() {
            state.stops += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.state.lock().unwrap().sender.is_some()
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct PresenterLog {
    snapshots: Vec<Snapshot>,
    repositions: usize,
    degraded: Vec<String>,
}

struct RecordingPresenter(Arc<Mutex<PresenterLog>>);

impl Presenter for RecordingPresenter {
    fn render(&mut self, snapshot: &Snapshot) {
        self.0.lock().unwrap().snapshots.push(snapshot.clone());
    }

    fn reposition(&mut self) {
        self.0.lock().unwrap().repositions += 1;
    }

    fn set_degraded(&mut self, reason: &str) {
        self.0.lock().unwrap().degraded.push(reason.to_string());
    }
}

struct TypingBackend(Arc<Mutex<Vec<String>>>);

impl OutputBackend for TypingBackend {
    fn name(&self) -> &'static str {
        "typing"
    }

    fn type_text(&mut self, text: &str) -> Result<(), OutputError> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn set_clipboard(&mut self, _text: &str) -> Result<(), OutputError> {
        Err(OutputError::Unsupported("clipboard"))
    }

    fn paste(&mut self) -> Result<(), OutputError> {
        Err(OutputError::Unsupported("paste"))
    }
}

struct Harness {
    controller: Controller,
    dict: Arc<ClosingDict>,
    capture: Arc<Mutex<FakeState>>,
    failed: Arc<AtomicBool>,
    presenter: Arc<Mutex<PresenterLog>>,
    typed: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(refuse: bool, batch_size: usize) -> Self {
        let dict = make_dict();
        let capture = Arc::new(Mutex::new(FakeState::default()));
        let failed = Arc::new(AtomicBool::new(false));
        let presenter = Arc::new(Mutex::new(PresenterLog::default()));
        let typed = Arc::new(Mutex::new(Vec::new()));

        let shared: Arc<dyn Dictionary> = dict.clone();
        let injector = OutputInjector::new(
            Box::new(TypingBackend(Arc::clone(&typed))),
            Arc::clone(&shared),
            DirectTyping::On,
        );
        let controller = Controller::new(
            shared,
            Box::new(FakeCapture {
                state: Arc::clone(&capture),
                failed: Arc::clone(&failed),
                refuse,
            }),
            injector,
            Box::new(RecordingPresenter(Arc::clone(&presenter))),
            ScriptMode::Traditional,
            batch_size,
        );
        Self {
            controller,
            dict,
            capture,
            failed,
            presenter,
            typed,
        }
    }

    /// Simulate physical presses arriving on the capture context.
    fn press(&self, keys: &[KeyKind]) {
        let state = self.capture.lock().unwrap();
        let sender = state.sender.as_ref().expect("capture not started");
        for &k in keys {
            assert!(sender.send(k));
        }
    }

    fn gate_live(&self) -> bool {
        self.capture
            .lock()
            .unwrap()
            .gate
            .as_ref()
            .expect("capture not started")
            .is_live()
    }

    fn typed(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }
}

fn digits(code: &str) -> Vec<KeyKind> {
    code.bytes().map(|b| KeyKind::Digit(b - b'0')).collect()
}

#[test]
fn captured_keys_commit_through_injector() {
    let mut h = Harness::new(false, 10);
    assert_eq!(h.controller.start(), &CaptureStatus::Active);

    h.press(&digits("0112"));
    assert_eq!(h.controller.poll(), 4);

    assert_eq!(h.typed(), vec!["好"]);
    assert_eq!(h.controller.last_output(), Some("好"));
    assert_eq!(h.controller.snapshot().mode, Mode::Idle);

    let log = h.presenter.lock().unwrap();
    // Initial render from start, then one per handled key.
    assert_eq!(log.snapshots.len(), 5);
    assert_eq!(log.snapshots[3].mode, Mode::Selecting);
}

#[test]
fn poll_handles_at_most_one_batch() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    h.press(&[KeyKind::Dot; 15]);
    assert_eq!(h.controller.poll(), 10);
    assert_eq!(h.controller.poll(), 5);
    assert_eq!(h.controller.poll(), 0);
}

#[test]
fn visibility_publishes_gate_and_repositions() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    assert!(h.gate_live());

    h.press(&digits("01"));
    h.controller.poll();
    assert!(h.controller.session().is_composing());

    h.press(&[KeyKind::ToggleVisibility]);
    h.controller.poll();
    assert!(!h.gate_live());
    assert_eq!(h.controller.snapshot().visibility, Visibility::Hidden);
    // Composition survives the toggle.
    assert_eq!(h.controller.session().buffer(), "01");

    // While hidden, clicks on digits are not consumed.
    assert_eq!(h.controller.click(KeyKind::Digit(1)), None);
    assert_eq!(h.controller.session().buffer(), "01");

    h.controller.toggle_visibility();
    assert!(h.gate_live());
    assert_eq!(h.presenter.lock().unwrap().repositions, 1);

    h.controller.click(KeyKind::Digit(1));
    assert_eq!(h.controller.click(KeyKind::Digit(1)), Some(Delivery::Typed));
    assert_eq!(h.typed(), vec!["你"]);
}

#[test]
fn capture_failure_degrades_to_clicks() {
    let mut h = Harness::new(true, 10);
    let status = h.controller.start().clone();
    assert!(matches!(status, CaptureStatus::Degraded(ref r) if r.contains("missing")));
    assert_eq!(h.presenter.lock().unwrap().degraded.len(), 1);

    for k in digits("0113") {
        h.controller.click(k);
    }
    assert_eq!(h.typed(), vec!["嗎"]);
}

#[test]
fn second_start_keeps_active_capture() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    assert_eq!(h.controller.start(), &CaptureStatus::Active);
    let state = h.capture.lock().unwrap();
    assert_eq!(state.starts, 2);
    assert!(state.sender.is_some());
}

#[test]
fn runtime_capture_failure_reported_once() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    h.failed.store(true, Ordering::SeqCst);
    h.controller.poll();
    h.controller.poll();
    assert_eq!(h.controller.status(), &CaptureStatus::Failed);
    assert_eq!(h.presenter.lock().unwrap().degraded.len(), 1);

    h.controller.click(KeyKind::Digit(1));
    h.controller.click(KeyKind::Digit(2));
    h.controller.click(KeyKind::Digit(3));
    assert_eq!(h.controller.click(KeyKind::Digit(1)), Some(Delivery::Typed));
}

#[test]
fn script_toggle_applies_to_next_commit() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    h.controller.click(KeyKind::ToggleScript);
    assert_eq!(h.controller.snapshot().script, ScriptMode::Simplified);
    for k in digits("0113") {
        h.controller.click(k);
    }
    assert_eq!(h.typed(), vec!["吗"]);
}

#[test]
fn non_keypad_digit_clicks_are_ignored() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    h.controller.click(KeyKind::Digit(1));
    assert_eq!(h.controller.click(KeyKind::Digit(12)), None);
    assert_eq!(h.controller.click(KeyKind::Digit(250)), None);
    assert_eq!(h.controller.snapshot().buffer, "1");
    h.controller.click(KeyKind::Digit(2));
    h.controller.click(KeyKind::Digit(3));
    assert_eq!(h.controller.click(KeyKind::Digit(1)), Some(Delivery::Typed));
    assert_eq!(h.typed(), vec!["的"]);
}

#[test]
fn shutdown_is_idempotent() {
    let mut h = Harness::new(false, 10);
    h.controller.start();
    h.controller.shutdown();
    h.controller.shutdown();
    assert!(h.controller.is_shut_down());
    assert_eq!(h.controller.status(), &CaptureStatus::Stopped);

    // No restart after shutdown.
    h.controller.start();
    assert_eq!(h.controller.status(), &CaptureStatus::Stopped);

    let Harness {
        controller,
        dict,
        capture,
        ..
    } = h;
    drop(controller);
    assert_eq!(capture.lock().unwrap().stops, 1);
    assert_eq!(dict.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn shutdown_without_start() {
    let mut h = Harness::new(false, 10);
    h.controller.shutdown();
    assert_eq!(h.capture.lock().unwrap().stops, 0);
    assert_eq!(h.dict.closed.load(Ordering::SeqCst), 1);
}
