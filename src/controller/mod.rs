//! Lifecycle controller: owns the session and its collaborators and runs
//! them from the composition context.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use q9_core::dict::Dictionary;
use q9_core::key::{KeyEvent, KeyKind};
use q9_core::script::ScriptMode;
use q9_session::{ComposeSession, KeyResponse, Snapshot, Visibility};
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureAdapter, CaptureError, CaptureGate};
use crate::channel::{event_channel, EventReceiver, EventSender};
use crate::output::{Delivery, OutputInjector};
use crate::presenter::Presenter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    NotStarted,
    Active,
    /// Capture could not be acquired; clicks still work.
    Degraded(String),
    /// Capture stopped on its own after a successful start.
    Failed,
    Stopped,
}

pub struct Controller {
    session: ComposeSession,
    dict: Arc<dyn Dictionary>,
    capture: Box<dyn CaptureAdapter>,
    sender: EventSender,
    events: EventReceiver,
    gate: CaptureGate,
    injector: OutputInjector,
    presenter: Box<dyn Presenter>,
    batch_size: usize,
    status: CaptureStatus,
    shut_down: bool,
}

impl Controller {
    pub fn new(
        dict: Arc<dyn Dictionary>,
        capture: Box<dyn CaptureAdapter>,
        injector: OutputInjector,
        presenter: Box<dyn Presenter>,
        script: ScriptMode,
        batch_size: usize,
    ) -> Self {
        let session = ComposeSession::new(Arc::clone(&dict)).with_script(script);
        let gate = CaptureGate::new(session.visibility().is_shown());
        let (sender, events) = event_channel();
        Self {
            session,
            dict,
            capture,
            sender,
            events,
            gate,
            injector,
            presenter,
            batch_size: batch_size.max(1),
            status: CaptureStatus::NotStarted,
            shut_down: false,
        }
    }

    /// Acquire capture. Failure is not fatal: the controller degrades to
    /// click-only input and says so through the presenter.
    pub fn start(&mut self) -> &CaptureStatus {
        if self.shut_down {
            warn!("start after shutdown ignored");
            return &self.status;
        }
        let backend = self.capture.name();
        match self.capture.start(self.sender.duplicate(), self.gate.clone()) {
            Ok(()) => {
                info!(backend, "capture started");
                self.status = CaptureStatus::Active;
            }
            Err(CaptureError::AlreadyActive) => {
                warn!(backend, "capture already active");
            }
            Err(e) => {
                warn!(backend, error = %e, "capture unavailable, click input only");
                let reason = e.to_string();
                self.presenter.set_degraded(&reason);
                self.status = CaptureStatus::Degraded(reason);
            }
        }
        self.presenter.render(&self.session.snapshot());
        &self.status
    }

    /// One composition tick: handle at most one batch of captured events.
    /// Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        if self.status == CaptureStatus::Active && self.capture.has_failed() {
            error!(backend = self.capture.name(), "capture stopped unexpectedly");
            self.presenter.set_degraded("capture stopped");
            self.status = CaptureStatus::Failed;
        }

        let batch = self.events.drain(self.batch_size);
        let handled = batch.len();
        for event in batch {
            debug!(
                kind = ?event.kind,
                queued_us = event.captured_at.elapsed().as_micros() as u64,
                "dequeued"
            );
            self.dispatch(event);
        }
        handled
    }

    /// A press coming from the UI rather than the keyboard.
    pub fn click(&mut self, kind: KeyKind) -> Option<Delivery> {
        self.dispatch(KeyEvent::new(kind))
    }

    pub fn toggle_visibility(&mut self) -> Option<Delivery> {
        self.click(KeyKind::ToggleVisibility)
    }

    /// Release capture and the dictionary. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.capture.stop();
        self.status = CaptureStatus::Stopped;
        self.dict.close();
        info!("controller shut down");
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    pub fn session(&self) -> &ComposeSession {
        &self.session
    }

    pub fn last_output(&self) -> Option<&str> {
        self.injector.last_output()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn dispatch(&mut self, event: KeyEvent) -> Option<Delivery> {
        let resp = self.session.handle_key(event);
        self.apply(resp)
    }

    fn apply(&mut self, resp: KeyResponse) -> Option<Delivery> {
        if let Some(visibility) = resp.side_effects.visibility {
            self.gate.set_live(visibility.is_shown());
            if visibility == Visibility::Shown {
                self.presenter.reposition();
            }
        }
        if let Some(script) = resp.side_effects.script {
            info!(script = script.label(), "output script changed");
        }
        let delivery = resp
            .commit
            .as_deref()
            .map(|text| self.injector.emit(text, self.session.script()));
        if resp.consumed {
            self.presenter.render(&resp.snapshot);
        }
        delivery
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
