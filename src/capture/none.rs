use super::{CaptureAdapter, CaptureError, CaptureGate};
use crate::channel::EventSender;

/// Adapter for hosts without a capture backend. Starting it fails, which
/// leaves the controller in click-only mode.
pub struct NoCapture;

impl CaptureAdapter for NoCapture {
    fn name(&self) -> &'static str {
        "none"
    }

    fn start(&mut self, _sink: EventSender, _gate: CaptureGate) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported("none"))
    }

    fn stop(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }
}
