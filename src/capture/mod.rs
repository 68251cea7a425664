//! Platform key capture.
//!
//! An adapter observes the physical keyboard on its own context, hands
//! tracked keypad presses to the event channel and lets everything else
//! through untouched. Whether a tracked key is swallowed depends on the
//! shared [`CaptureGate`], which the controller updates from the composition
//! context whenever visibility flips.

#[cfg(target_os = "linux")]
mod devices;
#[cfg(target_os = "linux")]
mod evdev;
#[cfg(windows)]
mod hook;
mod none;

#[cfg(target_os = "linux")]
pub use self::devices::{list_input_devices, InputDeviceInfo};
#[cfg(target_os = "linux")]
pub use self::evdev::EvdevCapture;
#[cfg(windows)]
pub use self::hook::HookCapture;
pub use self::none::NoCapture;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use q9_core::key::KeyKind;
use q9_core::settings::{CaptureBackend, CaptureSettings};
use tracing::warn;

use crate::channel::EventSender;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no input device configured")]
    NoDevice,

    #[error("input device not found: {0}")]
    DeviceNotFound(PathBuf),

    #[error("permission denied opening {0}")]
    PermissionDenied(PathBuf),

    #[error("device {0} is grabbed by another process")]
    DeviceBusy(PathBuf),

    #[error("keyboard hook rejected: {0}")]
    HookRejected(String),

    #[error("capture already active")]
    AlreadyActive,

    #[error("capture backend {0} is not available on this platform")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Visibility as seen from the capture context. Written only by the
/// controller, read on every intercepted key.
#[derive(Debug, Clone)]
pub struct CaptureGate(Arc<AtomicBool>);

impl CaptureGate {
    pub fn new(live: bool) -> Self {
        Self(Arc::new(AtomicBool::new(live)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_live(&self, live: bool) {
        self.0.store(live, Ordering::Release);
    }

    /// Record a key the adapter just enqueued. A visibility toggle flips
    /// the gate at once so keys read after it in the same burst are routed
    /// the way the session will see them; the controller later publishes
    /// the same value.
    pub(crate) fn observe(&self, kind: KeyKind) {
        if kind == KeyKind::ToggleVisibility {
            self.0.fetch_xor(true, Ordering::AcqRel);
        }
    }
}

/// What the adapter does with one intercepted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Swallow it; presses go to the event channel.
    Capture,
    /// Let the host receive it unchanged.
    PassThrough,
}

/// Routing decision for a classified key. Untracked keys always pass. The
/// visibility toggle is always captured; digits and the dot only while the
/// gate is live.
pub fn route(kind: Option<KeyKind>, live: bool) -> Route {
    match kind {
        None => Route::PassThrough,
        Some(KeyKind::ToggleVisibility) => Route::Capture,
        Some(k) if k.is_gated() && !live => Route::PassThrough,
        Some(_) => Route::Capture,
    }
}

/// Platform adapter contract. `start` hands over the producer half of the
/// event channel; after `stop` the adapter holds no device or hook.
pub trait CaptureAdapter: Send {
    fn name(&self) -> &'static str;

    fn start(&mut self, sink: EventSender, gate: CaptureGate) -> Result<(), CaptureError>;

    /// Release the device or hook. Safe to call when not started.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Set once the capture context hit an unrecoverable error after a
    /// successful start.
    fn has_failed(&self) -> bool {
        false
    }
}

/// Build the adapter selected by `settings`. Backends that cannot exist on
/// this platform fall back to [`NoCapture`] with a warning.
pub fn from_settings(settings: &CaptureSettings) -> Box<dyn CaptureAdapter> {
    let device = (!settings.device_path.is_empty()).then(|| PathBuf::from(&settings.device_path));
    let poll_timeout = Duration::from_millis(settings.poll_timeout_ms);

    match settings.backend {
        CaptureBackend::None => Box::new(NoCapture),
        CaptureBackend::Auto => platform_default(device, poll_timeout),
        #[cfg(target_os = "linux")]
        CaptureBackend::Evdev => Box::new(EvdevCapture::new(device, poll_timeout)),
        #[cfg(windows)]
        CaptureBackend::Hook => Box::new(HookCapture::new()),
        #[allow(unreachable_patterns)]
        other => {
            warn!(backend = ?other, "capture backend unsupported here, capture disabled");
            Box::new(NoCapture)
        }
    }
}

#[cfg(target_os = "linux")]
fn platform_default(device: Option<PathBuf>, poll_timeout: Duration) -> Box<dyn CaptureAdapter> {
    Box::new(EvdevCapture::new(device, poll_timeout))
}

#[cfg(windows)]
fn platform_default(_device: Option<PathBuf>, _poll_timeout: Duration) -> Box<dyn CaptureAdapter> {
    Box::new(HookCapture::new())
}

#[cfg(not(any(target_os = "linux", windows)))]
fn platform_default(_device: Option<PathBuf>, _poll_timeout: Duration) -> Box<dyn CaptureAdapter> {
    Box::new(NoCapture)
}
