//! Linux capture: exclusive grab of one evdev keyboard plus a uinput mirror
//! that replays every event the engine does not keep.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use q9_core::key::KeyKind;
use tracing::{debug, error, info, warn};

use super::{route, CaptureAdapter, CaptureError, CaptureGate, Route};
use crate::channel::EventSender;

const MIRROR_NAME: &str = "q9 passthrough keyboard";

pub struct EvdevCapture {
    device_path: Option<PathBuf>,
    poll_timeout: Duration,
    worker: Option<Worker>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// What the read loop does with one source event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Replay on the mirror device.
    Mirror,
    /// Swallow and hand to the event channel.
    Enqueue(KeyKind),
    /// Swallow without enqueueing (releases, autorepeat).
    Swallow,
    /// Source sync reports; the mirror writes its own.
    Skip,
}

impl EvdevCapture {
    pub fn new(device_path: Option<PathBuf>, poll_timeout: Duration) -> Self {
        Self {
            device_path,
            poll_timeout,
            worker: None,
        }
    }
}

impl CaptureAdapter for EvdevCapture {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn start(&mut self, sink: EventSender, gate: CaptureGate) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        let path = self.device_path.clone().ok_or(CaptureError::NoDevice)?;

        let mut device = Device::open(&path).map_err(|e| open_error(&path, e))?;
        let mirror = build_mirror(&device)?;
        device.grab().map_err(|e| grab_error(&path, e))?;
        info!(
            device = %path.display(),
            name = device.name().unwrap_or("?"),
            "keyboard grabbed"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let failed = Arc::clone(&failed);
            let timeout = poll_timeout(self.poll_timeout);
            thread::Builder::new()
                .name("q9-capture".into())
                .spawn(move || {
                    read_loop(device, mirror, sink, gate, &stop, timeout);
                    if !stop.load(Ordering::Acquire) {
                        failed.store(true, Ordering::Release);
                    }
                })?
        };

        self.worker = Some(Worker {
            stop,
            failed,
            handle,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        if worker.handle.join().is_err() {
            error!("capture thread panicked");
        }
        info!("keyboard released");
    }

    fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn has_failed(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.failed.load(Ordering::Acquire))
    }
}

impl Drop for EvdevCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a key code to the tracked set.
pub(crate) fn classify(code: u16) -> Option<KeyKind> {
    let key = Key::new(code);
    let digit = match key {
        Key::KEY_KP0 => 0,
        Key::KEY_KP1 => 1,
        Key::KEY_KP2 => 2,
        Key::KEY_KP3 => 3,
        Key::KEY_KP4 => 4,
        Key::KEY_KP5 => 5,
        Key::KEY_KP6 => 6,
        Key::KEY_KP7 => 7,
        Key::KEY_KP8 => 8,
        Key::KEY_KP9 => 9,
        Key::KEY_KPDOT => return Some(KeyKind::Dot),
        Key::KEY_F10 => return Some(KeyKind::ToggleVisibility),
        _ => return None,
    };
    Some(KeyKind::Digit(digit))
}

/// Per-event decision. Only presses (value 1) of captured keys are
/// enqueued; their releases and repeats are swallowed so the host never
/// sees half a keystroke.
pub(crate) fn decide(event_type: EventType, code: u16, value: i32, live: bool) -> Decision {
    if event_type == EventType::SYNCHRONIZATION {
        return Decision::Skip;
    }
    if event_type != EventType::KEY {
        return Decision::Mirror;
    }
    let kind = classify(code);
    match (route(kind, live), kind) {
        (Route::Capture, Some(kind)) if value == 1 => Decision::Enqueue(kind),
        (Route::Capture, _) => Decision::Swallow,
        (Route::PassThrough, _) => Decision::Mirror,
    }
}

/// Decisions for one fetched report, in order. The gate is read per event
/// and a toggle press flips it before the next event is routed, so a digit
/// right behind F10 is mirrored instead of swallowed for a hidden session.
pub(crate) fn decide_batch(
    events: impl IntoIterator<Item = (EventType, u16, i32)>,
    gate: &CaptureGate,
) -> Vec<Decision> {
    events
        .into_iter()
        .map(|(event_type, code, value)| {
            let decision = decide(event_type, code, value, gate.is_live());
            if let Decision::Enqueue(kind) = decision {
                gate.observe(kind);
            }
            decision
        })
        .collect()
}

fn read_loop(
    mut device: Device,
    mut mirror: VirtualDevice,
    sink: EventSender,
    gate: CaptureGate,
    stop: &AtomicBool,
    timeout: PollTimeout,
) {
    let fd = device.as_raw_fd();
    let mut passthrough: Vec<InputEvent> = Vec::new();

    'read: while !stop.load(Ordering::Acquire) {
        // SAFETY: `device` owns the fd and outlives this borrow.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) | Err(Errno::EINTR) => continue,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "poll on input device failed");
                break;
            }
        }

        let events: Vec<InputEvent> = match device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                error!(error = %e, "reading input device failed, capture stopped");
                break;
            }
        };

        let decisions = decide_batch(
            events.iter().map(|e| (e.event_type(), e.code(), e.value())),
            &gate,
        );
        passthrough.clear();
        for (event, decision) in events.into_iter().zip(decisions) {
            match decision {
                Decision::Mirror => passthrough.push(event),
                Decision::Enqueue(kind) => {
                    debug!(?kind, "captured");
                    if !sink.send(kind) {
                        warn!("event consumer gone, capture stopped");
                        break 'read;
                    }
                }
                Decision::Swallow | Decision::Skip => {}
            }
        }

        if !passthrough.is_empty() {
            if let Err(e) = mirror.emit(&passthrough) {
                error!(error = %e, "writing mirror device failed, capture stopped");
                break;
            }
        }
    }

    if let Err(e) = device.ungrab() {
        warn!(error = %e, "ungrab failed");
    }
}

fn build_mirror(device: &Device) -> Result<VirtualDevice, CaptureError> {
    let builder = VirtualDeviceBuilder::new()?.name(MIRROR_NAME);
    let builder = match device.supported_keys() {
        Some(keys) => builder.with_keys(keys)?,
        None => {
            let mut keys = AttributeSet::<Key>::new();
            for code in 0..256u16 {
                keys.insert(Key::new(code));
            }
            builder.with_keys(&keys)?
        }
    };
    Ok(builder.build()?)
}

fn poll_timeout(timeout: Duration) -> PollTimeout {
    let ms = timeout.as_millis().min(u128::from(u16::MAX)) as u16;
    PollTimeout::from(ms)
}

fn open_error(path: &Path, e: io::Error) -> CaptureError {
    match e.kind() {
        io::ErrorKind::NotFound => CaptureError::DeviceNotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(path.to_path_buf()),
        _ => CaptureError::Io(e),
    }
}

fn grab_error(path: &Path, e: io::Error) -> CaptureError {
    if e.raw_os_error() == Some(Errno::EBUSY as i32) {
        CaptureError::DeviceBusy(path.to_path_buf())
    } else {
        open_error(path, e)
    }
}
