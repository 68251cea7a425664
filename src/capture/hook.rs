//! Windows capture: a low-level keyboard hook on a dedicated thread that
//! runs its own message pump.

use std::cell::{Cell, RefCell};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use q9_core::key::KeyKind;
use tracing::{error, info, warn};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN, WM_USER,
};

use super::{route, CaptureAdapter, CaptureError, CaptureGate, Route};
use crate::channel::EventSender;

const VK_NUMPAD0: u32 = 0x60;
const VK_NUMPAD9: u32 = 0x69;
const VK_DECIMAL: u32 = 0x6E;
const VK_F10: u32 = 0x79;

struct HookContext {
    sink: EventSender,
    gate: CaptureGate,
    /// Tracked keys currently down, so autorepeat is not enqueued twice.
    held: Cell<u16>,
}

fn held_bit(kind: KeyKind) -> u16 {
    match kind {
        KeyKind::Digit(d) => 1 << d,
        KeyKind::Dot => 1 << 10,
        KeyKind::ToggleVisibility | KeyKind::ToggleScript => 1 << 11,
    }
}

thread_local! {
    // Only the hook thread ever fills this; the callback runs on that thread.
    static CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
}

pub struct HookCapture {
    worker: Option<HookWorker>,
}

struct HookWorker {
    thread_id: u32,
    handle: JoinHandle<()>,
}

impl HookCapture {
    pub fn new() -> Self {
        Self { worker: None }
    }
}

impl Default for HookCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureAdapter for HookCapture {
    fn name(&self) -> &'static str {
        "hook"
    }

    fn start(&mut self, sink: EventSender, gate: CaptureGate) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();
        let handle = thread::Builder::new()
            .name("q9-hook".into())
            .spawn(move || hook_thread(sink, gate, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!("keyboard hook installed");
                self.worker = Some(HookWorker { thread_id, handle });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(CaptureError::HookRejected(reason))
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::HookRejected("hook thread exited".into()))
            }
        }
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // SAFETY: plain message post to a thread id we own.
        let posted = unsafe { PostThreadMessageW(worker.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            if !worker.handle.is_finished() {
                // Still pumping; keep the handle so a later stop or drop retries.
                warn!(error = %e, "could not signal hook thread, capture still active");
                self.worker = Some(worker);
                return;
            }
        }
        if worker.handle.join().is_err() {
            error!("hook thread panicked");
        }
        info!("keyboard hook removed");
    }

    fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn has_failed(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.handle.is_finished())
    }
}

impl Drop for HookCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn classify_vk(vk: u32) -> Option<KeyKind> {
    match vk {
        VK_NUMPAD0..=VK_NUMPAD9 => Some(KeyKind::Digit((vk - VK_NUMPAD0) as u8)),
        VK_DECIMAL => Some(KeyKind::Dot),
        VK_F10 => Some(KeyKind::ToggleVisibility),
        _ => None,
    }
}

fn hook_thread(sink: EventSender, gate: CaptureGate, ready: mpsc::Sender<Result<u32, String>>) {
    CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = Some(HookContext {
            sink,
            gate,
            held: Cell::new(0),
        })
    });

    // SAFETY: Win32 calls confined to this thread; the hook handle never
    // leaves it.
    unsafe {
        let mut msg = MSG::default();
        // Force the message queue into existence before anyone posts WM_QUIT.
        let _ = PeekMessageW(&mut msg, HWND::default(), WM_USER, WM_USER, PM_NOREMOVE);

        let module = match GetModuleHandleW(None) {
            Ok(m) => HINSTANCE::from(m),
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), module, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        let _ = ready.send(Ok(GetCurrentThreadId()));

        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if let Err(e) = UnhookWindowsHookEx(hook) {
            warn!(error = %e, "unhook failed");
        }
    }

    CONTEXT.with(|ctx| ctx.borrow_mut().take());
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 && lparam.0 != 0 {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        if let Some(kind) = classify_vk(info.vkCode) {
            let is_press = matches!(wparam.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN);
            let swallow = CONTEXT.with(|ctx| {
                let ctx = ctx.borrow();
                let Some(ctx) = ctx.as_ref() else {
                    return false;
                };
                match route(Some(kind), ctx.gate.is_live()) {
                    Route::Capture => {
                        let bit = held_bit(kind);
                        let held = ctx.held.get();
                        if is_press {
                            if held & bit == 0 {
                                ctx.sink.send(kind);
                                ctx.gate.observe(kind);
                            }
                            ctx.held.set(held | bit);
                        } else {
                            ctx.held.set(held & !bit);
                        }
                        true
                    }
                    Route::PassThrough => false,
                }
            });
            if swallow {
                return LRESULT(1);
            }
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}
