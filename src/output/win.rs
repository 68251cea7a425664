use std::mem::size_of;
use std::ptr;

use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, OpenClipboard, SetClipboardData,
};
use windows::Win32::System::Memory::{GlobalAlloc, GlobalFree, GlobalLock, GlobalUnlock, GMEM_MOVEABLE};
use windows::Win32::System::Ole::CF_UNICODETEXT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
    KEYEVENTF_UNICODE, VIRTUAL_KEY, VK_CONTROL, VK_V,
};

use super::{OutputBackend, OutputError};

/// Delivery through `SendInput` and the Win32 clipboard.
pub struct WinInputBackend;

impl WinInputBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WinInputBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for WinInputBackend {
    fn name(&self) -> &'static str {
        "sendinput"
    }

    fn type_text(&mut self, text: &str) -> Result<(), OutputError> {
        let mut inputs = Vec::new();
        for unit in text.encode_utf16() {
            inputs.push(key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE));
            inputs.push(key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
        }
        send(&inputs)
    }

    fn types_natively(&self) -> bool {
        true
    }

    fn set_clipboard(&mut self, text: &str) -> Result<(), OutputError> {
        let wide: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
        // SAFETY: the clipboard is opened and closed within this block; the
        // global allocation is handed to the system only on success.
        unsafe {
            OpenClipboard(HWND::default()).map_err(platform)?;
            let result = fill_clipboard(&wide);
            let _ = CloseClipboard();
            result
        }
    }

    fn paste(&mut self) -> Result<(), OutputError> {
        let inputs = [
            key_input(VK_CONTROL, 0, KEYBD_EVENT_FLAGS(0)),
            key_input(VK_V, 0, KEYBD_EVENT_FLAGS(0)),
            key_input(VK_V, 0, KEYEVENTF_KEYUP),
            key_input(VK_CONTROL, 0, KEYEVENTF_KEYUP),
        ];
        send(&inputs)
    }
}

unsafe fn fill_clipboard(wide: &[u16]) -> Result<(), OutputError> {
    EmptyClipboard().map_err(platform)?;
    let mem = GlobalAlloc(GMEM_MOVEABLE, wide.len() * size_of::<u16>()).map_err(platform)?;
    let dst = GlobalLock(mem) as *mut u16;
    if dst.is_null() {
        let _ = GlobalFree(mem);
        return Err(OutputError::Platform("GlobalLock failed".into()));
    }
    ptr::copy_nonoverlapping(wide.as_ptr(), dst, wide.len());
    let _ = GlobalUnlock(mem);
    if let Err(e) = SetClipboardData(u32::from(CF_UNICODETEXT.0), HANDLE(mem.0)) {
        let _ = GlobalFree(mem);
        return Err(platform(e));
    }
    Ok(())
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<(), OutputError> {
    if inputs.is_empty() {
        return Ok(());
    }
    // SAFETY: `inputs` is a valid slice of initialized INPUT records.
    let sent = unsafe { SendInput(inputs, size_of::<INPUT>() as i32) };
    if sent as usize == inputs.len() {
        Ok(())
    } else {
        Err(OutputError::Platform(format!(
            "SendInput injected {sent} of {} events",
            inputs.len()
        )))
    }
}

fn platform(e: windows::core::Error) -> OutputError {
    OutputError::Platform(e.to_string())
}
