use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use evdev::{Device, Key};
use serde::Serialize;
use tracing::debug;

const BY_PATH_DIR: &str = "/dev/input/by-path";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDeviceInfo {
    pub name: String,
    pub path: PathBuf,
}

/// Keyboards with a numeric keypad, listed once per device name. Stable
/// `by-path` links are preferred over the raw `eventN` nodes they point to.
pub fn list_input_devices() -> Vec<InputDeviceInfo> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    let mut by_path: Vec<PathBuf> = fs::read_dir(BY_PATH_DIR)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_event_link(p))
                .collect()
        })
        .unwrap_or_default();
    by_path.sort();

    for path in by_path {
        match Device::open(&path) {
            Ok(device) => push_keypad(&mut found, &mut seen, path, &device),
            Err(e) => debug!(path = %path.display(), error = %e, "skipping device"),
        }
    }

    let mut nodes: Vec<(PathBuf, Device)> = evdev::enumerate().collect();
    nodes.sort_by(|a, b| a.0.cmp(&b.0));
    for (path, device) in nodes {
        push_keypad(&mut found, &mut seen, path, &device);
    }

    found
}

fn is_event_link(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("event"))
}

fn push_keypad(
    found: &mut Vec<InputDeviceInfo>,
    seen: &mut HashSet<String>,
    path: PathBuf,
    device: &Device,
) {
    let has_keypad = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::KEY_KP0) && keys.contains(Key::KEY_KPDOT));
    if !has_keypad {
        return;
    }
    let name = device.name().unwrap_or("unknown").to_string();
    if seen.insert(name.clone()) {
        found.push(InputDeviceInfo { name, path });
    }
}
