//! Rendering seam between the controller and whatever shows candidates.

use std::io::{self, Write};

use q9_session::{Mode, Snapshot, Visibility};
use tracing::warn;

pub trait Presenter: Send {
    fn render(&mut self, snapshot: &Snapshot);

    /// Called when the window becomes visible again so it can follow the
    /// focused application.
    fn reposition(&mut self) {}

    /// Capture is unavailable; only clicks reach the session.
    fn set_degraded(&mut self, _reason: &str) {}
}

/// Line-oriented presenter for the headless driver: one line per snapshot,
/// either human readable or JSON.
pub struct ConsolePresenter<W: Write + Send> {
    out: W,
    json: bool,
}

impl ConsolePresenter<io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(io::stdout(), json)
    }
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "presenter write failed");
        }
    }
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn render(&mut self, snapshot: &Snapshot) {
        let line = if self.json {
            match serde_json::to_string(snapshot) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "snapshot serialization failed");
                    return;
                }
            }
        } else {
            format_snapshot(snapshot)
        };
        self.write_line(&line);
    }

    fn set_degraded(&mut self, reason: &str) {
        let line = if self.json {
            serde_json::json!({ "degraded": reason }).to_string()
        } else {
            format!("[capture unavailable: {reason}; click mode]")
        };
        self.write_line(&line);
    }
}

pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut line = match snapshot.visibility {
        Visibility::Hidden => String::from("[hidden]"),
        Visibility::Shown => format!("[{}]", snapshot.script.label()),
    };
    match snapshot.mode {
        Mode::Idle => line.push_str(" idle"),
        Mode::Composing => {
            line.push_str(" code ");
            line.push_str(&snapshot.buffer);
        }
        Mode::Selecting | Mode::RelatePreview => {
            if snapshot.mode == Mode::Selecting {
                line.push_str(&format!(
                    " page {}/{}",
                    snapshot.page + 1,
                    snapshot.page_count
                ));
            } else {
                line.push_str(" related");
            }
            for (i, slot) in snapshot.slots.iter().enumerate() {
                if let Some(text) = slot {
                    line.push_str(&format!(" {}:{}", i + 1, text));
                }
            }
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use q9_core::script::ScriptMode;

    use super::*;

    fn selecting() -> Snapshot {
        let mut slots = vec![None; 9];
        slots[0] = Some("你".to_string());
        slots[2] = Some("嗎".to_string());
        Snapshot {
            mode: Mode::Selecting,
            buffer: String::new(),
            slots,
            page: 0,
            page_count: 2,
            visibility: Visibility::Shown,
            script: ScriptMode::Traditional,
        }
    }

    #[test]
    fn text_line_skips_empty_slots() {
        assert_eq!(
            format_snapshot(&selecting()),
            "[traditional] page 1/2 1:你 3:嗎"
        );
    }

    #[test]
    fn hidden_and_idle() {
        let snap = Snapshot {
            visibility: Visibility::Hidden,
            ..Snapshot::default()
        };
        assert_eq!(format_snapshot(&snap), "[hidden] idle");
    }

    #[test]
    fn json_lines() {
        let mut presenter = ConsolePresenter::new(Vec::new(), true);
        presenter.render(&selecting());
        presenter.set_degraded("no device");
        let out = String::from_utf8(presenter.into_inner()).unwrap();
        let mut lines = out.lines();
        let first: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(first["mode"], "selecting");
        assert_eq!(first["slots"][0], "你");
        assert!(first["slots"][1].is_null());
        let second: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(second["degraded"], "no device");
    }
}
