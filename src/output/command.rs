use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use q9_core::settings::OutputSettings;
use tracing::debug;

use super::{OutputBackend, OutputError};

/// Delivery through external tools (`xdotool`, `wl-copy`, `xclip`).
pub struct CommandBackend {
    type_command: Vec<String>,
    copy_commands: Vec<Vec<String>>,
    paste_command: Vec<String>,
    paste_delay: Duration,
}

impl CommandBackend {
    pub fn from_settings(settings: &OutputSettings) -> Self {
        Self {
            type_command: settings.type_command.clone(),
            copy_commands: settings.copy_commands.clone(),
            paste_command: settings.paste_command.clone(),
            paste_delay: Duration::from_millis(settings.paste_delay_ms),
        }
    }
}

impl OutputBackend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    fn type_text(&mut self, text: &str) -> Result<(), OutputError> {
        run(&self.type_command, Some(text), None)
    }

    fn set_clipboard(&mut self, text: &str) -> Result<(), OutputError> {
        let mut last_err = OutputError::Unsupported("clipboard");
        for command in &self.copy_commands {
            match run(command, None, Some(text)) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(error = %e, "clipboard command failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn paste(&mut self) -> Result<(), OutputError> {
        if !self.paste_delay.is_zero() {
            thread::sleep(self.paste_delay);
        }
        run(&self.paste_command, None, None)
    }
}

/// Run `argv`, optionally appending `arg` and feeding `stdin`.
fn run(argv: &[String], arg: Option<&str>, stdin: Option<&str>) -> Result<(), OutputError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(OutputError::Unsupported("empty command"));
    };
    let spawn_err = |source: std::io::Error| OutputError::Spawn {
        command: program.clone(),
        source,
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .args(arg)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(spawn_err)?;
    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                // The child may have exited without reading; reap it either way.
                drop(pipe);
                let _ = child.wait();
                return Err(spawn_err(e));
            }
        }
    }
    let status = child.wait().map_err(spawn_err)?;
    if status.success() {
        Ok(())
    } else {
        Err(OutputError::Status {
            command: program.clone(),
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn run_reports_missing_program() {
        let err = run(&argv(&["q9-no-such-tool"]), Some("x"), None).unwrap_err();
        assert!(matches!(err, OutputError::Spawn { .. }));
    }

    #[test]
    fn run_reports_exit_status() {
        let err = run(&argv(&["sh", "-c", "exit 3"]), None, None).unwrap_err();
        assert!(matches!(err, OutputError::Status { code: Some(3), .. }));
    }

    #[test]
    fn run_feeds_stdin() {
        // `grep -q` exits 0 only if the expected text arrived on stdin.
        run(&argv(&["grep", "-q", "好"]), None, Some("你好")).unwrap();
    }

    #[test]
    fn run_reaps_child_that_ignores_stdin() {
        // More than a pipe buffer, so the write fails once `true` has exited.
        let input = "字".repeat(256 * 1024);
        let err = run(&argv(&["true"]), None, Some(&input)).unwrap_err();
        match err {
            OutputError::Spawn { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::BrokenPipe)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clipboard_tries_each_command() {
        let mut backend = CommandBackend {
            type_command: argv(&["false"]),
            copy_commands: vec![argv(&["q9-no-such-tool"]), argv(&["sh", "-c", "cat > /dev/null"])],
            paste_command: argv(&["true"]),
            paste_delay: Duration::ZERO,
        };
        backend.set_clipboard("字").unwrap();
        backend.paste().unwrap();
        assert!(backend.type_text("字").is_err());
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = run(&[], None, None).unwrap_err();
        assert!(matches!(err, OutputError::Unsupported(_)));
    }
}
