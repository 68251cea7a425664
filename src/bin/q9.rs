use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use q9_engine::capture;
use q9_engine::dict::{Dictionary, TableDictionary};
use q9_engine::key::KeyKind;
use q9_engine::output::{self, OutputInjector};
use q9_engine::presenter::ConsolePresenter;
use q9_engine::script::ScriptMode;
use q9_engine::settings::{self, CaptureBackend};
use q9_engine::{init_tracing, Controller};

#[derive(Parser)]
#[command(name = "q9", about = "Q9 numeric keypad composition engine")]
struct Cli {
    /// Settings TOML replacing the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Compiled dictionary file
    #[arg(long)]
    dict: Option<PathBuf>,
    /// Input device to grab (evdev backend)
    #[arg(long)]
    device: Option<PathBuf>,
    /// Capture backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
    /// Start with simplified output
    #[arg(long)]
    simplified: bool,
    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,
    /// Write JSON trace logs to this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// List keyboards with a numeric keypad and exit
    #[arg(long)]
    list_devices: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    Evdev,
    Hook,
    None,
}

impl From<BackendArg> for CaptureBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => CaptureBackend::Auto,
            BackendArg::Evdev => CaptureBackend::Evdev,
            BackendArg::Hook => CaptureBackend::Hook,
            BackendArg::None => CaptureBackend::None,
        }
    }
}

enum Input {
    Click(KeyKind),
    Quit,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_deref());

    if cli.list_devices {
        return list_devices();
    }

    if let Some(path) = &cli.config {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        settings::init_custom(content).context("invalid settings")?;
    }
    let mut cfg = settings::settings().clone();
    if let Some(device) = &cli.device {
        cfg.capture.device_path = device.display().to_string();
    }
    if let Some(backend) = cli.backend {
        cfg.capture.backend = backend.into();
    }
    if cli.simplified {
        cfg.output.script = ScriptMode::Simplified;
    }

    let dict_path = cli
        .dict
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.dictionary.path));
    let dict: Arc<dyn Dictionary> = Arc::new(TableDictionary::open_or_empty(&dict_path));

    let injector = OutputInjector::new(
        output::platform_backend(&cfg.output),
        Arc::clone(&dict),
        cfg.output.direct_typing,
    );
    let mut controller = Controller::new(
        dict,
        capture::from_settings(&cfg.capture),
        injector,
        Box::new(ConsolePresenter::stdout(cli.json)),
        cfg.output.script,
        cfg.engine.batch_size,
    );

    let term = Arc::new(AtomicBool::new(false));
    register_signals(&term)?;
    let clicks = spawn_stdin_reader()?;

    controller.start();
    info!(
        interval_ms = cfg.engine.poll_interval_ms,
        "running; type keys on stdin (0-9 . t s, q to quit)"
    );

    let interval = Duration::from_millis(cfg.engine.poll_interval_ms);
    'run: while !term.load(Ordering::Relaxed) {
        controller.poll();
        while let Ok(input) = clicks.try_recv() {
            match input {
                Input::Click(kind) => {
                    controller.click(kind);
                }
                Input::Quit => break 'run,
            }
        }
        thread::sleep(interval);
    }

    controller.shutdown();
    Ok(())
}

#[cfg(unix)]
fn register_signals(term: &Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(term))
            .context("installing signal handler")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn register_signals(_term: &Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Stdin lines become clicks. `q` quits; tokens made only of keypad
/// characters are split into one click per character.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<Input>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("q9-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                for token in line.split_whitespace() {
                    if token == "q" {
                        let _ = tx.send(Input::Quit);
                        return;
                    }
                    for kind in parse_token(token) {
                        if tx.send(Input::Click(kind)).is_err() {
                            return;
                        }
                    }
                }
            }
        })
        .context("spawning stdin reader")?;
    Ok(rx)
}

fn parse_token(token: &str) -> Vec<KeyKind> {
    if let Some(kind) = KeyKind::from_token(token) {
        return vec![kind];
    }
    let split: Option<Vec<KeyKind>> = token
        .chars()
        .map(|c| KeyKind::from_token(c.encode_utf8(&mut [0; 4])))
        .collect();
    split.unwrap_or_else(|| {
        warn!(token, "unknown key token");
        Vec::new()
    })
}

#[cfg(target_os = "linux")]
fn list_devices() -> Result<()> {
    let devices = capture::list_input_devices();
    if devices.is_empty() {
        eprintln!("no keypad devices found (is this user in the input group?)");
    }
    for dev in devices {
        println!("{}\t{}", dev.path.display(), dev.name);
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn list_devices() -> Result<()> {
    anyhow::bail!("device listing is only available with the evdev backend")
}
