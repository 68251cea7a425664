//! Delivery of committed text to the focused application.
//!
//! [`OutputInjector`] applies script conversion and walks the degrade
//! chain: direct typing, then clipboard plus paste, then clipboard only.
//! Whatever happens, the last committed text stays retrievable.

#[cfg(unix)]
mod command;
#[cfg(windows)]
mod win;

#[cfg(unix)]
pub use self::command::CommandBackend;
#[cfg(windows)]
pub use self::win::WinInputBackend;

use std::io;
use std::sync::Arc;

use q9_core::dict::Dictionary;
use q9_core::script::{convert_text, ScriptMode};
use q9_core::settings::{DirectTyping, OutputSettings};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with status {code:?}")]
    Status { command: String, code: Option<i32> },

    #[error("{0} not supported by this backend")]
    Unsupported(&'static str),

    #[error("platform error: {0}")]
    Platform(String),
}

/// How far down the degrade chain a commit got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Typed,
    Pasted,
    ClipboardOnly,
    /// Nothing reached the host; the text is only in `last_output`.
    Retained,
}

/// Host text delivery primitives.
pub trait OutputBackend: Send {
    fn name(&self) -> &'static str;

    fn type_text(&mut self, text: &str) -> Result<(), OutputError>;

    /// Typing goes through a native text-injection API rather than an
    /// external tool; `DirectTyping::Auto` enables typing only then.
    fn types_natively(&self) -> bool {
        false
    }

    fn set_clipboard(&mut self, text: &str) -> Result<(), OutputError>;

    /// Trigger the host paste shortcut for the current clipboard.
    fn paste(&mut self) -> Result<(), OutputError>;
}

/// Backend that delivers nothing.
pub struct NullBackend;

impl OutputBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn type_text(&mut self, _text: &str) -> Result<(), OutputError> {
        Err(OutputError::Unsupported("typing"))
    }

    fn set_clipboard(&mut self, _text: &str) -> Result<(), OutputError> {
        Err(OutputError::Unsupported("clipboard"))
    }

    fn paste(&mut self) -> Result<(), OutputError> {
        Err(OutputError::Unsupported("paste"))
    }
}

/// The delivery backend this platform supports best.
#[cfg(unix)]
pub fn platform_backend(settings: &OutputSettings) -> Box<dyn OutputBackend> {
    Box::new(CommandBackend::from_settings(settings))
}

#[cfg(windows)]
pub fn platform_backend(_settings: &OutputSettings) -> Box<dyn OutputBackend> {
    Box::new(WinInputBackend::new())
}

#[cfg(not(any(unix, windows)))]
pub fn platform_backend(_settings: &OutputSettings) -> Box<dyn OutputBackend> {
    Box::new(NullBackend)
}

pub struct OutputInjector {
    backend: Box<dyn OutputBackend>,
    dict: Arc<dyn Dictionary>,
    direct_typing: bool,
    last_output: Option<String>,
}

impl OutputInjector {
    pub fn new(
        backend: Box<dyn OutputBackend>,
        dict: Arc<dyn Dictionary>,
        typing: DirectTyping,
    ) -> Self {
        let direct_typing = match typing {
            DirectTyping::On => true,
            DirectTyping::Off => false,
            DirectTyping::Auto => backend.types_natively(),
        };
        debug!(backend = backend.name(), direct_typing, "output injector ready");
        Self {
            backend,
            dict,
            direct_typing,
            last_output: None,
        }
    }

    /// Deliver one committed string, converted per `script` at this moment.
    /// Never fails; the result says how far delivery got.
    pub fn emit(&mut self, text: &str, script: ScriptMode) -> Delivery {
        let out = convert_text(self.dict.as_ref(), text, script);
        let delivery = self.deliver(&out);
        match delivery {
            Delivery::Typed | Delivery::Pasted => {
                debug!(text = %out, ?delivery, backend = self.backend.name(), "emitted")
            }
            Delivery::ClipboardOnly => info!(text = %out, "text left on clipboard"),
            Delivery::Retained => error!(text = %out, "output failed, text retained"),
        }
        self.last_output = Some(out);
        delivery
    }

    /// The most recently committed text after conversion.
    pub fn last_output(&self) -> Option<&str> {
        self.last_output.as_deref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn types_directly(&self) -> bool {
        self.direct_typing
    }

    fn deliver(&mut self, text: &str) -> Delivery {
        if self.direct_typing {
            match self.backend.type_text(text) {
                Ok(()) => return Delivery::Typed,
                Err(e) => warn!(error = %e, "direct typing failed, falling back to paste"),
            }
        }
        if let Err(e) = self.backend.set_clipboard(text) {
            warn!(error = %e, "clipboard unavailable");
            return Delivery::Retained;
        }
        match self.backend.paste() {
            Ok(()) => Delivery::Pasted,
            Err(e) => {
                warn!(error = %e, "paste failed");
                Delivery::ClipboardOnly
            }
        }
    }
}
