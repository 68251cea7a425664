//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`

use std::sync::OnceLock;

use serde::Deserialize;

use crate::script::ScriptMode;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Poll intervals at or above this defeat the sub-100ms latency target.
const MAX_POLL_INTERVAL_MS: u64 = 100;

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub capture: CaptureSettings,
    pub engine: EngineSettings,
    pub output: OutputSettings,
    pub dictionary: DictionarySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// evdev on Linux, the low-level hook on Windows, none elsewhere.
    Auto,
    Evdev,
    Hook,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    pub backend: CaptureBackend,
    pub device_path: String,
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    pub script: ScriptMode,
    pub direct_typing: DirectTyping,
    pub type_command: Vec<String>,
    pub copy_commands: Vec<Vec<String>>,
    pub paste_command: Vec<String>,
    pub paste_delay_ms: u64,
}

/// Whether the output injector tries direct text input before the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectTyping {
    /// Only when the backend injects text natively.
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DictionarySettings {
    pub path: String,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn invalid(field: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(invalid(
                    concat!(stringify!($section), ".", stringify!($field)),
                    "must be positive",
                ));
            }
        };
    }

    check_positive!(capture.poll_timeout_ms);
    check_positive!(engine.poll_interval_ms);
    check_positive!(engine.batch_size);

    if s.engine.poll_interval_ms >= MAX_POLL_INTERVAL_MS {
        return Err(invalid(
            "engine.poll_interval_ms",
            "must be below 100 to keep input latency under 100ms",
        ));
    }
    if s.output.type_command.is_empty() {
        return Err(invalid("output.type_command", "must not be empty"));
    }
    if s.output.paste_command.is_empty() {
        return Err(invalid("output.paste_command", "must not be empty"));
    }
    if s.output.copy_commands.iter().any(|c| c.is_empty()) {
        return Err(invalid("output.copy_commands", "entries must not be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_replaced(from: &str, to: &str) -> String {
        assert!(DEFAULT_SETTINGS_TOML.contains(from), "{from} not in defaults");
        DEFAULT_SETTINGS_TOML.replace(from, to)
    }

    #[test]
    fn parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.capture.backend, CaptureBackend::Auto);
        assert_eq!(s.capture.device_path, "");
        assert_eq!(s.capture.poll_timeout_ms, 100);
        assert_eq!(s.engine.poll_interval_ms, 10);
        assert_eq!(s.engine.batch_size, 10);
        assert_eq!(s.output.script, ScriptMode::Traditional);
        assert_eq!(s.output.direct_typing, DirectTyping::Auto);
        assert_eq!(s.output.type_command[0], "xdotool");
        assert_eq!(s.output.copy_commands.len(), 2);
        assert_eq!(s.output.paste_command.last().map(String::as_str), Some("ctrl+v"));
        assert_eq!(s.dictionary.path, "q9.dict");
    }

    #[test]
    fn parse_custom_backend_and_script() {
        let toml = with_replaced("backend = \"auto\"", "backend = \"none\"")
            .replace("script = \"traditional\"", "script = \"simplified\"");
        let s = parse_settings_toml(&toml).unwrap();
        assert_eq!(s.capture.backend, CaptureBackend::None);
        assert_eq!(s.output.script, ScriptMode::Simplified);
    }

    #[test]
    fn parse_direct_typing_values() {
        for (value, expected) in [("on", DirectTyping::On), ("off", DirectTyping::Off)] {
            let toml = with_replaced(
                "direct_typing = \"auto\"",
                &format!("direct_typing = \"{value}\""),
            );
            assert_eq!(parse_settings_toml(&toml).unwrap().output.direct_typing, expected);
        }
        let toml = with_replaced("direct_typing = \"auto\"", "direct_typing = \"maybe\"");
        assert!(matches!(parse_settings_toml(&toml), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn error_zero_batch_size() {
        let toml = with_replaced("batch_size = 10", "batch_size = 0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
        assert!(err.to_string().contains("engine.batch_size"));
    }

    #[test]
    fn error_slow_poll_interval() {
        let toml = with_replaced("poll_interval_ms = 10", "poll_interval_ms = 250");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("engine.poll_interval_ms"));
    }

    #[test]
    fn error_empty_paste_command() {
        let toml = with_replaced(
            "paste_command = [\"xdotool\", \"key\", \"--clearmodifiers\", \"ctrl+v\"]",
            "paste_command = []",
        );
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("output.paste_command"));
    }

    #[test]
    fn error_unknown_backend() {
        let toml = with_replaced("backend = \"auto\"", "backend = \"x11\"");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_settings_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_missing_section() {
        let toml = r#"
[engine]
poll_interval_ms = 10
batch_size = 10
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
