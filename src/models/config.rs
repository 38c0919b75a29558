use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use termcolor::ColorChoice;

use crate::utils::error::{AppError, AppResult};

/// Interface used when none is given on the command line
pub const DEFAULT_INTERFACE: &str = "any";

/// When to colour console output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolve to a termcolor choice; `auto` only colours a real terminal.
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto if std::io::stdout().is_terminal() => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interfaces handed to the capture provider
    pub interfaces: Vec<String>,

    /// Directory receiving the raw capture file
    pub capture_dir: PathBuf,

    /// Capture provider executable
    pub tshark_path: String,

    /// Field separator requested from the provider
    pub separator: char,

    /// Console colouring
    pub color: ColorMode,

    /// Seconds the provider gets to flush after being interrupted
    pub stop_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interfaces: vec![DEFAULT_INTERFACE.to_string()],
            capture_dir: PathBuf::from("captures"),
            tshark_path: "tshark".to_string(),
            separator: '|',
            color: ColorMode::Auto,
            stop_timeout_secs: 5,
        }
    }
}

impl AppConfig {
    /// Normalise interface selections: trims entries, drops blanks and falls
    /// back to capturing on every interface.
    pub fn with_interfaces<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selected: Vec<String> = interfaces
            .into_iter()
            .map(|iface| iface.as_ref().trim().to_string())
            .filter(|iface| !iface.is_empty())
            .collect();

        self.interfaces = if selected.is_empty() {
            vec![DEFAULT_INTERFACE.to_string()]
        } else {
            selected
        };
        self
    }

    /// Reject settings the provider output could not be parsed with
    pub fn validate(&self) -> AppResult<()> {
        let sep = self.separator;
        if sep.is_alphanumeric() || sep.is_whitespace() || matches!(sep, ':' | '.' | ',') {
            return Err(AppError::ConfigError(format!(
                "separator {:?} collides with addresses, ports or protocol names",
                sep
            )));
        }

        if self.tshark_path.trim().is_empty() {
            return Err(AppError::ConfigError("provider path must not be empty".to_string()));
        }

        Ok(())
    }

    /// Path of the capture file for a run started at `started`
    pub fn capture_file(&self, started: DateTime<Local>) -> PathBuf {
        self.capture_dir
            .join(format!("capture_{}.pcap", started.format("%Y%m%d_%H%M%S")))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_interface_selection_means_any() {
        let config = AppConfig::default().with_interfaces(["", "  "]);
        assert_eq!(config.interfaces, vec!["any"]);
    }

    #[test]
    fn interface_entries_are_trimmed() {
        let config = AppConfig::default().with_interfaces([" 1", "2 ", "eth0"]);
        assert_eq!(config.interfaces, vec!["1", "2", "eth0"]);
    }

    #[test]
    fn capture_file_is_timestamped() {
        let config = AppConfig {
            capture_dir: PathBuf::from("/tmp/caps"),
            ..AppConfig::default()
        };
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        assert_eq!(
            config.capture_file(started),
            PathBuf::from("/tmp/caps/capture_20240309_140507.pcap")
        );
    }

    #[test]
    fn rejects_separators_that_appear_in_fields() {
        for separator in ['a', '7', ' ', '\t', ':', '.', ','] {
            let config = AppConfig {
                separator,
                ..AppConfig::default()
            };
            assert!(config.validate().is_err(), "{:?} should be rejected", separator);
        }

        assert!(AppConfig::default().validate().is_ok());
        let semicolon = AppConfig {
            separator: ';',
            ..AppConfig::default()
        };
        assert!(semicolon.validate().is_ok());
    }

    #[test]
    fn config_round_trips_through_json() {
        let json = serde_json::to_string(&AppConfig::default()).unwrap();
        assert!(json.contains("\"color\":\"auto\""));
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.interfaces, vec!["any"]);
        assert_eq!(parsed.separator, '|');
    }
}
