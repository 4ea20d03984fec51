//! Timing and heuristic knobs for the engine.
//!
//! Defaults reproduce the behaviour the host page has been tuned against; an
//! injector may override any subset through a camelCase JSON document.

use serde::{Deserialize, Serialize};

/// When the value-write guard rewrites a prefixed value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterceptPolicy {
    /// Every prefixed write is cleaned.
    #[default]
    Always,
    /// Only once some dialog has seen the squash strategy selected.
    SquashOnly,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanerConfig {
    /// One-shot pass delays scheduled when a dialog is first seen.
    pub attempt_delays_ms: Vec<u64>,
    /// Period of the bounded early poll.
    pub poll_period_ms: u64,
    /// Maximum number of poll runs (0 disables the poll).
    pub poll_max_runs: u32,
    /// Quiescence window for mutation-triggered passes.
    pub debounce_ms: u64,
    /// Extra passes after a completion click (a microtask pass always runs).
    pub click_followups_ms: Vec<u64>,
    /// Extra passes after the customize checkbox got checked.
    pub customize_followups_ms: Vec<u64>,
    /// Period of the full-document fallback rescan (0 disables it).
    pub rescan_period_ms: u64,
    /// Lowercase word a dialog's text must contain to be a candidate.
    pub dialog_keyword: String,
    /// Tick the "customize merge commit" checkbox when it is unchecked.
    pub enforce_customize: bool,
    /// Attach a watcher to each discovered text surface.
    pub watch_fields: bool,
    pub intercept: InterceptPolicy,
    pub debug: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            attempt_delays_ms: vec![0, 50, 150, 400, 1000, 2000, 3000, 5000, 8000],
            poll_period_ms: 500,
            poll_max_runs: 20,
            debounce_ms: 75,
            click_followups_ms: vec![0, 150, 300],
            customize_followups_ms: vec![100, 500],
            rescan_period_ms: 15_000,
            dialog_keyword: "complete".to_string(),
            enforce_customize: true,
            watch_fields: true,
            intercept: InterceptPolicy::Always,
            debug: false,
        }
    }
}

impl CleanerConfig {
    /// Parse a (partial) JSON configuration on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_max_runs > 0 && self.poll_period_ms == 0 {
            return Err(ConfigError::Invalid("pollPeriodMs must be non-zero while polling is enabled"));
        }
        if self.dialog_keyword.trim().is_empty() {
            return Err(ConfigError::Invalid("dialogKeyword must not be empty"));
        }
        Ok(())
    }
}

/// Error returned by [`CleanerConfig::from_json`].
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "invalid cleaner config: {err}"),
            ConfigError::Invalid(reason) => write!(f, "invalid cleaner config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = CleanerConfig::from_json("{}").unwrap();
        assert_eq!(config, CleanerConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = CleanerConfig::from_json(
            r#"{ "debounceMs": 10, "intercept": "squashOnly", "debug": true }"#,
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 10);
        assert_eq!(config.intercept, InterceptPolicy::SquashOnly);
        assert!(config.debug);
        assert_eq!(config.poll_max_runs, 20);
    }

    #[test]
    fn rejects_zero_poll_period() {
        let err = CleanerConfig::from_json(r#"{ "pollPeriodMs": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = CleanerConfig::from_json(r#"{ "pollPeriodMs": 0, "pollMaxRuns": 0 }"#).unwrap();
        assert_eq!(config.poll_max_runs, 0);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = CleanerConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid cleaner config"));
    }
}
