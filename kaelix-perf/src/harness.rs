//! Harness-level settings.
//!
//! These control the harness itself rather than any workload: how long
//! stopped drivers get to wind down, the default log filter, and the report
//! format. Defaults can be overridden with `KAELIX_PERF_*` environment
//! variables.

use crate::error::{PerfError, Result};
use crate::report::{ReportFormat, Reporter};
use std::time::Duration;
use tracing::debug;

/// Prefix of harness environment variables.
pub const ENV_PREFIX: &str = "KAELIX_PERF";

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_LOG_FILTER: &str = "info";

/// Harness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Time stopped drivers get to report before they are aborted
    pub shutdown_grace: Duration,
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Report rendering
    pub report_format: ReportFormat,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            report_format: ReportFormat::default(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    /// Returns [`PerfError::Configuration`] for unparsable values.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Defaults overridden by `vars`. Recognised keys, after the
    /// `KAELIX_PERF_` prefix: `SHUTDOWN_GRACE_MS`, `LOG`, `REPORT_FORMAT`.
    /// Other keys are ignored.
    ///
    /// # Errors
    /// Returns [`PerfError::Configuration`] for unparsable values.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = format!("{ENV_PREFIX}_");
        let mut config = Self::default();

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(&prefix) else {
                continue;
            };
            let value = value.as_ref().trim();
            match name {
                "SHUTDOWN_GRACE_MS" => {
                    let ms = value.parse::<u64>().map_err(|e| {
                        PerfError::configuration("harness", format!("{ENV_PREFIX}_{name}: {e}"))
                    })?;
                    config.shutdown_grace = Duration::from_millis(ms);
                }
                "LOG" => config.log_filter = value.to_string(),
                "REPORT_FORMAT" => {
                    config.report_format = value
                        .parse()
                        .map_err(|e: String| PerfError::configuration("harness", e))?;
                }
                _ => {
                    debug!(variable = key.as_ref(), "ignoring unknown harness variable");
                    continue;
                }
            }
            debug!(variable = key.as_ref(), "applied harness override");
        }

        Ok(config)
    }

    /// Reporter for the configured report format.
    #[must_use]
    pub fn reporter(&self) -> Box<dyn Reporter> {
        self.report_format.reporter()
    }

    /// Set the shutdown grace.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.report_format, ReportFormat::Human);
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let config = HarnessConfig::from_vars([
            ("KAELIX_PERF_SHUTDOWN_GRACE_MS", "250"),
            ("KAELIX_PERF_LOG", "kaelix_perf=debug"),
            ("KAELIX_PERF_REPORT_FORMAT", "json"),
            ("KAELIX_PERF_UNKNOWN", "x"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert_eq!(config.shutdown_grace, Duration::from_millis(250));
        assert_eq!(config.log_filter, "kaelix_perf=debug");
        assert_eq!(config.report_format, ReportFormat::Json);
    }

    #[test]
    fn reporter_follows_report_format() {
        let report = crate::report::sample_report();
        let json = HarnessConfig::from_vars([("KAELIX_PERF_REPORT_FORMAT", "json")]).unwrap();
        let rendered = json.reporter().render_to_string(&report);
        assert!(serde_json::from_str::<serde_json::Value>(&rendered).is_ok());

        let human = HarnessConfig::default().reporter().render_to_string(&report);
        assert!(human.starts_with("run "));
    }

    #[test]
    fn bad_values_are_configuration_errors() {
        let err =
            HarnessConfig::from_vars([("KAELIX_PERF_SHUTDOWN_GRACE_MS", "soon")]).unwrap_err();
        assert!(err.is_configuration());
        assert!(HarnessConfig::from_vars([("KAELIX_PERF_REPORT_FORMAT", "xml")]).is_err());
    }
}
