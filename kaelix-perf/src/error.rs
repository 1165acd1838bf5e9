//! Error types for profile planning and execution.

use thiserror::Error;

/// Errors raised while turning a profile into running workloads.
#[derive(Error, Debug, Clone)]
pub enum PerfError {
    /// The profile cannot be executed as written. Raised before any
    /// workload starts.
    #[error("Configuration error in {scope}: {message}")]
    Configuration { scope: String, message: String },

    /// A workload's client failed while sending or receiving.
    #[error("Workload '{instance}' failed: {source}")]
    Workload {
        instance: String,
        #[source]
        source: kaelix_core::Error,
    },

    /// A profile document could not be parsed.
    #[error("Failed to parse {format} profile: {message}")]
    ProfileParse { format: &'static str, message: String },
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, PerfError>;

impl PerfError {
    /// Configuration problem attributed to `scope` (an instance id, a
    /// group, or the profile).
    pub fn configuration(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration { scope: scope.into(), message: message.into() }
    }

    /// Client failure inside workload `instance`.
    pub fn workload(instance: impl Into<String>, source: kaelix_core::Error) -> Self {
        Self::Workload { instance: instance.into(), source }
    }

    /// Whether this error was raised before execution started.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::ProfileParse { .. })
    }
}

impl From<serde_json::Error> for PerfError {
    fn from(err: serde_json::Error) -> Self {
        Self::ProfileParse { format: "JSON", message: err.to_string() }
    }
}

impl From<toml::de::Error> for PerfError {
    fn from(err: toml::de::Error) -> Self {
        Self::ProfileParse { format: "TOML", message: err.to_string() }
    }
}
