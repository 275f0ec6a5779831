//! Environment-derived builder settings, resolved once at `build()` time.
//!
//! Tests should construct [`EnvSettings`] directly rather than going through [`EnvSettings::from_env`]
//! and mutating `std::env` — `std::env::set_var` is process-global and races across parallel test
//! threads.

use std::path::PathBuf;

/// `WORKFLOW_ENABLE_OTEL_DIAGNOSTICS` / `WORKFLOW_CHECKPOINT_DIR`, read once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    /// Default false. When false, OpenTelemetry span emission is a no-op; `tracing` diagnostics
    /// are unaffected either way.
    pub enable_otel_diagnostics: bool,
    /// Default unset. A file-backed checkpoint store built without an explicit directory argument
    /// falls back to this; with neither set, `WorkflowBuilder::build()` errors rather than picking
    /// a silent default location.
    pub checkpoint_dir: Option<PathBuf>,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self {
            enable_otel_diagnostics: std::env::var("WORKFLOW_ENABLE_OTEL_DIAGNOSTICS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            checkpoint_dir: std::env::var("WORKFLOW_CHECKPOINT_DIR").ok().map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_disable_otel_and_leave_checkpoint_dir_unset() {
        let settings = EnvSettings::default();
        assert!(!settings.enable_otel_diagnostics);
        assert!(settings.checkpoint_dir.is_none());
    }
}
