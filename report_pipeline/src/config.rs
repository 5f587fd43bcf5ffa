//! Process configuration.
//!
//! All settings are environment-sourced (with optional `.env` support at the
//! binary edge) and assembled exactly once into [`PipelineConfig`], which is
//! passed explicitly to each component. Business logic never does ambient
//! environment lookups.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::SecretString;
use shared_utils::env::{EnvError, get_env_parsed, get_env_var, get_env_var_or};
use thiserror::Error;

use crate::window::{CutoffHour, WindowError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("invalid REPORT_TIMEZONE: {0:?}")]
    BadTimezone(String),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Portal endpoint and credentials. The password stays wrapped until the
/// moment it is typed into the login form.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub reports_url: String,
    pub email: String,
    pub password: SecretString,
}

/// Business-day window settings.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    pub cutoff: CutoffHour,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub portal: PortalConfig,
    pub window: WindowConfig,
    pub database_url: String,
    /// Downloaded exports land here and are kept as an audit trail.
    pub export_dir: PathBuf,
    /// Per-selector-alternative visibility timeout.
    pub ui_timeout: Duration,
    /// Bound on the wait for the portal's task-status response.
    pub job_timeout: Duration,
}

impl PipelineConfig {
    /// Reads configuration from the environment.
    ///
    /// Required: `PORTAL_REPORTS_URL`, `PORTAL_EMAIL`, `PORTAL_PASSWORD`,
    /// `DATABASE_URL`. Optional with defaults: `REPORT_TIMEZONE`
    /// (Europe/Paris), `REPORT_CUTOFF_HOUR` (22), `EXPORT_DIR` (exports),
    /// `UI_TIMEOUT_SECS` (5), `JOB_TIMEOUT_SECS` (120).
    pub fn from_env() -> Result<Self, ConfigError> {
        let portal = PortalConfig {
            reports_url: get_env_var("PORTAL_REPORTS_URL")?,
            email: get_env_var("PORTAL_EMAIL")?,
            password: SecretString::from(get_env_var("PORTAL_PASSWORD")?),
        };

        let tz_name = get_env_var_or("REPORT_TIMEZONE", "Europe/Paris");
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| ConfigError::BadTimezone(tz_name))?;
        let cutoff = CutoffHour::new(get_env_parsed("REPORT_CUTOFF_HOUR", 22u32)?)?;

        Ok(Self {
            portal,
            window: WindowConfig { cutoff, timezone },
            database_url: get_env_var("DATABASE_URL")?,
            export_dir: PathBuf::from(get_env_var_or("EXPORT_DIR", "exports")),
            ui_timeout: Duration::from_secs(get_env_parsed("UI_TIMEOUT_SECS", 5u64)?),
            job_timeout: Duration::from_secs(get_env_parsed("JOB_TIMEOUT_SECS", 120u64)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set(name: &str, value: &str) {
        // SAFETY: tests touching the process environment are serialized.
        unsafe { std::env::set_var(name, value) };
    }

    fn unset(name: &str) {
        unsafe { std::env::remove_var(name) };
    }

    fn set_required() {
        set("PORTAL_REPORTS_URL", "https://portal.example/reports");
        set("PORTAL_EMAIL", "ops@example.com");
        set("PORTAL_PASSWORD", "secret");
        set("DATABASE_URL", "postgres://localhost/exports");
    }

    fn clear_all() {
        for name in [
            "PORTAL_REPORTS_URL",
            "PORTAL_EMAIL",
            "PORTAL_PASSWORD",
            "DATABASE_URL",
            "REPORT_TIMEZONE",
            "REPORT_CUTOFF_HOUR",
            "EXPORT_DIR",
            "UI_TIMEOUT_SECS",
            "JOB_TIMEOUT_SECS",
        ] {
            unset(name);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_optional_vars_unset() {
        clear_all();
        set_required();
        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.window.cutoff.get(), 22);
        assert_eq!(config.window.timezone, chrono_tz::Europe::Paris);
        assert_eq!(config.export_dir, PathBuf::from("exports"));
        assert_eq!(config.ui_timeout, Duration::from_secs(5));
        assert_eq!(config.job_timeout, Duration::from_secs(120));
        clear_all();
    }

    #[test]
    #[serial]
    fn missing_required_var_is_an_error() {
        clear_all();
        let err = PipelineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
        clear_all();
    }

    #[test]
    #[serial]
    fn invalid_timezone_rejected() {
        clear_all();
        set_required();
        set("REPORT_TIMEZONE", "Mars/Olympus_Mons");
        let err = PipelineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::BadTimezone(_)));
        clear_all();
    }

    #[test]
    #[serial]
    fn out_of_range_cutoff_rejected() {
        clear_all();
        set_required();
        set("REPORT_CUTOFF_HOUR", "24");
        let err = PipelineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Window(_)));
        clear_all();
    }
}
