//! Run mode, configuration shape, and the shared runtime handle.
//!
//! The surrounding application decides how configuration reaches the process;
//! this module only defines the deserializable shape and the [`SkinRuntime`]
//! handle that skins share once assembly is done.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

/// Whether the process trades performance for edit-reload latency.
///
/// Development mode enables per-access template staleness rechecks and
/// per-request cache-busting timestamps; production mode compiles each
/// template once and serves a fixed timestamp for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Development,
    #[default]
    Production,
}

impl RunMode {
    /// True in development mode.
    pub fn is_development(self) -> bool {
        matches!(self, RunMode::Development)
    }
}

/// Skin-related configuration, typically a section of the application's
/// config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkinConfig {
    /// Run mode. Defaults to production.
    #[serde(default)]
    pub run_mode: RunMode,

    /// Application-root URL prepended to every generated href.
    /// Empty means the application is served at the site root.
    #[serde(default)]
    pub site_url: String,
}

/// Process-wide values shared by every skin: the run mode, the application
/// root URL, and the process-start timestamp used for stable cache-busting.
///
/// Constructed once during application assembly and passed to each skin.
#[derive(Debug)]
pub struct SkinRuntime {
    mode: RunMode,
    site_url: String,
    startup: SystemTime,
}

impl SkinRuntime {
    /// Build a runtime handle, capturing the current time as the process
    /// start for production cache-busting.
    pub fn new(config: SkinConfig) -> Self {
        Self {
            mode: config.run_mode,
            site_url: config.site_url,
            startup: SystemTime::now(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_development(&self) -> bool {
        self.mode.is_development()
    }

    /// Application-root URL used as the base of every generated href.
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Process start time.
    pub fn startup(&self) -> SystemTime {
        self.startup
    }

    pub(crate) fn startup_seconds(&self) -> f64 {
        unix_seconds(self.startup)
    }
}

/// Seconds since the Unix epoch as a float, the unit of the `t=` query
/// parameter on generated hrefs.
pub(crate) fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
