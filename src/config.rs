//! Launcher configuration.
//!
//! `LauncherConfig` controls how the [`LaunchRouter`](crate::launcher::LaunchRouter)
//! treats inbound launch requests on a given device: whether per-page windows
//! are available at all, whether the embedded (hosted) mode switch is on, and
//! how long the router may wait for the default landing page.
//!
//! `LauncherConfig` provides sensible defaults via [`Default`] and a fluent
//! [`LauncherConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_launcher::LauncherConfig;
//! let cfg = LauncherConfig::default();
//! assert_eq!(cfg.landing_page_timeout.as_millis(), 500);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use std::time::Duration;
//! use gosub_launcher::LauncherConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = LauncherConfig::builder()
//!     .embedded_mode_enabled(true)
//!     .multi_instance(false)
//!     .landing_page_timeout(Duration::from_millis(250))
//!     .fallback_landing_url("gosub://newtab/")
//!     .build()?;
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `page_mode_supported`: Per-page windows are available on this device (default: true).
//!   The user can still opt out through the preference store.
//! - `embedded_mode_enabled`: Requests with the append flag may spawn an embedded window.
//! - `multi_instance`: The host allows a second launcher instance (split screen vendors).
//! - `landing_page_timeout`: Bounded wait for the landing page provider (default: 500ms).
//! - `fallback_landing_url`: Page opened when the provider is silent or too slow.
//! - `raise_failure_counter`: Diagnostic counter name for failed raise-to-front attempts.
//!
//! # Errors
//!
//! Builder validation can return [`LauncherConfigError`] if values are invalid
//! (zero timeout, unparsable fallback URL, empty counter name).

use std::fmt;
use std::time::Duration;

pub const DEFAULT_LANDING_PAGE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_FALLBACK_LANDING_URL: &str = "gosub://newtab/";
pub const DEFAULT_RAISE_FAILURE_COUNTER: &str = "Launcher.RaiseToFrontFailed";

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub page_mode_supported: bool,
    pub embedded_mode_enabled: bool,
    pub multi_instance: bool,
    pub landing_page_timeout: Duration,
    pub fallback_landing_url: String,
    pub raise_failure_counter: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            page_mode_supported: true,
            embedded_mode_enabled: false,
            multi_instance: false,
            landing_page_timeout: DEFAULT_LANDING_PAGE_TIMEOUT,
            fallback_landing_url: DEFAULT_FALLBACK_LANDING_URL.to_string(),
            raise_failure_counter: DEFAULT_RAISE_FAILURE_COUNTER.to_string(),
        }
    }
}

impl LauncherConfig {
    pub fn builder() -> LauncherConfigBuilder {
        LauncherConfigBuilder::default()
    }
}

/// Builder for [`LauncherConfig`].
#[derive(Debug, Clone, Default)]
pub struct LauncherConfigBuilder {
    inner: LauncherConfig,
}

impl LauncherConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut LauncherConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn page_mode_supported(self, on: bool) -> Self { self.map(|c| c.page_mode_supported = on) }
    pub fn embedded_mode_enabled(self, on: bool) -> Self { self.map(|c| c.embedded_mode_enabled = on) }
    pub fn multi_instance(self, on: bool) -> Self { self.map(|c| c.multi_instance = on) }
    pub fn landing_page_timeout(self, timeout: Duration) -> Self { self.map(|c| c.landing_page_timeout = timeout) }
    pub fn fallback_landing_url<S: Into<String>>(self, url: S) -> Self { self.map(|c| c.fallback_landing_url = url.into()) }
    pub fn raise_failure_counter<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.raise_failure_counter = name.into()) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut LauncherConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<LauncherConfig, LauncherConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum LauncherConfigError {
    ZeroLandingTimeout,
    InvalidFallbackUrl(String),
    EmptyCounterName,
}

impl fmt::Display for LauncherConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LauncherConfigError::ZeroLandingTimeout =>
                write!(f, "landing_page_timeout must be greater than zero"),
            LauncherConfigError::InvalidFallbackUrl(url) =>
                write!(f, "fallback_landing_url '{url}' is not a valid URL"),
            LauncherConfigError::EmptyCounterName =>
                write!(f, "raise_failure_counter must not be empty"),
        }
    }
}
impl std::error::Error for LauncherConfigError {}

fn validate(c: &LauncherConfig) -> Result<(), LauncherConfigError> {
    if c.landing_page_timeout.is_zero() {
        return Err(LauncherConfigError::ZeroLandingTimeout);
    }
    if url::Url::parse(&c.fallback_landing_url).is_err() {
        return Err(LauncherConfigError::InvalidFallbackUrl(c.fallback_landing_url.clone()));
    }
    if c.raise_failure_counter.trim().is_empty() {
        return Err(LauncherConfigError::EmptyCounterName);
    }
    Ok(())
}
