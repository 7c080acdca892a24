//! Collaborators queried by the router.
//!
//! Each collaborator is a small object-safe trait so hosts can plug in their
//! own implementation. Simple in-process implementations live next to the
//! traits; they are what the demo and the tests run against.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use crate::launcher::request::LaunchRequest;

/// User opted out of per-page windows.
pub const PREF_OPTED_OUT_OF_PAGE_MODE: &str = "launcher.page_mode.opted_out";
/// The page mode preference flipped and old windows still need sweeping.
pub const PREF_MIGRATION_PENDING: &str = "launcher.page_mode.migration_pending";

/// Source of the default landing page (partner customization and the like).
#[async_trait]
pub trait LandingPageProvider: Send + Sync {
    /// Returns the landing page URL, or `None` when there is no customization.
    async fn landing_page(&self) -> Option<String>;
}

/// Verifies that a mini-app shortcut was minted for the URL it carries.
pub trait MiniAppVerifier: Send + Sync {
    fn is_url_valid(&self, url: &str, mac: &[u8]) -> bool;
}

/// Private-session encryption key.
#[async_trait]
pub trait PrivateKeyStore: Send + Sync {
    fn has_key(&self) -> bool;

    /// One-shot restoration of the key from its saved state.
    async fn restore_key(&self) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FirstRunResult {
    Completed,
    Aborted,
}

/// First run experience.
#[async_trait]
pub trait FirstRunFlow: Send + Sync {
    fn is_required(&self, request: &LaunchRequest) -> bool;

    async fn run(&self, request: &LaunchRequest) -> FirstRunResult;
}

/// Durable key/value preferences.
pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Option<bool>;

    fn set_bool(&self, key: &str, value: bool) -> Result<()>;
}

/// Collaborators a router is built with.
#[derive(Clone)]
pub struct LauncherServices {
    pub landing: Arc<dyn LandingPageProvider>,
    pub verifier: Arc<dyn MiniAppVerifier>,
    pub keys: Arc<dyn PrivateKeyStore>,
    pub first_run: Arc<dyn FirstRunFlow>,
    pub prefs: Arc<dyn PreferenceStore>,
}

impl std::fmt::Debug for LauncherServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LauncherServices").finish_non_exhaustive()
    }
}

impl Default for LauncherServices {
    fn default() -> Self {
        Self {
            landing: Arc::new(StaticLandingPage::none()),
            verifier: Arc::new(MacAllowList::default()),
            keys: Arc::new(InMemoryKeyStore::new(true)),
            first_run: Arc::new(NoFirstRun),
            prefs: Arc::new(InMemoryPreferences::default()),
        }
    }
}

// ---------- In-process implementations ----------

/// Landing page provider that answers immediately with a fixed value.
#[derive(Debug, Clone)]
pub struct StaticLandingPage(Option<String>);

impl StaticLandingPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self(Some(url.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl LandingPageProvider for StaticLandingPage {
    async fn landing_page(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Verifier backed by a fixed URL to MAC table.
#[derive(Debug, Default)]
pub struct MacAllowList {
    macs: HashMap<String, Vec<u8>>,
}

impl MacAllowList {
    pub fn allow(mut self, url: impl Into<String>, mac: impl Into<Vec<u8>>) -> Self {
        self.macs.insert(url.into(), mac.into());
        self
    }
}

impl MiniAppVerifier for MacAllowList {
    fn is_url_valid(&self, url: &str, mac: &[u8]) -> bool {
        self.macs.get(url).is_some_and(|m| m.as_slice() == mac)
    }
}

#[derive(Debug)]
pub struct InMemoryKeyStore {
    present: AtomicBool,
    fail_restore: bool,
}

impl InMemoryKeyStore {
    pub fn new(present: bool) -> Self {
        Self { present: AtomicBool::new(present), fail_restore: false }
    }

    /// Key store whose restoration always fails.
    pub fn failing() -> Self {
        Self { present: AtomicBool::new(false), fail_restore: true }
    }
}

#[async_trait]
impl PrivateKeyStore for InMemoryKeyStore {
    fn has_key(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    async fn restore_key(&self) -> Result<()> {
        if self.fail_restore {
            return Err(anyhow!("no saved key state"));
        }
        self.present.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// First run that is never required.
#[derive(Debug, Default)]
pub struct NoFirstRun;

#[async_trait]
impl FirstRunFlow for NoFirstRun {
    fn is_required(&self, _request: &LaunchRequest) -> bool {
        false
    }

    async fn run(&self, _request: &LaunchRequest) -> FirstRunResult {
        FirstRunResult::Completed
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    values: RwLock<HashMap<String, bool>>,
}

impl PreferenceStore for InMemoryPreferences {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.read().ok()?.get(key).copied()
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values
            .write()
            .map_err(|_| anyhow!("preference lock poisoned"))?
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Preferences kept in a single JSON object on disk. Every write rewrites the file.
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    values: RwLock<HashMap<String, bool>>,
}

impl JsonPreferenceStore {
    /// Opens the store at `path`. A missing file starts out empty.
    pub fn open(path: PathBuf) -> Result<Self> {
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading preferences from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing preferences in {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self { path, values: RwLock::new(values) })
    }

    fn save(&self, values: &HashMap<String, bool>) -> Result<()> {
        let contents = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("writing preferences to {}", self.path.display()))?;
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.read().ok()?.get(key).copied()
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let mut values = self.values.write().map_err(|_| anyhow!("preference lock poisoned"))?;
        values.insert(key.to_string(), value);
        self.save(&values)
    }
}
