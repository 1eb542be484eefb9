//! Portal endpoints, browser header set, and user settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Credentials, ScometError, ScometResult};

pub const DEFAULT_BASE_URL: &str = "https://scomet.ro";

/// Default refresh interval in seconds.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;

/// Name of the session cookie issued on login.
pub const SESSION_COOKIE: &str = "deskis";

const LOGIN_PATH: &str = "/index.php?vprog=proprietari&autentificare=true";
const SITUATION_PATH: &str = "/index.php?meniu=apartament&submeniu=situatie";
const INVOICES_PATH: &str = "/index.php?meniu=apartament&submeniu=facturi";
const PAYMENT_PATH: &str = "/index.php?meniu=apartament&submeniu=plateste";
const WATER_PATH: &str = "/index.php?meniu=apartament&submeniu=consumuri";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Headers the portal expects from a desktop browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserHeaders {
    pub accept: String,
    pub user_agent: String,
}

impl Default for BrowserHeaders {
    fn default() -> Self {
        Self {
            accept: ACCEPT.to_string(),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl BrowserHeaders {
    pub(crate) fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            ("accept", self.accept.as_str()),
            ("user-agent", self.user_agent.as_str()),
        ]
    }
}

/// Fixed endpoints and request settings for one portal origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub login_url: String,
    pub situation_url: String,
    pub invoices_url: String,
    pub payment_url: String,
    pub water_url: String,
    pub session_cookie: String,
    pub headers: BrowserHeaders,
    /// Per-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::for_origin(DEFAULT_BASE_URL)
    }
}

impl PortalConfig {
    /// Build the endpoint set for another origin, e.g. a local mock server.
    pub fn with_base_url(base: &str) -> ScometResult<Self> {
        let parsed = url::Url::parse(base)
            .map_err(|e| ScometError::Config(format!("invalid base URL '{base}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScometError::Config(format!(
                "base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self::for_origin(base.trim_end_matches('/')))
    }

    fn for_origin(origin: &str) -> Self {
        Self {
            login_url: format!("{origin}{LOGIN_PATH}"),
            situation_url: format!("{origin}{SITUATION_PATH}"),
            invoices_url: format!("{origin}{INVOICES_PATH}"),
            payment_url: format!("{origin}{PAYMENT_PATH}"),
            water_url: format!("{origin}{WATER_PATH}"),
            session_cookie: SESSION_COOKIE.to_string(),
            headers: BrowserHeaders::default(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// User settings, read from a JSON file and overridden by the environment.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub update_interval_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("update_interval_secs", &self.update_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Settings {
    /// Load settings from `path` (if it exists), then apply `SCOMET_*` env overrides.
    pub fn load(path: &Path) -> ScometResult<Self> {
        let mut settings = Self::from_file(path)?;
        settings.apply_env_from(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read a settings file. A missing file yields empty settings.
    pub fn from_file(path: &Path) -> ScometResult<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {}", path.display());
            return Ok(Self::default());
        }
        tracing::debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Override file values with whatever `lookup` returns for the `SCOMET_*` keys.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SCOMET_USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = lookup("SCOMET_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("SCOMET_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = lookup("SCOMET_UPDATE_INTERVAL") {
            match v.parse() {
                Ok(secs) => self.update_interval_secs = Some(secs),
                Err(_) => tracing::warn!("Ignoring SCOMET_UPDATE_INTERVAL={v}: not a number"),
            }
        }
    }

    pub fn credentials(&self) -> ScometResult<Credentials> {
        let username = self
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ScometError::Config("username is not set".to_string()))?;
        let password = self
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ScometError::Config("password is not set".to_string()))?;
        Ok(Credentials::new(username, password))
    }

    pub fn portal_config(&self) -> ScometResult<PortalConfig> {
        let config = match self.base_url.as_deref() {
            Some(base) => PortalConfig::with_base_url(base)?,
            None => PortalConfig::default(),
        };
        Ok(match self.request_timeout_secs {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        })
    }

    pub fn update_interval(&self) -> ScometResult<Duration> {
        match self.update_interval_secs {
            Some(0) => Err(ScometError::Config(
                "update_interval_secs must be greater than zero".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS)),
        }
    }
}

/// Resolve the settings file path.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var("SCOMET_CONFIG") {
        return PathBuf::from(env_path);
    }

    let cwd_config = PathBuf::from("scomet.json");
    if cwd_config.exists() {
        return cwd_config;
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scomet")
        .join("config.json")
}
