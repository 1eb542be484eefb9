//! Login and session-cookie lifecycle.
//!
//! The portal has no token refresh endpoint. A held `deskis` cookie is
//! presumed valid until a page request says otherwise; the next
//! [`SessionManager::ensure_valid`] call then logs in again.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use tokio::sync::Mutex;

use crate::config::PortalConfig;
use crate::types::{Credentials, ScometError, ScometResult};

/// Owns the HTTP client, its cookie jar, and the current session token.
pub struct SessionManager {
    client: reqwest::Client,
    jar: Arc<Jar>,
    config: Arc<PortalConfig>,
    /// `config.login_url` as `reqwest` normalizes it.
    login_url: url::Url,
    credentials: Credentials,
    /// Held across a login so concurrent callers wait for it.
    token: Mutex<Option<String>>,
}

impl SessionManager {
    /// Build a session manager with a fresh cookie jar and no token.
    pub fn new(config: Arc<PortalConfig>, credentials: Credentials) -> ScometResult<Self> {
        let login_url = url::Url::parse(&config.login_url).map_err(|e| {
            ScometError::Config(format!("invalid login URL '{}': {e}", config.login_url))
        })?;
        let jar = Arc::new(Jar::default());

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(reqwest::redirect::Policy::limited(5));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            jar,
            config,
            login_url,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Shared HTTP client. Cloning it is cheap.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Return the held token, logging in first if there is none.
    pub async fn ensure_valid(&self) -> ScometResult<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            tracing::debug!("Session cookie present, assuming it is still valid");
            return Ok(current.clone());
        }

        tracing::debug!("No session cookie held, logging in");
        match self.authenticate().await {
            Ok(fresh) => {
                *token = Some(fresh.clone());
                Ok(fresh)
            }
            Err(e) => Err(login_failed(e)),
        }
    }

    /// Post the credentials and store the session cookie on success.
    ///
    /// Any failure clears the held token. Safe to call repeatedly.
    pub async fn login(&self) -> bool {
        let mut token = self.token.lock().await;
        match self.authenticate().await {
            Ok(fresh) => {
                *token = Some(fresh);
                true
            }
            Err(e) => {
                tracing::error!("Login failed: {e}");
                *token = None;
                false
            }
        }
    }

    /// Currently held session token.
    pub async fn token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    /// Drop the held token so the next `ensure_valid` logs in again.
    pub async fn invalidate(&self) {
        if self.token.lock().await.take().is_some() {
            tracing::info!("Session cookie invalidated");
        }
    }

    /// Log in again after the portal rejected `stale`.
    ///
    /// If a concurrent caller already replaced `stale`, its token is returned
    /// without another login. The held token changes only once the new login
    /// completes, so a cancelled renewal leaves it as it was.
    pub(crate) async fn renew(&self, stale: &str) -> ScometResult<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_deref().filter(|current| *current != stale) {
            tracing::debug!("Session cookie already renewed");
            return Ok(current.to_string());
        }

        tracing::info!("Session cookie rejected by portal, logging in again");
        match self.authenticate().await {
            Ok(fresh) => {
                *token = Some(fresh.clone());
                Ok(fresh)
            }
            Err(e) => {
                *token = None;
                Err(login_failed(e))
            }
        }
    }

    async fn authenticate(&self) -> ScometResult<String> {
        let form = [
            ("utilizator", self.credentials.username.as_str()),
            ("parola", self.credentials.password.as_str()),
        ];

        let mut request = self.client.post(&self.config.login_url);
        for (name, value) in self.config.headers.pairs() {
            request = request.header(name, value);
        }

        let resp = request.form(&form[..]).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ScometError::Authentication(format!(
                "login returned HTTP {status}"
            )));
        }

        // A cookie set on an intermediate redirect only shows up in the jar.
        // Without a redirect the jar may still hold a cookie from an earlier
        // session, so it is not consulted.
        let redirected = *resp.url() != self.login_url;
        let name = self.config.session_cookie.as_str();
        let found = resp
            .cookies()
            .find(|c| c.name() == name && !c.value().is_empty())
            .map(|c| c.value().to_string())
            .or_else(|| redirected.then(|| self.cookie_from_jar(name)).flatten());

        match found {
            Some(value) => {
                tracing::info!("Login succeeded, session cookie {}", mask(&value));
                Ok(value)
            }
            None => Err(ScometError::Authentication(format!(
                "login response did not set the '{name}' cookie"
            ))),
        }
    }

    fn cookie_from_jar(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.login_url)?;
        cookie_from_header(header.to_str().ok()?, name)
    }
}

fn login_failed(e: ScometError) -> ScometError {
    tracing::error!("Login failed: {e}");
    match e {
        ScometError::Authentication(_) => e,
        other => ScometError::Authentication(other.to_string()),
    }
}

/// Pick one cookie value out of a `Cookie:` header value.
fn cookie_from_header(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

/// Shorten a token for logs.
pub(crate) fn mask(token: &str) -> String {
    let head: String = token.chars().take(4).collect();
    format!("{head}…")
}
