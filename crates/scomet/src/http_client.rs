//! Authenticated page requests.
//!
//! Not a browser, just GET requests carrying the session cookie and the
//! header set the portal expects. No retries: a failed page is reported to
//! the caller, which decides whether the session must be renewed.

use reqwest::header::COOKIE;

use crate::config::{BrowserHeaders, PortalConfig};
use crate::types::{ScometError, ScometResult};

/// GET client for the portal pages.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    headers: BrowserHeaders,
    cookie_name: String,
}

impl PageFetcher {
    /// Wrap a client (normally the session manager's) for page requests.
    pub fn new(client: reqwest::Client, config: &PortalConfig) -> Self {
        Self {
            client,
            headers: config.headers.clone(),
            cookie_name: config.session_cookie.clone(),
        }
    }

    /// Fetch a page and return its body. Anything but HTTP 200 is an error.
    pub async fn fetch(&self, url: &str, token: &str) -> ScometResult<String> {
        let resp = self.send(url, token).await?;
        let body = resp.text().await?;
        tracing::debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }

    /// Check that a page answers HTTP 200 without reading its body.
    pub async fn probe(&self, url: &str, token: &str) -> ScometResult<()> {
        self.send(url, token).await.map(|_| ())
    }

    async fn send(&self, url: &str, token: &str) -> ScometResult<reqwest::Response> {
        let mut request = self
            .client
            .get(url)
            .header(COOKIE, format!("{}={}", self.cookie_name, token));
        for (name, value) in self.headers.pairs() {
            request = request.header(name, value);
        }

        let resp = request.send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ScometError::Fetch {
                status,
                url: url.to_string(),
            });
        }
        Ok(resp)
    }
}
