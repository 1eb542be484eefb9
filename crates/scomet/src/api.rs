//! One refresh cycle: session → pages → extractors → snapshot.

use std::future::Future;
use std::sync::Arc;

use crate::config::{PortalConfig, Settings};
use crate::extract::{extract_invoices, extract_situation, extract_water_consumption};
use crate::http_client::PageFetcher;
use crate::session::SessionManager;
use crate::types::{Credentials, ScometResult, Snapshot};

/// Client for the Scomet owners portal.
pub struct ScometApi {
    session: SessionManager,
    fetcher: PageFetcher,
    config: Arc<PortalConfig>,
}

impl ScometApi {
    pub fn new(config: PortalConfig, credentials: Credentials) -> ScometResult<Self> {
        let config = Arc::new(config);
        let session = SessionManager::new(Arc::clone(&config), credentials)?;
        let fetcher = PageFetcher::new(session.client().clone(), &config);
        Ok(Self {
            session,
            fetcher,
            config,
        })
    }

    pub fn from_settings(settings: &Settings) -> ScometResult<Self> {
        Self::new(settings.portal_config()?, settings.credentials()?)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Session token currently held, for diagnostics.
    pub async fn current_token(&self) -> Option<String> {
        self.session.token().await
    }

    /// Run one refresh cycle.
    ///
    /// Fails only when no session can be obtained. Page and extraction
    /// failures leave the affected fields empty.
    pub async fn refresh(&self) -> ScometResult<Snapshot> {
        tracing::debug!("Starting refresh");
        let token = self.session.ensure_valid().await?;
        let cfg = &self.config;

        let (situation, invoices, water, payment) = futures::join!(
            self.with_session(&token, |t| async move {
                self.fetcher.fetch(&cfg.situation_url, &t).await
            }),
            self.with_session(&token, |t| async move {
                self.fetcher.fetch(&cfg.invoices_url, &t).await
            }),
            self.with_session(&token, |t| async move {
                self.fetcher.fetch(&cfg.water_url, &t).await
            }),
            self.with_session(&token, |t| async move {
                self.fetcher.probe(&cfg.payment_url, &t).await
            }),
        );

        let mut snapshot = Snapshot::empty();

        if let Some(html) = page_or_warn(situation) {
            let values = extract_situation(&html);
            snapshot.occupants = values.occupants;
            snapshot.sold = values.sold;
        }
        if let Some(html) = page_or_warn(invoices) {
            let values = extract_invoices(&html);
            snapshot.total = values.total;
            snapshot.invoice_date = values.invoice_date;
            snapshot.due_date = values.due_date;
        }
        if let Some(html) = page_or_warn(water) {
            snapshot.water_consumption = extract_water_consumption(&html);
        }
        if page_or_warn(payment).is_some() {
            snapshot.payment_url = Some(cfg.payment_url.clone());
        }

        let missing = snapshot.missing();
        if missing.is_empty() {
            tracing::info!("Refresh complete, all fields read");
        } else {
            let names: Vec<&str> = missing.iter().map(|f| f.key()).collect();
            tracing::info!("Refresh complete, missing: {}", names.join(", "));
        }
        tracing::debug!("Snapshot: {snapshot:?}");

        Ok(snapshot)
    }

    /// Payment page URL, if the page is reachable with the current session.
    pub async fn get_payment_url(&self) -> Option<String> {
        let token = match self.session.ensure_valid().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Cannot resolve payment URL: {e}");
                return None;
            }
        };

        let url = &self.config.payment_url;
        let probe = self
            .with_session(&token, |t| async move { self.fetcher.probe(url, &t).await })
            .await;
        page_or_warn(probe).map(|_| url.clone())
    }

    /// Run `op` with `token`; if the portal rejects it, log in again and retry once.
    async fn with_session<T, F, Fut>(&self, token: &str, op: F) -> ScometResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = ScometResult<T>>,
    {
        match op(token.to_string()).await {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("{e}, renewing session");
                let fresh = self.session.renew(token).await?;
                op(fresh).await
            }
            other => other,
        }
    }
}

fn page_or_warn<T>(result: ScometResult<T>) -> Option<T> {
    match result {
        Ok(page) => Some(page),
        Err(e) => {
            tracing::warn!("Page unavailable: {e}");
            None
        }
    }
}
