//! Periodic refresh driver.
//!
//! Holds the most recent snapshot for consumers. A failed cycle keeps the
//! previous snapshot and records the error; the next tick tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use crate::api::ScometApi;
use crate::types::{ScometResult, Snapshot};

pub struct Coordinator {
    api: Arc<ScometApi>,
    interval: Duration,
    latest: RwLock<Option<Arc<Snapshot>>>,
    last_error: RwLock<Option<String>>,
}

impl Coordinator {
    pub fn new(api: Arc<ScometApi>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            latest: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &ScometApi {
        &self.api
    }

    /// Most recent successful snapshot.
    pub async fn data(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().await.clone()
    }

    /// Error of the last cycle, if it failed.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Run one cycle now and store the result.
    pub async fn update(&self) -> ScometResult<Arc<Snapshot>> {
        match self.api.refresh().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.latest.write().await = Some(Arc::clone(&snapshot));
                *self.last_error.write().await = None;
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!("Update failed: {e}");
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Refresh every `interval` until `shutdown` completes.
    ///
    /// The first cycle runs immediately. `on_update` sees every result.
    pub async fn run<S, F>(&self, shutdown: S, mut on_update: F)
    where
        S: Future<Output = ()>,
        F: FnMut(&ScometResult<Arc<Snapshot>>),
    {
        tracing::info!("Refreshing every {}s", self.interval.as_secs());
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        result = self.update() => on_update(&result),
                    }
                }
            }
        }
        tracing::info!("Coordinator stopped");
    }
}
