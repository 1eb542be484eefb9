//! Scomet: session-keeping client for the Scomet owners portal.
//!
//! Logs in with the owner's credentials, keeps the `deskis` session cookie,
//! fetches the apartment pages and extracts billing values from their markup.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod extract;
pub mod http_client;
pub mod session;
pub mod types;

pub use api::ScometApi;
pub use config::{resolve_config_path, BrowserHeaders, PortalConfig, Settings};
pub use coordinator::Coordinator;
pub use http_client::PageFetcher;
pub use session::SessionManager;
pub use types::*;
