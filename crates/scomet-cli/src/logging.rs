//! Tracing subscriber setup.
//!
//! HTTP-stack and HTML-parser crates are capped at `warn` so `debug` shows
//! the portal flow rather than connection-pool chatter. `RUST_LOG` overrides
//! everything.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Modules filtered to `warn` regardless of the requested level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "cookie_store",
    "html5ever",
    "selectors",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{module}=warn"));
    }
    EnvFilter::new(directives)
}

/// Install the global subscriber. Logs go to stderr; stdout carries results.
pub fn init(log_level: &str, format: LogFormat) {
    let filter = build_filter(log_level);
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
    }
}
