//! Scomet CLI entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use scomet::{resolve_config_path, Coordinator, ScometApi, Settings, Snapshot};

mod logging;

use logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "scomet",
    about = "Scomet owners portal client: balance, invoices and water consumption",
    version
)]
struct Cli {
    /// Path to the JSON settings file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Print snapshots as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, read every field once and print the snapshot (default).
    Refresh,

    /// Refresh on an interval until interrupted.
    Watch {
        /// Seconds between refreshes. Overrides the settings file.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Print the payment page URL if it is reachable.
    PaymentUrl,

    /// Generate shell completion scripts.
    ///
    /// Example:
    ///   scomet completions bash > ~/.local/share/bash-completion/completions/scomet
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    match cli.command.unwrap_or(Commands::Refresh) {
        Commands::Refresh => {
            let (api, _) = load_api(cli.config.as_deref())?;
            let snapshot = api.refresh().await.context("refresh failed")?;
            print_snapshot(&snapshot, cli.json)?;
        }

        Commands::Watch { interval } => {
            let (api, settings) = load_api(cli.config.as_deref())?;
            let interval = match interval {
                Some(0) => bail!("--interval must be greater than zero"),
                Some(secs) => Duration::from_secs(secs),
                None => settings.update_interval()?,
            };

            let coordinator = Coordinator::new(Arc::new(api), interval);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            let json = cli.json;
            coordinator
                .run(shutdown, |result| {
                    if let Ok(snapshot) = result {
                        if let Err(e) = print_snapshot(snapshot, json) {
                            tracing::error!("Failed to print snapshot: {e}");
                        }
                    }
                })
                .await;
        }

        Commands::PaymentUrl => {
            let (api, _) = load_api(cli.config.as_deref())?;
            match api.get_payment_url().await {
                Some(url) => println!("{url}"),
                None => bail!("payment page is not reachable"),
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "scomet", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn load_api(config: Option<&str>) -> anyhow::Result<(ScometApi, Settings)> {
    let config_path = resolve_config_path(config);
    let settings = Settings::load(&config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    tracing::debug!("Settings: {settings:?}");

    let api = ScometApi::from_settings(&settings).context("invalid settings")?;
    Ok((api, settings))
}

fn print_snapshot(snapshot: &Snapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    println!(
        "Scomet snapshot at {}",
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for (field, value) in snapshot.iter() {
        let shown = match (value, field.unit()) {
            (Some(v), Some(unit)) => format!("{v} {unit}"),
            (Some(v), None) => v.to_string(),
            (None, _) => "Unknown".to_string(),
        };
        println!("  {:<24} {shown}", field.label());
    }
    Ok(())
}
