use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use gradewatch_core::config::{NotifyBackend, WatchConfig};
use gradewatch_core::fetch::{Credentials, EamsClient, GradeFetcher};
use gradewatch_core::notify::{self, LogNotifier, Notifier, NtfyNotifier};
use gradewatch_core::semester;
use gradewatch_core::store::SnapshotStore;

use gradewatch_daemon::monitor::Monitor;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watches the records service and alerts on new grades")]
struct Args {
    #[arg(short, long, default_value = "gradewatch.toml")]
    config: String,

    /// Run a single iteration and exit (for cron-style use)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match WatchConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let credentials = match credentials_from_env() {
        Ok(c) => c,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };

    let today = Local::now().date_naive();
    let term_id = config.term.resolve(today)?;
    match semester::decode(term_id) {
        Some((start_year, term)) => {
            tracing::info!(
                term_id,
                term = %semester::term_display(start_year, term),
                "Watching term"
            );
        }
        None => tracing::info!(term_id, "Watching term (non-standard id)"),
    }

    let store = SnapshotStore::for_account(&config.storage.state_dir, &credentials.account);
    tracing::info!(
        baseline = %store.path().display(),
        interval_secs = config.monitor.interval_secs,
        timeout_secs = config.monitor.timeout_secs,
        "Monitor configured"
    );

    let fetcher: Arc<dyn GradeFetcher> = Arc::new(EamsClient::new(config.fetcher.clone())?);
    let notifier = build_notifier(&config)?;

    let monitor = Monitor::new(
        config.monitor.clone(),
        credentials,
        term_id,
        fetcher,
        notifier,
        store,
    );

    if args.once {
        let outcome = monitor.run_iteration().await;
        tracing::info!(?outcome, "Single iteration finished");
        return Ok(());
    }

    let (tx, rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    monitor.run(rx).await;
    Ok(())
}

fn credentials_from_env() -> Result<Credentials, String> {
    let account = std::env::var("GRADEWATCH_ACCOUNT")
        .map_err(|_| "GRADEWATCH_ACCOUNT is not set".to_string())?;
    let password = std::env::var("GRADEWATCH_PASSWORD")
        .map_err(|_| "GRADEWATCH_PASSWORD is not set".to_string())?;
    Ok(Credentials::new(account, password))
}

fn build_notifier(config: &WatchConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match config.notify.backend {
        NotifyBackend::Log => Ok(Arc::new(LogNotifier)),
        NotifyBackend::Ntfy => {
            let topic = if config.notify.ntfy_topic.is_empty() {
                let topic = notify::generate_topic();
                tracing::warn!(
                    topic = %topic,
                    "No ntfy topic configured; generated one for this session. \
                     Subscribe to it and persist it as notify.ntfy_topic"
                );
                topic
            } else {
                config.notify.ntfy_topic.clone()
            };
            Ok(Arc::new(NtfyNotifier::new(
                &config.notify.ntfy_server,
                &topic,
            )?))
        }
    }
}
