#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Arc;
use std::time::Duration;

use ledger_api::config::LedgerConfig;
use ledger_api::routes::{ApiState, router};
use ledger_service::{EventIngress, HistoryReader, JournalPoster, LedgerTelemetry, OutboxDispatcher, ProcessOnceOptions};
use ledger_store::{InMemoryLedgerStore, LedgerStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(LedgerConfig::from_env()?);
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let telemetry = LedgerTelemetry::new();

    let poster = JournalPoster::new(
        store.clone(),
        config.system_overdraft_accounts.clone(),
        config.chaos_probability,
        telemetry.clone(),
    );
    let history_reader = HistoryReader::new(store.clone());
    let dispatcher = OutboxDispatcher::new(store.clone(), config.outbox_target_url.clone(), telemetry.clone());
    let ingress = EventIngress::new(store.clone(), telemetry.clone());

    if config.cron_enable {
        spawn_cron(dispatcher.clone(), config.clone());
    }

    let state = ApiState {
        config: config.clone(),
        store,
        telemetry,
        poster,
        history_reader,
        dispatcher,
        ingress,
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "ledger-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_cron(dispatcher: OutboxDispatcher, config: Arc<LedgerConfig>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(config.cron_interval_ms));
        loop {
            interval.tick().await;
            let options = ProcessOnceOptions {
                max_batch: Some(config.outbox_max_batch),
                timeout_ms: Some(config.outbox_timeout_ms),
                base_backoff_ms: Some(config.outbox_base_backoff_ms),
                max_backoff_ms: Some(config.outbox_max_backoff_ms),
            };
            match dispatcher.process_once(None, options).await {
                Ok(summary) => tracing::debug!(?summary, "cron outbox sweep"),
                Err(err) => tracing::warn!(error = %err, "cron outbox sweep failed"),
            }
        }
    });
}
