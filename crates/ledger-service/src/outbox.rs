use std::time::Duration;

use ledger_core::{LedgerResult, OutboxItem, ProcessOnceSummary};
use ledger_store::LedgerStore;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, info_span, warn};

use crate::telemetry::LedgerTelemetry;

const DEFAULT_MAX_BATCH: u32 = 50;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;

/// Per-call overrides for `processOnce`, mirroring the query parameters on
/// `POST /outbox/process` (§6). Any field left `None` falls back to the
/// dispatcher's configured default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOnceOptions {
    pub max_batch: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub base_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct DispatchPayload<'a> {
    #[serde(rename = "journalId")]
    journal_id: &'a str,
    topic: &'a str,
    payload: &'a serde_json::Value,
}

/// Computes the backoff delay for the k-th failure (§4.5): an exponential
/// term capped at `max_backoff_ms`, plus up to 20% of `max_backoff_ms` in
/// additive jitter so the result never exceeds `1.2 * max_backoff_ms`.
pub fn backoff_delay(attempts_after_failure: i64, base_ms: u64, max_backoff_ms: u64) -> Duration {
    let exponent = attempts_after_failure.clamp(0, 10) as u32;
    let exponential = base_ms.saturating_mul(1u64 << exponent);
    let capped = exponential.min(max_backoff_ms);

    let jitter_ceiling = (max_backoff_ms as f64 * 0.2) as u64;
    let jitter = if jitter_ceiling == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_ceiling)
    };

    Duration::from_millis(capped + jitter)
}

/// Drains the outbox to an external consumer (§4.5). Owns the HTTP client;
/// the target URL is resolved per call from `target_url_override` (the
/// `target` query parameter) falling back to `default_target_url`.
#[derive(Clone)]
pub struct OutboxDispatcher {
    store: Arc<dyn LedgerStore>,
    client: Client,
    default_target_url: String,
    telemetry: LedgerTelemetry,
}

impl OutboxDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, default_target_url: String, telemetry: LedgerTelemetry) -> Self {
        Self {
            store,
            client: Client::new(),
            default_target_url,
            telemetry,
        }
    }

    pub async fn process_once(
        &self,
        target_url_override: Option<&str>,
        options: ProcessOnceOptions,
    ) -> LedgerResult<ProcessOnceSummary> {
        let target_url = target_url_override.unwrap_or(&self.default_target_url);
        let max_batch = options.max_batch.unwrap_or(DEFAULT_MAX_BATCH);
        let timeout_ms = options.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let base_backoff_ms = options.base_backoff_ms.unwrap_or(DEFAULT_BASE_BACKOFF_MS);
        let max_backoff_ms = options.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS);

        let mut summary = ProcessOnceSummary::default();

        for _ in 0..max_batch {
            let Some(item) = self.store.claim_next_outbox_item().await? else {
                break;
            };
            summary.attempted += 1;

            let span = info_span!("dispatch_outbox_item", outbox_id = %item.id, journal_id = %item.journal_id);
            let sent = self
                .dispatch(target_url, &item, timeout_ms)
                .instrument(span)
                .await;

            if sent {
                self.store.mark_outbox_sent(&item.id).await?;
                summary.sent += 1;
                self.telemetry.record_outbox_sent(1);
            } else {
                let delay = backoff_delay((item.attempts + 1).max(1), base_backoff_ms, max_backoff_ms);
                let next_attempt_at = chrono::Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                self.store
                    .reschedule_outbox_item(&item.id, next_attempt_at)
                    .await?;
                summary.retried += 1;
                self.telemetry.record_outbox_retried(1);
            }
        }

        let health = self.store.health_snapshot().await;
        summary.pending = health.outbox_queue;
        summary.pending_retries = health.pending_retries;
        Ok(summary)
    }

    async fn dispatch(&self, target_url: &str, item: &OutboxItem, timeout_ms: u64) -> bool {
        let body = DispatchPayload {
            journal_id: &item.journal_id,
            topic: &item.topic,
            payload: &item.payload,
        };

        let response = self
            .client
            .post(target_url)
            .timeout(Duration::from_millis(timeout_ms))
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "outbox dispatch returned non-2xx");
                false
            }
            Err(err) => {
                warn!(error = %err, "outbox dispatch transport error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{AmountWire, JournalWire, LineWire, default_overdraft_accounts};
    use ledger_store::InMemoryLedgerStore;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn line(
        account_id: &str,
        side: &str,
        transition: &str,
        from_bucket: Option<&str>,
        to_bucket: Option<&str>,
        amount: &str,
    ) -> LineWire {
        LineWire {
            account_id: account_id.to_string(),
            side: side.to_string(),
            transition: transition.to_string(),
            from_bucket: from_bucket.map(str::to_string),
            to_bucket: to_bucket.map(str::to_string),
            amount: AmountWire {
                currency: "USD".to_string(),
                amount: amount.to_string(),
            },
        }
    }

    /// Funds `A` well beyond anything a test posts against it. The domain
    /// model has no deposit/mint transition, so this is how a fixture
    /// realizes the non-zero starting balance the guarded debit needs.
    async fn fund_account_a(store: &InMemoryLedgerStore) {
        store
            .seed_account(
                "A",
                "USD",
                ledger_core::BucketBalances {
                    available: 100_000,
                    ..Default::default()
                },
            )
            .await;
    }

    async fn seed_one_pending_item(store: &InMemoryLedgerStore, journal_id: &str, idempotency_key: &str) {
        let wire = JournalWire {
            journal_id: journal_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
            lines: vec![
                line("A", "debit", "reserve", Some("available"), Some("pending"), "10.00"),
                line(
                    "ESCROW_POOL",
                    "credit",
                    "lock",
                    Some("available"),
                    Some("escrow"),
                    "10.00",
                ),
            ],
        };
        let validated = ledger_core::validate_shape(wire).expect("fixture is well-formed");
        store
            .post_journal(validated, &default_overdraft_accounts(), 0.0)
            .await
            .expect("fixture posts cleanly");
    }

    #[tokio::test]
    async fn outbox_success_marks_item_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/consume"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let store = Arc::new(InMemoryLedgerStore::new());
        fund_account_a(&store).await;
        seed_one_pending_item(&store, "J-out-1", "idem-out-1").await;

        let dispatcher = OutboxDispatcher::new(
            store.clone(),
            format!("{}/consume", mock_server.uri()),
            LedgerTelemetry::new(),
        );
        let summary = dispatcher
            .process_once(None, ProcessOnceOptions::default())
            .await
            .expect("process_once succeeds");

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.retried, 0);
    }

    #[tokio::test]
    async fn outbox_failure_reschedules_with_backoff() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/consume"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let store = Arc::new(InMemoryLedgerStore::new());
        fund_account_a(&store).await;
        seed_one_pending_item(&store, "J-out-2", "idem-out-2").await;

        let dispatcher = OutboxDispatcher::new(
            store.clone(),
            format!("{}/consume", mock_server.uri()),
            LedgerTelemetry::new(),
        );
        let options = ProcessOnceOptions {
            max_backoff_ms: Some(1_000),
            ..Default::default()
        };
        let summary = dispatcher
            .process_once(None, options)
            .await
            .expect("process_once succeeds even on dispatch failure");

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.retried, 1);
        assert_eq!(summary.pending, 1);
    }

    #[tokio::test]
    async fn batch_ordering_respects_next_attempt_at_then_created_at() {
        let store = Arc::new(InMemoryLedgerStore::new());
        fund_account_a(&store).await;
        seed_one_pending_item(&store, "J-1", "idem-b-1").await;
        seed_one_pending_item(&store, "J-2", "idem-b-2").await;
        seed_one_pending_item(&store, "J-3", "idem-b-3").await;

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/consume"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let dispatcher = OutboxDispatcher::new(
            store.clone(),
            format!("{}/consume", mock_server.uri()),
            LedgerTelemetry::new(),
        );
        let options = ProcessOnceOptions {
            max_batch: Some(2),
            ..Default::default()
        };
        let summary = dispatcher
            .process_once(None, options)
            .await
            .expect("process_once succeeds");

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.pending, 1, "the third item must remain undispatched");
    }

    #[test]
    fn backoff_delay_plateaus_and_respects_jitter_ceiling() {
        for _ in 0..50 {
            let delay = backoff_delay(6, 500, 1_000);
            let millis = delay.as_millis();
            assert!(millis >= 1_000, "base must reach the cap: {millis}");
            assert!(millis <= 1_200, "jitter must not exceed 20% of the cap: {millis}");
        }
    }

    #[test]
    fn backoff_delay_grows_exponentially_before_the_cap() {
        let early = backoff_delay(1, 500, 60_000);
        let later = backoff_delay(3, 500, 60_000);
        assert!(later.as_millis() > early.as_millis());
    }
}
