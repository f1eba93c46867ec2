use std::sync::Arc;

use ledger_core::{AckInsertOutcome, LedgerError, LedgerResult};
use ledger_store::LedgerStore;
use tracing::{Instrument, info_span};

use crate::telemetry::LedgerTelemetry;

/// `POST /events` (§4.7): records a consumer acknowledgement, treating a
/// duplicate `journalId` as a successful no-op rather than a conflict.
#[derive(Clone)]
pub struct EventIngress {
    store: Arc<dyn LedgerStore>,
    telemetry: LedgerTelemetry,
}

impl EventIngress {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, telemetry: LedgerTelemetry) -> Self {
        Self { store, telemetry }
    }

    pub async fn ack(
        &self,
        journal_id: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> LedgerResult<AckInsertOutcome> {
        if journal_id.trim().is_empty() {
            return Err(LedgerError::Validation(vec![ledger_core::ValidationIssue::new(
                "journalId",
                "journalId must be a non-empty string",
                "required",
            )]));
        }

        let span = info_span!("event_ack", journal_id = %journal_id, topic = %topic);
        let outcome = self
            .store
            .insert_ack(journal_id, topic, payload)
            .instrument(span)
            .await?;

        match outcome {
            AckInsertOutcome::Inserted => self.telemetry.record_event_acked(),
            AckInsertOutcome::Duplicate => self.telemetry.record_event_ack_duplicate(),
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::InMemoryLedgerStore;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn duplicate_acks_for_the_same_journal_are_idempotent() {
        let ingress = EventIngress::new(Arc::new(InMemoryLedgerStore::new()), LedgerTelemetry::new());
        let payload = serde_json::json!({"journalId": "J-ack-1"});

        let first = ingress
            .ack("J-ack-1", "LedgerEvent.Posted", payload.clone())
            .await
            .expect("first ack succeeds");
        let second = ingress
            .ack("J-ack-1", "LedgerEvent.Posted", payload)
            .await
            .expect("duplicate ack still succeeds");

        assert_eq!(first, AckInsertOutcome::Inserted);
        assert_eq!(second, AckInsertOutcome::Duplicate);
    }

    #[tokio::test]
    async fn missing_journal_id_is_rejected() {
        let ingress = EventIngress::new(Arc::new(InMemoryLedgerStore::new()), LedgerTelemetry::new());
        let err = ingress
            .ack("", "LedgerEvent.Posted", serde_json::json!({}))
            .await
            .expect_err("empty journalId must be rejected");
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
