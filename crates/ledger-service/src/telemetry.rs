use std::sync::Arc;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// In-process counters for the operations this service exposes. Unlike the
/// teacher's `AccountingTelemetry`, there is nothing durable to restart from
/// here: a fresh in-memory ledger starts at zero regardless, so counters are
/// never persisted to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub journals_posted: usize,
    pub journals_idempotent_hits: usize,
    pub journals_rejected: usize,
    pub outbox_sent: usize,
    pub outbox_retried: usize,
    pub events_acked: usize,
    pub events_ack_duplicates: usize,
}

#[derive(Debug, Default)]
struct TelemetryInner {
    counters: TelemetryCounters,
}

#[derive(Clone, Default)]
pub struct LedgerTelemetry {
    inner: Arc<Mutex<TelemetryInner>>,
}

impl LedgerTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, mut updater: F)
    where
        F: FnMut(&mut TelemetryCounters),
    {
        if let Ok(mut inner) = self.inner.lock() {
            updater(&mut inner.counters);
        }
    }

    pub fn record_journal_posted(&self) {
        self.update(|counters| counters.journals_posted += 1);
    }

    pub fn record_journal_idempotent_hit(&self) {
        self.update(|counters| counters.journals_idempotent_hits += 1);
    }

    pub fn record_journal_rejected(&self) {
        self.update(|counters| counters.journals_rejected += 1);
    }

    pub fn record_outbox_sent(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.update(|counters| counters.outbox_sent += count);
    }

    pub fn record_outbox_retried(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.update(|counters| counters.outbox_retried += count);
    }

    pub fn record_event_acked(&self) {
        self.update(|counters| counters.events_acked += 1);
    }

    pub fn record_event_ack_duplicate(&self) {
        self.update(|counters| counters.events_ack_duplicates += 1);
    }

    #[must_use]
    pub fn snapshot(&self) -> TelemetryCounters {
        self.inner
            .lock()
            .map(|inner| inner.counters.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counters_accumulate() {
        let telemetry = LedgerTelemetry::new();
        telemetry.record_journal_posted();
        telemetry.record_journal_posted();
        telemetry.record_journal_idempotent_hit();
        telemetry.record_outbox_sent(3);
        telemetry.record_outbox_retried(1);
        telemetry.record_event_acked();
        telemetry.record_event_ack_duplicate();

        let counters = telemetry.snapshot();
        assert_eq!(counters.journals_posted, 2);
        assert_eq!(counters.journals_idempotent_hits, 1);
        assert_eq!(counters.outbox_sent, 3);
        assert_eq!(counters.outbox_retried, 1);
        assert_eq!(counters.events_acked, 1);
        assert_eq!(counters.events_ack_duplicates, 1);
    }

    #[test]
    fn zero_counts_are_not_recorded() {
        let telemetry = LedgerTelemetry::new();
        telemetry.record_outbox_sent(0);
        telemetry.record_outbox_retried(0);
        assert_eq!(telemetry.snapshot().outbox_sent, 0);
        assert_eq!(telemetry.snapshot().outbox_retried, 0);
    }
}
