use std::sync::Arc;

use ledger_core::{
    JournalWire, LedgerError, LedgerResult, OverdraftAccounts, PostOutcome, preflight,
    validate_shape,
};
use ledger_store::LedgerStore;
use tracing::{Instrument, info_span};

use crate::telemetry::LedgerTelemetry;

/// Orchestrates `POST /journal` (§4.3, §4.4): shape validation, semantic
/// preflight, then the store's transactional posting, with telemetry and a
/// tracing span wrapping the whole attempt.
#[derive(Clone)]
pub struct JournalPoster {
    store: Arc<dyn LedgerStore>,
    overdraft_accounts: OverdraftAccounts,
    chaos_probability: f64,
    telemetry: LedgerTelemetry,
}

impl JournalPoster {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        overdraft_accounts: OverdraftAccounts,
        chaos_probability: f64,
        telemetry: LedgerTelemetry,
    ) -> Self {
        Self {
            store,
            overdraft_accounts,
            chaos_probability,
            telemetry,
        }
    }

    pub async fn post(&self, wire: JournalWire) -> LedgerResult<PostOutcome> {
        let journal_id = wire.journal_id.clone();
        let idempotency_key = wire.idempotency_key.clone();
        let span = info_span!(
            "post_journal",
            journal_id = %journal_id,
            idempotency_key = %idempotency_key,
        );
        self.post_inner(wire).instrument(span).await
    }

    async fn post_inner(&self, wire: JournalWire) -> LedgerResult<PostOutcome> {
        let validated = validate_shape(wire).map_err(LedgerError::Validation)?;
        preflight(&validated)?;

        let result = self
            .store
            .post_journal(validated, &self.overdraft_accounts, self.chaos_probability)
            .await;

        match &result {
            Ok(outcome) if outcome.idempotent_hit => {
                self.telemetry.record_journal_idempotent_hit();
            }
            Ok(_) => {
                self.telemetry.record_journal_posted();
            }
            Err(err) => {
                tracing::warn!(class = err.class(), "journal post rejected");
                self.telemetry.record_journal_rejected();
            }
        }

        result
    }
}
