use std::sync::Arc;

use ledger_core::{AccountHistory, LedgerResult};
use ledger_store::LedgerStore;
use tracing::{Instrument, info_span};

/// `GET /accounts/:id/history` (§4.6): a thin, traced wrapper over the
/// store's projection query. No domain logic lives here beyond the span.
#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn LedgerStore>,
}

impl HistoryReader {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn history_for_account(
        &self,
        account_id: &str,
        currency: Option<&str>,
    ) -> LedgerResult<AccountHistory> {
        let span = info_span!("account_history", account_id = %account_id);
        self.store
            .history_for_account(account_id, currency)
            .instrument(span)
            .await
    }
}
