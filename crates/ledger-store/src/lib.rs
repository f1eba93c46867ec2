#![deny(clippy::print_stdout, clippy::print_stderr)]

//! The store abstraction (§4.8) plus its sole in-memory implementation,
//! which also hosts the journal-posting transaction body (§4.4). See
//! DESIGN.md for why the posting algorithm lives here rather than behind a
//! separate generic transaction trait.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{AccountHistory, AckInsertOutcome, LedgerResult, OutboxItem, OverdraftAccounts, PostOutcome, ValidatedJournalRequest};

pub use memory::InMemoryLedgerStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub db_connected: bool,
    pub outbox_queue: u64,
    pub pending_retries: u64,
}

/// The contract the ledger core requires from its backing store (§4.8).
/// `post_journal` additionally performs the full transactional posting
/// algorithm from §4.4: everything from the idempotency probe through the
/// chaos hook happens inside the store, atomically.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn post_journal(
        &self,
        request: ValidatedJournalRequest,
        overdraft_accounts: &OverdraftAccounts,
        chaos_probability: f64,
    ) -> LedgerResult<PostOutcome>;

    async fn claim_next_outbox_item(&self) -> LedgerResult<Option<OutboxItem>>;

    async fn mark_outbox_sent(&self, id: &str) -> LedgerResult<()>;

    async fn reschedule_outbox_item(&self, id: &str, next_attempt_at: DateTime<Utc>) -> LedgerResult<()>;

    async fn history_for_account(
        &self,
        account_id: &str,
        currency: Option<&str>,
    ) -> LedgerResult<AccountHistory>;

    async fn insert_ack(
        &self,
        journal_id: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> LedgerResult<AckInsertOutcome>;

    async fn health_snapshot(&self) -> HealthSnapshot;
}
