#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Pure domain layer for the ledger: money math, the bucket state machine,
//! request schema/validation, the shared data model and error taxonomy.
//! Nothing in this crate performs I/O.

pub mod amount;
pub mod buckets;
pub mod error;
pub mod model;
pub mod schema;

pub use error::{LedgerError, LedgerResult, ValidationIssue};
pub use model::{
    Account, AccountHistory, Ack, AckInsertOutcome, Bucket, BucketBalances, HistoryEntry,
    Journal, JournalStatus, LedgerEntryRecord, OutboxItem, OutboxStatus, OverdraftAccounts,
    PostOutcome, ProcessOnceSummary, Side, Transition, default_overdraft_accounts,
    event_posted_payload, parse_bucket_field, OUTBOX_TOPIC_POSTED,
};
pub use schema::{
    AmountWire, JournalWire, LineWire, ValidatedJournalRequest, ValidatedLine, preflight,
    validate_shape,
};
