use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

pub const OUTBOX_TOPIC_POSTED: &str = "LedgerEvent.Posted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Available,
    Pending,
    Escrow,
    Outflow,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Available,
        Bucket::Pending,
        Bucket::Escrow,
        Bucket::Outflow,
    ];

    pub fn parse(raw: &str) -> Option<Bucket> {
        match raw {
            "available" => Some(Bucket::Available),
            "pending" => Some(Bucket::Pending),
            "escrow" => Some(Bucket::Escrow),
            "outflow" => Some(Bucket::Outflow),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Bucket::Available => "available",
            Bucket::Pending => "pending",
            Bucket::Escrow => "escrow",
            Bucket::Outflow => "outflow",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Reserve,
    Lock,
    Finalize,
    Release,
    Revert,
}

impl Transition {
    pub fn parse(raw: &str) -> Option<Transition> {
        match raw {
            "reserve" => Some(Transition::Reserve),
            "lock" => Some(Transition::Lock),
            "finalize" => Some(Transition::Finalize),
            "release" => Some(Transition::Release),
            "revert" => Some(Transition::Revert),
            _ => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Reserve => "reserve",
            Transition::Lock => "lock",
            Transition::Finalize => "finalize",
            Transition::Release => "release",
            Transition::Revert => "revert",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn parse(raw: &str) -> Option<Side> {
        match raw {
            "debit" => Some(Side::Debit),
            "credit" => Some(Side::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Debit => "debit",
            Side::Credit => "credit",
        };
        f.write_str(s)
    }
}

/// Minor-unit balances for the four buckets an account can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketBalances {
    pub available: i64,
    pub pending: i64,
    pub escrow: i64,
    pub outflow: i64,
}

impl BucketBalances {
    pub fn get(&self, bucket: Bucket) -> i64 {
        match bucket {
            Bucket::Available => self.available,
            Bucket::Pending => self.pending,
            Bucket::Escrow => self.escrow,
            Bucket::Outflow => self.outflow,
        }
    }

    pub fn get_mut(&mut self, bucket: Bucket) -> &mut i64 {
        match bucket {
            Bucket::Available => &mut self.available,
            Bucket::Pending => &mut self.pending,
            Bucket::Escrow => &mut self.escrow,
            Bucket::Outflow => &mut self.outflow,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, i64)> + '_ {
        Bucket::ALL.into_iter().map(|b| (b, self.get(b)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub currency: String,
    pub buckets: BucketBalances,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    Pending,
    Posted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub journal_id: String,
    pub idempotency_key: String,
    pub line_count: usize,
    pub status: JournalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRecord {
    pub journal_id: String,
    pub line_no: u32,
    pub account_id: String,
    pub from_bucket: Option<Bucket>,
    pub to_bucket: Option<Bucket>,
    pub side: Side,
    pub transition: Transition,
    /// Canonical decimal string, e.g. "150.00" -> "150".
    pub amount: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Sent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: String,
    pub journal_id: String,
    pub topic: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i64,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub journal_id: String,
    pub topic: String,
    pub payload: serde_json::Value,
    pub acked_at: DateTime<Utc>,
}

/// One entry in an account's history projection (§4.6).
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub transition: Transition,
    pub amount: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHistory {
    pub account_id: String,
    pub currency: String,
    pub history: Vec<HistoryEntry>,
}

/// Outcome of `LedgerStore::post_journal` (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    pub journal_id: String,
    pub idempotent_hit: bool,
}

/// Outcome of one `processOnce` batch run (§4.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOnceSummary {
    pub attempted: u32,
    pub sent: u32,
    pub retried: u32,
    pub pending: u64,
    pub pending_retries: u64,
}

/// Whether inserting an acknowledgement was a first insert or a duplicate
/// that is treated as a success (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckInsertOutcome {
    Inserted,
    Duplicate,
}

pub fn parse_bucket_field(field: &str, raw: Option<&str>) -> Result<Option<Bucket>, LedgerError> {
    match raw {
        None => Ok(None),
        Some(value) => Bucket::parse(value)
            .map(Some)
            .ok_or_else(|| LedgerError::InvalidBucket {
                field: field.to_string(),
                expected: "one of available, pending, escrow, outflow".to_string(),
                actual: value.to_string(),
            }),
    }
}

/// Set of account ids exempt from the non-negative invariant (§9).
pub type OverdraftAccounts = std::collections::HashSet<String>;

pub fn default_overdraft_accounts() -> OverdraftAccounts {
    let mut set = OverdraftAccounts::new();
    set.insert("ESCROW_POOL".to_string());
    set
}

pub fn event_posted_payload(journal_id: &str) -> serde_json::Value {
    let mut map = HashMap::new();
    map.insert("journalId".to_string(), journal_id.to_string());
    serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
}
