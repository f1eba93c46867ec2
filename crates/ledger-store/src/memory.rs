use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{
    Account, AccountHistory, Ack, AckInsertOutcome, Bucket, BucketBalances, HistoryEntry, Journal,
    JournalStatus, LedgerEntryRecord, LedgerError, LedgerResult, OutboxItem, OutboxStatus,
    OverdraftAccounts, PostOutcome, ValidatedJournalRequest, event_posted_payload,
    OUTBOX_TOPIC_POSTED,
};
use rand::Rng;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{HealthSnapshot, LedgerStore};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: HashMap<String, Account>,
    journals: HashMap<String, Journal>,
    journal_ids_by_idempotency_key: HashMap<String, String>,
    ledger_entries: Vec<LedgerEntryRecord>,
    outbox: HashMap<String, OutboxItem>,
    acks: HashMap<String, Ack>,
}

/// The workspace's one store implementation: a single mutex guarding an
/// in-memory snapshot of every collection (§4.8's "any engine providing
/// ACID transactions and unique indexes may back it" is satisfied here by
/// the mutex standing in for the transaction boundary, and `HashMap`
/// secondary indexes standing in for unique indexes).
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl InMemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Establishes an account's starting balances directly, bypassing the
    /// posting algorithm entirely. The domain model has no deposit/mint
    /// transition, so this is how a fixture realizes the non-zero starting
    /// balances the spec's seeded scenarios assume (§8 "Seed: ...").
    pub async fn seed_account(&self, account_id: &str, currency: &str, buckets: BucketBalances) {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        state.accounts.insert(
            account_id.to_string(),
            Account {
                id: account_id.to_string(),
                currency: currency.to_string(),
                buckets,
                created_at: now,
                updated_at: now,
            },
        );
    }
}

enum IdempotencyProbe {
    Fresh,
    Hit(String),
    Conflict(String),
}

fn probe_idempotency(state: &State, idempotency_key: &str, journal_id: &str) -> IdempotencyProbe {
    let via_id = state.journals.get(journal_id);
    let via_key = state
        .journal_ids_by_idempotency_key
        .get(idempotency_key)
        .and_then(|jid| state.journals.get(jid));

    match (via_id, via_key) {
        (Some(a), Some(b)) => {
            if a.journal_id == b.journal_id {
                IdempotencyProbe::Hit(a.journal_id.clone())
            } else {
                IdempotencyProbe::Conflict(format!(
                    "idempotencyKey {idempotency_key} is already bound to journal {}",
                    b.journal_id
                ))
            }
        }
        (Some(a), None) => IdempotencyProbe::Conflict(format!(
            "journalId {} already exists with a different idempotencyKey",
            a.journal_id
        )),
        (None, Some(b)) => IdempotencyProbe::Conflict(format!(
            "idempotencyKey {idempotency_key} is already bound to journal {}",
            b.journal_id
        )),
        (None, None) => IdempotencyProbe::Fresh,
    }
}

fn upsert_account(state: &mut State, account_id: &str, currency: &str, now: DateTime<Utc>) {
    state
        .accounts
        .entry(account_id.to_string())
        .and_modify(|account| account.updated_at = now)
        .or_insert_with(|| Account {
            id: account_id.to_string(),
            currency: currency.to_string(),
            buckets: BucketBalances::default(),
            created_at: now,
            updated_at: now,
        });
}

/// The predicate-guarded update from §4.4 step 3d: requires the account's
/// currency to match and, unless the account is overdraft-exempt, the
/// `fromBucket` to hold enough. Both failure modes report as the same
/// `InsufficientFunds` class (the bundled resolution of the currency vs.
/// insufficient-funds open question, see DESIGN.md).
fn apply_guarded_delta(
    state: &mut State,
    account_id: &str,
    currency: &str,
    from: Option<Bucket>,
    to: Option<Bucket>,
    amount_minor: i64,
    overdraft_exempt: bool,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let account = match state.accounts.get_mut(account_id) {
        Some(account) => account,
        None => {
            return Err(LedgerError::Internal(format!(
                "account {account_id} missing after upsert"
            )));
        }
    };

    if account.currency != currency {
        return Err(LedgerError::InsufficientFunds {
            account_id: account_id.to_string(),
        });
    }

    if let Some(from_bucket) = from
        && !overdraft_exempt
        && account.buckets.get(from_bucket) < amount_minor
    {
        return Err(LedgerError::InsufficientFunds {
            account_id: account_id.to_string(),
        });
    }

    if let Some(from_bucket) = from {
        *account.buckets.get_mut(from_bucket) -= amount_minor;
    }
    if let Some(to_bucket) = to {
        *account.buckets.get_mut(to_bucket) += amount_minor;
    }
    account.updated_at = now;
    Ok(())
}

/// The full posting transaction body (§4.4 steps 1-7), run against a working
/// copy of `State` that is only committed back on success.
fn apply_posting(
    state: &mut State,
    request: &ValidatedJournalRequest,
    overdraft_accounts: &OverdraftAccounts,
    chaos_probability: f64,
    now: DateTime<Utc>,
) -> LedgerResult<PostOutcome> {
    match probe_idempotency(state, &request.idempotency_key, &request.journal_id) {
        IdempotencyProbe::Hit(journal_id) => {
            return Ok(PostOutcome {
                journal_id,
                idempotent_hit: true,
            });
        }
        IdempotencyProbe::Conflict(message) => return Err(LedgerError::DuplicateKey(message)),
        IdempotencyProbe::Fresh => {}
    }

    // Header insert. A collision here can only happen under a true
    // concurrent race (the probe above already ruled out the single-writer
    // case); the spec says to re-interpret that as an idempotent hit.
    if state.journals.contains_key(&request.journal_id)
        || state
            .journal_ids_by_idempotency_key
            .contains_key(&request.idempotency_key)
    {
        return Ok(PostOutcome {
            journal_id: request.journal_id.clone(),
            idempotent_hit: true,
        });
    }
    state.journals.insert(
        request.journal_id.clone(),
        Journal {
            journal_id: request.journal_id.clone(),
            idempotency_key: request.idempotency_key.clone(),
            line_count: request.lines.len(),
            status: JournalStatus::Pending,
            created_at: now,
        },
    );
    state
        .journal_ids_by_idempotency_key
        .insert(request.idempotency_key.clone(), request.journal_id.clone());

    let mut touched_accounts: BTreeSet<String> = BTreeSet::new();

    for (idx, line) in request.lines.iter().enumerate() {
        let line_no = (idx + 1) as u32;
        upsert_account(state, &line.account_id, &line.currency, now);
        touched_accounts.insert(line.account_id.clone());

        let is_noop = line.from_bucket.is_some() && line.from_bucket == line.to_bucket;
        if !is_noop {
            let overdraft_exempt = overdraft_accounts.contains(&line.account_id);
            apply_guarded_delta(
                state,
                &line.account_id,
                &line.currency,
                line.from_bucket,
                line.to_bucket,
                line.amount_minor,
                overdraft_exempt,
                now,
            )?;
        }

        state.ledger_entries.push(LedgerEntryRecord {
            journal_id: request.journal_id.clone(),
            line_no,
            account_id: line.account_id.clone(),
            from_bucket: line.from_bucket,
            to_bucket: line.to_bucket,
            side: line.side,
            transition: line.transition,
            amount: line.amount_canonical.clone(),
            currency: line.currency.clone(),
            created_at: now,
        });
    }

    for account_id in &touched_accounts {
        if overdraft_accounts.contains(account_id) {
            continue;
        }
        if let Some(account) = state.accounts.get(account_id) {
            for (bucket, value) in account.buckets.iter() {
                if value < 0 {
                    return Err(LedgerError::NegativeBalance {
                        account_id: account_id.clone(),
                        bucket: bucket.to_string(),
                    });
                }
            }
        }
    }

    let outbox_id = Uuid::new_v4().to_string();
    state.outbox.insert(
        outbox_id.clone(),
        OutboxItem {
            id: outbox_id,
            journal_id: request.journal_id.clone(),
            topic: OUTBOX_TOPIC_POSTED.to_string(),
            payload: event_posted_payload(&request.journal_id),
            status: OutboxStatus::Pending,
            attempts: 0,
            next_attempt_at: now,
            created_at: now,
            updated_at: now,
        },
    );

    if let Some(journal) = state.journals.get_mut(&request.journal_id) {
        journal.status = JournalStatus::Posted;
    }

    if chaos_probability > 0.0 {
        let sample: f64 = rand::rng().random();
        if sample < chaos_probability {
            return Err(LedgerError::ChaosFailure);
        }
    }

    Ok(PostOutcome {
        journal_id: request.journal_id.clone(),
        idempotent_hit: false,
    })
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn post_journal(
        &self,
        request: ValidatedJournalRequest,
        overdraft_accounts: &OverdraftAccounts,
        chaos_probability: f64,
    ) -> LedgerResult<PostOutcome> {
        let mut guard = self.state.lock().await;
        let mut working = guard.clone();
        let now = Utc::now();

        let outcome = apply_posting(&mut working, &request, overdraft_accounts, chaos_probability, now)?;
        *guard = working;
        Ok(outcome)
    }

    async fn claim_next_outbox_item(&self) -> LedgerResult<Option<OutboxItem>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let candidate_id = state
            .outbox
            .values()
            .filter(|item| item.status == OutboxStatus::Pending && item.next_attempt_at <= now)
            .min_by_key(|item| (item.next_attempt_at, item.created_at, item.id.clone()))
            .map(|item| item.id.clone());

        let Some(id) = candidate_id else {
            return Ok(None);
        };

        let Some(item) = state.outbox.get_mut(&id) else {
            return Ok(None);
        };
        item.status = OutboxStatus::Processing;
        item.updated_at = now;
        Ok(Some(item.clone()))
    }

    async fn mark_outbox_sent(&self, id: &str) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        match state.outbox.get_mut(id) {
            Some(item) if item.status == OutboxStatus::Processing => {
                item.status = OutboxStatus::Sent;
                item.attempts += 1;
                item.updated_at = now;
                Ok(())
            }
            Some(_) => Err(LedgerError::Internal(format!(
                "outbox item {id} was not in processing when marking sent"
            ))),
            None => Err(LedgerError::NotFound(format!("outbox item {id}"))),
        }
    }

    async fn reschedule_outbox_item(&self, id: &str, next_attempt_at: DateTime<Utc>) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        match state.outbox.get_mut(id) {
            Some(item) => {
                item.attempts += 1;
                item.status = OutboxStatus::Pending;
                item.next_attempt_at = next_attempt_at;
                item.updated_at = now;
                Ok(())
            }
            None => Err(LedgerError::NotFound(format!("outbox item {id}"))),
        }
    }

    async fn history_for_account(
        &self,
        account_id: &str,
        currency: Option<&str>,
    ) -> LedgerResult<AccountHistory> {
        let state = self.state.lock().await;
        let mut entries: Vec<&LedgerEntryRecord> = state
            .ledger_entries
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .filter(|entry| currency.is_none_or(|c| entry.currency == c))
            .collect();
        entries.sort_by_key(|entry| entry.created_at);

        let resolved_currency = currency
            .map(str::to_string)
            .or_else(|| entries.first().map(|entry| entry.currency.clone()))
            .unwrap_or_else(|| "USD".to_string());

        let history = entries
            .iter()
            .map(|entry| HistoryEntry {
                transition: entry.transition,
                amount: entry.amount.clone(),
                timestamp: entry.created_at,
            })
            .collect();

        Ok(AccountHistory {
            account_id: account_id.to_string(),
            currency: resolved_currency,
            history,
        })
    }

    async fn insert_ack(
        &self,
        journal_id: &str,
        topic: &str,
        payload: serde_json::Value,
    ) -> LedgerResult<AckInsertOutcome> {
        let mut state = self.state.lock().await;
        if state.acks.contains_key(journal_id) {
            return Ok(AckInsertOutcome::Duplicate);
        }
        state.acks.insert(
            journal_id.to_string(),
            Ack {
                journal_id: journal_id.to_string(),
                topic: topic.to_string(),
                payload,
                acked_at: Utc::now(),
            },
        );
        Ok(AckInsertOutcome::Inserted)
    }

    async fn health_snapshot(&self) -> HealthSnapshot {
        let state = self.state.lock().await;
        let outbox_queue = state
            .outbox
            .values()
            .filter(|item| item.status != OutboxStatus::Sent)
            .count() as u64;
        let pending_retries = state
            .outbox
            .values()
            .filter(|item| item.status == OutboxStatus::Pending && item.attempts > 0)
            .count() as u64;
        HealthSnapshot {
            db_connected: true,
            outbox_queue,
            pending_retries,
        }
    }
}
