use std::env;

use ledger_core::{LedgerError, LedgerResult, OverdraftAccounts, default_overdraft_accounts};

const DEFAULT_OUTBOX_TARGET_URL: &str = "http://127.0.0.1:4000/events";
const DEFAULT_OUTBOX_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_OUTBOX_MAX_BATCH: u32 = 50;
const DEFAULT_OUTBOX_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_OUTBOX_MAX_BACKOFF_MS: u64 = 60_000;
const DEFAULT_CRON_INTERVAL_MS: u64 = 30_000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Process configuration, loaded once at startup (§10). Follows the
/// `env::var_os`/fallback-to-default style used for telemetry persistence
/// elsewhere in the stack; unlike that store, a missing `LEDGER_API_KEY` is
/// fatal rather than silently defaulted, since an unauthenticated ledger is
/// not a safe default to start up with.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub api_key: String,
    pub system_overdraft_accounts: OverdraftAccounts,
    pub chaos_probability: f64,
    pub outbox_target_url: String,
    pub outbox_timeout_ms: u64,
    pub outbox_max_batch: u32,
    pub outbox_base_backoff_ms: u64,
    pub outbox_max_backoff_ms: u64,
    pub cron_enable: bool,
    pub cron_interval_ms: u64,
    pub bind_addr: String,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => matches!(raw.trim(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

impl LedgerConfig {
    pub fn from_env() -> LedgerResult<Self> {
        let api_key = env::var("LEDGER_API_KEY")
            .map_err(|_| LedgerError::Misconfigured("LEDGER_API_KEY is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(LedgerError::Misconfigured(
                "LEDGER_API_KEY must not be empty".to_string(),
            ));
        }

        let system_overdraft_accounts = match env::var("LEDGER_SYSTEM_OVERDRAFT_ACCOUNTS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => default_overdraft_accounts(),
        };

        Ok(Self {
            api_key,
            system_overdraft_accounts,
            chaos_probability: env_parsed("LEDGER_CHAOS_PROBABILITY", 0.0),
            outbox_target_url: env_string("LEDGER_OUTBOX_TARGET_URL", DEFAULT_OUTBOX_TARGET_URL),
            outbox_timeout_ms: env_parsed("LEDGER_OUTBOX_TIMEOUT_MS", DEFAULT_OUTBOX_TIMEOUT_MS),
            outbox_max_batch: env_parsed("LEDGER_OUTBOX_MAX_BATCH", DEFAULT_OUTBOX_MAX_BATCH),
            outbox_base_backoff_ms: env_parsed(
                "LEDGER_OUTBOX_BASE_BACKOFF_MS",
                DEFAULT_OUTBOX_BASE_BACKOFF_MS,
            ),
            outbox_max_backoff_ms: env_parsed(
                "LEDGER_OUTBOX_MAX_BACKOFF_MS",
                DEFAULT_OUTBOX_MAX_BACKOFF_MS,
            ),
            cron_enable: env_bool("LEDGER_CRON_ENABLE", false),
            cron_interval_ms: env_parsed("LEDGER_CRON_INTERVAL_MS", DEFAULT_CRON_INTERVAL_MS),
            bind_addr: env_string("LEDGER_BIND_ADDR", DEFAULT_BIND_ADDR),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_api_key_is_misconfigured() {
        let _guard = ENV_LOCK.lock().expect("lock poisoned");
        // SAFETY: serialized by ENV_LOCK, no other test reads this var concurrently.
        unsafe {
            env::remove_var("LEDGER_API_KEY");
        }
        let err = LedgerConfig::from_env().expect_err("no key set");
        assert!(matches!(err, LedgerError::Misconfigured(_)));
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let _guard = ENV_LOCK.lock().expect("lock poisoned");
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            env::set_var("LEDGER_API_KEY", "test-secret");
            env::remove_var("LEDGER_OUTBOX_MAX_BATCH");
        }
        let config = LedgerConfig::from_env().expect("key is set");
        assert_eq!(config.outbox_max_batch, DEFAULT_OUTBOX_MAX_BATCH);
        assert!(config.system_overdraft_accounts.contains("ESCROW_POOL"));
        // SAFETY: serialized by ENV_LOCK.
        unsafe {
            env::remove_var("LEDGER_API_KEY");
        }
    }
}
