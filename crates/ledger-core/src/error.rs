use serde::Serialize;
use thiserror::Error;

/// One issue surfaced by shape validation (§4.3). Collected in batches rather
/// than short-circuiting on the first problem found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub code: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown transition: {0}")]
    InvalidTransition(String),

    #[error("missing bucket field {field}: expected {expected}")]
    MissingBucket { field: String, expected: String },

    #[error("invalid bucket field {field}: expected {expected}, got {actual}")]
    InvalidBucket {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("journal entry must balance exactly (debits and credits differ)")]
    Unbalanced,

    #[error("all lines in a journal must share one currency")]
    CurrencyMismatch,

    #[error("schema validation failed")]
    Validation(Vec<ValidationIssue>),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("insufficient funds or currency mismatch on account {account_id}")]
    InsufficientFunds { account_id: String },

    #[error("account {account_id} bucket {bucket} would go negative")]
    NegativeBalance { account_id: String, bucket: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("server misconfigured: {0}")]
    Misconfigured(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("synthetic chaos failure")]
    ChaosFailure,

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Short machine-stable class name, used in tracing fields and tests.
    pub fn class(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InvalidTransition(_) => "invalid_transition",
            LedgerError::MissingBucket { .. } => "missing_bucket",
            LedgerError::InvalidBucket { .. } => "invalid_bucket",
            LedgerError::Unbalanced => "unbalanced",
            LedgerError::CurrencyMismatch => "currency_mismatch",
            LedgerError::Validation(_) => "validation",
            LedgerError::DuplicateKey(_) => "duplicate_key",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::NegativeBalance { .. } => "negative_balance",
            LedgerError::Unauthorized => "unauthorized",
            LedgerError::Misconfigured(_) => "misconfigured",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::ChaosFailure => "chaos_failure",
            LedgerError::Internal(_) => "internal",
        }
    }
}
