use serde::Deserialize;

use crate::amount;
use crate::buckets;
use crate::error::{LedgerError, LedgerResult, ValidationIssue};
use crate::model::{Bucket, Side, Transition};

/// Wire shape for one journal line, accepted as an opaque JSON object and
/// validated by [`validate_shape`] (§4.3).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineWire {
    pub account_id: String,
    pub side: String,
    pub transition: String,
    #[serde(default)]
    pub from_bucket: Option<String>,
    #[serde(default)]
    pub to_bucket: Option<String>,
    pub amount: AmountWire,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmountWire {
    pub currency: String,
    pub amount: String,
}

/// Wire shape for `POST /journal`'s body (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalWire {
    pub journal_id: String,
    pub idempotency_key: String,
    pub lines: Vec<LineWire>,
}

#[derive(Debug, Clone)]
pub struct ValidatedLine {
    pub account_id: String,
    pub side: Side,
    pub transition: Transition,
    pub from_bucket: Option<Bucket>,
    pub to_bucket: Option<Bucket>,
    pub currency: String,
    pub amount_minor: i64,
    pub amount_canonical: String,
}

#[derive(Debug, Clone)]
pub struct ValidatedJournalRequest {
    pub journal_id: String,
    pub idempotency_key: String,
    pub lines: Vec<ValidatedLine>,
}

fn is_three_letter_currency(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

/// Shape-validates a wire request, collecting every issue it can find rather
/// than stopping at the first (§4.3). Does not run the semantic preflight
/// checks (currency uniformity, bucket rules, balance) — call [`preflight`]
/// on the result for those.
pub fn validate_shape(wire: JournalWire) -> Result<ValidatedJournalRequest, Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if wire.journal_id.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "journalId",
            "journalId must be a non-empty string",
            "required",
        ));
    }
    if wire.idempotency_key.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "idempotencyKey",
            "idempotencyKey must be a non-empty string",
            "required",
        ));
    }
    if wire.lines.len() < 2 {
        issues.push(ValidationIssue::new(
            "lines",
            "a journal must have at least two lines",
            "min_length",
        ));
    }

    let mut lines = Vec::with_capacity(wire.lines.len());
    for (idx, line) in wire.lines.into_iter().enumerate() {
        let path = format!("lines[{idx}]");

        if line.account_id.trim().is_empty() {
            issues.push(ValidationIssue::new(
                format!("{path}.accountId"),
                "accountId must be a non-empty string",
                "required",
            ));
        }

        let side = Side::parse(&line.side);
        if side.is_none() {
            issues.push(ValidationIssue::new(
                format!("{path}.side"),
                "side must be one of debit, credit",
                "enum",
            ));
        }

        let transition = Transition::parse(&line.transition);
        if transition.is_none() {
            issues.push(ValidationIssue::new(
                format!("{path}.transition"),
                "transition must be one of reserve, lock, finalize, release, revert",
                "enum",
            ));
        }

        let from_bucket = line.from_bucket.as_deref().map(Bucket::parse);
        if let Some(None) = from_bucket {
            issues.push(ValidationIssue::new(
                format!("{path}.fromBucket"),
                "fromBucket must be one of available, pending, escrow, outflow",
                "enum",
            ));
        }
        let to_bucket = line.to_bucket.as_deref().map(Bucket::parse);
        if let Some(None) = to_bucket {
            issues.push(ValidationIssue::new(
                format!("{path}.toBucket"),
                "toBucket must be one of available, pending, escrow, outflow",
                "enum",
            ));
        }

        let currency = line.amount.currency.trim().to_string();
        if !is_three_letter_currency(&currency) {
            issues.push(ValidationIssue::new(
                format!("{path}.amount.currency"),
                "currency must match ^[A-Z]{3}$",
                "pattern",
            ));
        }

        let amount_trimmed = line.amount.amount.trim().to_string();
        let amount_minor = amount::to_minor(&amount_trimmed);
        if amount_minor.is_err() {
            issues.push(ValidationIssue::new(
                format!("{path}.amount.amount"),
                "amount must match ^\\d+(\\.\\d{1,2})?$",
                "pattern",
            ));
        }

        if let (Some(side), Some(transition), Ok(amount_minor)) = (side, transition, &amount_minor) {
            lines.push(ValidatedLine {
                account_id: line.account_id,
                side,
                transition,
                from_bucket: from_bucket.flatten(),
                to_bucket: to_bucket.flatten(),
                currency,
                amount_minor: *amount_minor,
                amount_canonical: amount::canonicalize(&amount_trimmed),
            });
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    Ok(ValidatedJournalRequest {
        journal_id: wire.journal_id,
        idempotency_key: wire.idempotency_key,
        lines,
    })
}

/// Semantic preflight checks that run once the shape is known good, before a
/// transaction is ever opened (§4.3, §4.4 step 0). Each check surfaces a
/// single concrete domain error rather than a `ValidationIssue` list.
pub fn preflight(request: &ValidatedJournalRequest) -> LedgerResult<()> {
    let mut currencies = request.lines.iter().map(|l| l.currency.as_str());
    if let Some(first) = currencies.next()
        && currencies.any(|c| c != first)
    {
        return Err(LedgerError::CurrencyMismatch);
    }

    for line in &request.lines {
        buckets::validate_line_buckets(line.transition, line.from_bucket, line.to_bucket)?;
    }

    let pairs: Vec<(Side, i64)> = request
        .lines
        .iter()
        .map(|l| (l.side, l.amount_minor))
        .collect();
    if !amount::is_balanced(&pairs) {
        return Err(LedgerError::Unbalanced);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(
        account_id: &str,
        side: &str,
        transition: &str,
        from_bucket: Option<&str>,
        to_bucket: Option<&str>,
        amount: &str,
    ) -> LineWire {
        LineWire {
            account_id: account_id.to_string(),
            side: side.to_string(),
            transition: transition.to_string(),
            from_bucket: from_bucket.map(str::to_string),
            to_bucket: to_bucket.map(str::to_string),
            amount: AmountWire {
                currency: "USD".to_string(),
                amount: amount.to_string(),
            },
        }
    }

    fn reserve_and_lock_wire() -> JournalWire {
        JournalWire {
            journal_id: "J-0001".to_string(),
            idempotency_key: "idem-0001".to_string(),
            lines: vec![
                line("USER_1", "debit", "reserve", Some("available"), Some("pending"), "150.00"),
                line(
                    "ESCROW_POOL",
                    "credit",
                    "lock",
                    Some("available"),
                    Some("escrow"),
                    "150.00",
                ),
            ],
        }
    }

    #[test]
    fn validates_a_well_formed_request() {
        let validated = validate_shape(reserve_and_lock_wire()).expect("shape is valid");
        assert_eq!(validated.lines.len(), 2);
        assert_eq!(validated.lines[0].amount_minor, 15_000);
        preflight(&validated).expect("balanced, single currency, legal buckets");
    }

    #[test]
    fn collects_multiple_shape_issues_at_once() {
        let wire = JournalWire {
            journal_id: String::new(),
            idempotency_key: String::new(),
            lines: vec![line("", "sideways", "reserve", None, Some("pending"), "not-a-number")],
        };
        let issues = validate_shape(wire).expect_err("multiple issues expected");
        assert!(issues.len() >= 4, "expected several issues, got {issues:?}");
    }

    #[test]
    fn preflight_rejects_currency_mismatch() {
        let mut wire = reserve_and_lock_wire();
        wire.lines[1].amount.currency = "EUR".to_string();
        let validated = validate_shape(wire).expect("shape is valid");
        let err = preflight(&validated).expect_err("currencies differ");
        assert!(matches!(err, LedgerError::CurrencyMismatch));
    }

    #[test]
    fn preflight_rejects_unbalanced_journal() {
        let mut wire = reserve_and_lock_wire();
        wire.lines[1].amount.amount = "100.00".to_string();
        let validated = validate_shape(wire).expect("shape is valid");
        let err = preflight(&validated).expect_err("100 != 150");
        assert!(matches!(err, LedgerError::Unbalanced));
    }
}
