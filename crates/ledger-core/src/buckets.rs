use crate::error::LedgerError;
use crate::model::{Bucket, Transition};

/// The allowed `from` buckets and the single required `to` bucket for a
/// transition (§4.2). `lock` is the only transition with a choice of two
/// `from` buckets.
pub fn bucket_rule(transition: Transition) -> (&'static [Bucket], Bucket) {
    match transition {
        Transition::Reserve => (&[Bucket::Available], Bucket::Pending),
        Transition::Lock => (&[Bucket::Pending, Bucket::Available], Bucket::Escrow),
        Transition::Finalize => (&[Bucket::Escrow], Bucket::Outflow),
        Transition::Release => (&[Bucket::Pending], Bucket::Available),
        Transition::Revert => (&[Bucket::Escrow], Bucket::Available),
    }
}

fn describe_buckets(buckets: &[Bucket]) -> String {
    buckets
        .iter()
        .map(Bucket::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Validates one line's bucket pair against the transition's rule. An
/// explicit no-op (`fromBucket == toBucket`, both present) is always legal
/// regardless of transition (§4.2, and the release/revert open question in
/// SPEC_FULL.md §9).
pub fn validate_line_buckets(
    transition: Transition,
    from: Option<Bucket>,
    to: Option<Bucket>,
) -> Result<(), LedgerError> {
    if let (Some(f), Some(t)) = (from, to)
        && f == t
    {
        return Ok(());
    }

    let (allowed_from, required_to) = bucket_rule(transition);

    let from = from.ok_or_else(|| LedgerError::MissingBucket {
        field: "fromBucket".to_string(),
        expected: describe_buckets(allowed_from),
    })?;
    if !allowed_from.contains(&from) {
        return Err(LedgerError::InvalidBucket {
            field: "fromBucket".to_string(),
            expected: describe_buckets(allowed_from),
            actual: from.to_string(),
        });
    }

    let to = to.ok_or_else(|| LedgerError::MissingBucket {
        field: "toBucket".to_string(),
        expected: required_to.to_string(),
    })?;
    if to != required_to {
        return Err(LedgerError::InvalidBucket {
            field: "toBucket".to_string(),
            expected: required_to.to_string(),
            actual: to.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_requires_available_to_pending() {
        validate_line_buckets(Transition::Reserve, Some(Bucket::Available), Some(Bucket::Pending))
            .expect("reserve available->pending is legal");
    }

    #[test]
    fn lock_accepts_either_allowed_from_bucket() {
        validate_line_buckets(Transition::Lock, Some(Bucket::Pending), Some(Bucket::Escrow))
            .expect("lock pending->escrow is legal");
        validate_line_buckets(Transition::Lock, Some(Bucket::Available), Some(Bucket::Escrow))
            .expect("lock available->escrow is legal");
    }

    #[test]
    fn wrong_from_bucket_is_rejected() {
        let err = validate_line_buckets(Transition::Reserve, Some(Bucket::Escrow), Some(Bucket::Pending))
            .expect_err("escrow is not a legal reserve source");
        assert!(matches!(err, LedgerError::InvalidBucket { field, .. } if field == "fromBucket"));
    }

    #[test]
    fn wrong_to_bucket_is_rejected() {
        let err = validate_line_buckets(Transition::Reserve, Some(Bucket::Available), Some(Bucket::Escrow))
            .expect_err("reserve must land in pending");
        assert!(matches!(err, LedgerError::InvalidBucket { field, .. } if field == "toBucket"));
    }

    #[test]
    fn missing_bucket_is_reported_with_field_name() {
        let err = validate_line_buckets(Transition::Reserve, None, Some(Bucket::Pending))
            .expect_err("fromBucket is required");
        assert!(matches!(err, LedgerError::MissingBucket { field, .. } if field == "fromBucket"));
    }

    #[test]
    fn no_op_line_is_legal_for_any_transition() {
        validate_line_buckets(Transition::Release, Some(Bucket::Escrow), Some(Bucket::Escrow))
            .expect("no-op lines are legal regardless of transition");
        validate_line_buckets(Transition::Revert, Some(Bucket::Outflow), Some(Bucket::Outflow))
            .expect("no-op lines are legal regardless of transition");
    }
}
