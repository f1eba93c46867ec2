use crate::error::LedgerError;
use crate::model::Side;

/// True if `s` is `\d+` or `\d+\.\d{1,2}`, hand-checked rather than via a
/// regex crate (this workspace parses statement amounts the same way, see
/// `codex-bank-ingest::parse_amount`).
fn is_well_formed(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    match parts.next() {
        Some(p) if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) => {}
        _ => return false,
    }
    match parts.next() {
        None => true,
        Some(frac) => {
            !frac.is_empty() && frac.len() <= 2 && frac.chars().all(|c| c.is_ascii_digit())
        }
    }
}

fn strip_leading_zeros(int_part: &str) -> String {
    let trimmed = int_part.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonicalizes a positive decimal amount string: strips leading zeros from
/// the integer part and drops an all-zero fractional part. Leaves malformed
/// input unchanged, the caller's schema validation will reject it later
/// (§4.1).
pub fn canonicalize(input: &str) -> String {
    let trimmed = input.trim();
    if !is_well_formed(trimmed) {
        return input.to_string();
    }
    let mut parts = trimmed.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    let canonical_int = strip_leading_zeros(int_part);
    match frac_part {
        Some(frac) if frac.chars().any(|c| c != '0') => format!("{canonical_int}.{frac}"),
        _ => canonical_int,
    }
}

/// Converts a canonical (or well-formed) decimal amount string into minor
/// units (cents). Fails with `InvalidAmount` if the string is not
/// `^\d+(\.\d{1,2})?$` after canonicalization.
pub fn to_minor(input: &str) -> Result<i64, LedgerError> {
    let canonical = canonicalize(input);
    if !is_well_formed(&canonical) {
        return Err(LedgerError::InvalidAmount(format!(
            "not a valid amount: {input}"
        )));
    }

    let mut parts = canonical.splitn(2, '.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next().unwrap_or("");

    let int_value: i64 = int_part
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(format!("amount too large: {input}")))?;

    let mut frac_digits = frac_part.to_string();
    while frac_digits.len() < 2 {
        frac_digits.push('0');
    }
    let frac_value: i64 = frac_digits
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(format!("invalid fraction in: {input}")))?;

    int_value
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| LedgerError::InvalidAmount(format!("amount overflows minor units: {input}")))
}

/// True iff the signed sum of all lines (debit positive, credit negative) is
/// exactly zero, in integer minor units (§4.1).
pub fn is_balanced(lines: &[(Side, i64)]) -> bool {
    let mut sum: i64 = 0;
    for (side, amount_minor) in lines {
        let signed = match side {
            Side::Debit => *amount_minor,
            Side::Credit => -*amount_minor,
        };
        sum = match sum.checked_add(signed) {
            Some(v) => v,
            None => return false,
        };
    }
    sum == 0
}
