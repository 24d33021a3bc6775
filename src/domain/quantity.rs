//! Storage quantities
//!
//! Parses Kubernetes-style sizes ("512Mi", "1Gi", "10G", "1.5Gi") into bytes
//! so that "1Gi" and "1024Mi" compare equal.

use crate::error::{Error, Result};

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

const DECIMAL_SUFFIXES: [(&str, u32); 6] = [
    ("k", 1),
    ("M", 2),
    ("G", 3),
    ("T", 4),
    ("P", 5),
    ("E", 6),
];

/// Parse a size into a byte count, rounding fractional bytes up
pub fn parse_bytes(value: &str) -> Result<u128> {
    let invalid = |reason: &str| Error::InvalidQuantity {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty quantity"));
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);

    let multiplier: u128 = if suffix.is_empty() {
        1
    } else if let Some((_, exp)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        1024u128.pow(*exp)
    } else if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        1000u128.pow(*exp)
    } else {
        return Err(invalid("unknown unit suffix"));
    };

    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("missing number"));
    }
    if fraction.contains('.') {
        return Err(invalid("more than one decimal point"));
    }
    if fraction.len() > 9 {
        return Err(invalid("too many decimal places"));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("number out of range"))?
    };
    let scale = 10u128.pow(fraction.len() as u32);
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        fraction.parse().map_err(|_| invalid("malformed fraction"))?
    };

    let scaled = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| invalid("number out of range"))?;

    Ok(scaled.div_ceil(scale))
}

/// Check that a size is well formed
pub fn validate(value: &str) -> Result<()> {
    parse_bytes(value).map(|_| ())
}

/// Compare two sizes by the number of bytes they denote
pub fn same_size(a: &str, b: &str) -> Result<bool> {
    Ok(parse_bytes(a)? == parse_bytes(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_bytes("100").unwrap(), 100);
        assert_eq!(parse_bytes("1Ki").unwrap(), 1024);
        assert_eq!(parse_bytes("1Gi").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_bytes("10G").unwrap(), 10_000_000_000);
        assert_eq!(parse_bytes("1.5Gi").unwrap(), 1024 * 1024 * 1536);
    }

    #[test]
    fn test_equivalent_sizes() {
        assert!(same_size("1Gi", "1024Mi").unwrap());
        assert!(!same_size("5Gi", "1Gi").unwrap());
        assert!(!same_size("1G", "1Gi").unwrap());
    }

    #[test]
    fn test_invalid_quantities() {
        assert_matches!(parse_bytes("example"), Err(Error::InvalidQuantity { .. }));
        assert_matches!(parse_bytes(""), Err(Error::InvalidQuantity { .. }));
        assert_matches!(parse_bytes("5Xi"), Err(Error::InvalidQuantity { .. }));
        assert_matches!(parse_bytes("1.2.3Gi"), Err(Error::InvalidQuantity { .. }));
        assert!(validate("5Gi").is_ok());
    }
}
