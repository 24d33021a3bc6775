//! Child resource naming
//!
//! Derives deterministic DNS-1123 label names from a logical name and its
//! owners, e.g. `("data", ["nodejs", "app"])` -> `data-nodejs-app`. When a part
//! carries a hyphen of its own the joined form no longer identifies the
//! tuple (`data` + `my-comp` vs `data-my` + `comp`), so those names, and names
//! over the length limit, get a digest of the full input appended. Recomputing
//! the name always finds the same object.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};

/// Maximum length of a Kubernetes label-style object name
pub const MAX_NAME_LENGTH: usize = 63;

const DIGEST_LENGTH: usize = 8;

/// Resolve the name of a child object within the default length limit
pub fn resolve_child_name(logical_name: &str, owners: &[&str]) -> Result<String> {
    resolve_child_name_within(logical_name, owners, MAX_NAME_LENGTH)
}

/// Resolve the name of a child object, bounded to `max_len` characters
pub fn resolve_child_name_within(
    logical_name: &str,
    owners: &[&str],
    max_len: usize,
) -> Result<String> {
    if max_len < 2 * DIGEST_LENGTH {
        return Err(Error::InvalidIdentifier {
            value: logical_name.to_string(),
            reason: format!("name limit {} is too small", max_len),
        });
    }

    let parts = std::iter::once(logical_name)
        .chain(owners.iter().copied())
        .map(normalize_part)
        .collect::<Result<Vec<_>>>()?;
    let joined = parts.join("-");
    let ambiguous = parts.iter().any(|p| p.contains('-'));

    if !ambiguous && joined.len() <= max_len {
        return Ok(joined);
    }

    let mut raw = String::from(logical_name);
    for owner in owners {
        raw.push('\0');
        raw.push_str(owner);
    }
    let digest = short_digest(&raw, DIGEST_LENGTH);

    // joined is ASCII, so byte slicing is safe
    let keep = (max_len - DIGEST_LENGTH - 1).min(joined.len());
    let prefix = joined[..keep].trim_end_matches('-');
    Ok(format!("{}-{}", prefix, digest))
}

/// Turn one name component into a DNS-1123 label fragment.
///
/// Components that need rewriting get a digest of the original appended, so
/// `Data` and `data` never map to the same fragment.
fn normalize_part(part: &str) -> Result<String> {
    if part.is_empty() {
        return Err(Error::InvalidIdentifier {
            value: part.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }

    if let Some(bad) = part
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Err(Error::InvalidIdentifier {
            value: part.to_string(),
            reason: format!("character {:?} is not allowed", bad),
        });
    }

    if is_dns_label(part) {
        return Ok(part.to_string());
    }

    let mut normalized = String::with_capacity(part.len());
    for c in part.chars() {
        let c = match c {
            '_' | '.' | '/' => '-',
            c => c.to_ascii_lowercase(),
        };
        if c == '-' && normalized.ends_with('-') {
            continue;
        }
        normalized.push(c);
    }
    let normalized = normalized.trim_matches('-');
    if normalized.is_empty() {
        return Err(Error::InvalidIdentifier {
            value: part.to_string(),
            reason: "name has no alphanumeric characters".to_string(),
        });
    }

    Ok(format!("{}-{}", normalized, short_digest(part, 6)))
}

fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

fn short_digest(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    #[test]
    fn test_simple_names_are_hyphenated() {
        assert_eq!(
            resolve_child_name("data", &["nodejs", "app"]).unwrap(),
            "data-nodejs-app"
        );
        assert_eq!(resolve_child_name("web", &[]).unwrap(), "web");
    }

    #[test]
    fn test_hyphenated_parts_do_not_collide_across_components() {
        let first = resolve_child_name("data", &["my-comp", "app"]).unwrap();
        let second = resolve_child_name("data-my", &["comp", "app"]).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("data-my-comp-app-"));
        assert!(is_dns_label(&first) && is_dns_label(&second));
        assert_ne!(second, "data-my-comp-app");

        // digest covers the whole tuple, so the name stays stable
        assert_eq!(first, resolve_child_name("data", &["my-comp", "app"]).unwrap());
    }

    #[test]
    fn test_stability() {
        let a = resolve_child_name("very-long-volume-name", &["component-x", "application-y"]);
        let b = resolve_child_name("very-long-volume-name", &["component-x", "application-y"]);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_uniqueness_under_truncation() {
        let owners = ["a-rather-long-component-name", "and-an-application-name"];
        let mut seen = HashSet::new();
        for len in 1..=MAX_NAME_LENGTH {
            for suffix in ["a", "b", "c"] {
                let logical = format!("{}{}", "v".repeat(len - 1), suffix);
                let name = resolve_child_name(&logical, &owners).unwrap();
                assert!(name.len() <= MAX_NAME_LENGTH, "{} too long", name);
                assert!(is_dns_label(&name), "{} is not a label", name);
                assert!(seen.insert(name.clone()), "collision on {}", name);
            }
        }
    }

    #[test]
    fn test_custom_limit() {
        let name =
            resolve_child_name_within(&"x".repeat(70), &["nodejs", "app"], 59).unwrap();
        assert_eq!(name.len(), 59);
        assert!(name.ends_with(&short_digest(&format!("{}\0nodejs\0app", "x".repeat(70)), 8)));
    }

    #[test]
    fn test_normalization_keeps_names_distinct() {
        let upper = resolve_child_name("Data", &["nodejs"]).unwrap();
        let lower = resolve_child_name("data", &["nodejs"]).unwrap();
        assert_ne!(upper, lower);
        assert!(upper.starts_with("data-"));

        let dotted = resolve_child_name("my.volume", &["nodejs"]).unwrap();
        let underscored = resolve_child_name("my_volume", &["nodejs"]).unwrap();
        assert_ne!(dotted, underscored);
        assert!(is_dns_label(&dotted));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert_matches!(
            resolve_child_name("data volume", &["nodejs"]),
            Err(Error::InvalidIdentifier { .. })
        );
        assert_matches!(
            resolve_child_name("", &["nodejs"]),
            Err(Error::InvalidIdentifier { .. })
        );
        assert_matches!(
            resolve_child_name("data", &["nödejs"]),
            Err(Error::InvalidIdentifier { .. })
        );
        assert_matches!(
            resolve_child_name("--", &["nodejs"]),
            Err(Error::InvalidIdentifier { .. })
        );
    }
}
