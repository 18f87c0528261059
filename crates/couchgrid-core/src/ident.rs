//! Identity generation: cluster tags, admin passwords, replica bounds.

use thiserror::Error;

use crate::{MAX_CLUSTER_TAG, MAX_REPLICAS, MIN_CLUSTER_TAG, PASSWORD_LENGTH};

/// Characters used for generated tags and passwords. Lowercase and digits
/// only, so tags are valid platform resource names.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error)]
pub enum IdentError {
    #[error("system randomness unavailable: {0}")]
    Random(String),

    /// The tag would not form valid platform resource names.
    #[error("invalid cluster tag {tag:?}: only a-z, 0-9 and inner '-' are allowed")]
    InvalidTag { tag: String },
}

/// Normalize a caller-supplied cluster tag.
///
/// Missing or shorter than [`MIN_CLUSTER_TAG`] → a fresh random tag of
/// [`MAX_CLUSTER_TAG`] characters. Longer than the maximum → truncated.
/// The result is lowercased and must be usable inside a DNS label.
pub fn normalize_tag(requested: Option<&str>) -> Result<String, IdentError> {
    let requested = requested.map(str::trim).unwrap_or_default();
    let len = requested.chars().count();
    if len < MIN_CLUSTER_TAG {
        return random_token(MAX_CLUSTER_TAG);
    }
    let tag: String = requested
        .chars()
        .take(MAX_CLUSTER_TAG)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let valid = tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !tag.starts_with('-')
        && !tag.ends_with('-');
    if !valid {
        return Err(IdentError::InvalidTag {
            tag: requested.to_string(),
        });
    }
    Ok(tag)
}

/// Generate an admin password for a new cluster.
pub fn generate_password() -> Result<String, IdentError> {
    random_token(PASSWORD_LENGTH)
}

/// Clamp a requested replica count into `1..=MAX_REPLICAS`.
pub fn clamp_replicas(requested: i64) -> u32 {
    requested.clamp(1, MAX_REPLICAS as i64) as u32
}

fn random_token(len: usize) -> Result<String, IdentError> {
    // Largest multiple of the alphabet size that fits in a byte; bytes at or
    // above it are rejected so every character is equally likely.
    let limit = (256 / ALPHABET.len() * ALPHABET.len()) as u8;
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        getrandom::getrandom(&mut buf).map_err(|e| IdentError::Random(e.to_string()))?;
        for b in buf {
            if b < limit && out.len() < len {
                out.push(ALPHABET[(b as usize) % ALPHABET.len()] as char);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_token_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit()
    }

    #[test]
    fn short_tag_is_replaced_with_generated() {
        let tag = normalize_tag(Some("ab")).unwrap();
        assert_eq!(tag.len(), MAX_CLUSTER_TAG);
        assert!(tag.chars().all(is_token_char));
    }

    #[test]
    fn missing_tag_is_generated() {
        let tag = normalize_tag(None).unwrap();
        assert_eq!(tag.len(), 12);
    }

    #[test]
    fn long_tag_is_truncated() {
        let tag = normalize_tag(Some("abcdefghijklmnopqrstuvwxyz")).unwrap();
        assert_eq!(tag, "abcdefghijkl");
    }

    #[test]
    fn valid_tag_is_kept() {
        assert_eq!(normalize_tag(Some("orders")).unwrap(), "orders");
        assert_eq!(normalize_tag(Some("abcd")).unwrap(), "abcd");
    }

    #[test]
    fn tag_is_lowercased() {
        assert_eq!(normalize_tag(Some("Orders-EU")).unwrap(), "orders-eu");
    }

    #[test]
    fn tag_outside_dns_alphabet_is_rejected() {
        for bad in ["AB_cd", "ab cd", "-abcd", "abcd-", "caf\u{e9}s"] {
            assert!(
                matches!(normalize_tag(Some(bad)), Err(IdentError::InvalidTag { .. })),
                "{bad:?} accepted"
            );
        }
        // Truncation can expose a trailing dash.
        assert!(normalize_tag(Some("abcdefghijk-xyz")).is_err());
    }

    #[test]
    fn generated_tags_differ() {
        let a = normalize_tag(None).unwrap();
        let b = normalize_tag(None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn password_has_expected_shape() {
        let pw = generate_password().unwrap();
        assert_eq!(pw.len(), PASSWORD_LENGTH);
        assert!(pw.chars().all(is_token_char));
    }

    #[test]
    fn replicas_are_clamped() {
        assert_eq!(clamp_replicas(15), 10);
        assert_eq!(clamp_replicas(0), 1);
        assert_eq!(clamp_replicas(-3), 1);
        assert_eq!(clamp_replicas(4), 4);
    }
}
