// src/cache/fingerprint.rs — Stable query fingerprints

use sha2::{Digest, Sha256};

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase hex SHA-256 of the normalized query.
///
/// Two queries that differ only in case or spacing share a fingerprint. A
/// lookup must still compare normalized text before trusting a hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(query: &str) -> Self {
        Self::of_normalized(&normalize(query))
    }

    pub fn of_normalized(normalized: &str) -> Self {
        Self(hex::encode(Sha256::digest(normalized.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("  Show   me\tRevenue\nby Region  "),
            "show me revenue by region"
        );
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_equivalent_queries_share_fingerprint() {
        assert_eq!(
            Fingerprint::of("Revenue by Region"),
            Fingerprint::of("  revenue   BY region ")
        );
        assert_ne!(Fingerprint::of("revenue by region"), Fingerprint::of("revenue by product"));
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            Fingerprint::of("ABC").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(Fingerprint::of("x").as_str().len(), 64);
    }
}
