//! Content fingerprints for optimistic concurrency.

use sha2::{Digest, Sha256};

use crate::codec;
use crate::error::Result;
use crate::model::Bean;

/// Number of hex characters kept from the SHA-256 digest.
pub const ETAG_LEN: usize = 16;

/// Fingerprint of arbitrary file content.
#[must_use]
pub fn compute(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(ETAG_LEN);
    for byte in digest.iter().take(ETAG_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Fingerprint of a bean's rendered file content.
pub fn for_bean(bean: &Bean) -> Result<String> {
    Ok(compute(&codec::encode(bean)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    #[test]
    fn test_compute_deterministic() {
        let a = compute("hello");
        assert_eq!(a, compute("hello"));
        assert_eq!(a.len(), ETAG_LEN);
        assert_eq!(a, "2cf24dba5fb0a30e");
        assert_ne!(a, compute("hello!"));
    }

    #[test]
    fn test_for_bean_tracks_persisted_fields() {
        let mut bean = Bean::new("Title");
        bean.id = "beans-ab12".into();
        let e0 = for_bean(&bean).unwrap();
        assert_eq!(e0, for_bean(&bean.clone()).unwrap());

        bean.status = Status::Completed;
        assert_ne!(e0, for_bean(&bean).unwrap());
    }
}
