use sha2::{Digest, Sha256};

pub fn compute_hash(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// First `len` hex chars of the SHA-256 digest; used where a full digest is noise.
pub fn short_hash(input: &str, len: usize) -> String {
    let mut digest = compute_hash(input);
    digest.truncate(len);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let digest = compute_hash("Nike men's running shorts");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, compute_hash("Nike men's running shorts"));
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_hash_is_prefix() {
        let full = compute_hash("crew neck t-shirt");
        assert_eq!(short_hash("crew neck t-shirt", 12), full[..12]);
    }
}
