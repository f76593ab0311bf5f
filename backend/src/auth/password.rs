//! Password hashing using bcrypt
//!
//! Digests are in modular crypt format (`$2b$<cost>$<salt+hash>`), so the
//! cost factor can be raised at any time without invalidating stored digests.
//!
//! # Performance Considerations
//!
//! bcrypt is intentionally CPU-intensive. Request handlers use the `_async`
//! variants, which run on the blocking thread pool.

use anyhow::Result;

/// Lowest and highest cost factors accepted by bcrypt
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// Password hashing service
#[derive(Debug, Clone, Copy)]
pub struct PasswordService {
    cost: u32,
}

impl PasswordService {
    /// Create a hasher with the given cost factor (log2 of the round count)
    pub fn new(cost: u32) -> Result<Self> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            anyhow::bail!(
                "bcrypt cost must be between {} and {}, got {}",
                MIN_COST,
                MAX_COST,
                cost
            );
        }
        Ok(Self { cost })
    }

    /// Cost factor used for new digests
    #[inline]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh random salt (blocking operation)
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
    }

    /// Hash a password asynchronously (non-blocking)
    ///
    /// Spawns the CPU-intensive work on a blocking thread pool,
    /// preventing it from blocking the async runtime.
    pub async fn hash_async(&self, password: String) -> Result<String> {
        let service = *self;
        tokio::task::spawn_blocking(move || service.hash(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {}", e))?
    }

    /// Verify a password against a digest (blocking operation)
    ///
    /// Any mismatch, including a malformed digest, is `false`.
    pub fn verify(password: &str, digest: &str) -> bool {
        bcrypt::verify(password, digest).unwrap_or(false)
    }

    /// Verify a password asynchronously (non-blocking)
    pub async fn verify_async(password: String, digest: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || Self::verify(&password, &digest))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Minimum cost keeps the property tests fast
    fn fast() -> PasswordService {
        PasswordService::new(MIN_COST).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let password = "secure_password_123";
        let hash = fast().hash(password).unwrap();

        assert!(PasswordService::verify(password, &hash));
        assert!(!PasswordService::verify("wrong_password", &hash));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = "test_password";
        let hash1 = fast().hash(password).unwrap();
        let hash2 = fast().hash(password).unwrap();

        // Hashes should be different due to random salt
        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(PasswordService::verify(password, &hash1));
        assert!(PasswordService::verify(password, &hash2));
    }

    #[test]
    fn test_cost_is_embedded_in_digest() {
        let hash = PasswordService::new(10).unwrap().hash("secret1").unwrap();
        assert!(hash.starts_with("$2b$10$"));

        // A digest produced at another cost still verifies
        let cheap = fast().hash("secret1").unwrap();
        assert!(cheap.starts_with("$2b$04$"));
        assert!(PasswordService::verify("secret1", &cheap));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        assert!(PasswordService::new(3).is_err());
        assert!(PasswordService::new(32).is_err());
    }

    #[test]
    fn test_malformed_digest_is_false() {
        assert!(!PasswordService::verify("anything", "not-a-valid-hash"));
        assert!(!PasswordService::verify("anything", ""));
        assert!(!PasswordService::verify("", "$2b$10$"));
    }

    #[test]
    fn test_empty_password_does_not_crash() {
        let hash = fast().hash("").unwrap();
        assert!(PasswordService::verify("", &hash));
        assert!(!PasswordService::verify("x", &hash));
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let password = "async_test_password".to_string();
        let hash = fast().hash_async(password.clone()).await.unwrap();

        assert!(PasswordService::verify_async(password.clone(), hash.clone()).await.unwrap());
        assert!(!PasswordService::verify_async("wrong".to_string(), hash).await.unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_hash_then_verify_round_trips(password in "[ -~]{1,40}") {
            let hash = fast().hash(&password).unwrap();
            prop_assert!(PasswordService::verify(&password, &hash));
        }

        #[test]
        fn prop_mutated_digest_never_verifies(
            password in "[a-zA-Z0-9]{1,24}",
            position in any::<prop::sample::Index>(),
        ) {
            let hash = fast().hash(&password).unwrap();

            // Mutate one character of the salt/hash body. The last salt and
            // last hash characters carry padding bits, so they are skipped.
            let prefix = "$2b$04$".len();
            let significant: Vec<usize> = (0..21).chain(22..52).map(|i| prefix + i).collect();
            let idx = significant[position.index(significant.len())];
            let original = hash.as_bytes()[idx];
            let replacement = if original == b'A' { b'B' } else { b'A' };
            let mut mutated = hash.into_bytes();
            mutated[idx] = replacement;
            let mutated = String::from_utf8(mutated).unwrap();

            prop_assert!(!PasswordService::verify(&password, &mutated));
        }
    }
}
