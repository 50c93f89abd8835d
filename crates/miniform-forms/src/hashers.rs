//! Password hashing for password columns.
//!
//! Model forms never store a submitted password as-is: the raw value is
//! hashed with bcrypt before it reaches the database. Hashing is CPU-bound,
//! so it runs on the blocking pool.
//!
//! The cost factor comes from `Settings::password_hash_cost` unless a
//! [`BcryptHasher`] is built with an explicit cost.

use async_trait::async_trait;
use miniform_core::error::{MiniformError, MiniformResult};
use miniform_core::settings::SETTINGS;

/// A password hashing backend.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// The algorithm identifier.
    fn algorithm(&self) -> &str;

    /// Hashes `password` into an encoded string.
    async fn hash(&self, password: &str) -> MiniformResult<String>;

    /// Returns `true` if `password` matches `hash`.
    async fn verify(&self, password: &str, hash: &str) -> MiniformResult<bool>;

    /// Returns `true` if `hash` was produced with weaker parameters.
    fn must_update(&self, hash: &str) -> bool;
}

/// Bcrypt hasher.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    /// The bcrypt cost parameter.
    pub cost: u32,
}

impl BcryptHasher {
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    /// Uses the configured `password_hash_cost`.
    fn default() -> Self {
        Self::new(SETTINGS.get_or_default().password_hash_cost)
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    fn algorithm(&self) -> &'static str {
        "bcrypt"
    }

    async fn hash(&self, password: &str) -> MiniformResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || {
            bcrypt::hash(password, cost)
                .map_err(|e| MiniformError::PasswordHashError(format!("Bcrypt hash error: {e}")))
        })
        .await
        .map_err(|e| MiniformError::PasswordHashError(format!("Task join error: {e}")))?
    }

    async fn verify(&self, password: &str, hash: &str) -> MiniformResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &hash)
                .map_err(|e| MiniformError::PasswordHashError(format!("Bcrypt verify error: {e}")))
        })
        .await
        .map_err(|e| MiniformError::PasswordHashError(format!("Task join error: {e}")))?
    }

    fn must_update(&self, hash: &str) -> bool {
        // $2b$XX$...
        hash.strip_prefix("$2b$")
            .and_then(|s| s.get(..2))
            .and_then(|cost| cost.parse::<u32>().ok())
            .is_some_and(|stored| stored < self.cost)
    }
}

/// Hashes `raw` with bcrypt at the configured cost.
pub async fn hash_password(raw: &str) -> MiniformResult<String> {
    BcryptHasher::default().hash(raw).await
}

/// Checks `raw` against a stored bcrypt hash.
///
/// A malformed hash counts as a mismatch.
pub async fn check_password(raw: &str, hashed: &str) -> bool {
    match BcryptHasher::default().verify(raw, hashed).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!(error = %e, "password check failed");
            false
        }
    }
}
