//! Operator accounts and bcrypt password hashes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::UserId;

/// Work factor for newly generated hashes.
pub const DEFAULT_COST: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed password hash: {0}")]
    Malformed(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Stored password verifier in bcrypt's modular crypt format (`$2b$10$...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a password with a fresh random salt at [`DEFAULT_COST`].
    pub fn generate(password: &str) -> Result<Self, CredentialError> {
        Self::generate_with_cost(password, DEFAULT_COST)
    }

    pub fn generate_with_cost(password: &str, cost: u32) -> Result<Self, CredentialError> {
        bcrypt::hash(password, cost)
            .map(Self)
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// Check a candidate password. A hash bcrypt cannot read never verifies.
    pub fn verify(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.0).unwrap_or(false)
    }

    pub fn encode(&self) -> String {
        self.0.clone()
    }

    pub fn parse(encoded: &str) -> Result<Self, CredentialError> {
        encoded
            .parse::<bcrypt::HashParts>()
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        Ok(Self(encoded.to_string()))
    }
}

impl TryFrom<String> for PasswordHash {
    type Error = CredentialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PasswordHash> for String {
    fn from(value: PasswordHash) -> Self {
        value.0
    }
}

/// An operator who may log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub password_hash: PasswordHash,
}

impl UserAccount {
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, CredentialError> {
        Ok(Self::with_hash(username, PasswordHash::generate(password)?))
    }

    pub fn with_hash(username: impl Into<String>, password_hash: PasswordHash) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            password_hash,
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash.verify(password)
    }
}
