//! Password rules and bcrypt hashing for user accounts.
//!
//! A raw password becomes a [ValidatedPassword] once it is long enough, and
//! only a validated password can be turned into a stored [PasswordHash].

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The minimum number of characters a password must have.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A password that is long enough to be accepted, still in plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Accept `raw_password` if it has at least [MIN_PASSWORD_LENGTH] characters.
    ///
    /// # Errors
    /// Returns [Error::Validation] for a shorter password.
    pub fn new(raw_password: &str) -> Result<Self, Error> {
        match raw_password.chars().count() {
            length if length < MIN_PASSWORD_LENGTH => Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
            ))),
            _ => Ok(Self(raw_password.to_owned())),
        }
    }

    /// Wrap `raw_password` without checking its length, for tests and fixtures.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("********")
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// The bcrypt cost used outside of tests.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Salt and hash `password` with bcrypt at `cost`.
    ///
    /// Each increment of `cost` doubles the time needed to hash and verify.
    ///
    /// # Errors
    /// Returns [Error::HashingError] if bcrypt fails.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash read back from the database.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Validate then hash `raw_password`.
    ///
    /// # Errors
    /// Returns [Error::Validation] for a short password or
    /// [Error::HashingError] if bcrypt fails.
    pub fn from_raw_password(raw_password: &str, cost: u32) -> Result<Self, Error> {
        PasswordHash::new(ValidatedPassword::new(raw_password)?, cost)
    }

    /// Whether `raw_password` hashes to this hash.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
