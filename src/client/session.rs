//! Reads the identity out of a session token without the server secret.
//!
//! The client cannot check the signature, only the server can. Decoding
//! locally gives the display identity and lets the client drop a session
//! that has already expired before making a request with it.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use time::OffsetDateTime;

use crate::{auth::Claims, client::ClientError, user::PublicUser};

/// A decoded session token.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    token: String,
    claims: Claims,
}

impl Session {
    /// Decode `token` into a session.
    ///
    /// # Errors
    /// Returns [ClientError::Decode] if the token is not a well formed JWT with
    /// the expected claims.
    pub fn new(token: String) -> Result<Self, ClientError> {
        let claims = decode_unverified(&token)?;
        Ok(Self { token, claims })
    }

    /// The raw token, sent as the bearer credential.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The user the session belongs to.
    pub fn user(&self) -> PublicUser {
        self.claims.user()
    }

    /// When the session stops being accepted by the server.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.claims.exp).ok()
    }

    /// Whether the session has expired at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.claims.is_expired_at(now)
    }
}

/// Decode the claims of `token` without checking its signature or expiry.
///
/// # Errors
/// Returns [ClientError::Decode] if the token cannot be decoded.
pub fn decode_unverified(token: &str) -> Result<Claims, ClientError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|error| ClientError::Decode(format!("the session token: {error}")))
}
