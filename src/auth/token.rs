//! Issues and verifies the JSON Web Tokens that authenticate API requests.

use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, UserID, user::PublicUser};

/// How long a newly issued token is valid for.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::days(7);

/// The payload of a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub id: UserID,
    /// The user's display name at the time of issue.
    pub name: String,
    /// The user's email at the time of issue.
    pub email: String,
    /// When the token was issued, in seconds since the Unix epoch.
    pub iat: i64,
    /// When the token expires, in seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    /// Claims for `user` that are valid for `duration` from `issued_at`.
    pub fn new(user: &PublicUser, issued_at: OffsetDateTime, duration: Duration) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + duration).unix_timestamp(),
        }
    }

    /// Whether the token has expired at the instant `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }

    /// The user the token identifies.
    pub fn user(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// The keys for signing and verifying tokens, derived from the server secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl TokenKeys {
    /// Create HS256 keys from `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a token for `user` that is valid for `duration` from now.
    ///
    /// # Errors
    /// Returns [Error::TokenCreation] if the token could not be encoded.
    pub fn issue(&self, user: &PublicUser, duration: Duration) -> Result<String, Error> {
        self.sign(&Claims::new(user, OffsetDateTime::now_utc(), duration))
    }

    /// Sign arbitrary `claims`.
    ///
    /// # Errors
    /// Returns [Error::TokenCreation] if the token could not be encoded.
    pub fn sign(&self, claims: &Claims) -> Result<String, Error> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|error| Error::TokenCreation(error.to_string()))
    }

    /// Check the signature and expiry of `token` and return its claims.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::ExpiredToken] if the token has expired,
    /// - or [Error::InvalidToken] for a bad signature, a malformed payload,
    ///   or a user ID that cannot belong to a user.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => Error::ExpiredToken,
                _ => {
                    tracing::debug!("rejected token: {error}");
                    Error::InvalidToken
                }
            })?;

        if claims.id.as_i64() <= 0 {
            return Err(Error::InvalidToken);
        }

        Ok(claims)
    }
}
