//! Defines the app level error type and its conversion to JSON responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{ledger::RecordKind, response::ApiResponse};

/// The message sent to the client for any error it should not see the details of.
pub const SERVER_ERROR_MSG: &str = "Server Error";

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The client sent missing or malformed input.
    ///
    /// The string is shown to the client as-is.
    #[error("{0}")]
    Validation(String),

    /// A user with the same email address (ignoring case) is already registered.
    #[error("User already exists")]
    EmailTaken,

    /// The email does not belong to a user or the password did not match.
    ///
    /// The two cases are deliberately indistinguishable to the client.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The request did not carry an `Authorization: Bearer <token>` header.
    #[error("Access denied. No token provided or invalid format.")]
    MissingToken,

    /// The bearer token was well formed but its expiry has passed.
    #[error("Token has expired")]
    ExpiredToken,

    /// The bearer token failed verification for any reason other than expiry.
    #[error("Invalid token")]
    InvalidToken,

    /// The record does not exist or belongs to another user.
    ///
    /// Both cases share one message so that the existence of other users'
    /// records is not leaked.
    #[error("{} not found or unauthorized", .0.title())]
    RecordNotFound(RecordKind),

    /// A query returned no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The JWT library could not sign a token.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl Error {
    /// The HTTP status code used when this error is sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::EmailTaken => StatusCode::CONFLICT,
            Error::InvalidCredentials
            | Error::MissingToken
            | Error::ExpiredToken
            | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::RecordNotFound(_) | Error::NotFound => StatusCode::NOT_FOUND,
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::EmailTaken
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Any errors that are not handled above are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            SERVER_ERROR_MSG.to_owned()
        } else {
            self.to_string()
        };

        (status, ApiResponse::<()>::failure(message)).into_response()
    }
}
