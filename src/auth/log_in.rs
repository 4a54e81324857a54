//! Handles log-in requests by checking the user's credentials and issuing a token.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::{middleware::AuthState, register::AuthPayload},
    db::lock_connection,
    response::ApiResponse,
    user::{Email, PublicUser, get_user_by_email},
};

/// The raw data entered by the user in the log-in form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: Option<String>,
    /// Password entered during log-in.
    pub password: Option<String>,
}

/// Handler for log-in requests.
///
/// An unknown email and a wrong password produce the same error so that
/// clients cannot tell which emails are registered.
pub async fn log_in_user(
    State(state): State<AuthState>,
    form: Result<Json<LogInData>, JsonRejection>,
) -> Result<ApiResponse<AuthPayload>, Error> {
    let Json(form) = form?;

    let (Some(raw_email), Some(raw_password)) = (form.email, form.password) else {
        return Err(Error::InvalidCredentials);
    };
    let email = Email::new(&raw_email).map_err(|_| Error::InvalidCredentials)?;

    let user = {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    let password_matches = user.password_hash.verify(&raw_password).map_err(|error| {
        tracing::error!("Error verifying password: {error}");
        Error::HashingError(error.to_string())
    })?;

    if !password_matches {
        return Err(Error::InvalidCredentials);
    }

    let user = PublicUser::from(&user);
    let token = state.token_keys.issue(&user, state.token_duration)?;

    tracing::info!("user {} logged in", user.id);

    Ok(ApiResponse::success(
        "Login successful",
        AuthPayload { token, user },
    ))
}
