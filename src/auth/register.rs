//! Handles registration requests: validates the form, stores the user and
//! issues their first session token.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    Error, PasswordHash, ValidatedPassword,
    auth::middleware::AuthState,
    db::lock_connection,
    response::ApiResponse,
    user::{Email, NewUser, PublicUser, create_user, get_user_by_email},
};

const ALL_FIELDS_REQUIRED_MSG: &str = "All fields are required";

/// The data for registering a new user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    /// The user's display name.
    pub name: Option<String>,
    /// The user's email address.
    pub email: Option<String>,
    /// The plain text password.
    pub password: Option<String>,
}

/// The payload of a successful registration or log in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// A signed session token for the user.
    pub token: String,
    /// The public view of the user.
    pub user: PublicUser,
}

/// A route handler for registering a new user.
///
/// Responds with 201 and a session token so the client is logged in straight away.
pub async fn register_user(
    State(state): State<AuthState>,
    form: Result<Json<RegisterForm>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<AuthPayload>), Error> {
    let Json(form) = form?;

    let (Some(name), Some(raw_email), Some(raw_password)) = (
        non_blank(form.name.as_deref()),
        non_blank(form.email.as_deref()),
        form.password.as_deref().filter(|password| !password.is_empty()),
    ) else {
        return Err(Error::Validation(ALL_FIELDS_REQUIRED_MSG.to_owned()));
    };

    let email = Email::new(raw_email)?;
    let password = ValidatedPassword::new(raw_password)?;

    {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&email, &connection) {
            Ok(_) => return Err(Error::EmailTaken),
            Err(Error::NotFound) => {}
            Err(error) => return Err(error),
        }
    }

    // The lock is not held while hashing. A user registered with the same
    // email in the meantime is caught by the UNIQUE constraint.
    let password_hash = PasswordHash::new(password, state.password_cost)?;
    let user = {
        let connection = lock_connection(&state.db_connection)?;

        create_user(
            NewUser {
                name: name.to_owned(),
                email,
                password_hash,
            },
            &connection,
        )?
    };
    let user = PublicUser::from(&user);
    let token = state.token_keys.issue(&user, state.token_duration)?;

    tracing::info!("registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        ApiResponse::success("User registered successfully", AuthPayload { token, user }),
    ))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
