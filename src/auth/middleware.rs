//! Authentication middleware that checks the bearer token on protected routes.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use rusqlite::Connection;
use time::Duration;

use crate::{AppState, Error, auth::token::TokenKeys};

/// The state needed by the auth middleware and the register and log-in handlers.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The keys for signing and verifying session tokens.
    pub token_keys: TokenKeys,
    /// How long newly issued tokens are valid for.
    pub token_duration: Duration,
    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_keys: state.token_keys.clone(),
            token_duration: state.token_duration,
            password_cost: state.password_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that checks for a valid `Authorization: Bearer <token>` header.
///
/// The user ID from the token is placed into the request and the request is
/// executed normally if the token is valid, otherwise a 401 JSON response is returned.
/// The user is not looked up in the database.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bearer =
        match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state).await {
            Ok(TypedHeader(Authorization(bearer))) => bearer,
            Err(rejection) => {
                tracing::debug!("rejected request to {}: {rejection}", parts.uri);
                return Error::MissingToken.into_response();
            }
        };

    let claims = match state.token_keys.verify(bearer.token()) {
        Ok(claims) => claims,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(claims.id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}
