//! Pocket Ledger is a personal finance tracker: users record income and
//! expenses and review totals, balance and monthly trends.
//!
//! This library provides the JSON REST API server and a typed client for it.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
pub mod client;
mod db;
mod endpoints;
mod error;
mod ledger;
mod logging;
mod password;
mod response;
mod routing;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{
    AuthPayload, AuthState, Claims, DEFAULT_TOKEN_DURATION, LogInData, RegisterForm, TokenKeys,
    auth_guard, log_in_user, register_user,
};
pub use db::initialize as initialize_db;
pub use endpoints::{
    EXPENSE, EXPENSE_ITEM, INCOME, INCOME_ITEM, LOG_IN, REGISTER, ROOT, collection_endpoint,
    format_endpoint, item_endpoint,
};
pub use error::{Error, SERVER_ERROR_MSG};
pub use ledger::{
    LedgerRecord, LedgerState, MAX_CATEGORY_LENGTH, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH,
    RecordForm, RecordId, RecordKind, ValidatedRecord, create_record, delete_record, format_date,
    get_record, ledger_router, list_records, update_record,
};
pub use logging::{LOG_BODY_LENGTH_LIMIT, MAX_REQUEST_BODY_SIZE, logging_middleware};
pub use password::{MIN_PASSWORD_LENGTH, PasswordHash, ValidatedPassword};
pub use response::ApiResponse;
pub use routing::{build_router, cors_layer};
pub use user::{
    Email, PublicUser, User, UserID, get_user_by_email, get_user_by_id, update_password,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
