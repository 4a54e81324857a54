//! HTTP handlers for creating, listing, updating and deleting ledger records.
//!
//! The same handlers serve both income and expenses. The router for each kind
//! inserts its [RecordKind] as a request extension, and the auth middleware
//! inserts the caller's [UserID].

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json, Router,
    extract::{FromRef, Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{post, put},
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    db::lock_connection,
    endpoints,
    ledger::{
        db::{create_record, delete_record, get_record, list_records, update_record},
        record::{LedgerRecord, RecordForm, RecordId, RecordKind},
    },
    response::ApiResponse,
};

/// The state needed by the ledger handlers.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// The database connection for managing records.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The routes for both record kinds.
///
/// The routes expect a [UserID] extension, so they must sit behind the auth middleware.
pub fn ledger_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    LedgerState: FromRef<S>,
{
    RecordKind::ALL
        .into_iter()
        .fold(Router::new(), |router, kind| router.merge(kind_router(kind)))
}

fn kind_router<S>(kind: RecordKind) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    LedgerState: FromRef<S>,
{
    Router::new()
        .route(
            endpoints::collection_endpoint(kind),
            post(create_record_endpoint).get(list_records_endpoint),
        )
        .route(
            endpoints::item_endpoint(kind),
            put(update_record_endpoint).delete(delete_record_endpoint),
        )
        .layer(Extension(kind))
}

/// Create a record for the caller, responding with 201 and the stored record.
pub async fn create_record_endpoint(
    State(state): State<LedgerState>,
    Extension(kind): Extension<RecordKind>,
    Extension(owner_id): Extension<UserID>,
    form: Result<Json<RecordForm>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<LedgerRecord>), Error> {
    let Json(form) = form?;
    let fields = form.validate()?;

    let connection = lock_connection(&state.db_connection)?;
    let record = create_record(owner_id, kind, fields, &connection)?;

    tracing::debug!("user {owner_id} created {kind} {}", record.id);

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(format!("{} added successfully", kind.title()), record),
    ))
}

/// List the caller's records, newest first.
pub async fn list_records_endpoint(
    State(state): State<LedgerState>,
    Extension(kind): Extension<RecordKind>,
    Extension(owner_id): Extension<UserID>,
) -> Result<ApiResponse<Vec<LedgerRecord>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let records = list_records(owner_id, kind, &connection)?;

    Ok(ApiResponse::list(records))
}

/// Apply a partial update to one of the caller's records.
///
/// The given fields are merged over the stored record and the result must
/// pass the same checks as a new record.
pub async fn update_record_endpoint(
    State(state): State<LedgerState>,
    Extension(kind): Extension<RecordKind>,
    Extension(owner_id): Extension<UserID>,
    Path(raw_record_id): Path<String>,
    form: Result<Json<RecordForm>, JsonRejection>,
) -> Result<ApiResponse<LedgerRecord>, Error> {
    let record_id = RecordId::parse(&raw_record_id).ok_or(Error::RecordNotFound(kind))?;
    let Json(form) = form?;

    let connection = lock_connection(&state.db_connection)?;
    let existing = get_record(record_id, owner_id, kind, &connection)?;
    let fields = form.merged_with(&existing).validate()?;
    let record = update_record(record_id, owner_id, kind, fields, &connection)?;

    Ok(ApiResponse::success(
        format!("{} updated successfully", kind.title()),
        record,
    ))
}

/// Delete one of the caller's records.
pub async fn delete_record_endpoint(
    State(state): State<LedgerState>,
    Extension(kind): Extension<RecordKind>,
    Extension(owner_id): Extension<UserID>,
    Path(raw_record_id): Path<String>,
) -> Result<ApiResponse<()>, Error> {
    let record_id = RecordId::parse(&raw_record_id).ok_or(Error::RecordNotFound(kind))?;

    let connection = lock_connection(&state.db_connection)?;
    delete_record(record_id, owner_id, kind, &connection)?;

    tracing::debug!("user {owner_id} deleted {kind} {record_id}");

    Ok(ApiResponse::ok(format!(
        "{} deleted successfully",
        kind.title()
    )))
}
