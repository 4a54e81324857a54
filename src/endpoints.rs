//! The API endpoint URIs, shared by the server router and the HTTP client.
//!
//! For endpoints that take a parameter, e.g., '/api/users/income/{record_id}', use [format_endpoint].

use crate::ledger::RecordKind;

/// The health check route.
pub const ROOT: &str = "/";
/// The route for registering a new user.
pub const REGISTER: &str = "/api/users/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/users/login";
/// The route to create and list income.
pub const INCOME: &str = "/api/users/income";
/// The route to update or delete a single income record.
pub const INCOME_ITEM: &str = "/api/users/income/{record_id}";
/// The route to create and list expenses.
pub const EXPENSE: &str = "/api/users/expense";
/// The route to update or delete a single expense record.
pub const EXPENSE_ITEM: &str = "/api/users/expense/{record_id}";

/// The route for creating and listing records of `kind`.
pub fn collection_endpoint(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Income => INCOME,
        RecordKind::Expense => EXPENSE,
    }
}

/// The route for updating and deleting a single record of `kind`.
pub fn item_endpoint(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Income => INCOME_ITEM,
        RecordKind::Expense => EXPENSE_ITEM,
    }
}

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/income/{record_id}', '{record_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl std::fmt::Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
