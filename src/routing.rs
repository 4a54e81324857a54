//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    auth::{auth_guard, log_in_user, register_user},
    endpoints,
    ledger::ledger_router,
    logging::logging_middleware,
    response::ApiResponse,
};

/// The reply to the health check route.
pub const HEALTH_MESSAGE: &str = "API is running...";

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::ROOT, get(get_health))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(log_in_user));

    let protected_routes = ledger_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Build the CORS layer that lets the browser client at `client_url` call the API.
///
/// Credentials are allowed, so the origin must be given explicitly.
///
/// # Errors
/// Returns an error if `client_url` is not a valid header value.
pub fn cors_layer(client_url: &str) -> Result<CorsLayer, header::InvalidHeaderValue> {
    let origin = HeaderValue::from_str(client_url.trim_end_matches('/'))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

async fn get_health() -> &'static str {
    HEALTH_MESSAGE
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        ApiResponse::<()>::failure("Route not found"),
    )
        .into_response()
}


#[cfg(test)]
mod cors_tests {
    use axum::http::{HeaderValue, Method, header};

    use crate::{build_router, routing::cors_layer, test_utils::get_test_app_state};

    #[tokio::test]
    async fn preflight_allows_configured_origin() {
        let app = build_router(get_test_app_state())
            .layer(cors_layer("http://localhost:5173/").unwrap());
        let server = axum_test::TestServer::new(app);

        let response = server
            .method(Method::OPTIONS, "/api/users/income")
            .add_header(
                header::ORIGIN,
                HeaderValue::from_static("http://localhost:5173"),
            )
            .add_header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("POST"),
            )
            .await;

        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "http://localhost:5173"
        );
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            "true"
        );
    }

    #[test]
    fn rejects_invalid_origin() {
        assert!(cors_layer("http://bad\norigin").is_err());
    }
}
