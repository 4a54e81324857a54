//! Helpers shared by the unit and HTTP tests.
#![allow(missing_docs)]

use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, PasswordHash, User, build_router, endpoints,
    user::{Email, NewUser, create_user},
};

pub(crate) const TEST_JWT_SECRET: &str = "test-secret";
pub(crate) const TEST_PASSWORD: &str = "secret1";

/// An in-memory database with the application tables.
pub(crate) fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    crate::db::initialize(&connection).expect("Could not initialize database");

    connection
}

/// Insert a user directly, skipping the registration endpoint.
pub(crate) fn create_test_user(email: &str, connection: &Connection) -> User {
    create_user(
        NewUser {
            name: "Test User".to_owned(),
            email: Email::new(email).expect("Invalid test email"),
            password_hash: PasswordHash::from_raw_password(TEST_PASSWORD, 4)
                .expect("Could not hash test password"),
        },
        connection,
    )
    .expect("Could not create test user")
}

/// App state over a fresh in-memory database with a cheap password hashing cost.
pub(crate) fn get_test_app_state() -> AppState {
    AppState::new(Connection::open_in_memory().unwrap(), TEST_JWT_SECRET)
        .expect("Could not create app state")
        .with_password_cost(4)
}

/// A test server running the full application router.
pub(crate) fn get_test_server() -> TestServer {
    TestServer::new(build_router(get_test_app_state()))
}

/// Register a user through the API and return their bearer token.
pub(crate) async fn register_test_user(server: &TestServer, name: &str, email: &str) -> String {
    let response = server
        .post(endpoints::REGISTER)
        .json(&json!({"name": name, "email": email, "password": TEST_PASSWORD}))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    body["data"]["token"]
        .as_str()
        .expect("Registration response has no token")
        .to_owned()
}
