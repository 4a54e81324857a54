//! A typed client for the REST API.
//!
//! [ClientStore] keeps the signed in user's records in memory and refreshes
//! them after every change, [summary] derives totals, balance, history and
//! monthly figures from them, and [export] writes the history as CSV.

mod api;
mod error;
pub mod export;
mod session;
mod store;
pub mod summary;
mod token_store;

pub use api::{DEFAULT_REQUEST_TIMEOUT, HttpLedgerApi, LedgerApi};
pub use error::ClientError;
pub use export::write_history_csv;
pub use session::{Session, decode_unverified};
pub use store::{ClientStore, Notice, SESSION_EXPIRED_MSG};
pub use token_store::{DEFAULT_TOKEN_LIFETIME, FileTokenStore, MemoryTokenStore, TokenStore};
