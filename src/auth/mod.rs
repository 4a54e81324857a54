//! Registration, log in and the bearer-token guard for protected routes.

mod log_in;
mod middleware;
mod register;
mod token;

pub use log_in::{LogInData, log_in_user};
pub use middleware::{AuthState, auth_guard};
pub use register::{AuthPayload, RegisterForm, register_user};
pub use token::{Claims, DEFAULT_TOKEN_DURATION, TokenKeys};
