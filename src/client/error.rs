//! The error type for the API client and client-side state.

/// The errors that may occur while talking to the API or persisting the session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the request with the given status and message.
    #[error("{message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The server's message, shown to the user as-is.
        message: String,
    },

    /// The server rejected the session token, the user must log in again.
    #[error("{0}")]
    Unauthorized(String),

    /// An action that needs a session was attempted while logged out.
    #[error("You must log in first")]
    NotLoggedIn,

    /// The request could not be sent or the response could not be read.
    #[error("Could not reach the server: {0}")]
    Transport(String),

    /// The response or a stored token could not be decoded.
    #[error("Could not decode {0}")]
    Decode(String),

    /// The token file could not be read or written.
    #[error("Could not access the token file: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the error means the session is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ClientError::Decode(format!("the response body: {error}"))
        } else {
            ClientError::Transport(error.to_string())
        }
    }
}
