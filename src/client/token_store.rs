//! Where the client keeps the session token between runs.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::client::ClientError;

/// How long a saved token is kept before it is discarded.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::days(7);

/// Persistent storage for a single session token.
pub trait TokenStore {
    /// The saved token, if there is one that has not expired.
    fn load(&self) -> Result<Option<String>, ClientError>;

    /// Save `token`, replacing any previous token.
    fn save(&mut self, token: &str) -> Result<(), ClientError>;

    /// Forget the saved token.
    fn clear(&mut self) -> Result<(), ClientError>;
}

/// Keeps the token for the lifetime of the process only.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    token: Option<String>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.token.clone())
    }

    fn save(&mut self, token: &str) -> Result<(), ClientError> {
        self.token = Some(token.to_owned());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        self.token = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedToken {
    token: String,
    /// Seconds since the Unix epoch.
    expires_at: i64,
}

/// Keeps the token in a JSON file, like a cookie with a fixed expiry.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    lifetime: Duration,
}

impl FileTokenStore {
    /// A store that saves tokens at `path` for [DEFAULT_TOKEN_LIFETIME].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_lifetime(path, DEFAULT_TOKEN_LIFETIME)
    }

    /// A store that saves tokens at `path` for `lifetime`.
    pub fn with_lifetime(path: impl Into<PathBuf>, lifetime: Duration) -> Self {
        Self {
            path: path.into(),
            lifetime,
        }
    }

    /// The file the token is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let saved: SavedToken = serde_json::from_str(&contents)
            .map_err(|error| ClientError::Decode(format!("the token file: {error}")))?;

        if OffsetDateTime::now_utc().unix_timestamp() >= saved.expires_at {
            tracing::debug!("discarding expired token file {}", self.path.display());
            return Ok(None);
        }

        Ok(Some(saved.token))
    }

    fn save(&mut self, token: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let saved = SavedToken {
            token: token.to_owned(),
            expires_at: (OffsetDateTime::now_utc() + self.lifetime).unix_timestamp(),
        };
        let contents = serde_json::to_string(&saved)
            .map_err(|error| ClientError::Decode(format!("the token file: {error}")))?;

        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
