//! The transport between the client and the REST API.

use std::{future::Future, time::Duration};

use reqwest::{Client, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    auth::{AuthPayload, LogInData, RegisterForm},
    client::ClientError,
    endpoints::{self, collection_endpoint, format_endpoint, item_endpoint},
    ledger::{LedgerRecord, RecordForm, RecordId, RecordKind},
    response::ApiResponse,
};

/// How long a request may take before it is abandoned.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The operations the client can ask of the API.
///
/// Every call that needs a session takes the bearer `token` explicitly, the
/// caller owns the session.
pub trait LedgerApi {
    /// Register a new user and get a session for them.
    fn register(
        &self,
        form: &RegisterForm,
    ) -> impl Future<Output = Result<AuthPayload, ClientError>> + Send;

    /// Exchange credentials for a session.
    fn log_in(
        &self,
        credentials: &LogInData,
    ) -> impl Future<Output = Result<AuthPayload, ClientError>> + Send;

    /// Fetch every record of `kind` owned by the session's user.
    fn list(
        &self,
        token: &str,
        kind: RecordKind,
    ) -> impl Future<Output = Result<Vec<LedgerRecord>, ClientError>> + Send;

    /// Create a record of `kind`.
    fn create(
        &self,
        token: &str,
        kind: RecordKind,
        form: &RecordForm,
    ) -> impl Future<Output = Result<LedgerRecord, ClientError>> + Send;

    /// Apply the fields set in `form` to the record `id`.
    fn update(
        &self,
        token: &str,
        kind: RecordKind,
        id: RecordId,
        form: &RecordForm,
    ) -> impl Future<Output = Result<LedgerRecord, ClientError>> + Send;

    /// Delete the record `id`.
    fn delete(
        &self,
        token: &str,
        kind: RecordKind,
        id: RecordId,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// A [LedgerApi] that talks to a server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerApi {
    client: Client,
    base_url: Url,
}

impl HttpLedgerApi {
    /// Create a client for the server at `base_url`, e.g. `http://localhost:4000`.
    ///
    /// # Errors
    /// Returns [ClientError::Transport] if `base_url` is not a valid URL or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|error| {
            ClientError::Transport(format!("invalid server URL {base_url}: {error}"))
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url.join(path).map_err(|error| {
            ClientError::Transport(format!("invalid request path {path}: {error}"))
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&body)
            .map_err(|error| ClientError::Decode(format!("the response body: {error}")))?;

        Ok(envelope.data)
    }

    async fn send_for_data<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(request)
            .await?
            .ok_or_else(|| ClientError::Decode("the response body: missing data".to_owned()))
    }

    fn post_json(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        Ok(self.client.post(self.url(path)?).json(body))
    }
}

impl LedgerApi for HttpLedgerApi {
    async fn register(&self, form: &RegisterForm) -> Result<AuthPayload, ClientError> {
        let request = self.post_json(endpoints::REGISTER, form)?;
        self.send_for_data(request).await
    }

    async fn log_in(&self, credentials: &LogInData) -> Result<AuthPayload, ClientError> {
        let request = self.post_json(endpoints::LOG_IN, credentials)?;
        self.send_for_data(request).await
    }

    async fn list(
        &self,
        token: &str,
        kind: RecordKind,
    ) -> Result<Vec<LedgerRecord>, ClientError> {
        let request = self
            .client
            .get(self.url(collection_endpoint(kind))?)
            .bearer_auth(token);
        self.send_for_data(request).await
    }

    async fn create(
        &self,
        token: &str,
        kind: RecordKind,
        form: &RecordForm,
    ) -> Result<LedgerRecord, ClientError> {
        let request = self
            .post_json(collection_endpoint(kind), form)?
            .bearer_auth(token);
        self.send_for_data(request).await
    }

    async fn update(
        &self,
        token: &str,
        kind: RecordKind,
        id: RecordId,
        form: &RecordForm,
    ) -> Result<LedgerRecord, ClientError> {
        let path = format_endpoint(item_endpoint(kind), id);
        let request = self
            .client
            .put(self.url(&path)?)
            .bearer_auth(token)
            .json(form);
        self.send_for_data(request).await
    }

    async fn delete(
        &self,
        token: &str,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<(), ClientError> {
        let path = format_endpoint(item_endpoint(kind), id);
        let request = self.client.delete(self.url(&path)?).bearer_auth(token);
        self.send::<serde_json::Value>(request).await?;
        Ok(())
    }
}

/// Turn an error response into a [ClientError], keeping the server's message.
fn map_status_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_owned()
        });

    if status == StatusCode::UNAUTHORIZED {
        ClientError::Unauthorized(message)
    } else {
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }
}
