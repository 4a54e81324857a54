//! The client's in-memory view of the signed in user's ledger.

use std::collections::VecDeque;

use time::OffsetDateTime;

use crate::{
    auth::{LogInData, RegisterForm},
    client::{ClientError, LedgerApi, Session, TokenStore},
    ledger::{LedgerRecord, RecordForm, RecordId, RecordKind},
    user::PublicUser,
};

/// The notice shown when the server rejects the session or it has run out.
pub const SESSION_EXPIRED_MSG: &str = "Session expired.";

/// A message for the user about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The action succeeded.
    Success(String),
    /// The action failed.
    Error(String),
}

/// Holds the session and both record collections, and keeps them in step with
/// the server.
///
/// Every mutation is followed by a full re-fetch of both collections, the
/// store never patches its collections locally. Errors are reported both as
/// the return value and as a [Notice]. A rejected session logs the user out.
#[derive(Debug)]
pub struct ClientStore<A, T> {
    api: A,
    token_store: T,
    session: Option<Session>,
    income: Vec<LedgerRecord>,
    expense: Vec<LedgerRecord>,
    busy: bool,
    notices: VecDeque<Notice>,
}

impl<A: LedgerApi, T: TokenStore> ClientStore<A, T> {
    /// A logged out store.
    pub fn new(api: A, token_store: T) -> Self {
        Self {
            api,
            token_store,
            session: None,
            income: Vec::new(),
            expense: Vec::new(),
            busy: false,
            notices: VecDeque::new(),
        }
    }

    /// The signed in user.
    pub fn user(&self) -> Option<PublicUser> {
        self.session.as_ref().map(Session::user)
    }

    /// The current session token.
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(Session::token)
    }

    /// Whether a user is signed in.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The fetched income records, newest first.
    pub fn income(&self) -> &[LedgerRecord] {
        &self.income
    }

    /// The fetched expense records, newest first.
    pub fn expense(&self) -> &[LedgerRecord] {
        &self.expense
    }

    /// The fetched records of `kind`.
    pub fn records(&self, kind: RecordKind) -> &[LedgerRecord] {
        match kind {
            RecordKind::Income => &self.income,
            RecordKind::Expense => &self.expense,
        }
    }

    /// Remove and return the pending notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Resume the session saved in the token store, if there is one.
    ///
    /// # Errors
    /// Returns an error if the saved token cannot be read, has expired, or the
    /// collections cannot be fetched.
    pub async fn restore(&mut self) -> Result<(), ClientError> {
        match self.token_store.load() {
            Ok(Some(token)) => self.set_token(Some(token)).await,
            Ok(None) => Ok(()),
            Err(error) => {
                self.report_error(&error);
                Err(error)
            }
        }
    }

    /// Start a session with `token`, or end the current one with `None`.
    ///
    /// The token is decoded locally to get the user's identity. A token that
    /// cannot be decoded or has expired ends the session. Otherwise the token
    /// is saved and both collections are fetched.
    ///
    /// # Errors
    /// Returns [ClientError::Unauthorized] for an unusable token, or any error
    /// from fetching the collections.
    pub async fn set_token(&mut self, token: Option<String>) -> Result<(), ClientError> {
        let Some(token) = token else {
            self.clear_session();
            return Ok(());
        };

        let session = match Session::new(token) {
            Ok(session) if !session.is_expired_at(OffsetDateTime::now_utc()) => session,
            Ok(_) => return Err(self.expire_session()),
            Err(error) => {
                tracing::debug!("could not decode session token: {error}");
                return Err(self.expire_session());
            }
        };

        if let Err(error) = self.token_store.save(session.token()) {
            tracing::warn!("could not save session token: {error}");
            self.notices.push_back(Notice::Error(error.to_string()));
        }
        self.session = Some(session);

        self.refresh_all().await
    }

    /// Register a new user and sign them in.
    ///
    /// # Errors
    /// Returns the server's error, e.g. when the email is already registered.
    pub async fn register(&mut self, form: RegisterForm) -> Result<(), ClientError> {
        self.busy = true;
        let result = self.api.register(&form).await;
        self.busy = false;

        let payload = result.inspect_err(|error| self.report_failure(error))?;
        self.set_token(Some(payload.token)).await?;
        self.notices.push_back(Notice::Success(format!(
            "Welcome, {}!",
            payload.user.name
        )));
        Ok(())
    }

    /// Sign in with an email and password.
    ///
    /// # Errors
    /// Returns the server's error, e.g. for invalid credentials.
    pub async fn log_in(&mut self, credentials: LogInData) -> Result<(), ClientError> {
        self.busy = true;
        let result = self.api.log_in(&credentials).await;
        self.busy = false;

        let payload = result.inspect_err(|error| self.report_failure(error))?;
        self.set_token(Some(payload.token)).await?;
        self.notices.push_back(Notice::Success(format!(
            "Logged in as {}.",
            payload.user.name
        )));
        Ok(())
    }

    /// End the session and forget the saved token.
    pub fn log_out(&mut self) {
        self.clear_session();
        self.notices.push_back(Notice::Success("Logged out.".to_owned()));
    }

    /// Fetch both collections again.
    ///
    /// # Errors
    /// Returns [ClientError::NotLoggedIn] without a session, or the error from
    /// either request.
    pub async fn refresh_all(&mut self) -> Result<(), ClientError> {
        self.busy = true;
        let result = self.fetch_all().await;
        self.busy = false;
        self.settle(result, None)
    }

    /// Create a record of `kind`.
    ///
    /// # Errors
    /// Returns the server's error, e.g. for a validation failure.
    pub async fn add(&mut self, kind: RecordKind, form: RecordForm) -> Result<(), ClientError> {
        self.busy = true;
        let result = match self.session_token() {
            Ok(token) => self.api.create(&token, kind, &form).await.map(|_| ()),
            Err(error) => Err(error),
        };
        let result = self.then_fetch_all(result).await;
        self.busy = false;
        self.settle(result, Some(format!("{} added successfully", kind.title())))
    }

    /// Apply the fields set in `form` to the record `id` of `kind`.
    ///
    /// # Errors
    /// Returns the server's error, e.g. when the record does not exist.
    pub async fn update(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        form: RecordForm,
    ) -> Result<(), ClientError> {
        self.busy = true;
        let result = match self.session_token() {
            Ok(token) => self.api.update(&token, kind, id, &form).await.map(|_| ()),
            Err(error) => Err(error),
        };
        let result = self.then_fetch_all(result).await;
        self.busy = false;
        self.settle(result, Some(format!("{} updated successfully", kind.title())))
    }

    /// Delete the record `id` of `kind`.
    ///
    /// # Errors
    /// Returns the server's error, e.g. when the record does not exist.
    pub async fn delete(&mut self, kind: RecordKind, id: RecordId) -> Result<(), ClientError> {
        self.busy = true;
        let result = match self.session_token() {
            Ok(token) => self.api.delete(&token, kind, id).await,
            Err(error) => Err(error),
        };
        let result = self.then_fetch_all(result).await;
        self.busy = false;
        self.settle(result, Some(format!("{} deleted successfully", kind.title())))
    }

    fn session_token(&self) -> Result<String, ClientError> {
        self.token()
            .map(str::to_owned)
            .ok_or(ClientError::NotLoggedIn)
    }

    async fn then_fetch_all(&mut self, result: Result<(), ClientError>) -> Result<(), ClientError> {
        result?;
        self.fetch_all().await
    }

    async fn fetch_all(&mut self) -> Result<(), ClientError> {
        let token = self.session_token()?;

        let (income, expense) = tokio::join!(
            self.api.list(&token, RecordKind::Income),
            self.api.list(&token, RecordKind::Expense),
        );

        self.income = income?;
        self.expense = expense?;
        Ok(())
    }

    fn settle(
        &mut self,
        result: Result<(), ClientError>,
        success_message: Option<String>,
    ) -> Result<(), ClientError> {
        match result {
            Ok(()) => {
                if let Some(message) = success_message {
                    self.notices.push_back(Notice::Success(message));
                }
                Ok(())
            }
            Err(error) => {
                self.report_error(&error);
                Err(error)
            }
        }
    }

    fn report_error(&mut self, error: &ClientError) {
        if error.is_unauthorized() {
            self.expire_session();
        } else {
            self.report_failure(error);
        }
    }

    /// Report `error` as-is, for requests made without a session.
    fn report_failure(&mut self, error: &ClientError) {
        self.notices.push_back(Notice::Error(error.to_string()));
    }

    /// Log out because the session can no longer be used.
    fn expire_session(&mut self) -> ClientError {
        self.clear_session();
        self.notices.push_back(Notice::Error(SESSION_EXPIRED_MSG.to_owned()));
        ClientError::Unauthorized(SESSION_EXPIRED_MSG.to_owned())
    }

    fn clear_session(&mut self) {
        if let Err(error) = self.token_store.clear() {
            tracing::warn!("could not clear saved session token: {error}");
        }
        self.session = None;
        self.income.clear();
        self.expense.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use serde_json::json;
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        UserID,
        auth::{AuthPayload, Claims, LogInData, RegisterForm, TokenKeys},
        client::{
            ClientError, ClientStore, LedgerApi, MemoryTokenStore, Notice, SESSION_EXPIRED_MSG,
            TokenStore,
        },
        ledger::{LedgerRecord, RecordForm, RecordId, RecordKind},
        user::PublicUser,
    };

    const SECRET: &str = "fake-secret";

    /// An in-process stand-in for the server.
    #[derive(Default)]
    struct FakeState {
        users: Vec<(PublicUser, String)>,
        records: Vec<LedgerRecord>,
        next_id: i64,
        list_calls: usize,
    }

    #[derive(Clone, Default)]
    struct FakeLedgerApi {
        state: Arc<Mutex<FakeState>>,
        reject_tokens: Arc<AtomicBool>,
    }

    impl FakeLedgerApi {
        fn keys() -> TokenKeys {
            TokenKeys::new(SECRET)
        }

        fn owner(&self, token: &str) -> Result<UserID, ClientError> {
            if self.reject_tokens.load(Ordering::SeqCst) {
                return Err(ClientError::Unauthorized("Invalid token".to_owned()));
            }

            Self::keys()
                .verify(token)
                .map(|claims| claims.id)
                .map_err(|error| ClientError::Unauthorized(error.to_string()))
        }

        fn payload(user: &PublicUser) -> AuthPayload {
            AuthPayload {
                token: Self::keys().issue(user, Duration::days(7)).unwrap(),
                user: user.clone(),
            }
        }

        fn list_calls(&self) -> usize {
            self.state.lock().unwrap().list_calls
        }

        fn not_found(kind: RecordKind) -> ClientError {
            ClientError::Api {
                status: 404,
                message: format!("{} not found or unauthorized", kind.title()),
            }
        }
    }

    fn bad_request(error: crate::Error) -> ClientError {
        ClientError::Api {
            status: 400,
            message: error.to_string(),
        }
    }

    impl LedgerApi for FakeLedgerApi {
        async fn register(&self, form: &RegisterForm) -> Result<AuthPayload, ClientError> {
            let mut state = self.state.lock().unwrap();
            let email = form.email.clone().unwrap_or_default().to_lowercase();
            if state.users.iter().any(|(user, _)| user.email == email) {
                return Err(ClientError::Api {
                    status: 409,
                    message: "User already exists".to_owned(),
                });
            }

            let user = PublicUser {
                id: UserID::new(state.users.len() as i64 + 1),
                name: form.name.clone().unwrap_or_default(),
                email,
            };
            state
                .users
                .push((user.clone(), form.password.clone().unwrap_or_default()));

            Ok(Self::payload(&user))
        }

        async fn log_in(&self, credentials: &LogInData) -> Result<AuthPayload, ClientError> {
            let state = self.state.lock().unwrap();
            let email = credentials.email.clone().unwrap_or_default().to_lowercase();

            state
                .users
                .iter()
                .find(|(user, password)| {
                    user.email == email && Some(password) == credentials.password.as_ref()
                })
                .map(|(user, _)| Self::payload(user))
                .ok_or_else(|| ClientError::Unauthorized("Invalid credentials".to_owned()))
        }

        async fn list(
            &self,
            token: &str,
            kind: RecordKind,
        ) -> Result<Vec<LedgerRecord>, ClientError> {
            let owner = self.owner(token)?;
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;

            let mut records: Vec<LedgerRecord> = state
                .records
                .iter()
                .filter(|record| record.owner_id == owner && record.kind == kind)
                .cloned()
                .collect();
            records.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

            Ok(records)
        }

        async fn create(
            &self,
            token: &str,
            kind: RecordKind,
            form: &RecordForm,
        ) -> Result<LedgerRecord, ClientError> {
            let owner = self.owner(token)?;
            let fields = form.clone().validate().map_err(bad_request)?;
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;

            let now = OffsetDateTime::now_utc();
            let record = LedgerRecord {
                id: RecordId::new(state.next_id),
                owner_id: owner,
                title: fields.title,
                amount: fields.amount,
                kind,
                category: fields.category,
                description: fields.description,
                date: fields.date,
                created_at: now,
                updated_at: now,
            };
            state.records.push(record.clone());

            Ok(record)
        }

        async fn update(
            &self,
            token: &str,
            kind: RecordKind,
            id: RecordId,
            form: &RecordForm,
        ) -> Result<LedgerRecord, ClientError> {
            let owner = self.owner(token)?;
            let mut state = self.state.lock().unwrap();
            let record = state
                .records
                .iter_mut()
                .find(|record| record.id == id && record.owner_id == owner && record.kind == kind)
                .ok_or_else(|| Self::not_found(kind))?;

            let fields = form
                .clone()
                .merged_with(record)
                .validate()
                .map_err(bad_request)?;
            record.title = fields.title;
            record.amount = fields.amount;
            record.category = fields.category;
            record.description = fields.description;
            record.date = fields.date;
            record.updated_at = OffsetDateTime::now_utc();

            Ok(record.clone())
        }

        async fn delete(
            &self,
            token: &str,
            kind: RecordKind,
            id: RecordId,
        ) -> Result<(), ClientError> {
            let owner = self.owner(token)?;
            let mut state = self.state.lock().unwrap();
            let count = state.records.len();
            state.records.retain(|record| {
                !(record.id == id && record.owner_id == owner && record.kind == kind)
            });

            if state.records.len() == count {
                return Err(Self::not_found(kind));
            }

            Ok(())
        }
    }

    fn register_form(email: &str) -> RegisterForm {
        RegisterForm {
            name: Some("Alice".to_owned()),
            email: Some(email.to_owned()),
            password: Some("secret1".to_owned()),
        }
    }

    fn form(value: serde_json::Value) -> RecordForm {
        serde_json::from_value(value).unwrap()
    }

    fn salary() -> RecordForm {
        form(json!({"title": "Salary", "amount": 1000, "category": "Salary", "date": "2024-01-15"}))
    }

    fn rent() -> RecordForm {
        form(json!({"title": "Rent", "amount": "400", "category": "Housing", "date": "2024-01-16"}))
    }

    async fn logged_in_store() -> (ClientStore<FakeLedgerApi, MemoryTokenStore>, FakeLedgerApi) {
        let api = FakeLedgerApi::default();
        let mut store = ClientStore::new(api.clone(), MemoryTokenStore::default());
        store.register(register_form("a@x.com")).await.unwrap();
        store.take_notices();
        (store, api)
    }

    #[tokio::test]
    async fn register_signs_in_and_saves_token() {
        let (store, _) = logged_in_store().await;

        assert!(store.is_logged_in());
        assert_eq!(store.user().unwrap().name, "Alice");
        assert_eq!(
            store.token_store.load().unwrap().as_deref(),
            store.token()
        );
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn register_conflict_is_error_notice() {
        let api = FakeLedgerApi::default();
        let mut first = ClientStore::new(api.clone(), MemoryTokenStore::default());
        first.register(register_form("a@x.com")).await.unwrap();
        let mut second = ClientStore::new(api, MemoryTokenStore::default());

        let result = second.register(register_form("A@X.com")).await;

        assert!(result.is_err());
        assert!(!second.is_logged_in());
        assert_eq!(
            second.take_notices(),
            vec![Notice::Error("User already exists".to_owned())]
        );
    }

    #[tokio::test]
    async fn log_in_with_wrong_password_stays_logged_out() {
        let (_, api) = logged_in_store().await;
        let mut store = ClientStore::new(api, MemoryTokenStore::default());

        let result = store
            .log_in(LogInData {
                email: Some("a@x.com".to_owned()),
                password: Some("wrong".to_owned()),
            })
            .await;

        assert!(matches!(result, Err(ClientError::Unauthorized(_))));
        assert!(!store.is_logged_in());
        assert_eq!(
            store.take_notices(),
            vec![Notice::Error("Invalid credentials".to_owned())]
        );
    }

    #[tokio::test]
    async fn add_refetches_both_collections() {
        let (mut store, api) = logged_in_store().await;
        let calls_before = api.list_calls();

        store.add(RecordKind::Income, salary()).await.unwrap();
        store.add(RecordKind::Expense, rent()).await.unwrap();

        assert_eq!(api.list_calls(), calls_before + 4);
        assert_eq!(store.income().len(), 1);
        assert_eq!(store.expense().len(), 1);
        assert_eq!(store.records(RecordKind::Expense)[0].amount, 400.0);
        assert_eq!(
            store.take_notices(),
            vec![
                Notice::Success("Income added successfully".to_owned()),
                Notice::Success("Expense added successfully".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn validation_error_keeps_server_message() {
        let (mut store, _) = logged_in_store().await;

        let result = store
            .add(RecordKind::Income, form(json!({"title": "Salary"})))
            .await;

        assert!(result.is_err());
        assert!(store.is_logged_in());
        assert_eq!(
            store.take_notices(),
            vec![Notice::Error(
                "Title, Amount, Category, and Date are required".to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn update_and_delete_refresh_state() {
        let (mut store, _) = logged_in_store().await;
        store.add(RecordKind::Expense, rent()).await.unwrap();
        let id = store.expense()[0].id;

        store
            .update(RecordKind::Expense, id, form(json!({"amount": 450})))
            .await
            .unwrap();
        assert_eq!(store.expense()[0].amount, 450.0);
        assert_eq!(store.expense()[0].title, "Rent");

        store.delete(RecordKind::Expense, id).await.unwrap();
        assert!(store.expense().is_empty());
    }

    #[tokio::test]
    async fn missing_record_is_error_notice() {
        let (mut store, _) = logged_in_store().await;
        store.take_notices();

        let result = store.delete(RecordKind::Income, RecordId::new(99)).await;

        assert!(result.is_err());
        assert_eq!(
            store.take_notices(),
            vec![Notice::Error("Income not found or unauthorized".to_owned())]
        );
    }

    #[tokio::test]
    async fn unauthorized_response_forces_logout() {
        let (mut store, api) = logged_in_store().await;
        store.add(RecordKind::Income, salary()).await.unwrap();
        store.take_notices();
        api.reject_tokens.store(true, Ordering::SeqCst);

        let result = store.refresh_all().await;

        assert!(matches!(result, Err(ClientError::Unauthorized(_))));
        assert!(!store.is_logged_in());
        assert!(store.income().is_empty());
        assert_eq!(store.token_store.load().unwrap(), None);
        assert_eq!(
            store.take_notices(),
            vec![Notice::Error(SESSION_EXPIRED_MSG.to_owned())]
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected_locally() {
        let api = FakeLedgerApi::default();
        let mut store = ClientStore::new(api.clone(), MemoryTokenStore::default());
        let user = PublicUser {
            id: UserID::new(1),
            name: "Alice".to_owned(),
            email: "a@x.com".to_owned(),
        };
        let claims = Claims::new(&user, datetime!(2024-01-01 00:00 UTC), Duration::days(7));
        let token = TokenKeys::new(SECRET).sign(&claims).unwrap();

        let result = store.set_token(Some(token)).await;

        assert!(result.is_err());
        assert!(!store.is_logged_in());
        assert_eq!(api.list_calls(), 0);
        assert_eq!(
            store.take_notices(),
            vec![Notice::Error(SESSION_EXPIRED_MSG.to_owned())]
        );
    }

    #[tokio::test]
    async fn garbage_token_is_rejected_locally() {
        let mut store = ClientStore::new(FakeLedgerApi::default(), MemoryTokenStore::default());

        let result = store.set_token(Some("garbage".to_owned())).await;

        assert!(matches!(result, Err(ClientError::Unauthorized(_))));
        assert!(!store.is_logged_in());
    }

    #[tokio::test]
    async fn restore_resumes_saved_session() {
        let (store, api) = logged_in_store().await;
        let mut token_store = MemoryTokenStore::default();
        token_store.save(store.token().unwrap()).unwrap();
        let mut restored = ClientStore::new(api, token_store);

        restored.restore().await.unwrap();

        assert_eq!(restored.user(), store.user());
    }

    #[tokio::test]
    async fn restore_without_token_stays_logged_out() {
        let mut store = ClientStore::new(FakeLedgerApi::default(), MemoryTokenStore::default());

        store.restore().await.unwrap();

        assert!(!store.is_logged_in());
        assert!(store.take_notices().is_empty());
    }

    #[tokio::test]
    async fn log_out_clears_everything() {
        let (mut store, _) = logged_in_store().await;
        store.add(RecordKind::Income, salary()).await.unwrap();

        store.log_out();

        assert!(!store.is_logged_in());
        assert!(store.income().is_empty());
        assert_eq!(store.token_store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn mutations_need_a_session() {
        let mut store = ClientStore::new(FakeLedgerApi::default(), MemoryTokenStore::default());

        let result = store.add(RecordKind::Income, salary()).await;

        assert!(matches!(result, Err(ClientError::NotLoggedIn)));
        assert_eq!(
            store.take_notices(),
            vec![Notice::Error("You must log in first".to_owned())]
        );
    }
}
