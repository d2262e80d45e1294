// Auth client state machine
// Owns the observable loading/logged/user cells and orchestrates
// login/refresh/sync/logout against the configured callbacks and storage

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{AuthError, Result};
use crate::observable::{StateCell, Subscription};
use crate::storage::{MemoryTokenStorage, TokenStorage};

/// Async callback producing a raw login or refresh result
pub type TokenSourceFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Async callback fetching the current user for a stored access token
pub type FetchUserFn =
    Arc<dyn Fn(Option<String>) -> BoxFuture<'static, anyhow::Result<Option<Value>>> + Send + Sync>;

/// Extracts a token from a raw login or refresh result
pub type ExtractTokenFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Decides whether a fetched user record counts as logged in
pub type UserPredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// The two token kinds an auth client persists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived token sent with API calls
    Access,
    /// Long-lived token exchanged for new access tokens
    Refresh,
}

impl TokenKind {
    /// Storage key suffix for this kind
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Access => "access-token",
            Self::Refresh => "refresh-token",
        }
    }
}

/// Configuration for an [`AuthClient`], frozen at construction.
///
/// Every callback is optional; unset remote callbacks resolve to an absent
/// result, and the extractors and predicate fall back to the defaults
/// documented on their setters.
#[derive(Clone)]
pub struct AuthClientOptions {
    login: Option<TokenSourceFn>,
    refresh_token: Option<TokenSourceFn>,
    fetch_user: Option<FetchUserFn>,
    get_access_token: ExtractTokenFn,
    get_refresh_token: ExtractTokenFn,
    is_user_logged: UserPredicateFn,
    token_storage: Arc<dyn TokenStorage>,
}

impl Default for AuthClientOptions {
    fn default() -> Self {
        Self {
            login: None,
            refresh_token: None,
            fetch_user: None,
            // The raw result is treated as the token itself
            get_access_token: Arc::new(|raw| raw.as_str().map(str::to_owned)),
            get_refresh_token: Arc::new(|_| None),
            is_user_logged: Arc::new(default_is_user_logged),
            token_storage: MemoryTokenStorage::shared(),
        }
    }
}

/// A user record counts as logged in when it is an object with at least one field
fn default_is_user_logged(user: &Value) -> bool {
    matches!(user, Value::Object(map) if !map.is_empty())
}

impl AuthClientOptions {
    /// Options with every default in place
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote login call returning raw login-result data
    pub fn with_login<F, Fut>(mut self, login: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.login = Some(Arc::new(move |args| Box::pin(login(args))));
        self
    }

    /// Remote refresh call returning raw refresh-result data
    pub fn with_refresh_token<F, Fut>(mut self, refresh: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.refresh_token = Some(Arc::new(move |args| Box::pin(refresh(args))));
        self
    }

    /// Retrieves the current user record given the stored access token
    pub fn with_fetch_user<F, Fut>(mut self, fetch_user: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
    {
        self.fetch_user = Some(Arc::new(move |token| Box::pin(fetch_user(token))));
        self
    }

    /// Access-token extractor for raw login/refresh results.
    /// Default: the raw result itself, when it is a string.
    pub fn with_get_access_token(
        mut self,
        extract: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.get_access_token = Arc::new(extract);
        self
    }

    /// Refresh-token extractor for raw login/refresh results.
    /// Default: absent.
    pub fn with_get_refresh_token(
        mut self,
        extract: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.get_refresh_token = Arc::new(extract);
        self
    }

    /// Predicate deciding whether a fetched user record counts as logged in.
    /// Default: a non-empty object.
    pub fn with_is_user_logged(
        mut self,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_user_logged = Arc::new(predicate);
        self
    }

    /// Token storage backend. Default: the shared in-memory store.
    pub fn with_token_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.token_storage = storage;
        self
    }
}

/// Client-side authentication state machine.
///
/// One instance per auth namespace; the name scopes the storage keys so
/// several independent sessions can coexist in one process. Tokens live
/// only in the configured storage, never on the client, and the three
/// state cells (`loading`, `logged`, `user`) broadcast the latest value to
/// every subscriber.
///
/// Protocol methods provide no internal mutual exclusion. Overlapping
/// `login`/`refresh_token`/`sync` calls interleave their storage writes
/// and state publishes in completion order, and the shared `loading` cell
/// reports `false` as soon as the first of two overlapping calls finishes.
/// Callers that need strict ordering must serialize calls themselves.
pub struct AuthClient {
    name: String,
    options: AuthClientOptions,
    loading: StateCell<bool>,
    logged: StateCell<bool>,
    user: StateCell<Option<Value>>,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Create a client for the given namespace.
    ///
    /// An empty name falls back to the fixed `ns-auth` key prefix.
    pub fn new(name: impl Into<String>, options: AuthClientOptions) -> Self {
        Self {
            name: name.into(),
            options,
            loading: StateCell::new(false),
            logged: StateCell::new(false),
            user: StateCell::new(None),
        }
    }

    /// Namespace this client was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration frozen at construction
    pub fn options(&self) -> &AuthClientOptions {
        &self.options
    }

    /// True strictly while a login/refresh/sync call is in flight
    pub fn loading(&self) -> bool {
        self.loading.get()
    }

    /// True iff the last accepted user fetch passed the login predicate
    pub fn logged(&self) -> bool {
        self.logged.get()
    }

    /// Last accepted user record, if any
    pub fn user(&self) -> Option<Value> {
        self.user.get()
    }

    /// Observe the `loading` cell; the callback sees the current value immediately
    #[must_use]
    pub fn subscribe_loading(
        &self,
        callback: impl Fn(&bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.loading.subscribe(callback)
    }

    /// Observe the `logged` cell; the callback sees the current value immediately
    #[must_use]
    pub fn subscribe_logged(
        &self,
        callback: impl Fn(&bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.logged.subscribe(callback)
    }

    /// Observe the `user` cell; the callback sees the current value immediately
    #[must_use]
    pub fn subscribe_user(
        &self,
        callback: impl Fn(&Option<Value>) + Send + Sync + 'static,
    ) -> Subscription {
        self.user.subscribe(callback)
    }

    /// Storage key for a token kind, derived from the client namespace
    pub fn token_name(&self, kind: TokenKind) -> String {
        if self.name.is_empty() {
            format!("ns-auth-{}", kind.suffix())
        } else {
            format!("ns-auth-{}-{}", self.name, kind.suffix())
        }
    }

    /// Read a token of the given kind from storage
    pub async fn get_token(&self, kind: TokenKind) -> Result<Option<String>> {
        let key = self.token_name(kind);
        self.options
            .token_storage
            .get(&key)
            .await
            .map_err(AuthError::Storage)
    }

    /// Store a token of the given kind; an absent token deletes the key
    /// instead of persisting an empty value
    pub fn set_token(&self, token: Option<&str>, kind: TokenKind) -> Result<()> {
        let key = self.token_name(kind);
        match token {
            Some(value) => self
                .options
                .token_storage
                .set(value, &key)
                .map_err(AuthError::Storage),
            None => self
                .options
                .token_storage
                .delete(&key)
                .map_err(AuthError::Storage),
        }
    }

    /// Remove a token of the given kind from storage
    pub fn delete_token(&self, kind: TokenKind) -> Result<()> {
        let key = self.token_name(kind);
        self.options
            .token_storage
            .delete(&key)
            .map_err(AuthError::Storage)
    }

    /// Stored access token, if any
    pub async fn get_access_token(&self) -> Result<Option<String>> {
        self.get_token(TokenKind::Access).await
    }

    /// Stored refresh token, if any
    pub async fn get_refresh_token(&self) -> Result<Option<String>> {
        self.get_token(TokenKind::Refresh).await
    }

    /// Store (or, when absent, delete) the access token
    pub fn set_access_token(&self, token: Option<&str>) -> Result<()> {
        self.set_token(token, TokenKind::Access)
    }

    /// Store (or, when absent, delete) the refresh token
    pub fn set_refresh_token(&self, token: Option<&str>) -> Result<()> {
        self.set_token(token, TokenKind::Refresh)
    }

    /// Remove the stored access token
    pub fn delete_access_token(&self) -> Result<()> {
        self.delete_token(TokenKind::Access)
    }

    /// Remove the stored refresh token
    pub fn delete_refresh_token(&self) -> Result<()> {
        self.delete_token(TokenKind::Refresh)
    }

    /// Fetch the current user with the stored access token.
    ///
    /// Resolves absent when no `fetch_user` callback is configured.
    pub async fn fetch_user(&self) -> Result<Option<Value>> {
        let token = self.get_token(TokenKind::Access).await?;
        match &self.options.fetch_user {
            Some(fetch) => fetch(token).await.map_err(AuthError::Upstream),
            None => Ok(None),
        }
    }

    /// Perform the remote login, persist the resulting tokens, then fetch
    /// and publish the user state.
    ///
    /// On failure the error propagates after `loading` is reset; tokens
    /// already written stay written and `user`/`logged` keep their prior
    /// values.
    pub async fn login(&self, args: Value) -> Result<()> {
        tracing::debug!(name = %self.name, "Login requested");
        self.loading.publish(true);
        let result = async {
            self.acquire_tokens(self.options.login.clone(), args).await?;
            self.publish_user_state().await
        }
        .await;
        self.loading.publish(false);
        result
    }

    /// Same shape as [`login`](Self::login), sourced from the configured
    /// refresh callback instead
    pub async fn refresh_token(&self, args: Value) -> Result<()> {
        tracing::debug!(name = %self.name, "Token refresh requested");
        self.loading.publish(true);
        let result = async {
            self.acquire_tokens(self.options.refresh_token.clone(), args)
                .await?;
            self.publish_user_state().await
        }
        .await;
        self.loading.publish(false);
        result
    }

    /// Re-validate an existing session from the stored access token,
    /// without a fresh login or refresh exchange
    pub async fn sync(&self) -> Result<()> {
        tracing::debug!(name = %self.name, "Session sync requested");
        self.loading.publish(true);
        let result = self.publish_user_state().await;
        self.loading.publish(false);
        result
    }

    /// Delete both stored tokens, then publish `logged = false` followed
    /// by `user = absent`.
    ///
    /// Local cleanup only; no remote call and no `loading` transition.
    pub fn logout(&self) -> Result<()> {
        tracing::debug!(name = %self.name, "Logging out");
        self.delete_token(TokenKind::Access)?;
        self.delete_token(TokenKind::Refresh)?;
        self.logged.publish(false);
        self.user.publish(None);
        Ok(())
    }

    /// Run a token source, extract both tokens from its raw result and
    /// persist them. An unset source and a failed extraction both count
    /// as absent, which deletes the stored token.
    async fn acquire_tokens(&self, source: Option<TokenSourceFn>, args: Value) -> Result<()> {
        let raw = match source {
            Some(fetch) => Some(fetch(args).await.map_err(AuthError::Upstream)?),
            None => None,
        };

        let access = raw.as_ref().and_then(|r| (self.options.get_access_token)(r));
        let refresh = raw.as_ref().and_then(|r| (self.options.get_refresh_token)(r));

        self.set_token(access.as_deref(), TokenKind::Access)?;
        self.set_token(refresh.as_deref(), TokenKind::Refresh)?;
        Ok(())
    }

    /// Fetch the user and, when the predicate accepts it, publish `user`
    /// before `logged` so observers never see `logged` with a stale user.
    /// A rejected or absent user leaves both cells untouched.
    async fn publish_user_state(&self) -> Result<()> {
        let user = self.fetch_user().await?;
        let accepted = user
            .as_ref()
            .is_some_and(|record| (self.options.is_user_logged)(record));

        if accepted {
            self.user.publish(user);
            self.logged.publish(true);
        }
        Ok(())
    }
}
