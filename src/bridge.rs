// External client bridge
// Mirrors token state between an auth client and a third-party client
// that owns its own token change notifications

use std::sync::{Arc, Mutex};

use crate::client::AuthClient;
use crate::error::{AuthError, Result};
use crate::observable::Subscription;

/// Callback invoked with an external client's new token value
pub type TokenCallback = Box<dyn Fn(Option<String>) + Send + Sync>;

/// Token surface an external client must expose to be bridged.
///
/// Subscriptions may deliver the current value immediately; the bridge
/// guards against the resulting echoes.
pub trait ExternalTokenClient: Send + Sync {
    /// Current access token on the external side
    fn access_token(&self) -> Option<String>;

    /// Current refresh token on the external side
    fn refresh_token(&self) -> Option<String>;

    /// Replace the external access token
    fn set_access_token(&self, token: Option<String>);

    /// Replace the external refresh token
    fn set_refresh_token(&self, token: Option<String>);

    /// Subscribe to access-token changes
    fn subscribe_access_token(&self, callback: TokenCallback) -> Subscription;

    /// Subscribe to refresh-token changes
    fn subscribe_refresh_token(&self, callback: TokenCallback) -> Subscription;

    /// The external client's own logout
    fn logout(&self);
}

/// An auth client supplied directly or constructed on demand, resolved
/// once at wiring time
pub enum ClientSource {
    /// Use this instance
    Instance(Arc<AuthClient>),
    /// Build the instance when the bridge attaches
    Factory(Box<dyn Fn() -> anyhow::Result<Arc<AuthClient>> + Send + Sync>),
}

impl ClientSource {
    fn resolve(&self) -> Result<Arc<AuthClient>> {
        match self {
            Self::Instance(client) => Ok(Arc::clone(client)),
            Self::Factory(factory) => {
                factory().map_err(|e| AuthError::BridgeResolution(e.to_string()))
            }
        }
    }
}

impl From<Arc<AuthClient>> for ClientSource {
    fn from(client: Arc<AuthClient>) -> Self {
        Self::Instance(client)
    }
}

/// Wiring options for [`TokenBridge::attach`]
pub struct BridgeOptions {
    /// Where the auth client comes from
    pub auth_client: ClientSource,
    /// Sentinel access token meaning "unset" on the external side; it is
    /// never forwarded back into the auth client
    pub default_token: Option<String>,
}

/// Standing bridge between an [`AuthClient`] and an external token client.
///
/// Owns its subscription handles; dropping the bridge or calling
/// [`detach`](Self::detach) unsubscribes them.
pub struct TokenBridge {
    external: Arc<dyn ExternalTokenClient>,
    auth: Arc<AuthClient>,
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for TokenBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBridge")
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl TokenBridge {
    /// Wire an external client to an auth client.
    ///
    /// Seeds the external side from the token store wherever it has no
    /// token yet, subscribes to the external token events, and when a
    /// usable access token is already stored pushes it outward and
    /// re-validates the session with [`AuthClient::sync`].
    pub async fn attach(
        external: Arc<dyn ExternalTokenClient>,
        options: BridgeOptions,
    ) -> Result<Self> {
        let auth = options.auth_client.resolve()?;
        let default_token = options.default_token;

        if external.access_token().is_none() {
            let seeded = auth
                .get_access_token()
                .await?
                .or_else(|| default_token.clone());
            external.set_access_token(seeded);
        }
        if external.refresh_token().is_none() {
            external.set_refresh_token(auth.get_refresh_token().await?);
        }

        // Last access token seen in either direction; breaks the feedback
        // loop between the subscription below and our own pushes.
        let mirrored = Arc::new(Mutex::new(auth.get_access_token().await?));

        let refresh_subscription = external.subscribe_refresh_token(Box::new({
            let auth = Arc::clone(&auth);
            move |token: Option<String>| {
                if let Err(e) = auth.set_refresh_token(token.as_deref()) {
                    tracing::warn!("Failed to mirror refresh token: {e}");
                }
            }
        }));

        let access_subscription = external.subscribe_access_token(Box::new({
            let auth = Arc::clone(&auth);
            let external = Arc::clone(&external);
            let default_token = default_token.clone();
            let mirrored = Arc::clone(&mirrored);
            move |token: Option<String>| {
                if token == default_token {
                    // The sentinel marks "no session" and is never persisted
                    return;
                }
                match token {
                    None => external.set_access_token(default_token.clone()),
                    Some(value) => {
                        let mut last = mirrored.lock().unwrap();
                        if last.as_deref() == Some(value.as_str()) {
                            return;
                        }
                        *last = Some(value.clone());
                        drop(last);
                        if let Err(e) = auth.set_access_token(Some(&value)) {
                            tracing::warn!("Failed to mirror access token: {e}");
                        }
                    }
                }
            }
        }));

        if let Some(access) = auth.get_access_token().await? {
            external.set_access_token(Some(access));
            if let Err(e) = auth.sync().await {
                tracing::warn!("Session sync after wiring failed: {e}");
            }
        }

        Ok(Self {
            external,
            auth,
            subscriptions: vec![access_subscription, refresh_subscription],
        })
    }

    /// The auth client this bridge mirrors into
    pub fn auth_client(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    /// Cancel the standing subscriptions; safe to call more than once
    pub fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }

    /// Unsubscribe, delegate to the external client's logout, then clear
    /// the local auth state
    pub fn logout(&mut self) -> Result<()> {
        self.detach();
        self.external.logout();
        self.auth.logout()
    }
}
