// Authflow - reactive client-side authentication state
//
// Holds an access/refresh token pair in pluggable storage, exposes
// replay-latest observable state (loading, logged, user), and drives
// login/refresh/sync/logout flows through caller-supplied callbacks.

pub mod bridge;
pub mod client;
pub mod error;
pub mod observable;
pub mod storage;

pub use bridge::{BridgeOptions, ClientSource, ExternalTokenClient, TokenBridge, TokenCallback};
pub use client::{AuthClient, AuthClientOptions, TokenKind};
pub use error::AuthError;
pub use observable::{StateCell, Subscription};
pub use storage::{
    CookieStorageConfig, CookieTokenStorage, MemoryTokenStorage, SqliteTokenStorage, TokenStorage,
};
