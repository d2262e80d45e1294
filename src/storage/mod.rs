// Token storage module
// Pluggable key-value persistence backends for named tokens

mod cookie;
mod memory;
mod sqlite;

pub use cookie::{
    CookieReadOptions, CookieRemoveOptions, CookieStorageConfig, CookieTokenStorage,
    CookieWriteOptions, SameSite, TokenCookie,
};
pub use memory::MemoryTokenStorage;
pub use sqlite::SqliteTokenStorage;

use anyhow::Result;
use async_trait::async_trait;

/// Key-value persistence contract for named tokens.
///
/// Reading a missing key yields `Ok(None)`, never an error, and deleting a
/// missing key is a no-op. Backends may resolve reads asynchronously; the
/// auth client awaits every `get`. Swapping one backend for another must
/// not change client behavior.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Read the token stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `token` under `key`, replacing any previous value
    fn set(&self, token: &str, key: &str) -> Result<()>;

    /// Remove `key`; missing keys are ignored
    fn delete(&self, key: &str) -> Result<()>;
}
