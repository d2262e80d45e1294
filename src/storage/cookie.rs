// Cookie-backed token storage
// Each token is held as one cookie in an in-process jar, with the
// attributes it was written with

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TokenStorage;

/// SameSite attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Sent with top-level navigations and third-party GET requests
    #[default]
    Lax,
    /// Only sent in first-party context
    Strict,
    /// Sent with all requests
    None,
}

/// A stored token cookie with its write-time attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCookie {
    /// Cookie name (the token storage key)
    pub name: String,
    /// Token value
    pub value: String,
    /// Path the cookie applies to
    pub path: String,
    /// Domain the cookie belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Expiration time (None for session cookies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// HttpOnly flag
    #[serde(default)]
    pub http_only: bool,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// SameSite attribute
    #[serde(default)]
    pub same_site: SameSite,
}

impl TokenCookie {
    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|exp| exp < Utc::now())
    }
}

/// Attributes applied when writing a token cookie
#[derive(Debug, Clone, Default)]
pub struct CookieWriteOptions {
    /// Expiration time; unset produces a session cookie
    pub expires: Option<DateTime<Utc>>,
    /// Path attribute, defaults to "/"
    pub path: Option<String>,
    /// Domain attribute
    pub domain: Option<String>,
    /// HttpOnly flag
    pub http_only: bool,
    /// Secure flag
    pub secure: bool,
    /// SameSite attribute
    pub same_site: SameSite,
}

/// Options applied when reading a token cookie
#[derive(Debug, Clone, Default)]
pub struct CookieReadOptions {
    /// Return cookies whose expiry has passed instead of treating them as absent
    pub include_expired: bool,
}

/// Options applied when removing a token cookie.
/// A set path or domain narrows removal to cookies written with the same
/// attribute, matching how browsers scope cookie deletion.
#[derive(Debug, Clone, Default)]
pub struct CookieRemoveOptions {
    /// Only remove cookies written with this path
    pub path: Option<String>,
    /// Only remove cookies written with this domain
    pub domain: Option<String>,
}

/// Per-operation configuration for [`CookieTokenStorage`].
///
/// The top-level `expires` is a convenience: it is ported into the write
/// options when those carry no expiry of their own. An explicit
/// `set.expires` always wins.
#[derive(Debug, Clone, Default)]
pub struct CookieStorageConfig {
    /// Shared expiration applied to writes lacking their own
    pub expires: Option<DateTime<Utc>>,
    /// Read options
    pub get: CookieReadOptions,
    /// Write options
    pub set: CookieWriteOptions,
    /// Removal options
    pub remove: CookieRemoveOptions,
}

/// Token storage delegating to an in-process cookie jar
pub struct CookieTokenStorage {
    jar: RwLock<HashMap<String, TokenCookie>>,
    get_options: CookieReadOptions,
    set_options: CookieWriteOptions,
    remove_options: CookieRemoveOptions,
}

impl CookieTokenStorage {
    /// Jar with default options and no expiry (session cookies)
    pub fn new() -> Self {
        Self::with_config(CookieStorageConfig::default())
    }

    /// Jar with per-operation options
    pub fn with_config(config: CookieStorageConfig) -> Self {
        let mut set_options = config.set;
        set_options.expires = set_options.expires.or(config.expires);

        Self {
            jar: RwLock::new(HashMap::new()),
            get_options: config.get,
            set_options,
            remove_options: config.remove,
        }
    }

    /// Snapshot of the stored cookies
    pub fn cookies(&self) -> Vec<TokenCookie> {
        self.jar.read().unwrap().values().cloned().collect()
    }
}

impl Default for CookieTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStorage for CookieTokenStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let jar = self.jar.read().unwrap();
        Ok(jar
            .get(key)
            .filter(|cookie| self.get_options.include_expired || !cookie.is_expired())
            .map(|cookie| cookie.value.clone()))
    }

    fn set(&self, token: &str, key: &str) -> Result<()> {
        let opts = &self.set_options;
        let cookie = TokenCookie {
            name: key.to_string(),
            value: token.to_string(),
            path: opts.path.clone().unwrap_or_else(|| "/".to_string()),
            domain: opts.domain.clone(),
            expires: opts.expires,
            http_only: opts.http_only,
            secure: opts.secure,
            same_site: opts.same_site,
        };
        self.jar.write().unwrap().insert(key.to_string(), cookie);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut jar = self.jar.write().unwrap();
        if let Some(cookie) = jar.get(key) {
            let path_matches = self
                .remove_options
                .path
                .as_deref()
                .map_or(true, |path| path == cookie.path);
            let domain_matches = self
                .remove_options
                .domain
                .as_deref()
                .map_or(true, |domain| Some(domain) == cookie.domain.as_deref());
            if path_matches && domain_matches {
                jar.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_round_trip() {
        let store = CookieTokenStorage::new();

        store.set("abc123", "session").unwrap();
        assert_eq!(store.get("session").await.unwrap().as_deref(), Some("abc123"));

        store.delete("session").unwrap();
        assert_eq!(store.get("session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_cookie_reads_as_absent() {
        let store = CookieTokenStorage::with_config(CookieStorageConfig {
            expires: Some(Utc::now() - Duration::hours(1)),
            ..Default::default()
        });

        store.set("stale", "session").unwrap();
        assert_eq!(store.get("session").await.unwrap(), None);

        // Still physically in the jar, only filtered on read
        assert_eq!(store.cookies().len(), 1);
    }

    #[tokio::test]
    async fn test_include_expired_read_option() {
        let store = CookieTokenStorage::with_config(CookieStorageConfig {
            expires: Some(Utc::now() - Duration::hours(1)),
            get: CookieReadOptions {
                include_expired: true,
            },
            ..Default::default()
        });

        store.set("stale", "session").unwrap();
        assert_eq!(store.get("session").await.unwrap().as_deref(), Some("stale"));
    }

    #[test]
    fn test_explicit_set_expires_wins_over_shared() {
        let shared = Utc::now() + Duration::hours(1);
        let explicit = Utc::now() + Duration::hours(2);

        let store = CookieTokenStorage::with_config(CookieStorageConfig {
            expires: Some(shared),
            set: CookieWriteOptions {
                expires: Some(explicit),
                ..Default::default()
            },
            ..Default::default()
        });

        store.set("t", "k").unwrap();
        assert_eq!(store.cookies()[0].expires, Some(explicit));
    }

    #[test]
    fn test_shared_expires_ported_into_writes() {
        let shared = Utc::now() + Duration::hours(1);

        let store = CookieTokenStorage::with_config(CookieStorageConfig {
            expires: Some(shared),
            ..Default::default()
        });

        store.set("t", "k").unwrap();
        assert_eq!(store.cookies()[0].expires, Some(shared));
    }

    #[test]
    fn test_write_attributes_applied() {
        let store = CookieTokenStorage::with_config(CookieStorageConfig {
            set: CookieWriteOptions {
                path: Some("/api".to_string()),
                domain: Some("example.com".to_string()),
                http_only: true,
                secure: true,
                same_site: SameSite::Strict,
                ..Default::default()
            },
            ..Default::default()
        });

        store.set("t", "k").unwrap();
        let cookie = &store.cookies()[0];
        assert_eq!(cookie.path, "/api");
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, SameSite::Strict);
    }

    #[tokio::test]
    async fn test_remove_options_scope_deletion() {
        let store = CookieTokenStorage::with_config(CookieStorageConfig {
            set: CookieWriteOptions {
                path: Some("/api".to_string()),
                ..Default::default()
            },
            remove: CookieRemoveOptions {
                path: Some("/other".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        store.set("t", "k").unwrap();
        store.delete("k").unwrap();

        // Path mismatch, the cookie stays
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("t"));
    }

    #[test]
    fn test_cookie_serde_round_trip() {
        let cookie = TokenCookie {
            name: "ns-auth-app-access-token".to_string(),
            value: "abc123".to_string(),
            path: "/".to_string(),
            domain: Some("example.com".to_string()),
            expires: Some(Utc::now() + Duration::hours(1)),
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
        };

        let json = serde_json::to_string(&cookie).unwrap();
        let parsed: TokenCookie = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cookie);
    }

    #[test]
    fn test_cookie_serde_defaults_and_optional_fields() {
        // Attributes omitted from the wire form fall back to defaults
        let parsed: TokenCookie =
            serde_json::from_str(r#"{"name":"k","value":"v","path":"/"}"#).unwrap();
        assert_eq!(parsed.domain, None);
        assert_eq!(parsed.expires, None);
        assert!(!parsed.http_only);
        assert!(!parsed.secure);
        assert_eq!(parsed.same_site, SameSite::Lax);

        // Session cookies serialize without the optional attributes
        let json = serde_json::to_string(&parsed).unwrap();
        assert!(!json.contains("domain"));
        assert!(!json.contains("expires"));
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let store = CookieTokenStorage::new();
        store.delete("never-set").unwrap();
        assert!(store.cookies().is_empty());
    }
}
