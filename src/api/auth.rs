//! Bearer token discovery and attachment for API requests.

use std::sync::Arc;

use super::transport::ApiRequest;
use crate::storage::TokenStore;

/// Path prefix of requests that carry credentials.
pub const API_PREFIX: &str = "/api/";

/// Storage keys checked for a token, first match wins.
pub const DEFAULT_TOKEN_KEYS: &[&str] = &["token", "authToken", "accessToken", "jwt", "apiKey", "auth_token"];

/// Key a fallback token is persisted under.
const PERSIST_KEY: &str = "token";

/// Pre-provisioned tokens consulted only outside production builds.
#[derive(Debug, Clone, Default)]
pub struct DevFallback {
    /// Token from the settings file.
    pub configured: Option<String>,
    /// Token passed on the command line at launch.
    pub launch: Option<String>,
}

pub struct AuthAttachment {
    local: Arc<dyn TokenStore>,
    session: Arc<dyn TokenStore>,
    keys: Vec<String>,
    dev_fallback: Option<DevFallback>,
}

impl AuthAttachment {
    pub fn new(local: Arc<dyn TokenStore>, session: Arc<dyn TokenStore>) -> Self {
        Self {
            local,
            session,
            keys: DEFAULT_TOKEN_KEYS.iter().map(|k| k.to_string()).collect(),
            dev_fallback: None,
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        if !keys.is_empty() {
            self.keys = keys;
        }
        self
    }

    /// Enable the fallback; callers pass `None` in production builds.
    pub fn with_dev_fallback(mut self, fallback: Option<DevFallback>) -> Self {
        self.dev_fallback = fallback;
        self
    }

    /// Find a token: local store, then session store, then the dev fallback.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.lookup(self.local.as_ref(), "local") {
            return Some(token);
        }
        if let Some(token) = self.lookup(self.session.as_ref(), "session") {
            return Some(token);
        }

        let fallback = self.dev_fallback.as_ref()?;
        let token = non_blank(fallback.configured.as_deref())
            .map(|t| (t, "settings"))
            .or_else(|| non_blank(fallback.launch.as_deref()).map(|t| (t, "launch argument")));

        let (token, source) = token?;
        tracing::debug!("Using development token from {}", source);
        if let Err(e) = self.local.set(PERSIST_KEY, token) {
            tracing::warn!("Failed to persist development token: {}", e);
        }
        Some(token.to_string())
    }

    fn lookup(&self, store: &dyn TokenStore, label: &str) -> Option<String> {
        for key in &self.keys {
            match store.get(key) {
                Ok(Some(value)) if !value.trim().is_empty() => {
                    tracing::trace!("Found token in {} storage under '{}'", label, key);
                    return Some(value);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to read '{}' from {} storage: {}", key, label, e),
            }
        }
        None
    }

    /// Add an `Authorization` header to API requests when a token is available.
    /// Other requests, and API requests without a token, pass through untouched.
    pub fn attach(&self, request: &mut ApiRequest) {
        if !request.path.starts_with(API_PREFIX) {
            return;
        }
        match self.resolve_token() {
            Some(token) => request.set_header("Authorization", authorization_value(&token)),
            None => tracing::debug!("No auth token found, sending {} unauthenticated", request.path),
        }
    }
}

/// Normalise a stored token into a header value.
pub fn authorization_value(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("Bearer ") || token.starts_with("Token ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::Method;
    use crate::storage::MemoryTokenStore;

    fn stores() -> (Arc<MemoryTokenStore>, Arc<MemoryTokenStore>) {
        (Arc::new(MemoryTokenStore::new()), Arc::new(MemoryTokenStore::new()))
    }

    #[test]
    fn attaches_bearer_header_to_api_requests() {
        let (local, session) = stores();
        local.set("authToken", "abc123").unwrap();
        let auth = AuthAttachment::new(local, session);

        let mut request = ApiRequest::new(Method::Get, "/api/categories");
        auth.attach(&mut request);
        assert_eq!(request.header("Authorization"), Some("Bearer abc123"));
    }

    #[test]
    fn never_attaches_outside_api_prefix() {
        let (local, session) = stores();
        local.set("token", "abc123").unwrap();
        let auth = AuthAttachment::new(local, session);

        let mut request = ApiRequest::new(Method::Get, "/health");
        auth.attach(&mut request);
        assert_eq!(request.header("Authorization"), None);

        let mut request = ApiRequest::new(Method::Get, "/apix/categories");
        auth.attach(&mut request);
        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn first_key_in_order_wins_and_local_beats_session() {
        let (local, session) = stores();
        local.set("jwt", "from-jwt").unwrap();
        local.set("accessToken", "from-access").unwrap();
        session.set("token", "from-session").unwrap();
        let auth = AuthAttachment::new(local.clone(), session.clone());
        assert_eq!(auth.resolve_token().as_deref(), Some("from-access"));

        local.remove("jwt").unwrap();
        local.remove("accessToken").unwrap();
        assert_eq!(auth.resolve_token().as_deref(), Some("from-session"));
    }

    #[test]
    fn blank_values_are_skipped() {
        let (local, session) = stores();
        local.set("token", "   ").unwrap();
        local.set("apiKey", "real").unwrap();
        let auth = AuthAttachment::new(local, session);
        assert_eq!(auth.resolve_token().as_deref(), Some("real"));
    }

    #[test]
    fn keeps_existing_scheme_prefixes() {
        assert_eq!(authorization_value("  Bearer xyz "), "Bearer xyz");
        assert_eq!(authorization_value("Token xyz"), "Token xyz");
        assert_eq!(authorization_value("xyz"), "Bearer xyz");
    }

    #[test]
    fn dev_fallback_is_persisted_to_local_storage() {
        let (local, session) = stores();
        let auth = AuthAttachment::new(local.clone(), session).with_dev_fallback(Some(DevFallback {
            configured: None,
            launch: Some("launch-token".into()),
        }));

        assert_eq!(auth.resolve_token().as_deref(), Some("launch-token"));
        assert_eq!(local.get("token").unwrap().as_deref(), Some("launch-token"));
    }

    #[test]
    fn configured_token_beats_launch_token() {
        let (local, session) = stores();
        let auth = AuthAttachment::new(local, session).with_dev_fallback(Some(DevFallback {
            configured: Some("configured".into()),
            launch: Some("launch".into()),
        }));
        assert_eq!(auth.resolve_token().as_deref(), Some("configured"));
    }

    #[test]
    fn no_token_means_unauthenticated_request() {
        let (local, session) = stores();
        let auth = AuthAttachment::new(local, session).with_dev_fallback(None);
        let mut request = ApiRequest::new(Method::Get, "/api/expenses");
        auth.attach(&mut request);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn custom_keys_replace_defaults() {
        let (local, session) = stores();
        local.set("token", "default-key").unwrap();
        local.set("session_id", "custom-key").unwrap();
        let auth = AuthAttachment::new(local, session).with_keys(vec!["session_id".into()]);
        assert_eq!(auth.resolve_token().as_deref(), Some("custom-key"));
    }
}
