//! Handler configuration.

use std::time::Duration;

/// How an unseen key presented by value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// Create a session for any new key on first sight.
    #[default]
    TrustOnFirstUse,
    /// Only keys that already have a session are accepted.
    RegisteredOnly,
}

/// Configuration for the [`AuthHandler`](crate::AuthHandler).
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// URI returned to clients for continuation requests.
    pub continue_uri: String,
    /// Key policy for clients in access requests.
    pub client_key_policy: KeyPolicy,
    /// Key policy for resource servers in introspection requests.
    pub resource_server_key_policy: KeyPolicy,
    /// Continuation tokens older than this are treated as unknown.
    pub continue_token_ttl: Option<Duration>,
    /// Lifetime of issued access tokens; `None` never expires.
    pub access_token_ttl: Option<Duration>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            continue_uri: "/gnap/continue".to_string(),
            client_key_policy: KeyPolicy::TrustOnFirstUse,
            resource_server_key_policy: KeyPolicy::TrustOnFirstUse,
            continue_token_ttl: None,
            access_token_ttl: None,
        }
    }
}

impl HandlerConfig {
    pub(crate) fn continue_token_ttl_ms(&self) -> Option<i64> {
        self.continue_token_ttl.map(duration_ms)
    }

    pub(crate) fn access_token_ttl_ms(&self) -> Option<i64> {
        self.access_token_ttl.map(duration_ms)
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
