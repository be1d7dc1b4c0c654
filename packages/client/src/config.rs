//! Client configuration: backend endpoints, credential and timings.

use std::time::Duration;

use reqwest::Url;

use crate::{
    domain::{
        ReconnectPolicy, SessionId, UserId, connection::DEFAULT_KEEPALIVE_INTERVAL,
    },
    error::ConfigError,
};

/// Default timeout for REST calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by the REST client and every socket.
///
/// # Example
///
/// ```
/// use crm_live_client::config::LiveConfig;
///
/// let config = LiveConfig::new("https://crm.example.com/api").unwrap();
/// assert_eq!(config.ws_base_url().as_str(), "wss://crm.example.com/api");
/// ```
#[derive(Debug, Clone)]
pub struct LiveConfig {
    api_base_url: Url,
    ws_base_url: Url,
    credential: Option<String>,
    keepalive_interval: Duration,
    reconnect: ReconnectPolicy,
    request_timeout: Duration,
}

impl LiveConfig {
    /// Create a configuration for the backend at `api_base_url`.
    ///
    /// The socket base is derived from it (`http` → `ws`, `https` → `wss`).
    pub fn new(api_base_url: &str) -> Result<Self, ConfigError> {
        let api_base_url = parse_base(api_base_url, &["http", "https"])?;
        let mut ws_base_url = api_base_url.clone();
        let ws_scheme = if api_base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        ws_base_url
            .set_scheme(ws_scheme)
            .map_err(|_| invalid(api_base_url.as_str(), "cannot derive socket URL"))?;

        Ok(Self {
            api_base_url,
            ws_base_url,
            credential: None,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the socket base when sockets are served from another host.
    pub fn with_ws_base_url(mut self, ws_base_url: &str) -> Result<Self, ConfigError> {
        self.ws_base_url = parse_base(ws_base_url, &["ws", "wss"])?;
        Ok(self)
    }

    /// Cookie header value sent on REST calls and socket handshakes.
    pub fn with_credential(mut self, cookie: impl Into<String>) -> Self {
        self.credential = Some(cookie.into());
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    pub fn ws_base_url(&self) -> &Url {
        &self.ws_base_url
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// REST endpoint below the API base, e.g. `["support", "stats"]`.
    pub fn api_url(&self, segments: &[&str]) -> Url {
        join_segments(&self.api_base_url, segments)
    }

    /// `ws(s)://<host>/ws/notifications?user_id=<id>`
    pub fn notification_url(&self, user_id: &UserId) -> Url {
        let mut url = join_segments(&self.ws_base_url, &["ws", "notifications"]);
        url.query_pairs_mut().append_pair("user_id", user_id.as_str());
        url
    }

    /// `ws(s)://<host>/ws/chat/<session_id>?user_id=<id>&is_agent=<bool>`
    pub fn chat_url(&self, session_id: &SessionId, user_id: &UserId, is_agent: bool) -> Url {
        let mut url = join_segments(&self.ws_base_url, &["ws", "chat", session_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("user_id", user_id.as_str())
            .append_pair("is_agent", if is_agent { "true" } else { "false" });
        url
    }
}

fn parse_base(raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| invalid(raw, &e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(
            raw,
            &format!("scheme must be one of {}", schemes.join(", ")),
        ));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid(raw, "missing host"));
    }
    Ok(url)
}

fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn invalid(url: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidBaseUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
