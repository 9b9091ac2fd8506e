//! Client configuration.
//!
//! A typed options struct with a validating builder, the same shape as
//! `forwarder::config::ForwarderConfig` — except there is no file to load
//! here, the caller constructs it directly.

use std::time::Duration;

use crate::error::FinlightError;

/// Hook invoked synchronously after every transport close.
pub trait CloseHook: Fn(&CloseInfo) + Send + Sync {}
impl<T: Fn(&CloseInfo) + Send + Sync> CloseHook for T {}

/// Observed details of a transport close, passed to [`ClientConfig::on_close`].
#[derive(Debug, Clone)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

/// Configuration for the streaming client (and, where relevant, the REST client).
///
/// Construct via [`ClientConfig::new`] then chain setters; call [`ClientConfig::build`]
/// to validate.
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) wss_url: String,
    pub(crate) ping_interval: Duration,
    pub(crate) pong_timeout: Duration,
    pub(crate) base_reconnect_delay: Duration,
    pub(crate) max_reconnect_delay: Duration,
    pub(crate) connection_lifetime: Duration,
    pub(crate) takeover: bool,
    pub(crate) on_close: Option<Box<dyn CloseHook>>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("wss_url", &self.wss_url)
            .field("ping_interval", &self.ping_interval)
            .field("pong_timeout", &self.pong_timeout)
            .field("base_reconnect_delay", &self.base_reconnect_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("connection_lifetime", &self.connection_lifetime)
            .field("takeover", &self.takeover)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Start building a config with the required API key.
    pub fn new(api_key: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            api_key: api_key.into(),
            base_url: "https://api.finlight.me".to_owned(),
            wss_url: "wss://wss.finlight.me".to_owned(),
            ping_interval: Duration::from_secs(25),
            pong_timeout: Duration::from_secs(60),
            base_reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            connection_lifetime: Duration::from_secs(6_900),
            takeover: false,
            on_close: None,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn wss_url(&self) -> &str {
        &self.wss_url
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }

    pub fn base_reconnect_delay(&self) -> Duration {
        self.base_reconnect_delay
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        self.max_reconnect_delay
    }

    pub fn connection_lifetime(&self) -> Duration {
        self.connection_lifetime
    }

    pub fn takeover(&self) -> bool {
        self.takeover
    }

    pub(crate) fn fire_on_close(&self, info: &CloseInfo) {
        if let Some(hook) = &self.on_close {
            hook(info);
        }
    }
}

/// Builder for [`ClientConfig`]. See field docs on `ClientConfig` for defaults.
pub struct ClientConfigBuilder {
    api_key: String,
    base_url: String,
    wss_url: String,
    ping_interval: Duration,
    pong_timeout: Duration,
    base_reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    connection_lifetime: Duration,
    takeover: bool,
    on_close: Option<Box<dyn CloseHook>>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn wss_url(mut self, wss_url: impl Into<String>) -> Self {
        self.wss_url = wss_url.into();
        self
    }

    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    pub fn pong_timeout(mut self, d: Duration) -> Self {
        self.pong_timeout = d;
        self
    }

    pub fn base_reconnect_delay(mut self, d: Duration) -> Self {
        self.base_reconnect_delay = d;
        self
    }

    pub fn max_reconnect_delay(mut self, d: Duration) -> Self {
        self.max_reconnect_delay = d;
        self
    }

    pub fn connection_lifetime(mut self, d: Duration) -> Self {
        self.connection_lifetime = d;
        self
    }

    pub fn takeover(mut self, enabled: bool) -> Self {
        self.takeover = enabled;
        self
    }

    /// Register a hook fired synchronously after every transport close.
    pub fn on_close(mut self, hook: impl CloseHook + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Validate and produce the final [`ClientConfig`].
    pub fn build(self) -> Result<ClientConfig, FinlightError> {
        if self.api_key.trim().is_empty() {
            return Err(FinlightError::Config("api_key must not be empty".into()));
        }
        if self.base_reconnect_delay.is_zero() {
            return Err(FinlightError::Config(
                "base_reconnect_delay must be > 0".into(),
            ));
        }
        if self.max_reconnect_delay < self.base_reconnect_delay {
            return Err(FinlightError::Config(
                "max_reconnect_delay must be >= base_reconnect_delay".into(),
            ));
        }
        if self.connection_lifetime.is_zero() {
            return Err(FinlightError::Config(
                "connection_lifetime must be > 0".into(),
            ));
        }
        Ok(ClientConfig {
            api_key: self.api_key,
            base_url: self.base_url,
            wss_url: self.wss_url,
            ping_interval: self.ping_interval,
            pong_timeout: self.pong_timeout,
            base_reconnect_delay: self.base_reconnect_delay,
            max_reconnect_delay: self.max_reconnect_delay,
            connection_lifetime: self.connection_lifetime,
            takeover: self.takeover,
            on_close: self.on_close,
        })
    }
}
