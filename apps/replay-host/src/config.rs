use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use frame_session::{Prefix, PrefixResolvers};
use replay_channel::RealtimeConfig;
use replay_proto::SessionParams;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub content_host: String,
    pub api_base: String,
    pub ws_base: String,
    pub app_prefix: Option<String>,
    pub content_prefix: Option<String>,
    pub ws_reconnect_attempts: u32,
    pub ws_reconnect_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            content_host: lookup("REPLAY_CONTENT_HOST").unwrap_or(defaults.content_host),
            api_base: lookup("REPLAY_API_BASE").unwrap_or(defaults.api_base),
            ws_base: lookup("REPLAY_WS_BASE").unwrap_or(defaults.ws_base),
            app_prefix: lookup("REPLAY_APP_PREFIX"),
            content_prefix: lookup("REPLAY_CONTENT_PREFIX"),
            ws_reconnect_attempts: lookup("REPLAY_WS_RECONNECT_ATTEMPTS")
                .and_then(|val| val.parse().ok())
                .unwrap_or(defaults.ws_reconnect_attempts),
            ws_reconnect_delay_ms: lookup("REPLAY_WS_RECONNECT_DELAY_MS")
                .and_then(|val| val.parse().ok())
                .unwrap_or(defaults.ws_reconnect_delay_ms),
        }
    }

    /// Origin frame posts must carry to be trusted.
    pub fn content_origin(&self) -> String {
        format!("http://{}", self.content_host)
    }

    pub fn api_base_url(&self) -> Result<Url> {
        Url::parse(&self.api_base)
            .with_context(|| format!("invalid REPLAY_API_BASE {}", self.api_base))
    }

    pub fn realtime(&self) -> Result<RealtimeConfig> {
        let ws_base = Url::parse(&self.ws_base)
            .with_context(|| format!("invalid REPLAY_WS_BASE {}", self.ws_base))?;
        Ok(RealtimeConfig {
            ws_base,
            reconnect_attempts: self.ws_reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.ws_reconnect_delay_ms),
        })
    }

    /// Configured prefixes win; otherwise both are derived from the session.
    pub fn prefixes(&self, params: &SessionParams) -> PrefixResolvers {
        let app = match &self.app_prefix {
            Some(prefix) => Prefix::fixed(prefix.clone()),
            None => Prefix::fixed(format!("/{}/{}/", params.user, params.coll)),
        };
        let content = match &self.content_prefix {
            Some(prefix) => Prefix::fixed(prefix.clone()),
            None => {
                let origin = self.content_origin();
                let user = params.user.clone();
                let coll = params.coll.clone();
                Prefix::computed(move || format!("{origin}/{user}/{coll}/"))
            }
        };
        PrefixResolvers { app, content }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_host: "localhost:8092".to_string(),
            api_base: "http://localhost:8089/api/v1".to_string(),
            ws_base: "ws://localhost:8089".to_string(),
            app_prefix: None,
            content_prefix: None,
            ws_reconnect_attempts: 5,
            ws_reconnect_delay_ms: 1000,
        }
    }
}
