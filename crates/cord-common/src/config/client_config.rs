//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). Every component takes its own sub-config so tests can build one
//! directly.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rest: RestConfig,
    pub gateway: GatewayConfig,
    pub state: StateConfig,
    /// How long closing waits for running handlers before aborting them
    pub shutdown_grace: Duration,
}

/// REST executor and rate limiter settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Authorization header value, including any `Bot ` prefix
    pub token: String,
    /// Base URL of the REST API, without a trailing slash
    pub api_base: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// How many times a 502 is retried before giving up
    pub max_rest_retries: u32,
    /// Sleep and retry on 429 instead of returning the error
    pub retry_on_rate_limit: bool,
    /// Added to reset timestamps computed from the server clock
    pub clock_skew_margin: Duration,
}

/// Gateway session settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub token: String,
    /// Protocol version sent as the `v` query parameter
    pub version: u8,
    pub compress: bool,
    pub large_threshold: u32,
    pub shard_id: u32,
    pub shard_count: u32,
    pub should_reconnect: bool,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Pause between sending the close frame and dropping the socket
    pub close_grace: Duration,
    /// Pause between successive sub-connection reconnects
    pub sub_connection_stagger: Duration,
}

/// State cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateConfig {
    /// When false only the ready user and session id are kept
    pub enabled: bool,
    pub track_channels: bool,
    pub track_emojis: bool,
    pub track_members: bool,
    pub track_roles: bool,
    pub track_voice: bool,
    pub track_presences: bool,
    /// Messages kept per channel; 0 disables message tracking
    pub max_message_count: usize,
}

impl RestConfig {
    /// Defaults for the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            max_rest_retries: default_max_rest_retries(),
            retry_on_rate_limit: true,
            clock_skew_margin: Duration::from_millis(default_clock_skew_margin_ms()),
        }
    }

    /// Point the client at another API base (mock servers, proxies)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

impl GatewayConfig {
    /// Defaults for the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            version: default_gateway_version(),
            compress: true,
            large_threshold: default_large_threshold(),
            shard_id: 0,
            shard_count: 1,
            should_reconnect: true,
            reconnect_initial_delay: Duration::from_secs(default_reconnect_initial_secs()),
            reconnect_max_delay: Duration::from_secs(default_reconnect_max_secs()),
            close_grace: Duration::from_millis(default_close_grace_ms()),
            sub_connection_stagger: Duration::from_millis(default_sub_connection_stagger_ms()),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_channels: true,
            track_emojis: true,
            track_members: true,
            track_roles: true,
            track_voice: true,
            track_presences: true,
            max_message_count: default_max_message_count(),
        }
    }
}

// Default value functions
fn default_api_base() -> String {
    "https://discord.com/api/v6".to_string()
}

fn default_user_agent() -> String {
    format!("DiscordBot (cord, {})", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_rest_retries() -> u32 {
    3
}

fn default_clock_skew_margin_ms() -> u64 {
    250
}

fn default_gateway_version() -> u8 {
    6
}

fn default_large_threshold() -> u32 {
    250
}

fn default_reconnect_initial_secs() -> u64 {
    1
}

fn default_reconnect_max_secs() -> u64 {
    600
}

fn default_close_grace_ms() -> u64 {
    1000
}

fn default_sub_connection_stagger_ms() -> u64 {
    1000
}

fn default_max_message_count() -> usize {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    1000
}

impl ClientConfig {
    /// Build a config with defaults for everything but the token
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            rest: RestConfig::new(token.clone()),
            gateway: GatewayConfig::new(token),
            state: StateConfig::default(),
            shutdown_grace: Duration::from_millis(default_shutdown_grace_ms()),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CORD_TOKEN` is missing or a variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let token = lookup("CORD_TOKEN").ok_or(ConfigError::MissingVar("CORD_TOKEN"))?;

        let rest = RestConfig {
            token: token.clone(),
            api_base: lookup("CORD_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(default_api_base),
            user_agent: lookup("CORD_USER_AGENT").unwrap_or_else(default_user_agent),
            request_timeout: Duration::from_secs(
                vars.parse("CORD_REQUEST_TIMEOUT_SECS", default_request_timeout_secs)?,
            ),
            max_rest_retries: vars.parse("CORD_MAX_REST_RETRIES", default_max_rest_retries)?,
            retry_on_rate_limit: vars.flag("CORD_RETRY_ON_RATE_LIMIT", true)?,
            clock_skew_margin: Duration::from_millis(
                vars.parse("CORD_CLOCK_SKEW_MARGIN_MS", default_clock_skew_margin_ms)?,
            ),
        };

        let gateway = GatewayConfig {
            token,
            version: vars.parse("CORD_GATEWAY_VERSION", default_gateway_version)?,
            compress: vars.flag("CORD_COMPRESS", true)?,
            large_threshold: vars.parse("CORD_LARGE_THRESHOLD", default_large_threshold)?,
            shard_id: vars.parse("CORD_SHARD_ID", || 0)?,
            shard_count: vars.parse("CORD_SHARD_COUNT", || 1)?,
            should_reconnect: vars.flag("CORD_SHOULD_RECONNECT", true)?,
            reconnect_initial_delay: Duration::from_secs(
                vars.parse("CORD_RECONNECT_INITIAL_SECS", default_reconnect_initial_secs)?,
            ),
            reconnect_max_delay: Duration::from_secs(
                vars.parse("CORD_RECONNECT_MAX_SECS", default_reconnect_max_secs)?,
            ),
            close_grace: Duration::from_millis(
                vars.parse("CORD_CLOSE_GRACE_MS", default_close_grace_ms)?,
            ),
            sub_connection_stagger: Duration::from_millis(
                vars.parse("CORD_SUB_CONNECTION_STAGGER_MS", default_sub_connection_stagger_ms)?,
            ),
        };

        let state = StateConfig {
            enabled: vars.flag("CORD_STATE_ENABLED", true)?,
            track_channels: vars.flag("CORD_TRACK_CHANNELS", true)?,
            track_emojis: vars.flag("CORD_TRACK_EMOJIS", true)?,
            track_members: vars.flag("CORD_TRACK_MEMBERS", true)?,
            track_roles: vars.flag("CORD_TRACK_ROLES", true)?,
            track_voice: vars.flag("CORD_TRACK_VOICE", true)?,
            track_presences: vars.flag("CORD_TRACK_PRESENCES", true)?,
            max_message_count: vars.parse("CORD_MAX_MESSAGE_COUNT", default_max_message_count)?,
        };

        let shutdown_grace = Duration::from_millis(
            vars.parse("CORD_SHUTDOWN_GRACE_MS", default_shutdown_grace_ms)?,
        );

        Ok(Self {
            rest,
            gateway,
            state,
            shutdown_grace,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T, D>(&self, key: &'static str, default: D) -> Result<T, ConfigError>
    where
        T: FromStr,
        D: FnOnce() -> T,
    {
        match (self.0)(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(default()),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match (self.0)(key) {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue(key, raw)),
            },
            None => Ok(default),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
