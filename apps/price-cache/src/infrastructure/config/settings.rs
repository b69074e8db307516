//! Price Cache Configuration Settings
//!
//! Configuration types for the price cache, loaded from environment variables.

use std::time::Duration;

use chrono_tz::Tz;

/// Provider API keys.
#[derive(Clone)]
pub struct Credentials {
    finnhub_api_key: String,
    alpha_vantage_api_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(finnhub_api_key: String, alpha_vantage_api_key: String) -> Self {
        Self {
            finnhub_api_key,
            alpha_vantage_api_key,
        }
    }

    /// Key for the streaming feed and the quote API.
    #[must_use]
    pub fn finnhub_api_key(&self) -> &str {
        &self.finnhub_api_key
    }

    /// Key for the market calendar API.
    #[must_use]
    pub fn alpha_vantage_api_key(&self) -> &str {
        &self.alpha_vantage_api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("finnhub_api_key", &"[REDACTED]")
            .field("alpha_vantage_api_key", &"[REDACTED]")
            .finish()
    }
}

/// Provider base URLs.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Streaming feed WebSocket URL, without the token.
    pub stream_url: String,
    /// Quote REST base URL.
    pub quote_url: String,
    /// Market calendar REST base URL.
    pub calendar_url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            stream_url: "wss://ws.finnhub.io".to_string(),
            quote_url: "https://finnhub.io/api/v1".to_string(),
            calendar_url: "https://www.alphavantage.co".to_string(),
        }
    }
}

/// Which market gates price requests.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    /// Calendar provider region name.
    pub region: String,
    /// Exchange timezone.
    pub timezone: Tz,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            region: "United States".to_string(),
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// Cache lifecycle timers.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Idle time after which a ticker is swept.
    pub idle_threshold: Duration,
    /// How often the sweep runs.
    pub sweep_interval: Duration,
    /// How often the market schedule is refetched.
    pub market_refresh_interval: Duration,
    /// Timeout for REST provider calls.
    pub http_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            idle_threshold: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
            market_refresh_interval: Duration::from_secs(3600),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Silence after which the connection is considered dead.
    pub idle_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(90),
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// Complete price cache configuration.
#[derive(Debug, Clone)]
pub struct PriceCacheConfig {
    /// Provider API keys.
    pub credentials: Credentials,
    /// HTTP listen port.
    pub port: u16,
    /// Provider base URLs.
    pub endpoints: EndpointSettings,
    /// Target market.
    pub market: MarketSettings,
    /// Cache lifecycle timers.
    pub cache: CacheSettings,
    /// Streaming connection settings.
    pub stream: StreamSettings,
}

impl PriceCacheConfig {
    /// Default HTTP port.
    pub const DEFAULT_PORT: u16 = 3002;

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or empty, or the
    /// timezone is not a known IANA name.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let finnhub_api_key = env.required("FINNHUB_API_KEY")?;
        let alpha_vantage_api_key = env.required("ALPHA_VANTAGE_API_KEY")?;

        let endpoints_default = EndpointSettings::default();
        let endpoints = EndpointSettings {
            stream_url: env.string("FINNHUB_STREAM_URL", endpoints_default.stream_url),
            quote_url: env.string("FINNHUB_REST_URL", endpoints_default.quote_url),
            calendar_url: env.string("ALPHA_VANTAGE_URL", endpoints_default.calendar_url),
        };

        let market_default = MarketSettings::default();
        let timezone = match env.get("MARKET_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name))?,
            None => market_default.timezone,
        };
        let market = MarketSettings {
            region: env.string("MARKET_REGION", market_default.region),
            timezone,
        };

        let cache_default = CacheSettings::default();
        let cache = CacheSettings {
            idle_threshold: env.duration_secs(
                "PRICE_CACHE_IDLE_THRESHOLD_SECS",
                cache_default.idle_threshold,
            ),
            sweep_interval: env.duration_secs(
                "PRICE_CACHE_SWEEP_INTERVAL_SECS",
                cache_default.sweep_interval,
            ),
            market_refresh_interval: env.duration_secs(
                "PRICE_CACHE_MARKET_REFRESH_INTERVAL_SECS",
                cache_default.market_refresh_interval,
            ),
            http_timeout: env.duration_secs(
                "PRICE_CACHE_HTTP_TIMEOUT_SECS",
                cache_default.http_timeout,
            ),
        };

        let stream_default = StreamSettings::default();
        let stream = StreamSettings {
            idle_timeout: env.duration_secs(
                "PRICE_CACHE_STREAM_IDLE_TIMEOUT_SECS",
                stream_default.idle_timeout,
            ),
            reconnect_delay_initial: env.duration_millis(
                "PRICE_CACHE_RECONNECT_DELAY_INITIAL_MS",
                stream_default.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "PRICE_CACHE_RECONNECT_DELAY_MAX_SECS",
                stream_default.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parsed(
                "PRICE_CACHE_RECONNECT_DELAY_MULTIPLIER",
                stream_default.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parsed(
                "PRICE_CACHE_MAX_RECONNECT_ATTEMPTS",
                stream_default.max_reconnect_attempts,
            ),
        };

        Ok(Self {
            credentials: Credentials::new(finnhub_api_key, alpha_vantage_api_key),
            port: env.parsed("PORT", Self::DEFAULT_PORT),
            endpoints,
            market,
            cache,
            stream,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Timezone is not a known IANA name.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
}

/// Typed access over a key lookup. Unparseable values fall back to defaults.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        let value = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyValue(key.to_string()));
        }
        Ok(value)
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).filter(|v| !v.is_empty()).unwrap_or(default)
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const KEYS: [(&str, &str); 2] = [
        ("FINNHUB_API_KEY", "fh-key"),
        ("ALPHA_VANTAGE_API_KEY", "av-key"),
    ];

    #[test]
    fn defaults_with_only_keys() {
        let config = PriceCacheConfig::from_lookup(lookup(&KEYS)).unwrap();

        assert_eq!(config.port, 3002);
        assert_eq!(config.market.region, "United States");
        assert_eq!(config.market.timezone, chrono_tz::America::New_York);
        assert_eq!(config.cache.idle_threshold, Duration::from_secs(3600));
        assert_eq!(config.cache.http_timeout, Duration::from_secs(10));
        assert_eq!(config.stream.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.stream.max_reconnect_attempts, 0);
        assert_eq!(config.endpoints.stream_url, "wss://ws.finnhub.io");
    }

    #[test]
    fn overrides_are_applied() {
        let mut pairs = KEYS.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("MARKET_REGION", "Japan"),
            ("MARKET_TIMEZONE", "Asia/Tokyo"),
            ("PRICE_CACHE_IDLE_THRESHOLD_SECS", "120"),
            ("PRICE_CACHE_RECONNECT_DELAY_INITIAL_MS", "250"),
            ("PRICE_CACHE_RECONNECT_DELAY_MULTIPLIER", "1.5"),
        ]);

        let config = PriceCacheConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.market.region, "Japan");
        assert_eq!(config.market.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.cache.idle_threshold, Duration::from_secs(120));
        assert_eq!(
            config.stream.reconnect_delay_initial,
            Duration::from_millis(250)
        );
        assert!((config.stream.reconnect_delay_multiplier - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unparseable_number_falls_back() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("PORT", "not-a-port"));

        let config = PriceCacheConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.port, 3002);
    }

    #[test]
    fn missing_key_is_error() {
        let err = PriceCacheConfig::from_lookup(lookup(&[("FINNHUB_API_KEY", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "ALPHA_VANTAGE_API_KEY"));
    }

    #[test]
    fn empty_key_is_error() {
        let err = PriceCacheConfig::from_lookup(lookup(&[
            ("FINNHUB_API_KEY", " "),
            ("ALPHA_VANTAGE_API_KEY", "x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(k) if k == "FINNHUB_API_KEY"));
    }

    #[test]
    fn invalid_timezone_is_error() {
        let mut pairs = KEYS.to_vec();
        pairs.push(("MARKET_TIMEZONE", "Mars/Olympus"));

        let err = PriceCacheConfig::from_lookup(lookup(&pairs)).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidTimezone(_)));
    }


    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123".to_string(), "secret456".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }
}
