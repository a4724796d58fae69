//! Environment-driven configuration.

use std::time::Duration;

use mixdown::{AssemblyConfig, FallbackDurations};

/// Status stream (SSE) settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Poll interval between status checks.
    pub poll_interval: Duration,
    /// Wall-clock budget expressed as a check count; the stream closes with a
    /// `timeout` event once exhausted.
    pub max_checks: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_checks: 300, // 5 minutes at the default interval
        }
    }
}

/// CDN storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base URL of the storage write endpoint.
    pub storage_base: String,
    /// Public base URL programs are served from.
    pub cdn_base: String,
    /// Access key sent with storage writes.
    pub access_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_base: "https://storage.bunnycdn.com/little-microphones".to_string(),
            cdn_base: "https://little-microphones.b-cdn.net".to_string(),
            access_key: String::new(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address.
    pub bind_address: String,
    /// Server port.
    pub port: u16,
    /// SQLite database URL.
    pub database_url: String,
    /// Suggested client retry delay when the worker is busy.
    pub retry_after_secs: u64,
    pub storage: StorageConfig,
    pub stream: StreamConfig,
    pub assembly: AssemblyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8787,
            database_url: "sqlite:radiogen.db?mode=rwc".to_string(),
            retry_after_secs: 10,
            storage: StorageConfig::default(),
            stream: StreamConfig::default(),
            assembly: AssemblyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    ///
    /// Supported env vars: `API_BIND_ADDRESS`, `API_PORT`, `DATABASE_URL`,
    /// `STORAGE_BASE_URL`, `CDN_BASE_URL`, `STORAGE_ACCESS_KEY`,
    /// `FFMPEG_PATH`, `CODEC_TIMEOUT_SECS`, `NORMALIZE_ANSWERS`,
    /// `FALLBACK_BACKGROUND_SECS`, `FALLBACK_PROMPT_SECS`,
    /// `FALLBACK_OTHER_SECS`, `STREAM_POLL_INTERVAL_MS`, `STREAM_MAX_CHECKS`,
    /// `RETRY_AFTER_SECS`.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Some(bind_address) = env_string("API_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }
        if let Some(port) = env_parsed::<u16>("API_PORT") {
            config.port = port;
        }
        if let Some(database_url) = env_string("DATABASE_URL") {
            config.database_url = database_url;
        }
        if let Some(retry) = env_parsed::<u64>("RETRY_AFTER_SECS") {
            config.retry_after_secs = retry;
        }

        if let Some(storage_base) = env_string("STORAGE_BASE_URL") {
            config.storage.storage_base = storage_base;
        }
        if let Some(cdn_base) = env_string("CDN_BASE_URL") {
            config.storage.cdn_base = cdn_base;
        }
        if let Some(access_key) = env_string("STORAGE_ACCESS_KEY") {
            config.storage.access_key = access_key;
        }

        if let Some(ffmpeg_path) = env_string("FFMPEG_PATH") {
            config.assembly.ffmpeg_path = ffmpeg_path;
        }
        if let Some(timeout) = env_parsed::<u64>("CODEC_TIMEOUT_SECS") {
            config.assembly.codec_timeout = Duration::from_secs(timeout);
        }
        if let Some(normalize) = env_parsed::<bool>("NORMALIZE_ANSWERS") {
            config.assembly.normalize_answers = normalize;
        }
        config.assembly.fallbacks = FallbackDurations {
            background_secs: env_parsed("FALLBACK_BACKGROUND_SECS")
                .unwrap_or(config.assembly.fallbacks.background_secs),
            prompt_secs: env_parsed("FALLBACK_PROMPT_SECS")
                .unwrap_or(config.assembly.fallbacks.prompt_secs),
            other_secs: env_parsed("FALLBACK_OTHER_SECS")
                .unwrap_or(config.assembly.fallbacks.other_secs),
        };

        if let Some(interval_ms) = env_parsed::<u64>("STREAM_POLL_INTERVAL_MS") {
            config.stream.poll_interval = Duration::from_millis(interval_ms);
        }
        if let Some(max_checks) = env_parsed::<u32>("STREAM_MAX_CHECKS") {
            config.stream.max_checks = max_checks;
        }

        config
    }
}

fn env_string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_preserve_stream_budget() {
        let config = AppConfig::default();
        assert_eq!(config.stream.poll_interval, Duration::from_secs(1));
        assert_eq!(config.stream.max_checks, 300);
    }

    #[test]
    fn defaults_preserve_fallback_baseline() {
        let config = AppConfig::default();
        assert_eq!(config.assembly.fallbacks.background_secs, 30.0);
        assert_eq!(config.assembly.fallbacks.prompt_secs, 5.0);
        assert_eq!(config.assembly.fallbacks.other_secs, 3.0);
    }
}
