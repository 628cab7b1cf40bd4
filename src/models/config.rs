//! Configuration model.
//!
//! The engine consumes configuration but does not own its persistence; the
//! CLI loads it from `config.toml` in the user's config directory.

use crate::models::media::{ContentType, MediaType, MediaRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider names in priority order, per media type.
    pub priorities: BTreeMap<MediaType, Vec<String>>,
    /// Per-provider settings, keyed by provider name.
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Retry policy for transient provider errors.
    pub retry: RetryConfig,
    /// Cache time-to-live in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum number of candidates returned for disambiguation.
    pub max_candidates: usize,
    /// Naming settings.
    pub naming: NamingConfig,
    /// Executor settings.
    pub executor: ExecutorConfig,
}

/// Settings for one provider client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key or bearer token.
    pub api_key: Option<String>,
    /// Override for the service base URL.
    pub base_url: Option<String>,
    /// Timeout for one request attempt, in seconds.
    pub timeout_secs: u64,
    /// Rate limit.
    pub rate_limit: RateLimitConfig,
    /// Response language, where the provider supports one.
    pub language: Option<String>,
}

/// Token bucket settings: `requests` per `interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub interval_ms: u64,
    /// Callers allowed to wait for a token before new calls fail fast.
    pub max_queue: usize,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Naming templates and sanitization policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Templates keyed by content type (`movie`, `episode`, ...) or media
    /// type (`video`, `music`, ...). Content type wins.
    pub templates: BTreeMap<String, String>,
    /// Replacement for characters that are illegal in file names.
    pub safe_replacement: String,
}

/// Executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Whether to verify a SHA-256 checksum after cross-device copies.
    pub verify_checksum: bool,
    /// Always copy-verify-delete, even when a rename would work.
    pub always_copy: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut priorities = BTreeMap::new();
        priorities.insert(MediaType::Video, vec!["tmdb".to_string()]);
        priorities.insert(
            MediaType::Music,
            vec!["musicbrainz".to_string(), "deezer".to_string()],
        );
        priorities.insert(MediaType::Book, vec!["openlibrary".to_string()]);
        priorities.insert(MediaType::Game, vec!["rawg".to_string()]);

        let mut providers = BTreeMap::new();
        providers.insert(
            "tmdb".to_string(),
            ProviderConfig {
                api_key: std::env::var("TMDB_API_KEY").ok(),
                rate_limit: RateLimitConfig {
                    requests: 40,
                    interval_ms: 10_000,
                    max_queue: 64,
                },
                ..Default::default()
            },
        );
        providers.insert(
            "musicbrainz".to_string(),
            ProviderConfig {
                rate_limit: RateLimitConfig {
                    requests: 1,
                    interval_ms: 1000,
                    max_queue: 16,
                },
                ..Default::default()
            },
        );
        providers.insert("deezer".to_string(), ProviderConfig::default());
        providers.insert("openlibrary".to_string(), ProviderConfig::default());
        providers.insert(
            "rawg".to_string(),
            ProviderConfig {
                api_key: std::env::var("RAWG_API_KEY").ok(),
                ..Default::default()
            },
        );

        Self {
            priorities,
            providers,
            retry: RetryConfig::default(),
            cache_ttl_secs: 3600,
            max_candidates: 10,
            naming: NamingConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 10,
            rate_limit: RateLimitConfig::default(),
            language: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            interval_ms: 1000,
            max_queue: 32,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        let templates = [
            ("movie", "{title} ({year})/{title} ({year}){ext}"),
            ("series", "{title} ({year})/{title} ({year}){ext}"),
            (
                "episode",
                "{series}/Season {season}/{series} - S{season}E{episode}{ext}",
            ),
            ("album", "{artist}/{album} ({year})/{track:02} - {title}{ext}"),
            ("track", "{artist}/{album} ({year})/{track:02} - {title}{ext}"),
            ("book", "{author}/{title} ({year}){ext}"),
            ("game", "{title} ({year})/{title}{ext}"),
            ("dlc", "{title} ({year})/{title}{ext}"),
            ("video", "{title} ({year}){ext}"),
            ("music", "{title}{ext}"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            templates,
            safe_replacement: String::new(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            always_copy: false,
        }
    }
}

impl Config {
    /// Provider priority list for a media type.
    pub fn priority_for(&self, media_type: MediaType) -> &[String] {
        self.priorities
            .get(&media_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Settings for a provider, falling back to defaults.
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl ProviderConfig {
    /// Timeout for one HTTP attempt.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Upper bound for one provider call: every attempt, the backoff
    /// between attempts and one rate-limit interval per retry.
    pub fn call_budget(&self, retry: &RetryConfig) -> Duration {
        let backoff: Duration = (1..=retry.max_retries).map(|a| retry.delay_for(a)).sum();
        let refill = Duration::from_millis(self.rate_limit.interval_ms) * retry.max_retries;
        self.timeout() * (retry.max_retries + 1) + backoff + refill
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

impl NamingConfig {
    /// Template for a content type, falling back to its media type.
    pub fn template_for_content(&self, content_type: ContentType) -> Option<&str> {
        self.templates
            .get(content_type.as_str())
            .or_else(|| self.templates.get(content_type.media_type().as_str()))
            .map(String::as_str)
    }

    /// Template for a record.
    pub fn template_for(&self, record: &MediaRecord) -> Option<&str> {
        self.template_for_content(record.content_type)
    }
}

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_librarian")
}

/// Load configuration from file, falling back to defaults.
pub fn load_config() -> Config {
    let config_path = config_dir().join("config.toml");

    if config_path.exists() {
        match load_config_from(&config_path) {
            Ok(config) => return config,
            Err(e) => tracing::warn!("Ignoring config {:?}: {}", config_path, e),
        }
    }

    Config::default()
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &std::path::Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    // Environment keys fill in whatever the file leaves out.
    for (name, var) in [("tmdb", "TMDB_API_KEY"), ("rawg", "RAWG_API_KEY")] {
        if let Ok(key) = std::env::var(var) {
            let entry = config.providers.entry(name.to_string()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = Some(key);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.max_candidates, 10);
        assert_eq!(config.naming.safe_replacement, "");
        assert!(config.executor.verify_checksum);
        assert_eq!(config.priority_for(MediaType::Music), ["musicbrainz", "deezer"]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            cache_ttl_secs = 60

            [priorities]
            video = ["tmdb", "omdb"]

            [providers.tmdb]
            api_key = "secret"
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.max_candidates, 10);
        assert_eq!(config.priority_for(MediaType::Video), ["tmdb", "omdb"]);
        assert!(config.priority_for(MediaType::Game).is_empty());
        let tmdb = config.provider("tmdb");
        assert_eq!(tmdb.api_key.as_deref(), Some("secret"));
        assert_eq!(tmdb.timeout_secs, 5);
        assert_eq!(tmdb.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_call_budget_covers_every_attempt() {
        let provider = ProviderConfig {
            timeout_secs: 1,
            rate_limit: RateLimitConfig {
                requests: 1,
                interval_ms: 100,
                max_queue: 4,
            },
            ..Default::default()
        };
        let retry = RetryConfig {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 25,
        };

        // 4 attempts + (10 + 20 + 25) ms backoff + 3 refills
        assert_eq!(
            provider.call_budget(&retry),
            Duration::from_millis(4000 + 55 + 300)
        );
        assert!(provider.call_budget(&retry) > provider.timeout());
    }

    #[test]
    fn test_template_falls_back_to_media_type() {
        let mut naming = NamingConfig::default();
        naming.templates.remove("movie");
        assert_eq!(
            naming.template_for_content(ContentType::Movie),
            Some("{title} ({year}){ext}")
        );
        assert_eq!(
            naming.template_for_content(ContentType::Episode),
            Some("{series}/Season {season}/{series} - S{season}E{episode}{ext}")
        );
    }

    #[test]
    fn test_retry_delay_is_bounded() {
        let retry = RetryConfig {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(400));
        assert_eq!(retry.delay_for(8), Duration::from_millis(1000));
    }
}
