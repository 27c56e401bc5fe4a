use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Búsqueda
    pub ytdlp_path: String,
    pub resolve_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            guild_id: var("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            // Audio
            default_volume: match var("DEFAULT_VOLUME") {
                Some(v) => v.trim().parse().context("DEFAULT_VOLUME inválido")?,
                None => defaults.default_volume,
            },
            max_queue_size: match var("MAX_QUEUE_SIZE") {
                Some(v) => v.trim().parse().context("MAX_QUEUE_SIZE inválido")?,
                None => defaults.max_queue_size,
            },

            // Búsqueda
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            resolve_timeout_secs: match var("RESOLVE_TIMEOUT_SECS") {
                Some(v) => v.trim().parse().context("RESOLVE_TIMEOUT_SECS inválido")?,
                None => defaults.resolve_timeout_secs,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Queue size and resolve timeout must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: Guild {}\n  \
            Audio: {}% vol, {} max queue\n  \
            Search: {} ({}s timeout)",
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.ytdlp_path,
            self.resolve_timeout_secs,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,

            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&[("DISCORD_TOKEN", "abc")]).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.guild_id, None);
        assert_eq!(config.default_volume, 0.5);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("GUILD_ID", "123"),
            ("DEFAULT_VOLUME", "1.5"),
            ("MAX_QUEUE_SIZE", "20"),
            ("YTDLP_PATH", "  "),
        ])
        .unwrap();

        assert_eq!(config.guild_id, Some(123));
        assert_eq!(config.default_volume, 1.5);
        assert_eq!(config.max_queue_size, 20);
        assert_eq!(config.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("DEFAULT_VOLUME", "3.0")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("MAX_QUEUE_SIZE", "0")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("MAX_QUEUE_SIZE", "lots")]).is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = load(&[("DISCORD_TOKEN", "super-secret")]).unwrap();
        let summary = config.summary();

        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("global"));
        assert!(summary.contains("50% vol"));
    }
}
