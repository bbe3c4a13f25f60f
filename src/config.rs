use anyhow::{Context, Result};
use std::{str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Proveedores
    pub soundcloud_client_id: Option<String>,
    pub search_limit: usize,
    pub http_timeout: Duration,
    pub ytdlp_path: String,
    pub lavalink: Option<LavalinkConfig>,

    // Arranque
    pub auto_join: Option<AutoJoin>,
    pub presence: PresenceConfig,
}

/// Nodo Lavalink opcional usado como relay de respaldo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LavalinkConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
}

/// Canal de voz al que entrar al arrancar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoJoin {
    pub guild_id: u64,
    pub channel_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    pub activity: ActivityKind,
    pub name: String,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
    Competing,
    Custom,
}

impl FromStr for ActivityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "playing" => Ok(Self::Playing),
            "listening" => Ok(Self::Listening),
            "watching" => Ok(Self::Watching),
            "competing" => Ok(Self::Competing),
            "custom" => Ok(Self::Custom),
            other => anyhow::bail!("Tipo de presencia desconocido: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Idle,
    DoNotDisturb,
    Invisible,
}

impl FromStr for PresenceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::DoNotDisturb),
            "invisible" => Ok(Self::Invisible),
            other => anyhow::bail!("Estado de presencia desconocido: {}", other),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables (el entorno en producción, un mapa en tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let lavalink = match var("LAVALINK_HOST") {
            Some(host) => Some(LavalinkConfig {
                host,
                port: var("LAVALINK_PORT")
                    .unwrap_or_else(|| "2333".to_string())
                    .parse()
                    .context("LAVALINK_PORT inválido")?,
                password: var("LAVALINK_PASSWORD").unwrap_or_else(|| "youshallnotpass".to_string()),
                secure: var("LAVALINK_SECURE")
                    .unwrap_or_else(|| "false".to_string())
                    .parse()
                    .context("LAVALINK_SECURE inválido")?,
            }),
            None => None,
        };

        let auto_join = match (var("AUTO_JOIN_GUILD_ID"), var("AUTO_JOIN_CHANNEL_ID")) {
            (Some(guild), Some(channel)) => Some(AutoJoin {
                guild_id: guild.parse().context("AUTO_JOIN_GUILD_ID inválido")?,
                channel_id: channel.parse().context("AUTO_JOIN_CHANNEL_ID inválido")?,
            }),
            _ => None,
        };

        let config = Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: var("APPLICATION_ID")
                .context("APPLICATION_ID no definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: var("GUILD_ID").and_then(|s| s.parse().ok()),

            // Proveedores
            soundcloud_client_id: var("SOUNDCLOUD_CLIENT_ID"),
            search_limit: match var("SEARCH_LIMIT") {
                Some(v) => v.parse().context("SEARCH_LIMIT inválido")?,
                None => defaults.search_limit,
            },
            http_timeout: match var("HTTP_TIMEOUT") {
                Some(v) => humantime::parse_duration(&v).context("HTTP_TIMEOUT inválido")?,
                None => defaults.http_timeout,
            },
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            lavalink,

            // Arranque
            auto_join,
            presence: PresenceConfig {
                activity: match var("PRESENCE_TYPE") {
                    Some(v) => v.parse()?,
                    None => defaults.presence.activity,
                },
                name: var("PRESENCE_NAME").unwrap_or(defaults.presence.name),
                status: match var("PRESENCE_STATUS") {
                    Some(v) => v.parse()?,
                    None => defaults.presence.status,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.search_limit == 0 || self.search_limit > 25 {
            anyhow::bail!("Search limit must be between 1 and 25, got: {}", self.search_limit);
        }

        if self.http_timeout < Duration::from_secs(1) {
            anyhow::bail!(
                "HTTP timeout too low, minimum 1s, got: {}",
                humantime::format_duration(self.http_timeout)
            );
        }

        if let Some(lavalink) = &self.lavalink {
            if lavalink.port == 0 {
                anyhow::bail!("Lavalink port must be greater than 0");
            }
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and passwords are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Providers: SoundCloud ({}), yt-dlp ({}), Lavalink ({})\n  \
            Search: {} results, {} HTTP timeout\n  \
            Auto-join: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            if self.soundcloud_client_id.is_some() { "client_id del operador" } else { "client_id público" },
            self.ytdlp_path,
            self.lavalink
                .as_ref()
                .map_or("desactivado".to_string(), |l| format!("{}:{}", l.host, l.port)),
            self.search_limit,
            humantime::format_duration(self.http_timeout),
            self.auto_join
                .map_or("no".to_string(), |a| format!("{}/{}", a.guild_id, a.channel_id)),
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
            application_id: 0,
            guild_id: None,

            soundcloud_client_id: None,
            search_limit: 5,
            http_timeout: Duration::from_secs(15),
            ytdlp_path: "yt-dlp".to_string(),
            lavalink: None,

            auto_join: None,
            presence: PresenceConfig {
                activity: ActivityKind::Listening,
                name: "/play".to_string(),
                status: PresenceStatus::Online,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(&[("DISCORD_TOKEN", "token"), ("APPLICATION_ID", "123")]).unwrap();

        assert_eq!(config.application_id, 123);
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.lavalink, None);
        assert_eq!(config.auto_join, None);
        assert_eq!(config.presence.activity, ActivityKind::Listening);
    }

    #[test]
    fn test_full_config() {
        let config = load(&[
            ("DISCORD_TOKEN", "token"),
            ("APPLICATION_ID", "123"),
            ("GUILD_ID", "456"),
            ("SOUNDCLOUD_CLIENT_ID", "abc"),
            ("SEARCH_LIMIT", "3"),
            ("HTTP_TIMEOUT", "30s"),
            ("LAVALINK_HOST", "lavalink.local"),
            ("LAVALINK_SECURE", "true"),
            ("AUTO_JOIN_GUILD_ID", "456"),
            ("AUTO_JOIN_CHANNEL_ID", "789"),
            ("PRESENCE_TYPE", "watching"),
            ("PRESENCE_STATUS", "dnd"),
        ])
        .unwrap();

        assert_eq!(config.guild_id, Some(456));
        assert_eq!(config.soundcloud_client_id.as_deref(), Some("abc"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(
            config.lavalink,
            Some(LavalinkConfig {
                host: "lavalink.local".to_string(),
                port: 2333,
                password: "youshallnotpass".to_string(),
                secure: true,
            })
        );
        assert_eq!(
            config.auto_join,
            Some(AutoJoin {
                guild_id: 456,
                channel_id: 789,
            })
        );
        assert_eq!(config.presence.activity, ActivityKind::Watching);
        assert_eq!(config.presence.status, PresenceStatus::DoNotDisturb);
        assert!(!config.summary().contains("token"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load(&[("APPLICATION_ID", "123")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("APPLICATION_ID", "abc")]).is_err());
        assert!(load(&[
            ("DISCORD_TOKEN", "t"),
            ("APPLICATION_ID", "1"),
            ("SEARCH_LIMIT", "0")
        ])
        .is_err());
        assert!(load(&[
            ("DISCORD_TOKEN", "t"),
            ("APPLICATION_ID", "1"),
            ("HTTP_TIMEOUT", "soon")
        ])
        .is_err());
        assert!(load(&[
            ("DISCORD_TOKEN", "t"),
            ("APPLICATION_ID", "1"),
            ("PRESENCE_TYPE", "dancing")
        ])
        .is_err());
    }

    #[test]
    fn test_auto_join_needs_both_ids() {
        let config = load(&[
            ("DISCORD_TOKEN", "t"),
            ("APPLICATION_ID", "1"),
            ("AUTO_JOIN_GUILD_ID", "456"),
        ])
        .unwrap();
        assert_eq!(config.auto_join, None);
    }
}
