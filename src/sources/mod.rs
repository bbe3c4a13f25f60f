//! # Sources Module
//!
//! Track model and provider adapters.
//!
//! Every external audio service is a [`MusicProvider`]. The
//! [`resolver::ProviderResolver`] chains them in priority order:
//!
//! 1. [`soundcloud::SoundCloudProvider`] - token-gated primary, credential
//!    managed by [`auth::AuthTokenManager`]
//! 2. [`youtube::YouTubeProvider`] - yt-dlp search/stream fallback
//! 3. [`lavalink::LavalinkRelay`] - optional dedicated relay node

pub mod auth;
pub mod lavalink;
pub mod resolver;
pub mod soundcloud;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;

use crate::error::ProviderError;

pub use auth::AuthTokenManager;
pub use resolver::ProviderResolver;

/// Trait común para todos los proveedores de música
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Tipo de fuente que produce este proveedor
    fn kind(&self) -> SourceKind;

    /// Indica si el proveedor puede hacer stream del track sin buscarlo de nuevo
    fn supports(&self, track: &Track) -> bool;

    /// Busca tracks, ordenados por relevancia
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ProviderError>;

    /// Convierte un track en algo reproducible por el sink
    async fn stream(&self, track: &Track) -> Result<Playable, ProviderError>;
}

/// Referencia opaca que el sink sabe reproducir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playable {
    /// Blob codificado por un nodo relay (Lavalink)
    Encoded(String),
    /// URL de audio directo (HTTP progresivo)
    StreamUrl(String),
    /// URL que yt-dlp debe resolver en el momento de reproducir
    Resolver(String),
}

/// Tipos de fuentes de música
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    SoundCloud,
    YouTube,
    Lavalink,
}

impl SourceKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::SoundCloud => "SoundCloud",
            SourceKind::YouTube => "YouTube",
            SourceKind::Lavalink => "Lavalink",
        }
    }
}

/// Representa un track de música. Inmutable una vez construido.
#[derive(Debug, Clone)]
pub struct Track {
    title: String,
    url: String,
    thumbnail: Option<String>,
    duration_ms: u64,
    author: String,
    requested_by: Option<UserId>,
    source: SourceKind,
    playable: Playable,
}

impl Track {
    pub fn new(title: String, url: String, source: SourceKind, playable: Playable) -> Self {
        Self {
            title,
            url,
            thumbnail: None,
            duration_ms: 0,
            author: "Desconocido".to_string(),
            requested_by: None,
            source,
            playable,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }
    pub fn source(&self) -> SourceKind {
        self.source
    }
    pub fn playable(&self) -> &Playable {
        &self.playable
    }

    // Setters
    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        if !thumbnail.is_empty() {
            self.thumbnail = Some(thumbnail);
        }
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_author(mut self, author: String) -> Self {
        if !author.trim().is_empty() {
            self.author = author;
        }
        self
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    /// Query compuesta usada para buscar el mismo track en otro proveedor
    pub fn fallback_query(&self) -> String {
        format!("{} {}", self.title, self.author)
    }

    /// Duración en formato `m:ss` (o `h:mm:ss`)
    pub fn duration_label(&self) -> String {
        format_duration(self.duration())
    }
}

/// Dos tracks son el mismo si comparten URL canónica
impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Track {}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
