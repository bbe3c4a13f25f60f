//! Error taxonomy for the queue engine.
//!
//! Provider adapters report [`ProviderError`]; the resolver turns those into
//! [`ResolutionError`]; the voice layer reports [`ConnectionError`] and
//! [`PlaybackError`]. Per-track failures are folded into [`TrackFailure`] by
//! the guild manager and never leave it as errors.

use serenity::model::id::ChannelId;
use thiserror::Error;

/// Fallo de un proveedor concreto (SoundCloud, yt-dlp, Lavalink).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// La credencial fue rechazada o expiró (HTTP 401/403).
    #[error("{provider}: credencial rechazada ({reason})")]
    Auth {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider}: sin resultados para {what}")]
    NotFound { provider: &'static str, what: String },

    /// El servicio no respondió o devolvió algo inutilizable.
    #[error("{provider}: no disponible ({reason})")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn auth(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Auth {
            provider,
            reason: reason.into(),
        }
    }

    pub fn not_found(provider: &'static str, what: impl Into<String>) -> Self {
        Self::NotFound {
            provider,
            what: what.into(),
        }
    }

    pub fn unavailable(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            reason: reason.into(),
        }
    }

    /// Errores que disparan refresh/fallback. `Other` se propaga tal cual.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Errores que justifican forzar un refresh de la credencial.
    pub fn warrants_refresh(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::NotFound { .. })
    }

    /// Clasifica un status HTTP de la API de un proveedor.
    pub fn from_status(provider: &'static str, status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::auth(provider, status.to_string()),
            404 => Self::not_found(provider, status.to_string()),
            _ => Self::unavailable(provider, status.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("ningún proveedor pudo resolver \"{0}\"")]
    ProviderExhausted(String),

    #[error(transparent)]
    Provider(ProviderError),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("el canal {0} no es un canal de voz")]
    NotVoiceChannel(ChannelId),

    #[error("no se pudo conectar al canal de voz: {0}")]
    Attach(String),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("el bot no está conectado a un canal de voz")]
    NotConnected,

    #[error("referencia no reproducible: {0}")]
    Unsupported(String),

    #[error("fallo en el sink de audio: {0}")]
    Sink(String),
}

/// Fallo de un track individual; el manager lo convierte en aviso + avance.
#[derive(Debug, Error)]
pub enum TrackFailure {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
