use async_trait::async_trait;

use crate::{error::TrackFailure, sources::Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Queued,
    NowPlaying,
    TrackFailed,
}

/// Aviso estructurado que el manager publica en el canal de texto
/// asociado al servidor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
}

impl Notification {
    fn for_track(kind: NotificationKind, title: &str, track: &Track) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: format!("**{}**", track.title()),
            url: url_or_none(track.url()),
            thumbnail: track.thumbnail().map(str::to_string),
            fields: Vec::new(),
            footer: None,
        }
    }

    /// Track agregado a una cola que ya estaba sonando
    pub fn queued(track: &Track, position: usize) -> Self {
        let mut notification = Self::for_track(NotificationKind::Queued, "✅ Agregado a la cola", track);
        notification.fields = vec![
            ("⏱️ Duración".to_string(), track.duration_label()),
            ("📍 Posición".to_string(), format!("#{}", position)),
        ];
        notification.fields.extend(requester_field(track));
        notification
    }

    pub fn now_playing(track: &Track) -> Self {
        let mut notification = Self::for_track(NotificationKind::NowPlaying, "🎵 Reproduciendo Ahora", track);
        notification.fields = vec![
            ("🎤 Artista".to_string(), track.author().to_string()),
            ("⏱️ Duración".to_string(), track.duration_label()),
            ("🔗 Fuente".to_string(), track.source().display_name().to_string()),
        ];
        notification.fields.extend(requester_field(track));
        notification
    }

    pub fn track_failed(track: &Track, failure: &TrackFailure) -> Self {
        let mut notification = Self::for_track(NotificationKind::TrackFailed, "❌ Error al reproducir", track);
        notification.description = format!("**{}**\n{}", track.title(), failure);
        notification.footer = Some("⏭️ Pasando a la siguiente canción".to_string());
        notification
    }
}

fn url_or_none(url: &str) -> Option<String> {
    url.starts_with("http").then(|| url.to_string())
}

fn requester_field(track: &Track) -> Option<(String, String)> {
    track
        .requested_by()
        .map(|user| ("👤 Solicitado por".to_string(), format!("<@{}>", user)))
}

/// Destino de los avisos de un servidor
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publica el aviso. Los errores de entrega se registran y se descartan.
    async fn notify(&self, notification: Notification);
}
