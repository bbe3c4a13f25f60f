use async_trait::async_trait;
use serenity::{
    all::{Colour, Timestamp},
    builder::{CreateEmbed, CreateEmbedFooter, CreateMessage},
    http::Http,
    model::id::ChannelId,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::notification::{Notification, NotificationKind, Notifier};
use crate::{
    audio::{GuildSnapshot, PlaybackState},
    sources::{auth::CredentialOrigin, format_duration, Track},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Resonance";

/// Publica avisos como embeds en un canal de texto
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) {
        let embed = create_notification_embed(&notification);
        match self
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            Ok(_) => debug!("📨 Aviso enviado al canal {}", self.channel_id),
            Err(e) => warn!("No se pudo enviar aviso al canal {}: {}", self.channel_id, e),
        }
    }
}

fn notification_colour(kind: NotificationKind) -> Colour {
    match kind {
        NotificationKind::Queued => colors::SUCCESS_GREEN,
        NotificationKind::NowPlaying => colors::MUSIC_PURPLE,
        NotificationKind::TrackFailed => colors::ERROR_RED,
    }
}

/// Convierte un aviso del manager en embed
pub fn create_notification_embed(notification: &Notification) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(&notification.title)
        .description(&notification.description)
        .color(notification_colour(notification.kind));

    for (name, value) in &notification.fields {
        embed = embed.field(name, value, true);
    }

    if let Some(thumbnail) = &notification.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    if let Some(url) = &notification.url {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            notification.footer.as_deref().unwrap_or(STANDARD_FOOTER),
        ))
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(snapshot: &GuildSnapshot) -> CreateEmbed {
    let Some(track) = &snapshot.current else {
        return create_info_embed("Nada sonando", "💡 Usa `/play <canción>` para agregar música");
    };

    create_notification_embed(&Notification::now_playing(track))
        .field("📋 En cola", snapshot.queue.len().to_string(), true)
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &GuildSnapshot) -> CreateEmbed {
    const MAX_LISTED: usize = 10;

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.queue.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &snapshot.current {
        embed = embed.field("▶️ Reproduciendo", track_line(current), false);
    }

    if !snapshot.queue.is_empty() {
        let mut description = String::new();
        for (i, track) in snapshot.queue.iter().take(MAX_LISTED).enumerate() {
            description.push_str(&format!("**{}**. {}\n", i + 1, track_line(track)));
        }
        if snapshot.queue.len() > MAX_LISTED {
            description.push_str(&format!("… y {} más", snapshot.queue.len() - MAX_LISTED));
        }
        embed = embed.field("Próximas canciones", description, false);
    }

    embed
        .field(
            "Información",
            format!(
                "**Total:** {} canciones • **Duración:** {}",
                snapshot.queue.len(),
                format_duration(snapshot.queue_duration)
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

fn track_line(track: &Track) -> String {
    format!(
        "{} - {} `[{}]`",
        track.title(),
        track.author(),
        track.duration_label()
    )
}

/// Estado general del bot para `/status`
pub struct StatusReport<'a> {
    pub bot_status: &'a str,
    pub providers: Vec<&'static str>,
    pub credential: Option<CredentialOrigin>,
    pub active_guilds: usize,
    pub snapshot: Option<&'a GuildSnapshot>,
}

pub fn create_status_embed(report: &StatusReport<'_>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📊 Estado del Bot")
        .color(colors::INFO_BLUE)
        .field("🤖 Conexión", report.bot_status, true)
        .field("🔌 Proveedores", report.providers.join(" → "), true)
        .field("🔐 Credencial", credential_label(report.credential), true)
        .field("🏠 Servidores activos", report.active_guilds.to_string(), true);

    if let Some(snapshot) = report.snapshot {
        let state = match snapshot.state {
            PlaybackState::Playing => "▶️ Reproduciendo",
            PlaybackState::Idle => "⏸️ Inactivo",
        };
        embed = embed
            .field("🎵 Estado", state, true)
            .field("🔊 Voz", if snapshot.joined { "Conectado" } else { "Desconectado" }, true);

        if snapshot.consecutive_failures > 0 {
            embed = embed
                .field(
                    "⚠️ Fallos seguidos",
                    snapshot.consecutive_failures.to_string(),
                    true,
                )
                .color(colors::WARNING_ORANGE);
        }
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn credential_label(credential: Option<CredentialOrigin>) -> &'static str {
    match credential {
        Some(CredentialOrigin::Operator) => "✅ Válida (operador)",
        Some(CredentialOrigin::FreeIssued) => "✅ Válida (pública)",
        None => "⚠️ Sin credencial",
    }
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{testing::track, SourceKind};

    #[test]
    fn test_notification_colours() {
        assert_eq!(notification_colour(NotificationKind::Queued), colors::SUCCESS_GREEN);
        assert_eq!(notification_colour(NotificationKind::TrackFailed), colors::ERROR_RED);
    }

    #[test]
    fn test_track_line() {
        let track = track("Song", "https://a", SourceKind::YouTube)
            .with_duration(std::time::Duration::from_secs(75));
        assert_eq!(track_line(&track), "Song - Tester `[1:15]`");
    }

    #[test]
    fn test_credential_label() {
        assert_eq!(credential_label(None), "⚠️ Sin credencial");
        assert_eq!(
            credential_label(Some(CredentialOrigin::FreeIssued)),
            "✅ Válida (pública)"
        );
    }
}
