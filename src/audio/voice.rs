use async_trait::async_trait;
use serenity::{
    http::Http,
    model::{
        channel::{Channel, ChannelType},
        id::{ChannelId, GuildId},
    },
};
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{future::Future, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::session::{AudioSink, TrackReporter};
use crate::{
    error::{ConnectionError, PlaybackError},
    sources::Playable,
};

/// Abre conexiones de voz y entrega el sink correspondiente
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioSink>, ConnectionError>;
}

/// Conector sobre songbird
pub struct SongbirdConnector {
    songbird: Arc<Songbird>,
    http: Arc<Http>,
    client: reqwest::Client,
    ytdlp: &'static str,
}

impl SongbirdConnector {
    /// `client` no debe tener timeout total: se usa para descargar el audio.
    pub fn new(
        songbird: Arc<Songbird>,
        http: Arc<Http>,
        client: reqwest::Client,
        ytdlp: &'static str,
    ) -> Self {
        Self {
            songbird,
            http,
            client,
            ytdlp,
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn AudioSink>, ConnectionError> {
        let channel = self
            .http
            .get_channel(channel_id)
            .await
            .map_err(|e| ConnectionError::Attach(format!("canal {} inaccesible: {}", channel_id, e)))?;

        match channel {
            Channel::Guild(channel) if matches!(channel.kind, ChannelType::Voice | ChannelType::Stage) => {}
            _ => return Err(ConnectionError::NotVoiceChannel(channel_id)),
        }

        let call = join_or_cleanup(self.songbird.join(guild_id, channel_id), async {
            // Un join fallido deja la `Call` registrada en songbird
            if let Err(e) = self.songbird.remove(guild_id).await {
                debug!("Sin llamada que limpiar en guild {}: {}", guild_id, e);
            }
        })
        .await
        .map_err(|e| ConnectionError::Attach(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdSink {
            guild_id,
            call,
            songbird: self.songbird.clone(),
            client: self.client.clone(),
            ytdlp: self.ytdlp,
        }))
    }
}

/// Espera `join`; si falla ejecuta `cleanup` antes de devolver el error.
async fn join_or_cleanup<T, E>(
    join: impl Future<Output = Result<T, E>>,
    cleanup: impl Future<Output = ()>,
) -> Result<T, E> {
    match join.await {
        Ok(call) => Ok(call),
        Err(e) => {
            cleanup.await;
            Err(e)
        }
    }
}

/// Sink de audio sobre una `Call` de songbird
pub struct SongbirdSink {
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    songbird: Arc<Songbird>,
    client: reqwest::Client,
    ytdlp: &'static str,
}

impl SongbirdSink {
    fn input_for(&self, playable: Playable) -> Result<Input, PlaybackError> {
        match playable {
            Playable::StreamUrl(url) => Ok(HttpRequest::new(self.client.clone(), url).into()),
            Playable::Resolver(url) => {
                Ok(YoutubeDl::new_ytdl_like(self.ytdlp, self.client.clone(), url).into())
            }
            Playable::Encoded(blob) => Err(PlaybackError::Unsupported(format!(
                "blob de relay sin decodificar ({} bytes)",
                blob.len()
            ))),
        }
    }

    fn attach_events(&self, handle: &TrackHandle, reporter: TrackReporter) -> Result<(), PlaybackError> {
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    guild_id: self.guild_id,
                    reporter: reporter.clone(),
                },
            )
            .map_err(|e| PlaybackError::Sink(format!("Error al agregar event handler: {}", e)))?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    guild_id: self.guild_id,
                    reporter,
                },
            )
            .map_err(|e| PlaybackError::Sink(format!("Error al agregar event handler: {}", e)))
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(&self, playable: Playable, reporter: TrackReporter) -> Result<(), PlaybackError> {
        let input = self.input_for(playable)?;

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        if let Err(e) = self.attach_events(&handle, reporter) {
            let _ = handle.stop();
            return Err(e);
        }

        debug!("▶️ Track enviado al driver de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn stop(&self) {
        self.call.lock().await.stop();
        debug!("⏹️ Salida de audio detenida en guild {}", self.guild_id);
    }

    async fn release(&self) {
        if let Err(e) = self.songbird.remove(self.guild_id).await {
            warn!("Error al salir del canal de voz en guild {}: {}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

/// Handler para cuando termina una canción
struct TrackEndNotifier {
    guild_id: GuildId,
    reporter: TrackReporter,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("🎵 Track terminó en guild {}", self.guild_id);
        self.reporter.ended();
        None
    }
}

/// Handler para errores de tracks
struct TrackErrorNotifier {
    guild_id: GuildId,
    reporter: TrackReporter,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let cause = match ctx {
            EventContext::Track(tracks) => tracks
                .first()
                .map(|(state, _)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "error desconocido".to_string()),
            _ => "error desconocido".to_string(),
        };

        error!("❌ Error en track para guild {}: {}", self.guild_id, cause);
        self.reporter.errored(cause);
        None
    }
}
