//! # Bot Module
//!
//! Discord front end of the queue engine.
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]:
//!
//! - `ready`: registers slash commands, applies the configured presence and
//!   performs the optional startup auto-join
//! - `interaction_create`: dispatches slash commands to [`handlers`]
//! - `voice_state_update`: releases the guild session when the bot is
//!   disconnected from voice by someone else
//!
//! All playback state lives in the [`GuildQueueRegistry`]; the bot only
//! translates Discord events into manager calls.

use anyhow::Result;
use parking_lot::RwLock;
use serenity::{
    all::{
        ActivityData, ChannelId, Context, EventHandler, GuildId, Interaction, OnlineStatus, Ready,
        ResumedEvent, VoiceState,
    },
    async_trait,
};
use std::{fmt, sync::Arc};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::GuildQueueRegistry,
    config::{ActivityKind, Config, PresenceConfig, PresenceStatus},
};

/// Estado de la conexión del bot con Discord
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotStatus {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotStatus::Disconnected => write!(f, "🔴 Desconectado"),
            BotStatus::Connecting => write!(f, "🟡 Conectando"),
            BotStatus::Connected => write!(f, "🟢 Conectado"),
            BotStatus::Error(message) => write!(f, "❌ Error: {}", message),
        }
    }
}

pub type SharedStatus = Arc<RwLock<BotStatus>>;

pub struct MusicBot {
    config: Arc<Config>,
    pub registry: Arc<GuildQueueRegistry>,
    status: SharedStatus,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, registry: Arc<GuildQueueRegistry>, status: SharedStatus) -> Self {
        Self {
            config,
            registry,
            status,
        }
    }

    pub fn status(&self) -> BotStatus {
        self.status.read().clone()
    }

    fn set_status(&self, status: BotStatus) {
        info!("🔄 Estado del bot: {}", status);
        *self.status.write() = status;
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Entra al canal de voz configurado para el arranque
    async fn auto_join(&self) {
        let Some(target) = self.config.auto_join else {
            return;
        };

        let guild_id = GuildId::new(target.guild_id);
        let channel_id = ChannelId::new(target.channel_id);
        let manager = self.registry.get_or_create(guild_id);

        match manager.join(channel_id).await {
            Ok(()) => info!("🔊 Auto-join al canal {} en guild {}", channel_id, guild_id),
            Err(e) => warn!("⚠️ Auto-join falló en guild {}: {}", guild_id, e),
        }
    }
}

fn presence_activity(presence: &PresenceConfig) -> ActivityData {
    let name = presence.name.clone();
    match presence.activity {
        ActivityKind::Playing => ActivityData::playing(name),
        ActivityKind::Listening => ActivityData::listening(name),
        ActivityKind::Watching => ActivityData::watching(name),
        ActivityKind::Competing => ActivityData::competing(name),
        ActivityKind::Custom => ActivityData::custom(name),
    }
}

fn online_status(status: PresenceStatus) -> OnlineStatus {
    match status {
        PresenceStatus::Online => OnlineStatus::Online,
        PresenceStatus::Idle => OnlineStatus::Idle,
        PresenceStatus::DoNotDisturb => OnlineStatus::DoNotDisturb,
        PresenceStatus::Invisible => OnlineStatus::Invisible,
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        self.set_status(BotStatus::Connected);

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        ctx.set_presence(
            Some(presence_activity(&self.config.presence)),
            online_status(self.config.presence.status),
        );

        self.auto_join().await;
    }

    async fn resume(&self, _ctx: Context, _resumed: ResumedEvent) {
        self.set_status(BotStatus::Connected);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Detectar si el bot fue desconectado
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            if let Some(manager) = self.registry.get(guild_id) {
                manager.leave().await;
            }
        }
    }
}
