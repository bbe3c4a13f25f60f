use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::GuildMusicManager,
    bot::MusicBot,
    ui::embeds::{self, ChannelNotifier, StatusReport},
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "join" => handle_join(ctx, &command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await?,
        "status" => handle_status(ctx, &command, bot, guild_id).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que puede tomar tiempo
    defer(ctx, command).await?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_embed(
            ctx,
            command,
            embeds::create_error_embed("Sin canal de voz", "Debes estar en un canal de voz"),
        )
        .await;
    };

    let candidates = match bot.registry.resolver().search(&query).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("❌ Búsqueda fallida para '{}': {}", query, e);
            return edit_embed(
                ctx,
                command,
                embeds::create_error_embed("Proveedores no disponibles", &e.to_string()),
            )
            .await;
        }
    };

    let Some(track) = candidates.into_iter().next() else {
        return edit_embed(
            ctx,
            command,
            embeds::create_error_embed(
                "Sin resultados",
                &format!("No se encontraron resultados para: **{}**", query),
            ),
        )
        .await;
    };
    let track = track.with_requested_by(command.user.id);

    let manager = bot.registry.get_or_create(guild_id);
    if !join_and_target(ctx, command, &manager, voice_channel_id).await? {
        return Ok(());
    }

    edit_embed(
        ctx,
        command,
        embeds::create_success_embed(
            "Solicitud recibida",
            &format!("🎶 **{}** - {}", track.title(), track.author()),
        ),
    )
    .await?;

    manager.add_to_queue(track).await;
    Ok(())
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, command).await?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_embed(
            ctx,
            command,
            embeds::create_error_embed("Sin canal de voz", "Debes estar en un canal de voz"),
        )
        .await;
    };

    let manager = bot.registry.get_or_create(guild_id);
    if join_and_target(ctx, command, &manager, voice_channel_id).await? {
        edit_embed(
            ctx,
            command,
            embeds::create_success_embed("Conectado", &format!("🔊 Conectado a <#{}>", voice_channel_id)),
        )
        .await?;
    }
    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(manager) = bot.registry.get(guild_id) else {
        return respond_embed(ctx, command, nothing_playing()).await;
    };

    defer(ctx, command).await?;
    manager.play_next().await;
    edit_embed(
        ctx,
        command,
        embeds::create_success_embed("Saltado", "⏭️ Pasando a la siguiente canción"),
    )
    .await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    if let Some(manager) = bot.registry.get(guild_id) {
        manager.stop().await;
    }

    respond_embed(
        ctx,
        command,
        embeds::create_success_embed("Detenido", "⏹️ Reproducción detenida y cola limpiada"),
    )
    .await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    if let Some(manager) = bot.registry.get(guild_id) {
        manager.leave().await;
    }

    respond_embed(
        ctx,
        command,
        embeds::create_success_embed("Desconectado", "👋 Salí del canal de voz"),
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let embed = match bot.registry.get(guild_id) {
        Some(manager) => embeds::create_queue_embed(&manager.snapshot().await),
        None => nothing_playing(),
    };
    respond_embed(ctx, command, embed).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let embed = match bot.registry.get(guild_id) {
        Some(manager) => embeds::create_now_playing_embed(&manager.snapshot().await),
        None => nothing_playing(),
    };
    respond_embed(ctx, command, embed).await
}

async fn handle_status(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = match bot.registry.get(guild_id) {
        Some(manager) => Some(manager.snapshot().await),
        None => None,
    };
    let resolver = bot.registry.resolver();
    let bot_status = bot.status().to_string();

    let report = StatusReport {
        bot_status: &bot_status,
        providers: resolver.provider_names(),
        credential: resolver.auth().credential().map(|c| c.origin),
        active_guilds: bot.registry.len(),
        snapshot: snapshot.as_ref(),
    };
    respond_embed(ctx, command, embeds::create_status_embed(&report)).await
}

/// Conecta al canal de voz y fija el canal de avisos. Devuelve `false` si
/// ya se respondió al usuario con el error de conexión.
async fn join_and_target(
    ctx: &Context,
    command: &CommandInteraction,
    manager: &Arc<GuildMusicManager>,
    voice_channel_id: ChannelId,
) -> Result<bool> {
    if let Err(e) = manager.join(voice_channel_id).await {
        warn!("❌ No se pudo conectar en guild {}: {}", manager.guild_id(), e);
        edit_embed(
            ctx,
            command,
            embeds::create_error_embed("Error de conexión", &e.to_string()),
        )
        .await?;
        return Ok(false);
    }

    manager.set_notification_target(Arc::new(ChannelNotifier::new(
        ctx.http.clone(),
        command.channel_id,
    )));
    Ok(true)
}

fn nothing_playing() -> CreateEmbed {
    embeds::create_info_embed("Nada sonando", "💡 Usa `/play <canción>` para agregar música")
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn edit_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

/// Canal de voz en el que está el usuario, según la caché
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
