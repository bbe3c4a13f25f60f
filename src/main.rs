use anyhow::Result;
use parking_lot::RwLock;
use serenity::{http::Http, prelude::*};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::{
    audio::{voice::SongbirdConnector, GuildQueueRegistry},
    bot::{BotStatus, MusicBot, SharedStatus},
    config::Config,
    sources::{
        auth::{AuthTokenManager, CredentialIssuer, StaticCredential},
        lavalink::LavalinkRelay,
        resolver::ProviderResolver,
        soundcloud::{FreeClientIdIssuer, SoundCloudProvider},
        youtube::YouTubeProvider,
        MusicProvider,
    },
};

const USER_AGENT: &str = concat!("resonance-bot/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("resonance_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Resonance v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    // Health check para Docker
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config.ytdlp_path).await;
    }

    info!("{}", config.summary());
    let config = Arc::new(config);

    // Cliente para APIs con timeout total; el de audio solo limita la conexión
    let api_client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout)
        .build()?;
    let stream_client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(config.http_timeout)
        .build()?;

    let resolver = Arc::new(build_resolver(&config, api_client));

    // songbird se crea antes que el cliente para compartirlo con el conector
    let songbird = Songbird::serenity();
    let ytdlp: &'static str = Box::leak(config.ytdlp_path.clone().into_boxed_str());
    let connector = Arc::new(SongbirdConnector::new(
        songbird.clone(),
        Arc::new(Http::new(&config.discord_token)),
        stream_client,
        ytdlp,
    ));

    let registry = Arc::new(GuildQueueRegistry::new(resolver, connector));
    let status: SharedStatus = Arc::new(RwLock::new(BotStatus::Connecting));
    let handler = MusicBot::new(config.clone(), registry, status.clone());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            *status.write() = BotStatus::Error(e.to_string());
            return Err(e.into());
        }
    };

    // Manejar señales de terminación
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("No se pudo registrar el manejador de Ctrl+C: {}", e);
            return;
        }
        info!("🛑 Recibida señal de terminación, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado, esperando eventos...");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar el cliente: {:?}", why);
        *status.write() = BotStatus::Error(why.to_string());
        return Err(why.into());
    }

    *status.write() = BotStatus::Disconnected;
    info!("👋 Resonance detenido");
    Ok(())
}

/// Arma la cadena de proveedores: SoundCloud como primario, yt-dlp y el
/// relay Lavalink (si está configurado) como respaldo.
fn build_resolver(config: &Config, client: reqwest::Client) -> ProviderResolver {
    let mut issuers: Vec<Arc<dyn CredentialIssuer>> = Vec::new();
    if let Some(client_id) = &config.soundcloud_client_id {
        issuers.push(Arc::new(StaticCredential::new(client_id.clone())));
    }
    issuers.push(Arc::new(FreeClientIdIssuer::new(client.clone())));
    let auth = Arc::new(AuthTokenManager::new(issuers));

    // Calentar la credencial sin bloquear el arranque
    let warm = auth.clone();
    tokio::spawn(async move {
        if warm.ensure_valid(false).await {
            info!("🔑 Credencial de SoundCloud lista");
        } else {
            warn!("⚠️ Sin credencial de SoundCloud al arrancar, se usarán los respaldos");
        }
    });

    let primary: Arc<dyn MusicProvider> =
        Arc::new(SoundCloudProvider::new(client.clone(), auth.clone()));

    let mut fallbacks: Vec<Arc<dyn MusicProvider>> = vec![Arc::new(YouTubeProvider::new(
        config.ytdlp_path.clone(),
        config.http_timeout,
    ))];
    if let Some(lavalink) = &config.lavalink {
        fallbacks.push(Arc::new(LavalinkRelay::new(
            client,
            &lavalink.host,
            lavalink.port,
            lavalink.password.clone(),
            lavalink.secure,
        )));
    }

    ProviderResolver::new(Some(primary), auth, fallbacks, config.search_limit)
}

async fn health_check(ytdlp_path: &str) -> Result<()> {
    info!("🏥 Ejecutando health check...");

    let output = async_process::Command::new(ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!("yt-dlp no está disponible");
    }

    info!(
        "✅ yt-dlp {} disponible",
        String::from_utf8_lossy(&output.stdout).trim()
    );
    info!("✅ Health check completado");
    Ok(())
}
