use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{MusicProvider, Playable, SourceKind, Track};
use crate::error::ProviderError;

const PROVIDER: &str = "lavalink";

/// Nodo relay de audio (API REST v4 de Lavalink) usado como último recurso
pub struct LavalinkRelay {
    client: reqwest::Client,
    base_url: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResult {
    Track(LlTrack),
    Playlist(LlPlaylist),
    Search(Vec<LlTrack>),
    Empty(serde_json::Value),
    Error(LlException),
}

#[derive(Debug, Deserialize)]
struct LlTrack {
    encoded: String,
    info: LlInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlInfo {
    title: String,
    author: String,
    length: u64,
    uri: Option<String>,
    artwork_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlPlaylist {
    tracks: Vec<LlTrack>,
}

#[derive(Debug, Deserialize)]
struct LlException {
    message: Option<String>,
    severity: String,
}

impl LavalinkRelay {
    pub fn new(client: reqwest::Client, host: &str, port: u16, password: String, secure: bool) -> Self {
        let scheme = if secure { "https" } else { "http" };
        info!("🎼 Relay Lavalink configurado en {}:{}", host, port);

        Self {
            client,
            base_url: format!("{}://{}:{}", scheme, host, port),
            password,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", &self.password)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(PROVIDER, response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::unavailable(PROVIDER, format!("respuesta ilegible: {}", e)))
    }
}

#[async_trait]
impl MusicProvider for LavalinkRelay {
    fn kind(&self) -> SourceKind {
        SourceKind::Lavalink
    }

    fn supports(&self, track: &Track) -> bool {
        matches!(track.playable(), Playable::Encoded(_))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ProviderError> {
        let identifier = if query.starts_with("http") {
            query.to_string()
        } else {
            format!("ytsearch:{}", query)
        };

        let result: LoadResult = self
            .get("/v4/loadtracks", &[("identifier", &identifier)])
            .await?;

        let tracks = match result {
            LoadResult::Track(track) => vec![track],
            LoadResult::Playlist(playlist) => playlist.tracks,
            LoadResult::Search(tracks) => tracks,
            LoadResult::Empty(_) => {
                warn!("No se encontraron resultados en Lavalink para: {}", query);
                Vec::new()
            }
            LoadResult::Error(exception) => return Err(exception_error(query, exception)),
        };

        Ok(tracks.into_iter().filter_map(into_track).take(limit).collect())
    }

    async fn stream(&self, track: &Track) -> Result<Playable, ProviderError> {
        let Playable::Encoded(encoded) = track.playable() else {
            return Ok(Playable::Resolver(track.url().to_string()));
        };

        let decoded: LlTrack = self
            .get("/v4/decodetrack", &[("encodedTrack", encoded)])
            .await?;

        decoded
            .info
            .uri
            .map(Playable::Resolver)
            .ok_or_else(|| ProviderError::not_found(PROVIDER, track.title().to_string()))
    }
}

fn into_track(track: LlTrack) -> Option<Track> {
    let uri = track.info.uri?;
    let mut result = Track::new(
        track.info.title,
        uri,
        SourceKind::Lavalink,
        Playable::Encoded(track.encoded),
    )
    .with_author(track.info.author)
    .with_duration(Duration::from_millis(track.info.length));

    if let Some(artwork) = track.info.artwork_url {
        result = result.with_thumbnail(artwork);
    }
    Some(result)
}

fn exception_error(query: &str, exception: LlException) -> ProviderError {
    let message = exception.message.unwrap_or_default();
    if exception.severity == "common" {
        ProviderError::not_found(PROVIDER, format!("{} ({})", query, message))
    } else {
        ProviderError::unavailable(PROVIDER, message)
    }
}
