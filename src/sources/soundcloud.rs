use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use super::auth::{CredentialIssuer, CredentialOrigin};
use super::{AuthTokenManager, MusicProvider, Playable, SourceKind, Track};
use crate::error::ProviderError;

const PROVIDER: &str = "soundcloud";
const API_BASE: &str = "https://api-v2.soundcloud.com";
const WEB_HOME: &str = "https://soundcloud.com/";

/// Cliente de la API v2 de SoundCloud. Todas las llamadas requieren un
/// `client_id` gestionado por [`AuthTokenManager`].
pub struct SoundCloudProvider {
    client: reqwest::Client,
    auth: Arc<AuthTokenManager>,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    collection: Vec<ScTrack>,
}

#[derive(Debug, Deserialize)]
struct ScTrack {
    title: Option<String>,
    permalink_url: Option<String>,
    artwork_url: Option<String>,
    duration: Option<u64>,
    user: Option<ScUser>,
    media: Option<ScMedia>,
}

#[derive(Debug, Deserialize)]
struct ScUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct ScMedia {
    #[serde(default)]
    transcodings: Vec<Transcoding>,
}

#[derive(Debug, Deserialize)]
struct Transcoding {
    url: String,
    format: TranscodingFormat,
}

#[derive(Debug, Deserialize)]
struct TranscodingFormat {
    protocol: String,
}

#[derive(Debug, Deserialize)]
struct StreamLocation {
    url: String,
}

impl SoundCloudProvider {
    pub fn new(client: reqwest::Client, auth: Arc<AuthTokenManager>) -> Self {
        Self {
            client,
            auth,
            api_base: API_BASE.to_string(),
        }
    }

    pub fn is_soundcloud_url(url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == "soundcloud.com" || h.ends_with(".soundcloud.com")))
            .unwrap_or(false)
    }

    fn client_id(&self) -> Result<String, ProviderError> {
        self.auth
            .credential()
            .map(|c| c.value)
            .ok_or_else(|| ProviderError::auth(PROVIDER, "sin client_id válido"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
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
impl MusicProvider for SoundCloudProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::SoundCloud
    }

    fn supports(&self, track: &Track) -> bool {
        track.source() == SourceKind::SoundCloud
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ProviderError> {
        let client_id = self.client_id()?;

        // URL directa: resolver el permalink en vez de buscar
        if Self::is_soundcloud_url(query) {
            info!("🔗 Resolviendo URL de SoundCloud: {}", query);
            let url = format!("{}/resolve", self.api_base);
            let item: ScTrack = self
                .get_json(&url, &[("url", query), ("client_id", &client_id)])
                .await?;
            return Ok(into_tracks(SearchResponse {
                collection: vec![item],
            }));
        }

        info!("🔍 Buscando en SoundCloud: {}", query);
        let limit = limit.to_string();
        let url = format!("{}/search/tracks", self.api_base);
        let response: SearchResponse = self
            .get_json(
                &url,
                &[("q", query), ("client_id", &client_id), ("limit", &limit)],
            )
            .await?;

        let tracks = into_tracks(response);
        debug!("SoundCloud devolvió {} tracks reproducibles", tracks.len());
        Ok(tracks)
    }

    async fn stream(&self, track: &Track) -> Result<Playable, ProviderError> {
        let media_url = match track.playable() {
            Playable::Resolver(url) => url,
            Playable::StreamUrl(url) => return Ok(Playable::StreamUrl(url.clone())),
            Playable::Encoded(_) => {
                return Err(ProviderError::not_found(PROVIDER, track.url().to_string()))
            }
        };

        let client_id = self.client_id()?;
        let location: StreamLocation = self
            .get_json(media_url, &[("client_id", &client_id)])
            .await?;

        info!("🎯 Stream directo de SoundCloud para: {}", track.title());
        Ok(Playable::StreamUrl(location.url))
    }
}

/// Convierte la respuesta de búsqueda en tracks; descarta los que no tienen
/// transcodificación progresiva (HLS no lo reproduce el sink).
fn into_tracks(response: SearchResponse) -> Vec<Track> {
    response
        .collection
        .into_iter()
        .filter_map(|item| {
            let media_url = item
                .media?
                .transcodings
                .into_iter()
                .find(|t| t.format.protocol == "progressive")?
                .url;

            let mut track = Track::new(
                item.title.unwrap_or_else(|| "Desconocido".to_string()),
                item.permalink_url?,
                SourceKind::SoundCloud,
                Playable::Resolver(media_url),
            )
            .with_duration(Duration::from_millis(item.duration.unwrap_or(0)));

            if let Some(user) = item.user {
                track = track.with_author(user.username);
            }
            if let Some(artwork) = item.artwork_url {
                track = track.with_thumbnail(artwork);
            }
            Some(track)
        })
        .collect()
}

/// Obtiene el `client_id` público que usa la web de SoundCloud
pub struct FreeClientIdIssuer {
    client: reqwest::Client,
}

impl FreeClientIdIssuer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialIssuer for FreeClientIdIssuer {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::FreeIssued
    }

    async fn issue(&self) -> Result<String> {
        let html = self
            .client
            .get(WEB_HOME)
            .send()
            .await
            .context("Error en request a soundcloud.com")?
            .error_for_status()?
            .text()
            .await?;

        // El client_id suele estar en el último bundle
        for script in script_urls(&html)?.iter().rev() {
            let body = match self.client.get(script).send().await {
                Ok(response) => response.text().await.unwrap_or_default(),
                Err(e) => {
                    debug!("Bundle {} inaccesible: {}", script, e);
                    continue;
                }
            };

            if let Some(client_id) = extract_client_id(&body)? {
                info!("🆓 client_id público de SoundCloud obtenido");
                return Ok(client_id);
            }
        }

        anyhow::bail!("No se encontró client_id en los bundles de SoundCloud")
    }
}

fn script_urls(html: &str) -> Result<Vec<String>> {
    let re = Regex::new(r#"<script crossorigin src="(https://[^"]+\.js)""#)?;
    Ok(re
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect())
}

fn extract_client_id(script: &str) -> Result<Option<String>> {
    let re = Regex::new(r#"client_id\s*:\s*"([A-Za-z0-9]+)""#)?;
    Ok(re.captures(script).map(|caps| caps[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "collection": [
            {
                "title": "Lo-fi Beat",
                "permalink_url": "https://soundcloud.com/artist/lofi-beat",
                "artwork_url": "https://i1.sndcdn.com/artworks-1.jpg",
                "duration": 183000,
                "user": { "username": "artist" },
                "media": { "transcodings": [
                    { "url": "https://api-v2.soundcloud.com/media/1/hls", "format": { "protocol": "hls" } },
                    { "url": "https://api-v2.soundcloud.com/media/1/progressive", "format": { "protocol": "progressive" } }
                ] }
            },
            {
                "title": "Solo HLS",
                "permalink_url": "https://soundcloud.com/artist/hls-only",
                "duration": 1000,
                "media": { "transcodings": [
                    { "url": "https://api-v2.soundcloud.com/media/2/hls", "format": { "protocol": "hls" } }
                ] }
            }
        ]
    }"#;

    #[test]
    fn test_search_keeps_progressive_tracks() {
        let response: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let tracks = into_tracks(response);

        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.title(), "Lo-fi Beat");
        assert_eq!(track.author(), "artist");
        assert_eq!(track.duration(), Duration::from_millis(183_000));
        assert_eq!(track.thumbnail(), Some("https://i1.sndcdn.com/artworks-1.jpg"));
        assert_eq!(
            track.playable(),
            &Playable::Resolver("https://api-v2.soundcloud.com/media/1/progressive".to_string())
        );
    }

    #[test]
    fn test_empty_collection() {
        let response: SearchResponse = serde_json::from_str(r#"{"collection": []}"#).unwrap();
        assert!(into_tracks(response).is_empty());
    }

    #[test]
    fn test_client_id_scraping() {
        let html = r#"<script crossorigin src="https://a-v2.sndcdn.com/assets/0-abc.js"></script>
            <script crossorigin src="https://a-v2.sndcdn.com/assets/49-def.js"></script>"#;
        assert_eq!(
            script_urls(html).unwrap(),
            vec![
                "https://a-v2.sndcdn.com/assets/0-abc.js".to_string(),
                "https://a-v2.sndcdn.com/assets/49-def.js".to_string(),
            ]
        );

        let bundle = r#"n.a={env:"production",client_id:"aBcD1234eFgH5678iJkL9012mNoP3456",x:1}"#;
        assert_eq!(
            extract_client_id(bundle).unwrap().as_deref(),
            Some("aBcD1234eFgH5678iJkL9012mNoP3456")
        );
        assert_eq!(extract_client_id("var x = 1;").unwrap(), None);
    }

    #[test]
    fn test_soundcloud_url_detection() {
        assert!(SoundCloudProvider::is_soundcloud_url(
            "https://soundcloud.com/artist/track"
        ));
        assert!(SoundCloudProvider::is_soundcloud_url("https://m.soundcloud.com/a/b"));
        assert!(!SoundCloudProvider::is_soundcloud_url("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_requests_fail_as_auth_without_credential() {
        let auth = Arc::new(AuthTokenManager::new(Vec::new()));
        let provider = SoundCloudProvider::new(reqwest::Client::new(), auth);

        let err = provider.search("anything", 5).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
    }
}
