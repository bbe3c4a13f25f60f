use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{MusicProvider, Playable, SourceKind, Track};
use crate::error::ProviderError;

const PROVIDER: &str = "youtube";

/// Proveedor de respaldo basado en yt-dlp (búsqueda y extracción de audio)
pub struct YouTubeProvider {
    binary: String,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YouTubeProvider {
    pub fn new(binary: String, timeout: Duration) -> Self {
        Self {
            binary,
            timeout,
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Verifica si una URL es de YouTube
    pub fn is_youtube_url(url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|u| {
                u.host_str().map(|host| {
                    matches!(
                        host,
                        "www.youtube.com"
                            | "youtube.com"
                            | "youtu.be"
                            | "m.youtube.com"
                            | "music.youtube.com"
                    )
                })
            })
            .unwrap_or(false)
    }

    /// Ejecuta yt-dlp con un timeout; devuelve (éxito, stdout, stderr)
    async fn run(&self, args: &[&str]) -> Result<(bool, String, String), ProviderError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ProviderError::unavailable(PROVIDER, e.to_string()))?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ProviderError::unavailable(PROVIDER, "timeout de yt-dlp"))?
        .map_err(|e| ProviderError::unavailable(PROVIDER, format!("no se pudo ejecutar yt-dlp: {}", e)))?;

        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

#[async_trait]
impl MusicProvider for YouTubeProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    fn supports(&self, track: &Track) -> bool {
        track.source() == SourceKind::YouTube || Self::is_youtube_url(track.url())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ProviderError> {
        info!("🔍 Buscando con yt-dlp: {}", query);

        let target = if Self::is_youtube_url(query) {
            query.to_string()
        } else {
            format!("ytsearch{}:{}", limit.max(1), query)
        };

        let (success, stdout, stderr) = self
            .run(&[
                &target,
                "--dump-json",
                "--no-playlist",
                "--no-check-certificate",
                "--geo-bypass",
                "--quiet",
            ])
            .await?;

        // yt-dlp sale con error cuando no encuentra nada: eso es "sin resultados"
        if !success {
            warn!("⚠️ yt-dlp no encontró resultados para: {} ({})", query, stderr.trim());
            return Ok(Vec::new());
        }

        let tracks: Vec<Track> = parse_search_output(&stdout).into_iter().take(limit).collect();
        debug!("yt-dlp devolvió {} resultados", tracks.len());
        Ok(tracks)
    }

    async fn stream(&self, track: &Track) -> Result<Playable, ProviderError> {
        let (success, stdout, stderr) = self
            .run(&[
                "-f",
                "bestaudio/best",
                "--get-url",
                "--no-playlist",
                "--no-check-certificate",
                "--geo-bypass",
                "--no-warnings",
                track.url(),
            ])
            .await?;

        if !success {
            return Err(classify_failure(track.url(), &stderr));
        }

        let stream_url = stdout.lines().next().unwrap_or_default().trim().to_string();
        if stream_url.is_empty() {
            return Err(ProviderError::unavailable(PROVIDER, "yt-dlp no devolvió URL de stream"));
        }

        info!("🎯 URL de stream obtenida con yt-dlp para: {}", track.title());
        Ok(Playable::StreamUrl(stream_url))
    }
}

fn parse_search_output(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
        .filter_map(|info| {
            let url = info.webpage_url.or(info.url)?;
            let mut track = Track::new(
                info.title.unwrap_or_else(|| "Desconocido".to_string()),
                url.clone(),
                SourceKind::YouTube,
                Playable::Resolver(url),
            )
            .with_duration(Duration::from_secs_f64(info.duration.unwrap_or(0.0).max(0.0)));

            if let Some(author) = info.uploader.or(info.channel) {
                track = track.with_author(author);
            }
            if let Some(thumbnail) = info.thumbnail {
                track = track.with_thumbnail(thumbnail);
            }
            Some(track)
        })
        .collect()
}

fn classify_failure(url: &str, stderr: &str) -> ProviderError {
    let lower = stderr.to_lowercase();
    if lower.contains("sign in to confirm") || lower.contains("http error 403") {
        ProviderError::auth(PROVIDER, stderr.trim().to_string())
    } else if lower.contains("video unavailable") || lower.contains("not available") {
        ProviderError::not_found(PROVIDER, url.to_string())
    } else {
        ProviderError::unavailable(PROVIDER, stderr.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeProvider::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeProvider::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeProvider::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeProvider::is_youtube_url("https://example.com/video"));
        assert!(!YouTubeProvider::is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn test_parse_search_output() {
        let stdout = concat!(
            r#"{"title":"Song","duration":200.5,"uploader":"Band","thumbnail":"https://i.ytimg.com/a.jpg","webpage_url":"https://www.youtube.com/watch?v=a"}"#,
            "\n",
            "not json\n",
            r#"{"title":"Sin URL"}"#,
            "\n",
            r#"{"title":"Canal","channel":"Chan","url":"https://www.youtube.com/watch?v=b"}"#,
        );

        let tracks = parse_search_output(stdout);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title(), "Song");
        assert_eq!(tracks[0].author(), "Band");
        assert_eq!(tracks[0].duration(), Duration::from_millis(200_500));
        assert_eq!(tracks[0].duration_label(), "3:20");
        assert_eq!(tracks[1].author(), "Chan");
        assert_eq!(tracks[1].duration_label(), "0:00");
        assert_eq!(
            tracks[1].playable(),
            &Playable::Resolver("https://www.youtube.com/watch?v=b".to_string())
        );
    }

    #[test]
    fn test_failure_classification() {
        assert!(matches!(
            classify_failure("u", "ERROR: Sign in to confirm you're not a bot"),
            ProviderError::Auth { .. }
        ));
        assert!(matches!(
            classify_failure("u", "ERROR: Video unavailable"),
            ProviderError::NotFound { .. }
        ));
        assert!(matches!(
            classify_failure("u", "ERROR: unable to download webpage"),
            ProviderError::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let provider = YouTubeProvider::new(
            "definitely-not-a-real-yt-dlp-binary".to_string(),
            Duration::from_secs(5),
        );
        let err = provider.search("anything", 1).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
    }
}
