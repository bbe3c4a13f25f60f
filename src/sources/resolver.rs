use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AuthTokenManager, MusicProvider, Playable, Track};
use crate::error::{ProviderError, ResolutionError};

/// Resuelve búsquedas y streams recorriendo los proveedores por prioridad.
///
/// El proveedor principal depende de una credencial: ante un fallo de tipo
/// auth/not-found se invalida, se fuerza un único refresh y se reintenta una
/// vez antes de pasar a los proveedores de respaldo.
pub struct ProviderResolver {
    primary: Option<Arc<dyn MusicProvider>>,
    auth: Arc<AuthTokenManager>,
    fallbacks: Vec<Arc<dyn MusicProvider>>,
    search_limit: usize,
}

impl ProviderResolver {
    pub fn new(
        primary: Option<Arc<dyn MusicProvider>>,
        auth: Arc<AuthTokenManager>,
        fallbacks: Vec<Arc<dyn MusicProvider>>,
        search_limit: usize,
    ) -> Self {
        Self {
            primary,
            auth,
            fallbacks,
            search_limit: search_limit.max(1),
        }
    }

    pub fn auth(&self) -> &AuthTokenManager {
        &self.auth
    }

    /// Nombres de los proveedores en orden de prioridad
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.primary
            .iter()
            .chain(self.fallbacks.iter())
            .map(|p| p.kind().display_name())
            .collect()
    }

    /// Busca candidatos. Sin resultados en ningún proveedor devuelve un
    /// vector vacío; sólo es error si todos los proveedores fallaron.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>, ResolutionError> {
        let limit = self.search_limit;
        let mut answered = false;

        if let Some(primary) = &self.primary {
            match self.heal(|| primary.search(query, limit)).await {
                Ok(Some(tracks)) if !tracks.is_empty() => return Ok(tracks),
                Ok(Some(_)) => answered = true,
                Ok(None) => {}
                Err(e) => return Err(ResolutionError::Provider(e)),
            }
        }

        for fallback in &self.fallbacks {
            let name = fallback.kind().display_name();
            match fallback.search(query, limit).await {
                Ok(tracks) if !tracks.is_empty() => {
                    info!("🔄 Resultados obtenidos con respaldo {}", name);
                    return Ok(tracks);
                }
                Ok(_) => {
                    debug!("{} sin resultados para: {}", name, query);
                    answered = true;
                }
                Err(e) if e.is_recoverable() => warn!("⚠️ Respaldo {} falló: {}", name, e),
                Err(e) => return Err(ResolutionError::Provider(e)),
            }
        }

        if answered {
            Ok(Vec::new())
        } else {
            Err(ResolutionError::ProviderExhausted(query.to_string()))
        }
    }

    /// Obtiene algo reproducible para `track`, probando el principal y
    /// después cada respaldo (directo o por búsqueda "título autor").
    pub async fn stream(&self, track: &Track) -> Result<Playable, ResolutionError> {
        if let Some(primary) = self.primary.as_ref().filter(|p| p.supports(track)) {
            match self.heal(|| primary.stream(track)).await {
                Ok(Some(playable)) => return Ok(playable),
                Ok(None) => {}
                Err(e) => return Err(ResolutionError::Provider(e)),
            }
        }

        for fallback in &self.fallbacks {
            let name = fallback.kind().display_name();
            match self.stream_with_fallback(fallback.as_ref(), track).await {
                Ok(Some(playable)) => {
                    info!("🔄 Stream de '{}' obtenido con respaldo {}", track.title(), name);
                    return Ok(playable);
                }
                Ok(None) => debug!("{} sin candidatos para '{}'", name, track.title()),
                Err(e) if e.is_recoverable() => warn!("⚠️ Respaldo {} falló: {}", name, e),
                Err(e) => return Err(ResolutionError::Provider(e)),
            }
        }

        warn!("❌ Ningún proveedor pudo reproducir: {}", track.title());
        Err(ResolutionError::ProviderExhausted(track.title().to_string()))
    }

    async fn stream_with_fallback(
        &self,
        provider: &dyn MusicProvider,
        track: &Track,
    ) -> Result<Option<Playable>, ProviderError> {
        if provider.supports(track) {
            return provider.stream(track).await.map(Some);
        }

        let query = track.fallback_query();
        let Some(candidate) = provider.search(&query, 1).await?.into_iter().next() else {
            return Ok(None);
        };
        provider.stream(&candidate).await.map(Some)
    }

    /// Llamada al proveedor principal con auto-reparación de la credencial.
    /// `Ok(None)` significa fallo recuperable: seguir con los respaldos.
    async fn heal<'a, T, F>(&self, call: F) -> Result<Option<T>, ProviderError>
    where
        F: Fn() -> BoxFuture<'a, Result<T, ProviderError>>,
    {
        if !self.auth.ensure_valid(false).await {
            warn!("🔐 Sin credencial para el proveedor principal, se omite");
            return Ok(None);
        }
        let epoch = self.auth.epoch();

        let err = match call().await {
            Ok(value) => return Ok(Some(value)),
            Err(e) if e.warrants_refresh() => e,
            Err(e) if e.is_recoverable() => {
                warn!("⚠️ Proveedor principal falló: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Sólo se refresca si la credencial rechazada sigue siendo la actual
        let refreshed = if self.auth.invalidate_if(epoch) {
            warn!("🔐 {}; forzando refresh de credencial", err);
            self.auth.ensure_valid(true).await
        } else {
            debug!("🔐 {}; ya hay una credencial más nueva, se reintenta con ella", err);
            self.auth.ensure_valid(false).await
        };
        if !refreshed {
            return Ok(None);
        }

        match call().await {
            Ok(value) => {
                info!("✅ Proveedor principal recuperado tras refresh");
                Ok(Some(value))
            }
            Err(e) if e.is_recoverable() => {
                warn!("⚠️ Proveedor principal sigue fallando tras refresh: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
