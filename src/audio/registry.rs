use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::debug;

use super::{player::GuildMusicManager, voice::VoiceConnector};
use crate::sources::ProviderResolver;

/// Mapa global servidor -> manager. Los managers se crean al primer uso y
/// viven mientras viva el proceso.
pub struct GuildQueueRegistry {
    managers: DashMap<GuildId, Arc<GuildMusicManager>>,
    resolver: Arc<ProviderResolver>,
    connector: Arc<dyn VoiceConnector>,
}

impl GuildQueueRegistry {
    pub fn new(resolver: Arc<ProviderResolver>, connector: Arc<dyn VoiceConnector>) -> Self {
        Self {
            managers: DashMap::new(),
            resolver,
            connector,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildMusicManager> {
        self.managers
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Manager creado para guild {}", guild_id);
                GuildMusicManager::new(guild_id, self.resolver.clone(), self.connector.clone())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildMusicManager>> {
        self.managers.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn resolver(&self) -> &Arc<ProviderResolver> {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::AudioSink;
    use crate::error::ConnectionError;
    use crate::sources::AuthTokenManager;
    use async_trait::async_trait;
    use serenity::model::id::ChannelId;

    struct NoVoice;

    #[async_trait]
    impl VoiceConnector for NoVoice {
        async fn connect(
            &self,
            _guild_id: GuildId,
            channel_id: ChannelId,
        ) -> Result<Arc<dyn AudioSink>, ConnectionError> {
            Err(ConnectionError::NotVoiceChannel(channel_id))
        }
    }

    fn registry() -> GuildQueueRegistry {
        let resolver = Arc::new(ProviderResolver::new(
            None,
            Arc::new(AuthTokenManager::new(Vec::new())),
            Vec::new(),
            5,
        ));
        GuildQueueRegistry::new(resolver, Arc::new(NoVoice))
    }

    #[tokio::test]
    async fn test_one_manager_per_guild() {
        let registry = registry();
        assert!(registry.get(GuildId::new(1)).is_none());

        let first = registry.get_or_create(GuildId::new(1));
        let again = registry.get_or_create(GuildId::new(1));
        let other = registry.get_or_create(GuildId::new(2));

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(GuildId::new(2)).unwrap().guild_id(), GuildId::new(2));
    }

    #[tokio::test]
    async fn test_guilds_are_independent() {
        let registry = registry();
        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(2));

        a.stop().await;
        assert!(b.join(ChannelId::new(5)).await.is_err());
        assert!(!a.snapshot().await.joined);
    }
}
