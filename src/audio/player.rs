use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{
    queue::GuildQueue,
    session::{PlaybackSession, SessionEvent, SessionEventKind},
    voice::VoiceConnector,
};
use crate::{
    error::{ConnectionError, PlaybackError, TrackFailure},
    sources::{ProviderResolver, Track},
    ui::notification::{Notification, Notifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Vista de sólo lectura del estado de un servidor
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub state: PlaybackState,
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub queue_duration: Duration,
    pub joined: bool,
    pub consecutive_failures: u32,
}

struct GuildState {
    queue: GuildQueue,
    current: Option<Track>,
    playback: PlaybackState,
    // Cambia con cada avance, stop o leave; invalida resoluciones y
    // eventos del sink que lleguen tarde
    generation: u64,
    session: Option<PlaybackSession>,
    consecutive_failures: u32,
}

impl GuildState {
    /// Saca el siguiente track y lo convierte en el actual
    fn advance(&mut self) -> Option<(Track, u64)> {
        self.generation += 1;
        match self.queue.dequeue() {
            Some(track) => {
                self.current = Some(track.clone());
                self.playback = PlaybackState::Playing;
                Some((track, self.generation))
            }
            None => {
                self.current = None;
                self.playback = PlaybackState::Idle;
                None
            }
        }
    }
}

/// Cola, track actual y máquina de estados de un servidor.
///
/// Todo el estado mutable vive detrás de un único `tokio::sync::Mutex`. La
/// resolución de proveedores ocurre fuera del lock y su resultado se
/// descarta si la generación cambió mientras tanto.
pub struct GuildMusicManager {
    guild_id: GuildId,
    resolver: Arc<ProviderResolver>,
    connector: Arc<dyn VoiceConnector>,
    state: Mutex<GuildState>,
    notifier: RwLock<Option<Arc<dyn Notifier>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl GuildMusicManager {
    pub fn new(
        guild_id: GuildId,
        resolver: Arc<ProviderResolver>,
        connector: Arc<dyn VoiceConnector>,
    ) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            guild_id,
            resolver,
            connector,
            state: Mutex::new(GuildState {
                queue: GuildQueue::new(),
                current: None,
                playback: PlaybackState::Idle,
                generation: 0,
                session: None,
                consecutive_failures: 0,
            }),
            notifier: RwLock::new(None),
            events,
        });

        tokio::spawn(Self::event_loop(Arc::downgrade(&manager), rx));
        manager
    }

    async fn event_loop(manager: Weak<Self>, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.on_session_event(event).await;
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Canal donde se publican los avisos; gana el último en escribir
    pub fn set_notification_target(&self, notifier: Arc<dyn Notifier>) {
        *self.notifier.write() = Some(notifier);
    }

    /// Conecta al canal de voz. Si ya hay sesión no hace nada.
    pub async fn join(&self, channel_id: ChannelId) -> Result<(), ConnectionError> {
        let mut st = self.state.lock().await;
        if st.session.is_some() {
            debug!("Ya conectado en guild {}", self.guild_id);
            return Ok(());
        }

        let sink = self.connector.connect(self.guild_id, channel_id).await?;
        st.session = Some(PlaybackSession::new(sink, self.events.clone()));
        Ok(())
    }

    /// Agrega un track. Si no sonaba nada empieza a reproducirlo; si no,
    /// avisa de la posición en la cola.
    pub async fn add_to_queue(self: &Arc<Self>, track: Track) {
        let started = {
            let mut st = self.state.lock().await;
            let position = st.queue.enqueue(track.clone());

            if st.playback == PlaybackState::Idle {
                st.advance()
            } else {
                self.notify(Notification::queued(&track, position));
                None
            }
        };

        if let Some((track, generation)) = started {
            self.spawn_drive(track, generation).await;
        }
    }

    /// Salta al siguiente track; con la cola vacía detiene la salida.
    pub async fn play_next(self: &Arc<Self>) {
        let next = {
            let mut st = self.state.lock().await;
            let next = st.advance();
            if next.is_none() {
                if let Some(session) = st.session.as_mut() {
                    session.stop().await;
                }
            }
            next
        };

        if let Some((track, generation)) = next {
            self.spawn_drive(track, generation).await;
        }
    }

    /// Vacía la cola y detiene la reproducción. Idempotente.
    pub async fn stop(&self) {
        let mut st = self.state.lock().await;
        Self::halt(&mut st).await;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    /// `stop()` y además suelta la conexión de voz. Seguro sin haber
    /// hecho `join`.
    pub async fn leave(&self) {
        let mut st = self.state.lock().await;
        Self::halt(&mut st).await;
        if let Some(session) = st.session.take() {
            session.release().await;
            info!("👋 Sesión cerrada en guild {}", self.guild_id);
        }
    }

    pub async fn snapshot(&self) -> GuildSnapshot {
        let st = self.state.lock().await;
        GuildSnapshot {
            state: st.playback,
            current: st.current.clone(),
            queue: st.queue.tracks(),
            queue_duration: st.queue.total_duration(),
            joined: st.session.is_some(),
            consecutive_failures: st.consecutive_failures,
        }
    }

    async fn halt(st: &mut GuildState) {
        st.queue.clear();
        st.current = None;
        st.playback = PlaybackState::Idle;
        st.generation += 1;
        st.consecutive_failures = 0;
        if let Some(session) = st.session.as_mut() {
            session.stop().await;
        }
    }

    /// Corre `drive` en su propia tarea y la espera. Si el llamador se
    /// cancela, el track igual termina de resolverse o se descarta.
    async fn spawn_drive(self: &Arc<Self>, track: Track, generation: u64) {
        let manager = self.clone();
        if let Err(e) = tokio::spawn(async move { manager.drive(track, generation).await }).await {
            warn!("❌ Tarea de reproducción abortada en guild {}: {}", self.guild_id, e);
        }
    }

    /// Bucle de reproducción: resuelve y reproduce `track`; si falla avisa y
    /// sigue con el siguiente hasta que uno suene o la cola se vacíe.
    async fn drive(&self, mut track: Track, mut generation: u64) {
        loop {
            info!("🎵 Resolviendo: {}", track.title());
            let resolved = self.resolver.stream(&track).await;

            let mut st = self.state.lock().await;
            if st.generation != generation {
                debug!("Resolución de '{}' descartada (generación obsoleta)", track.title());
                return;
            }

            let outcome: Result<(), TrackFailure> = match resolved {
                Ok(playable) => match st.session.as_mut() {
                    Some(session) => session.play(generation, playable).await.map_err(Into::into),
                    None => Err(PlaybackError::NotConnected.into()),
                },
                Err(e) => Err(e.into()),
            };

            match outcome {
                Ok(()) => {
                    st.consecutive_failures = 0;
                    info!("▶️ Reproduciendo: {} en guild {}", track.title(), self.guild_id);
                    self.notify(Notification::now_playing(&track));
                    return;
                }
                Err(failure) => {
                    st.consecutive_failures += 1;
                    warn!(
                        "❌ No se pudo reproducir '{}' ({} fallos seguidos): {}",
                        track.title(),
                        st.consecutive_failures,
                        failure
                    );
                    self.notify(Notification::track_failed(&track, &failure));

                    match st.advance() {
                        Some((next, next_generation)) => {
                            track = next;
                            generation = next_generation;
                        }
                        None => {
                            if let Some(session) = st.session.as_mut() {
                                session.stop().await;
                            }
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn on_session_event(&self, event: SessionEvent) {
        let next = {
            let mut st = self.state.lock().await;
            if event.generation != st.generation || st.playback != PlaybackState::Playing {
                debug!("Evento obsoleto ignorado en guild {}", self.guild_id);
                return;
            }

            match &event.kind {
                SessionEventKind::Ended => {
                    debug!("🎵 Track terminado en guild {}", self.guild_id);
                }
                SessionEventKind::Errored(cause) => {
                    st.consecutive_failures += 1;
                    if let Some(track) = &st.current {
                        let failure = TrackFailure::from(PlaybackError::Sink(cause.clone()));
                        warn!("❌ Error durante la reproducción de '{}': {}", track.title(), cause);
                        self.notify(Notification::track_failed(track, &failure));
                    }
                }
            }

            st.advance()
        };

        match next {
            Some((track, generation)) => self.drive(track, generation).await,
            None => info!("📭 Cola terminada en guild {}", self.guild_id),
        }
    }

    fn notify(&self, notification: Notification) {
        let Some(notifier) = self.notifier.read().clone() else {
            debug!("Sin canal de avisos en guild {}", self.guild_id);
            return;
        };
        tokio::spawn(async move {
            notifier.notify(notification).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{testing::FakeSink, AudioSink};
    use crate::error::ProviderError;
    use crate::sources::{
        testing::track, AuthTokenManager, MusicProvider, Playable, SourceKind,
    };
    use crate::ui::notification::NotificationKind;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Proveedor guionizado: falla las URLs marcadas y puede bloquear una
    /// URL hasta que el test la libere.
    #[derive(Default)]
    struct ScriptedProvider {
        failing: HashSet<String>,
        gated: HashSet<String>,
        started: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl MusicProvider for ScriptedProvider {
        fn kind(&self) -> SourceKind {
            SourceKind::YouTube
        }

        fn supports(&self, _track: &Track) -> bool {
            true
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Track>, ProviderError> {
            Ok(Vec::new())
        }

        async fn stream(&self, track: &Track) -> Result<Playable, ProviderError> {
            if self.gated.contains(track.url()) {
                self.started.notify_one();
                self.gate.notified().await;
            }
            if self.failing.contains(track.url()) {
                return Err(ProviderError::unavailable("youtube", "video privado"));
            }
            Ok(Playable::StreamUrl(track.url().to_string()))
        }
    }

    struct FakeConnector {
        sink: Arc<FakeSink>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl VoiceConnector for FakeConnector {
        async fn connect(
            &self,
            _guild_id: GuildId,
            channel_id: ChannelId,
        ) -> Result<Arc<dyn AudioSink>, ConnectionError> {
            if channel_id == ChannelId::new(999) {
                return Err(ConnectionError::NotVoiceChannel(channel_id));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.sink.clone())
        }
    }

    struct ChannelNotifier(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify(&self, notification: Notification) {
            let _ = self.0.send(notification);
        }
    }

    struct Harness {
        manager: Arc<GuildMusicManager>,
        provider: Arc<ScriptedProvider>,
        sink: Arc<FakeSink>,
        connector: Arc<FakeConnector>,
        notifications: mpsc::UnboundedReceiver<Notification>,
    }

    impl Harness {
        fn new(provider: ScriptedProvider) -> Self {
            let provider = Arc::new(provider);
            let resolver = Arc::new(ProviderResolver::new(
                None,
                Arc::new(AuthTokenManager::new(Vec::new())),
                vec![provider.clone() as Arc<dyn MusicProvider>],
                5,
            ));
            let sink = Arc::new(FakeSink::default());
            let connector = Arc::new(FakeConnector {
                sink: sink.clone(),
                connects: AtomicUsize::new(0),
            });
            let manager = GuildMusicManager::new(GuildId::new(1), resolver, connector.clone());

            let (tx, notifications) = mpsc::unbounded_channel();
            manager.set_notification_target(Arc::new(ChannelNotifier(tx)));

            Self {
                manager,
                provider,
                sink,
                connector,
                notifications,
            }
        }

        async fn next_notification(&mut self) -> Notification {
            tokio::time::timeout(Duration::from_secs(2), self.notifications.recv())
                .await
                .expect("se esperaba un aviso")
                .expect("canal de avisos cerrado")
        }

        async fn wait_for_plays(&self, count: usize) {
            tokio::time::timeout(Duration::from_secs(2), async {
                while self.sink.played.lock().len() < count {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("el sink no recibió los tracks esperados");
        }

        async fn wait_for_state(&self, state: PlaybackState) {
            tokio::time::timeout(Duration::from_secs(2), async {
                while self.manager.snapshot().await.state != state {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("el manager no llegó al estado esperado");
        }
    }

    fn yt(name: &str) -> Track {
        track(name, &format!("https://www.youtube.com/watch?v={}", name), SourceKind::YouTube)
    }

    fn url(name: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", name)
    }

    #[tokio::test]
    async fn test_tracks_play_in_fifo_order() {
        let h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();

        h.manager.add_to_queue(yt("a")).await;
        h.manager.add_to_queue(yt("b")).await;
        h.manager.add_to_queue(yt("c")).await;
        assert_eq!(h.sink.played_urls(), vec![url("a")]);

        h.sink.last_reporter().unwrap().ended();
        h.wait_for_plays(2).await;
        h.sink.last_reporter().unwrap().ended();
        h.wait_for_plays(3).await;

        assert_eq!(h.sink.played_urls(), vec![url("a"), url("b"), url("c")]);

        h.sink.last_reporter().unwrap().ended();
        h.wait_for_state(PlaybackState::Idle).await;
        assert!(h.manager.snapshot().await.current.is_none());
    }

    #[tokio::test]
    async fn test_first_enqueue_starts_playback_and_later_ones_report_position() {
        let mut h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();

        h.manager.add_to_queue(yt("a")).await;
        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.current, Some(yt("a")));
        assert_eq!(h.next_notification().await.kind, NotificationKind::NowPlaying);

        h.manager.add_to_queue(yt("b")).await;
        h.manager.add_to_queue(yt("c")).await;

        let mut positions = Vec::new();
        for _ in 0..2 {
            let notification = h.next_notification().await;
            assert_eq!(notification.kind, NotificationKind::Queued);
            positions.push(notification.fields[1].1.clone());
        }
        positions.sort();
        assert_eq!(positions, vec!["#1", "#2"]);
    }

    #[tokio::test]
    async fn test_failed_resolution_advances_to_next_track() {
        let provider = ScriptedProvider {
            failing: HashSet::from([url("a")]),
            gated: HashSet::from([url("a")]),
            ..Default::default()
        };
        let mut h = Harness::new(provider);
        h.manager.join(ChannelId::new(10)).await.unwrap();

        let manager = h.manager.clone();
        let first = tokio::spawn(async move { manager.add_to_queue(yt("a")).await });
        h.provider.started.notified().await;

        h.manager.add_to_queue(yt("b")).await;
        assert_eq!(h.next_notification().await.kind, NotificationKind::Queued);

        h.provider.gate.notify_one();
        first.await.unwrap();

        let failure = h.next_notification().await;
        let now_playing = h.next_notification().await;
        let mut kinds = vec![failure.kind, now_playing.kind];
        kinds.sort_by_key(|k| *k as u8);
        assert_eq!(kinds, vec![NotificationKind::NowPlaying, NotificationKind::TrackFailed]);

        assert_eq!(h.sink.played_urls(), vec![url("b")]);
        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.current, Some(yt("b")));
        assert_eq!(snapshot.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_all_tracks_failing_ends_idle() {
        let provider = ScriptedProvider {
            failing: HashSet::from([url("a")]),
            ..Default::default()
        };
        let mut h = Harness::new(provider);
        h.manager.join(ChannelId::new(10)).await.unwrap();

        h.manager.add_to_queue(yt("a")).await;

        assert_eq!(h.next_notification().await.kind, NotificationKind::TrackFailed);
        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert_eq!(snapshot.consecutive_failures, 1);
        assert!(h.sink.played_urls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_resolution() {
        let provider = ScriptedProvider {
            gated: HashSet::from([url("a")]),
            ..Default::default()
        };
        let h = Harness::new(provider);
        h.manager.join(ChannelId::new(10)).await.unwrap();

        let manager = h.manager.clone();
        let pending = tokio::spawn(async move { manager.add_to_queue(yt("a")).await });
        h.provider.started.notified().await;
        h.manager.add_to_queue(yt("b")).await;

        h.manager.stop().await;
        h.provider.gate.notify_one();
        pending.await.unwrap();

        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.current.is_none());
        assert!(snapshot.queue.is_empty());
        assert!(h.sink.played_urls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_strand_current_track() {
        let provider = ScriptedProvider {
            gated: HashSet::from([url("a")]),
            ..Default::default()
        };
        let h = Harness::new(provider);
        h.manager.join(ChannelId::new(10)).await.unwrap();

        let manager = h.manager.clone();
        let caller = tokio::spawn(async move { manager.add_to_queue(yt("a")).await });
        h.provider.started.notified().await;
        caller.abort();
        let _ = caller.await;

        h.provider.gate.notify_one();
        h.wait_for_plays(1).await;

        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.current, Some(yt("a")));
        assert_eq!(h.sink.played_urls(), vec![url("a")]);
    }

    #[tokio::test]
    async fn test_second_track_starts_only_after_first_ends() {
        let mut h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();

        h.manager.add_to_queue(yt("a")).await;
        h.manager.add_to_queue(yt("b")).await;

        let mut kinds = vec![h.next_notification().await.kind, h.next_notification().await.kind];
        kinds.sort_by_key(|k| *k as u8);
        assert_eq!(kinds, vec![NotificationKind::Queued, NotificationKind::NowPlaying]);

        // Nada anuncia a "b" mientras "a" sigue sonando
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.notifications.try_recv().is_err());
        assert_eq!(h.manager.snapshot().await.queue, vec![yt("b")]);

        h.sink.last_reporter().unwrap().ended();

        let now_playing = h.next_notification().await;
        assert_eq!(now_playing.kind, NotificationKind::NowPlaying);
        assert_eq!(now_playing.description, "**b**");

        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.current, Some(yt("b")));
        assert!(snapshot.queue.is_empty());
        assert_eq!(snapshot.queue_duration, Duration::ZERO);
        assert_eq!(h.sink.played_urls(), vec![url("a"), url("b")]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_start_playback_once() {
        let h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();

        let adds: Vec<_> = (0..10)
            .map(|i| {
                let manager = h.manager.clone();
                tokio::spawn(async move { manager.add_to_queue(yt(&format!("t{}", i))).await })
            })
            .collect();
        for add in adds {
            add.await.unwrap();
        }

        assert_eq!(h.sink.played.lock().len(), 1);
        assert_eq!(h.manager.snapshot().await.queue.len(), 9);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_safe() {
        let h = Harness::new(ScriptedProvider::default());

        h.manager.leave().await;
        h.manager.leave().await;
        h.manager.stop().await;

        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(!snapshot.joined);
        assert!(!*h.sink.released.lock());
    }

    #[tokio::test]
    async fn test_leave_releases_sink_and_ignores_late_end() {
        let h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();
        h.manager.add_to_queue(yt("a")).await;
        h.manager.add_to_queue(yt("b")).await;

        let reporter = h.sink.last_reporter().unwrap();
        h.manager.leave().await;
        reporter.ended();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = h.manager.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(!snapshot.joined);
        assert!(*h.sink.released.lock());
        assert_eq!(h.sink.played_urls(), vec![url("a")]);
    }

    #[tokio::test]
    async fn test_enqueue_without_voice_reports_not_connected() {
        let mut h = Harness::new(ScriptedProvider::default());

        h.manager.add_to_queue(yt("a")).await;

        let notification = h.next_notification().await;
        assert_eq!(notification.kind, NotificationKind::TrackFailed);
        assert!(notification.description.contains("no está conectado"));
        assert_eq!(h.manager.snapshot().await.state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_rejects_text_channels() {
        let h = Harness::new(ScriptedProvider::default());

        let err = h.manager.join(ChannelId::new(999)).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotVoiceChannel(_)));

        h.manager.join(ChannelId::new(10)).await.unwrap();
        h.manager.join(ChannelId::new(11)).await.unwrap();
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
        assert!(h.manager.snapshot().await.joined);
    }

    #[tokio::test]
    async fn test_sink_error_notifies_and_advances() {
        let mut h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();
        h.manager.add_to_queue(yt("a")).await;
        h.manager.add_to_queue(yt("b")).await;

        h.sink.last_reporter().unwrap().errored("decoder roto");
        h.wait_for_plays(2).await;

        let failure = loop {
            let notification = h.next_notification().await;
            if notification.kind == NotificationKind::TrackFailed {
                break notification;
            }
        };
        assert!(failure.description.contains("decoder roto"));
        assert_eq!(h.sink.played_urls(), vec![url("a"), url("b")]);
    }

    #[tokio::test]
    async fn test_play_next_skips_and_halts_on_empty_queue() {
        let h = Harness::new(ScriptedProvider::default());
        h.manager.join(ChannelId::new(10)).await.unwrap();
        h.manager.add_to_queue(yt("a")).await;
        h.manager.add_to_queue(yt("b")).await;

        h.manager.play_next().await;
        assert_eq!(h.sink.played_urls(), vec![url("a"), url("b")]);

        h.manager.play_next().await;
        assert_eq!(h.manager.snapshot().await.state, PlaybackState::Idle);
        assert_eq!(*h.sink.stops.lock(), 1);
    }
}
