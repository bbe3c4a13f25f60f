use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{error::PlaybackError, sources::Playable};

/// Salida de audio de un servidor (conexión de voz).
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Reemplaza inmediatamente lo que esté sonando. El sink debe avisar al
    /// `reporter` cuando el track termine o falle.
    async fn play(&self, playable: Playable, reporter: TrackReporter) -> Result<(), PlaybackError>;

    /// Detiene la salida sin soltar la conexión
    async fn stop(&self);

    /// Suelta la conexión de voz
    async fn release(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
    Ended,
    Errored(String),
}

/// Evento de ciclo de vida de un track, etiquetado con la generación para
/// la que se emitió.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: SessionEventKind,
}

/// Canal de aviso de un único track: entrega como mucho un evento.
#[derive(Clone)]
pub struct TrackReporter {
    generation: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    fired: Arc<AtomicBool>,
}

impl TrackReporter {
    pub fn new(generation: u64, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            generation,
            events,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ended(&self) {
        self.report(SessionEventKind::Ended);
    }

    pub fn errored(&self, cause: impl Into<String>) {
        self.report(SessionEventKind::Errored(cause.into()));
    }

    /// Descarta cualquier evento futuro de este track
    pub fn silence(&self) {
        self.fired.store(true, Ordering::SeqCst);
    }

    fn report(&self, kind: SessionEventKind) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        // El receptor desaparece al destruirse el manager
        let _ = self.events.send(SessionEvent {
            generation: self.generation,
            kind,
        });
    }
}

/// Sesión de reproducción de un servidor sobre un [`AudioSink`].
pub struct PlaybackSession {
    sink: Arc<dyn AudioSink>,
    events: mpsc::UnboundedSender<SessionEvent>,
    reporter: Option<TrackReporter>,
}

impl PlaybackSession {
    pub fn new(sink: Arc<dyn AudioSink>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            sink,
            events,
            reporter: None,
        }
    }

    /// Reproduce `playable` reemplazando el track actual. El track
    /// reemplazado no emite ningún evento.
    pub async fn play(&mut self, generation: u64, playable: Playable) -> Result<(), PlaybackError> {
        if let Some(previous) = self.reporter.take() {
            previous.silence();
        }

        let reporter = TrackReporter::new(generation, self.events.clone());
        self.sink.play(playable, reporter.clone()).await?;
        self.reporter = Some(reporter);
        Ok(())
    }

    /// Detiene la salida sin emitir `Ended`
    pub async fn stop(&mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.silence();
        }
        self.sink.stop().await;
    }

    pub async fn release(mut self) {
        self.stop().await;
        self.sink.release().await;
        debug!("🔌 Sesión de reproducción liberada");
    }
}
