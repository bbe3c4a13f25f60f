use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::sources::Track;

/// Cola FIFO de un servidor. La posee en exclusiva su [`GuildMusicManager`].
///
/// [`GuildMusicManager`]: super::player::GuildMusicManager
#[derive(Debug, Default)]
pub struct GuildQueue {
    items: VecDeque<Track>,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final y devuelve la nueva longitud
    pub fn enqueue(&mut self, track: Track) -> usize {
        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        self.items.len()
    }

    /// Siguiente track en estricto orden FIFO
    pub fn dequeue(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => debug!("➡️ Siguiente en cola (FIFO): {}", track.title()),
            None => debug!("📭 Cola vacía, no hay siguiente track"),
        }
        next
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            info!("🗑️ Cola limpiada ({} tracks)", self.items.len());
        }
        self.items.clear();
    }

    /// Copia de los tracks pendientes, en orden de reproducción
    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(Track::duration).sum()
    }
}
