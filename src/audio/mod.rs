//! # Audio Module
//!
//! Per-guild playback engine.
//!
//! ### [`registry`] - Guild Registry
//! - Lazily creates one [`player::GuildMusicManager`] per guild, never evicts
//!
//! ### [`player`] - Guild Music Manager
//! - FIFO queue, current track and the `Idle`/`Playing` state machine
//! - Resolves tracks through the provider chain outside the state lock
//! - Generation counter discards stale resolutions and sink events
//!
//! ### [`session`] - Playback Session
//! - Wraps one guild's audio sink
//! - Reports ended/errored exactly once per track over an mpsc channel
//!
//! ### [`voice`] - Songbird Integration
//! - Voice connector and sink backed by songbird

pub mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod voice;

pub use player::{GuildMusicManager, GuildSnapshot, PlaybackState};
pub use registry::GuildQueueRegistry;
