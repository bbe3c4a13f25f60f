//! User-facing output: structured notifications and their embed rendering.

pub mod embeds;
pub mod notification;
