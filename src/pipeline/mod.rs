//! The playback pipeline: wire messages, crossfade planning, the playback
//! scheduler, and the engine that routes events between them.

pub mod crossfade;
pub mod engine;
pub mod messages;
pub mod scheduler;
