//! Audio output: the shared mixer and its real/offline frontends.

pub mod mixer;
pub mod offline;
pub mod output;
