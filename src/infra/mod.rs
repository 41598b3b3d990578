//! I/O edges: the data repository, snapshot publishing and the local stores.

pub mod builder;
pub mod content;
pub mod progress;
pub mod publish;
pub mod server;
pub mod snapshot;
