//! Mesh propagation: hash history and the flood engine.

pub mod engine;
pub mod history;

pub use engine::*;
pub use history::HashHistory;
