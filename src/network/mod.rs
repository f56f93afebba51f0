//! Network view of the mesh.
//!
//! This module holds the peer and channel directory that every other layer
//! reads from: who to broadcast to, which nicknames and channels exist.

pub mod directory;

pub use directory::*;
