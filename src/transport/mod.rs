//! Transport layer for the mesh.
//!
//! This module provides the wire envelope with its content hash and the
//! one-connection-per-envelope TCP framing.

pub mod protocol;
pub mod tcp;

pub use protocol::*;
pub use tcp::*;
