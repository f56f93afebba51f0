//! # IRC Mesh
//!
//! A serverless IRC-style chat node. Nodes form a mesh over plain TCP and
//! flood every message to every peer they know; a history of content hashes
//! stops each message after it has crossed every node once.
//!
//! ## Features
//!
//! - **Flood Propagation**: Every new envelope is applied locally and relayed to all known peers
//! - **Duplicate Suppression**: SHA-256 content hashes, remembered for the life of the node
//! - **Membership Gossip**: Peers learn each other and the channel list from announcements
//! - **Channels**: Optional keys, invitations, private messages and away status
//! - **Localized Console**: English and French output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use irc_mesh::{console::StdoutConsole, App, NodeConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let app = App::bind(config, Arc::new(StdoutConsole)).await?;
//!     app.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`]: Wire envelope, content hash and TCP framing
//! - [`gossip`]: Hash history and the propagation engine
//! - [`network`]: Directory of known peers and channels
//! - [`commands`]: Console command parser and interpreter
//! - [`console`]: Output sink and localized strings
//! - [`utils`]: Configuration and error handling

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod commands;
pub mod console;
pub mod gossip;
pub mod network;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use app::{App, NodeStats};
pub use commands::{Command, CommandInterpreter, Flow};
pub use gossip::{IngestOutcome, NodeState, PropagationEngine, SelfState};
pub use network::{Directory, PeerId, PeerRecord};
pub use transport::{Envelope, EnvelopeHash, EnvelopeKind};
pub use utils::{NodeConfig, NodeError, Result};

/// Maximum inbound envelope size in bytes (1MB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default configuration values
pub mod defaults {
    /// Default host the node listens on and identifies itself with
    pub const DEFAULT_HOST: &str = "127.0.0.1";

    /// Default listening port
    pub const DEFAULT_PORT: u16 = 6667;

    /// Default bound on one peer exchange, in milliseconds
    pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 3000;

    /// Default pending connection queue length
    pub const DEFAULT_LISTEN_BACKLOG: u32 = 1024;
}
