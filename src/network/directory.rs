//! Local view of the mesh: known peers and known channels.
//!
//! The directory is a plain state container. It does no locking of its own;
//! the propagation engine keeps it behind a single `RwLock` so that every
//! operation below is applied entirely or not at all.

use crate::utils::{NetworkError, NodeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Name of the channel every node starts in
pub const DEFAULT_CHANNEL: &str = "default";

/// Identity of a node: the address its listener is bound to
///
/// On the wire this is the JSON array `["host", port]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct PeerId {
    /// Host name or IP address
    pub host: String,
    /// TCP port of the peer's listener
    pub port: u16,
}

impl PeerId {
    /// Create a peer identity
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<(String, u16)> for PeerId {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<PeerId> for (String, u16) {
    fn from(id: PeerId) -> Self {
        (id.host, id.port)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerId {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidAddress {
            address: s.to_string(),
        };
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid().into());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

/// What a node advertises about itself in `UpdatedNode` envelopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Display name
    pub nickname: String,
    /// Whether the user marked themselves away
    pub away: bool,
    /// Away message, present only while away
    pub away_msg: Option<String>,
    /// Channel the user is currently in
    pub current_channel: String,
    /// Host of the node's listener, as the node advertises it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port of the node's listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl PeerRecord {
    /// A present user sitting in the default channel
    pub fn new<S: Into<String>>(nickname: S) -> Self {
        Self {
            nickname: nickname.into(),
            away: false,
            away_msg: None,
            current_channel: DEFAULT_CHANNEL.to_string(),
            host: None,
            port: None,
        }
    }

    /// The same record, stamped with the listener address it describes
    #[must_use]
    pub fn located_at(mut self, id: &PeerId) -> Self {
        self.host = Some(id.host.clone());
        self.port = Some(id.port);
        self
    }
}

/// A named channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Shared secret required to join, if any
    pub key: Option<String>,
}

impl ChannelRecord {
    /// Create a channel record with an optional key
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }
}

/// Known peers and channels
#[derive(Debug, Clone)]
pub struct Directory {
    /// Peers by identity; seeds have no record until they announce themselves
    peers: HashMap<PeerId, Option<PeerRecord>>,
    /// Channels by name
    channels: HashMap<String, ChannelRecord>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// Create a directory holding only the default channel
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        channels.insert(DEFAULT_CHANNEL.to_string(), ChannelRecord::default());
        Self {
            peers: HashMap::new(),
            channels,
        }
    }

    /// Register a seed peer by address, keeping any record already known
    pub fn add_seed(&mut self, id: PeerId) {
        self.peers.entry(id).or_insert(None);
    }

    /// Replace the record of a peer. Returns true if the peer had no record before.
    pub fn upsert_peer(&mut self, id: PeerId, record: PeerRecord) -> bool {
        let previous = self.peers.insert(id, Some(record));
        !matches!(previous, Some(Some(_)))
    }

    /// Forget a peer
    pub fn remove_peer(&mut self, id: &PeerId) -> Option<PeerRecord> {
        self.peers.remove(id).flatten()
    }

    /// Record of a peer, if it has announced itself
    pub fn peer(&self, id: &PeerId) -> Option<&PeerRecord> {
        self.peers.get(id).and_then(Option::as_ref)
    }

    /// Whether the identity is known at all, seed or announced
    pub fn contains_peer(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    /// Every identity a broadcast should reach
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().cloned().collect()
    }

    /// Number of known peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Nicknames of every peer with a record, sorted
    pub fn list_peer_nicknames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records()
            .map(|(_, record)| record.nickname.clone())
            .collect();
        names.sort();
        names
    }

    /// Identity of the peer using a nickname
    pub fn find_peer_by_nickname(&self, nickname: &str) -> Option<PeerId> {
        self.records()
            .filter(|(_, record)| record.nickname == nickname)
            .map(|(id, _)| id.clone())
            .min()
    }

    /// Nickname of a peer, if it has announced itself
    pub fn nickname_of(&self, id: &PeerId) -> Option<&str> {
        self.peer(id).map(|record| record.nickname.as_str())
    }

    /// Create or replace a channel
    pub fn upsert_channel<S: Into<String>>(&mut self, name: S, record: ChannelRecord) {
        self.channels.insert(name.into(), record);
    }

    /// Look up a channel
    pub fn channel(&self, name: &str) -> Option<&ChannelRecord> {
        self.channels.get(name)
    }

    /// Whether a channel is known
    pub fn channel_exists(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Names of every known channel, sorted
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// All channels with their records
    pub fn channels(&self) -> impl Iterator<Item = (&String, &ChannelRecord)> {
        self.channels.iter()
    }

    /// Nicknames of the peers currently in a channel, sorted
    pub fn peers_in_channel(&self, channel: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .records()
            .filter(|(_, record)| record.current_channel == channel)
            .map(|(_, record)| record.nickname.clone())
            .collect();
        names.sort();
        names
    }

    fn records(&self) -> impl Iterator<Item = (&PeerId, &PeerRecord)> {
        self.peers
            .iter()
            .filter_map(|(id, record)| record.as_ref().map(|record| (id, record)))
    }
}
