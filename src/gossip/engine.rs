//! Flood propagation with hash-based duplicate suppression.
//!
//! Every envelope a node sees for the first time is applied locally and then
//! sent, unchanged, to every peer in the directory. A hash already in the
//! history is dropped on arrival, which is what stops the flood: each node
//! relays a given envelope at most once.
//!
//! Locks on the directory, self state and history are only held for the
//! duration of a read or a mutation, never while talking to the network.

use crate::console::{Console, Strings, Text};
use crate::gossip::HashHistory;
use crate::network::{ChannelRecord, Directory, PeerId, PeerRecord, DEFAULT_CHANNEL};
use crate::transport::{send_frame, Envelope, EnvelopeHash, EnvelopeKind};
use crate::utils::{NodeConfig, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// This node's own view of itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfState {
    /// Identity the node listens on
    pub id: PeerId,
    /// What the node advertises
    pub record: PeerRecord,
}

impl SelfState {
    /// A present user in the default channel
    pub fn new<S: Into<String>>(id: PeerId, nickname: S) -> Self {
        let record = PeerRecord::new(nickname).located_at(&id);
        Self { id, record }
    }

    /// Envelope kind publishing this state
    pub fn update(&self) -> EnvelopeKind {
        EnvelopeKind::UpdatedNode {
            node: self.id.clone(),
            record: self.record.clone(),
        }
    }
}

/// Shared mutable state of one node
///
/// Each resource has its own lock. Self state is swapped as a whole
/// `Arc`, so readers always see a consistent snapshot.
#[derive(Debug)]
pub struct NodeState {
    local: RwLock<Arc<SelfState>>,
    directory: RwLock<Directory>,
    history: Mutex<HashHistory>,
}

impl NodeState {
    /// Create the state of a node
    pub fn new(local: SelfState, directory: Directory) -> Self {
        Self {
            local: RwLock::new(Arc::new(local)),
            directory: RwLock::new(directory),
            history: Mutex::new(HashHistory::new()),
        }
    }

    /// Snapshot of the self state
    pub async fn local(&self) -> Arc<SelfState> {
        Arc::clone(&*self.local.read().await)
    }

    /// Replace the self state with a value derived from the current one
    pub async fn update_local<F>(&self, update: F) -> Arc<SelfState>
    where
        F: FnOnce(&SelfState) -> SelfState,
    {
        let mut local = self.local.write().await;
        let next = Arc::new(update(&local));
        *local = Arc::clone(&next);
        next
    }

    /// Read access to the directory
    pub async fn directory(&self) -> RwLockReadGuard<'_, Directory> {
        self.directory.read().await
    }

    /// Write access to the directory
    pub async fn directory_mut(&self) -> RwLockWriteGuard<'_, Directory> {
        self.directory.write().await
    }

    /// Record a hash. Returns false if it was already seen.
    pub async fn remember(&self, hash: EnvelopeHash) -> bool {
        self.history.lock().await.insert(hash)
    }

    /// Number of distinct envelopes seen
    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }
}

/// Tuning of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Bound on delivering one envelope to one peer
    pub connection_timeout: Duration,
    /// Announce self state when a new peer shows up
    pub announce_on_discovery: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_millis(
                crate::defaults::DEFAULT_CONNECTION_TIMEOUT_MS,
            ),
            announce_on_discovery: true,
        }
    }
}

impl From<&NodeConfig> for EngineSettings {
    fn from(config: &NodeConfig) -> Self {
        Self {
            connection_timeout: config.network.connection_timeout(),
            announce_on_discovery: config.gossip.announce_on_discovery,
        }
    }
}

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers that accepted the envelope
    pub delivered: usize,
    /// Peers that could not be reached in time
    pub failed: usize,
}

impl BroadcastReport {
    /// Sum of two reports
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            delivered: self.delivered + other.delivered,
            failed: self.failed + other.failed,
        }
    }
}

/// What `ingest` did with an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Hash already seen; nothing happened
    Duplicate,
    /// Applied and delivered here; not relayed further
    Consumed,
    /// Applied and relayed to known peers
    Relayed(BroadcastReport),
}

/// Local effect of an envelope
#[derive(Clone, Copy)]
struct Effect {
    relay: bool,
    discovered: bool,
}

/// The propagation engine of one node
pub struct PropagationEngine {
    state: Arc<NodeState>,
    console: Arc<dyn Console>,
    strings: Strings,
    settings: EngineSettings,
}

impl PropagationEngine {
    /// Create an engine over a node's state
    pub fn new(
        state: Arc<NodeState>,
        console: Arc<dyn Console>,
        strings: Strings,
        settings: EngineSettings,
    ) -> Self {
        Self {
            state,
            console,
            strings,
            settings,
        }
    }

    /// Shared node state
    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    /// Console lines are written to
    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    /// Text renderer
    pub fn strings(&self) -> Strings {
        self.strings
    }

    /// Process an inbound envelope
    ///
    /// Applies it at most once, then relays it to every known peer unless
    /// it was an invitation addressed to this very node.
    pub async fn ingest(&self, envelope: Envelope) -> IngestOutcome {
        if !self.state.remember(envelope.hash().clone()).await {
            log::trace!("Dropping already seen {} {}", envelope.type_name(), envelope.hash());
            return IngestOutcome::Duplicate;
        }
        log::debug!(
            "Ingesting {} {} from {}",
            envelope.type_name(),
            envelope.hash(),
            envelope.sender()
        );

        let effect = self.apply(&envelope).await;

        let outcome = if effect.relay {
            IngestOutcome::Relayed(self.broadcast(&envelope).await)
        } else {
            IngestOutcome::Consumed
        };

        if effect.discovered && self.settings.announce_on_discovery {
            if let Err(e) = self.announce().await {
                log::warn!("Failed to announce to new peer: {}", e);
            }
        }

        outcome
    }

    /// Build, record and broadcast a new envelope from this node
    pub async fn originate(&self, kind: EnvelopeKind) -> Result<BroadcastReport> {
        let local = self.state.local().await;
        let envelope = Envelope::originate(kind, local.id.clone())?;
        self.state.remember(envelope.hash().clone()).await;
        log::debug!("Originating {} {}", envelope.type_name(), envelope.hash());
        Ok(self.broadcast(&envelope).await)
    }

    /// Publish self state and every non-default channel
    pub async fn announce(&self) -> Result<BroadcastReport> {
        let update = self.state.local().await.update();
        let mut channels: Vec<(String, ChannelRecord)> = self
            .state
            .directory()
            .await
            .channels()
            .filter(|(name, _)| name.as_str() != DEFAULT_CHANNEL)
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect();
        channels.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = self.originate(update).await?;
        for (name, record) in channels {
            let sent = self
                .originate(EnvelopeKind::NewChannel { name, record })
                .await?;
            report = report.merge(sent);
        }
        Ok(report)
    }

    /// Send an envelope to every known peer, one connection each
    ///
    /// Sends run concurrently; a failure only affects its own peer.
    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let local_id = self.state.local().await.id.clone();
        let peers: Vec<PeerId> = self
            .state
            .directory()
            .await
            .peer_ids()
            .into_iter()
            .filter(|peer| *peer != local_id)
            .collect();

        let limit = self.settings.connection_timeout;
        let payload = envelope.as_bytes();
        let results = join_all(peers.iter().map(|peer| async move {
            (peer, send_frame(peer, payload, limit).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (peer, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!("Could not deliver {} to {}: {}", envelope.hash(), peer, e);
                    report.failed += 1;
                }
            }
        }
        log::trace!(
            "Broadcast {} {}: {} delivered, {} failed",
            envelope.type_name(),
            envelope.hash(),
            report.delivered,
            report.failed
        );
        report
    }

    async fn apply(&self, envelope: &Envelope) -> Effect {
        let local = self.state.local().await;
        let relay = Effect {
            relay: true,
            discovered: false,
        };

        match envelope.kind() {
            EnvelopeKind::ClosedNode { node } => {
                if *node == local.id {
                    return relay;
                }
                let removed = self.state.directory_mut().await.remove_peer(node);
                log::info!("Peer {} left the mesh", node);
                if let Some(record) = removed {
                    self.show(&Text::UserClosed {
                        nickname: &record.nickname,
                    });
                }
                relay
            }
            EnvelopeKind::UpdatedNode { node, record } => {
                if *node == local.id {
                    return relay;
                }
                let discovered = self
                    .state
                    .directory_mut()
                    .await
                    .upsert_peer(node.clone(), record.clone());
                if discovered {
                    log::info!("Discovered peer {} ({})", record.nickname, node);
                }
                Effect {
                    relay: true,
                    discovered,
                }
            }
            EnvelopeKind::NewChannel { name, record } => {
                self.state
                    .directory_mut()
                    .await
                    .upsert_channel(name.clone(), record.clone());
                relay
            }
            EnvelopeKind::InviteMessage { to, invitation } => {
                if *to != local.id {
                    return relay;
                }
                self.show(&Text::InviteReceived {
                    from: &invitation.from,
                    channel: &invitation.channel,
                    key: invitation.key.as_deref(),
                });
                Effect {
                    relay: false,
                    discovered: false,
                }
            }
            EnvelopeKind::ChannelMessage { channel, text } => {
                if *channel == local.record.current_channel {
                    let sender = self.sender_label(envelope.sender(), &local).await;
                    self.show(&Text::ChannelLine {
                        channel,
                        sender: &sender,
                        text,
                    });
                }
                relay
            }
            EnvelopeKind::PrivateMessage { nickname, text } => {
                if *nickname == local.record.nickname {
                    let sender = self.sender_label(envelope.sender(), &local).await;
                    self.show(&Text::PrivateLine {
                        sender: &sender,
                        text,
                    });
                }
                relay
            }
        }
    }

    async fn sender_label(&self, sender: &PeerId, local: &SelfState) -> String {
        if *sender == local.id {
            return local.record.nickname.clone();
        }
        self.state
            .directory()
            .await
            .nickname_of(sender)
            .map_or_else(|| sender.to_string(), str::to_string)
    }

    fn show(&self, text: &Text<'_>) {
        self.console.add_line(&self.strings.render(text));
    }
}
