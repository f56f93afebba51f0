//! Envelope definitions and the JSON wire codec.
//!
//! One envelope travels per TCP connection as a single JSON object:
//!
//! ```text
//! { "hash": <number|string>, "type": <string>, "sender": [host, port],
//!   "receiver": <[host, port]|string|null>, "sent_at": <float>, "data": <any> }
//! ```
//!
//! In memory the `type`/`receiver`/`data` triple is an [`EnvelopeKind`], so
//! every kind carries exactly the fields it needs. The bytes an envelope was
//! decoded from are kept alongside and are what relays send on, so fields
//! this node does not model still reach the rest of the mesh.

use crate::network::{ChannelRecord, PeerId, PeerRecord};
use crate::utils::{NodeError, ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum envelope payload size (1MB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Content-derived envelope identifier used for duplicate suppression
///
/// Two envelopes with the same hash are the same message, even if their
/// contents differ. Peers may send any JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeHash {
    /// Numeric hash; this crate produces signed 64-bit integers
    Numeric(Number),
    /// Opaque textual hash
    Text(String),
}

impl fmt::Display for EnvelopeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Invitation to join a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Nickname of the inviting user
    pub from: String,
    /// Channel the invitee is asked to join
    pub channel: String,
    /// Key of that channel, if it has one
    pub key: Option<String>,
}

/// The six kinds of envelope and their payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// A node left the mesh
    ClosedNode {
        /// Identity of the departing node
        node: PeerId,
    },
    /// A node published its current state
    UpdatedNode {
        /// Identity of the node
        node: PeerId,
        /// Its full record
        record: PeerRecord,
    },
    /// A channel was created
    NewChannel {
        /// Channel name
        name: String,
        /// Channel record (key)
        record: ChannelRecord,
    },
    /// Invitation addressed to one node
    InviteMessage {
        /// Identity of the invitee
        to: PeerId,
        /// Invitation details
        invitation: Invitation,
    },
    /// Message posted to a channel
    ChannelMessage {
        /// Target channel
        channel: String,
        /// Message text
        text: String,
    },
    /// Message addressed to a nickname
    PrivateMessage {
        /// Target nickname
        nickname: String,
        /// Message text
        text: String,
    },
}

impl EnvelopeKind {
    /// Wire name of the kind
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ClosedNode { .. } => "ClosedNode",
            Self::UpdatedNode { .. } => "UpdatedNode",
            Self::NewChannel { .. } => "NewChannel",
            Self::InviteMessage { .. } => "InviteMessage",
            Self::ChannelMessage { .. } => "ChannelMessage",
            Self::PrivateMessage { .. } => "PrivateMessage",
        }
    }

    /// The `receiver` wire field
    fn receiver(&self) -> Result<Value> {
        let value = match self {
            Self::ClosedNode { .. } | Self::UpdatedNode { .. } | Self::NewChannel { .. } => {
                Value::Null
            }
            Self::InviteMessage { to, .. } => serde_json::to_value(to)?,
            Self::ChannelMessage { channel, .. } => Value::String(channel.clone()),
            Self::PrivateMessage { nickname, .. } => Value::String(nickname.clone()),
        };
        Ok(value)
    }

    /// The `data` wire field
    fn data(&self) -> Result<Value> {
        let value = match self {
            Self::ClosedNode { node } => serde_json::to_value(node)?,
            Self::UpdatedNode { node, record } => serde_json::to_value((node, record))?,
            Self::NewChannel { name, record } => serde_json::to_value((name, record))?,
            Self::InviteMessage { invitation, .. } => serde_json::to_value(invitation)?,
            Self::ChannelMessage { text, .. } | Self::PrivateMessage { text, .. } => {
                Value::String(text.clone())
            }
        };
        Ok(value)
    }

    /// Rebuild a kind from its wire fields
    fn from_wire(type_name: &str, receiver: Value, data: Value) -> Result<Self> {
        let kind = match type_name {
            "ClosedNode" => Self::ClosedNode {
                node: field(type_name, "data", data)?,
            },
            "UpdatedNode" => {
                let (node, record) = field(type_name, "data", data)?;
                Self::UpdatedNode { node, record }
            }
            "NewChannel" => {
                let (name, record) = field(type_name, "data", data)?;
                Self::NewChannel { name, record }
            }
            "InviteMessage" => Self::InviteMessage {
                to: required(type_name, "receiver", receiver)?,
                invitation: field(type_name, "data", data)?,
            },
            "ChannelMessage" => Self::ChannelMessage {
                channel: required(type_name, "receiver", receiver)?,
                text: field(type_name, "data", data)?,
            },
            "PrivateMessage" => Self::PrivateMessage {
                nickname: required(type_name, "receiver", receiver)?,
                text: field(type_name, "data", data)?,
            },
            other => {
                return Err(ProtocolError::UnknownMessageType {
                    message_type: other.to_string(),
                }
                .into())
            }
        };
        Ok(kind)
    }
}

fn field<T: DeserializeOwned>(type_name: &str, name: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        ProtocolError::InvalidMessage {
            reason: format!("{type_name}.{name}: {e}"),
        }
        .into()
    })
}

fn required<T: DeserializeOwned>(type_name: &str, name: &str, value: Value) -> Result<T> {
    if value.is_null() {
        return Err(ProtocolError::MissingField {
            field: format!("{type_name}.{name}"),
        }
        .into());
    }
    field(type_name, name, value)
}

/// Unit of propagation
///
/// Immutable once built. [`Envelope::as_bytes`] is the exact payload it was
/// decoded from, or its encoding when originated here.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    hash: EnvelopeHash,
    sender: PeerId,
    sent_at: f64,
    kind: EnvelopeKind,
    wire: Vec<u8>,
}

/// Envelope as it appears on the wire
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    hash: EnvelopeHash,
    #[serde(rename = "type")]
    kind: String,
    sender: PeerId,
    #[serde(default)]
    receiver: Value,
    sent_at: f64,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    /// Build an envelope, compute its content hash and encode it
    ///
    /// # Errors
    ///
    /// Returns error if the encoded envelope exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn new(kind: EnvelopeKind, sender: PeerId, sent_at: f64) -> Result<Self> {
        let hash = content_hash(&kind, &sender, sent_at)?;
        let wire = WireEnvelope {
            hash: hash.clone(),
            kind: kind.type_name().to_string(),
            sender: sender.clone(),
            receiver: kind.receiver()?,
            sent_at,
            data: kind.data()?,
        };
        let wire =
            serde_json::to_vec(&wire).map_err(|e| NodeError::Serialization(e.to_string()))?;
        check_size(wire.len())?;

        Ok(Self {
            hash,
            sender,
            sent_at,
            kind,
            wire,
        })
    }

    /// Build an envelope stamped with the current time
    pub fn originate(kind: EnvelopeKind, sender: PeerId) -> Result<Self> {
        Self::new(kind, sender, now_seconds())
    }

    /// Content hash, fixed at origination
    pub fn hash(&self) -> &EnvelopeHash {
        &self.hash
    }

    /// Identity of the originating node
    pub fn sender(&self) -> &PeerId {
        &self.sender
    }

    /// Origination time, seconds since the Unix epoch
    pub fn sent_at(&self) -> f64 {
        self.sent_at
    }

    /// Type, receiver and payload
    pub fn kind(&self) -> &EnvelopeKind {
        &self.kind
    }

    /// Wire name of the envelope's kind
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// JSON wire form, unchanged from what was received
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Deserialize an envelope from its JSON wire form
    ///
    /// The payload is kept as-is for relaying.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_size(bytes.len())?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::InvalidMessage {
                reason: "empty payload".to_string(),
            }
            .into());
        }

        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        let kind = EnvelopeKind::from_wire(&wire.kind, wire.receiver, wire.data)?;

        Ok(Self {
            hash: wire.hash,
            sender: wire.sender,
            sent_at: wire.sent_at,
            kind,
            wire: bytes.to_vec(),
        })
    }
}

fn check_size(size: usize) -> Result<()> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        }
        .into());
    }
    Ok(())
}

/// Hash of `[type, data, sender, receiver, sent_at]`
///
/// The first eight bytes of a SHA-256 digest over the canonical JSON array,
/// read as a big-endian signed integer.
pub fn content_hash(kind: &EnvelopeKind, sender: &PeerId, sent_at: f64) -> Result<EnvelopeHash> {
    let canonical = serde_json::to_vec(&(
        kind.type_name(),
        kind.data()?,
        sender,
        kind.receiver()?,
        sent_at,
    ))
    .map_err(|e| NodeError::Serialization(e.to_string()))?;

    let digest = Sha256::digest(&canonical);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Ok(EnvelopeHash::Numeric(Number::from(i64::from_be_bytes(prefix))))
}

/// Current time as fractional seconds since the Unix epoch
#[allow(clippy::cast_precision_loss)]
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> PeerId {
        PeerId::new("127.0.0.1", 4000)
    }

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::new(
            EnvelopeKind::ChannelMessage {
                channel: "rust".to_string(),
                text: "hello".to_string(),
            },
            alice(),
            1_700_000_000.5,
        )
        .unwrap();

        let value: Value = serde_json::from_slice(envelope.as_bytes()).unwrap();
        assert_eq!(value["type"], "ChannelMessage");
        assert_eq!(value["receiver"], "rust");
        assert_eq!(value["data"], "hello");
        assert_eq!(value["sender"], serde_json::json!(["127.0.0.1", 4000]));
        assert_eq!(value["sent_at"], 1_700_000_000.5);
        assert!(value["hash"].is_i64());
        assert!(!envelope.as_bytes().contains(&b'\n'));
    }

    #[test]
    fn test_updated_node_round_trip_keeps_hash() {
        let envelope = Envelope::originate(
            EnvelopeKind::UpdatedNode {
                node: alice(),
                record: PeerRecord::new("alice"),
            },
            alice(),
        )
        .unwrap();

        let decoded = Envelope::from_bytes(envelope.as_bytes()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(
            &content_hash(decoded.kind(), decoded.sender(), decoded.sent_at()).unwrap(),
            envelope.hash()
        );
    }

    #[test]
    fn test_decoded_envelope_keeps_unknown_fields() {
        let raw = r#"{"hash": 12, "type": "UpdatedNode", "sender": ["127.0.0.1", 5000],
                      "receiver": null, "sent_at": 3.5, "ttl": 4,
                      "data": [["127.0.0.1", 5000], {"nickname": "alice", "away": false,
                               "away_msg": null, "current_channel": "default",
                               "host": "127.0.0.1", "port": 5000, "mood": "sunny"}]}"#;
        let envelope = Envelope::from_bytes(raw.as_bytes()).unwrap();

        assert_eq!(envelope.as_bytes(), raw.as_bytes());
        let EnvelopeKind::UpdatedNode { node, record } = envelope.kind() else {
            panic!("expected UpdatedNode, got {:?}", envelope.kind());
        };
        assert_eq!(node, &PeerId::new("127.0.0.1", 5000));
        assert_eq!(record.nickname, "alice");
        assert_eq!(record.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(record.port, Some(5000));
    }

    #[test]
    fn test_decode_any_json_number_hash() {
        let decode = |hash: &str| {
            let raw = format!(
                r#"{{"hash": {hash}, "type": "ClosedNode", "sender": ["h", 1],
                    "sent_at": 1.0, "data": ["h", 1]}}"#
            );
            Envelope::from_bytes(raw.as_bytes()).unwrap()
        };

        let wide = decode("18446744073709551615");
        assert_eq!(wide.hash(), &EnvelopeHash::Numeric(Number::from(u64::MAX)));
        assert_eq!(wide.hash().to_string(), "18446744073709551615");

        let fractional = decode("1.5");
        assert_eq!(fractional.hash().to_string(), "1.5");
        assert_ne!(fractional.hash(), wide.hash());
        assert_ne!(fractional.hash(), decode("1").hash());
    }

    #[test]
    fn test_decode_foreign_envelope() {
        let raw = r#"{"hash": "abc", "type": "NewChannel", "sender": ["10.0.0.1", 5000],
                      "receiver": null, "sent_at": 12.25, "data": ["rust", {"key": null}]}"#;
        let envelope = Envelope::from_bytes(raw.as_bytes()).unwrap();

        assert_eq!(envelope.hash(), &EnvelopeHash::Text("abc".to_string()));
        assert_eq!(
            envelope.kind(),
            &EnvelopeKind::NewChannel {
                name: "rust".to_string(),
                record: ChannelRecord::default(),
            }
        );
    }

    #[test]
    fn test_decode_negative_numeric_hash() {
        let raw = r#"{"hash": -42, "type": "ClosedNode", "sender": ["h", 1],
                      "sent_at": 1.0, "data": ["h", 1]}"#;
        let envelope = Envelope::from_bytes(raw.as_bytes()).unwrap();
        assert_eq!(envelope.hash(), &EnvelopeHash::Numeric(Number::from(-42)));
        assert_eq!(envelope.kind(), &EnvelopeKind::ClosedNode { node: PeerId::new("h", 1) });
    }

    #[test]
    fn test_decode_errors() {
        let unknown = r#"{"hash": 1, "type": "Shout", "sender": ["h", 1], "sent_at": 1.0}"#;
        assert!(matches!(
            Envelope::from_bytes(unknown.as_bytes()),
            Err(NodeError::Protocol(ProtocolError::UnknownMessageType { .. }))
        ));

        let no_receiver = r#"{"hash": 1, "type": "PrivateMessage", "sender": ["h", 1],
                              "sent_at": 1.0, "data": "hi"}"#;
        assert!(matches!(
            Envelope::from_bytes(no_receiver.as_bytes()),
            Err(NodeError::Protocol(ProtocolError::MissingField { .. }))
        ));

        let bad_data = r#"{"hash": 1, "type": "UpdatedNode", "sender": ["h", 1],
                           "sent_at": 1.0, "data": "nope"}"#;
        assert!(Envelope::from_bytes(bad_data.as_bytes()).is_err());

        assert!(Envelope::from_bytes(b"not json").is_err());
        assert!(Envelope::from_bytes(b"  ").is_err());
    }

    #[test]
    fn test_hash_depends_on_content() {
        let kind = EnvelopeKind::PrivateMessage {
            nickname: "bob".to_string(),
            text: "hi".to_string(),
        };
        let first = content_hash(&kind, &alice(), 1.0).unwrap();

        assert_eq!(first, content_hash(&kind, &alice(), 1.0).unwrap());
        assert_ne!(first, content_hash(&kind, &alice(), 2.0).unwrap());
        assert_ne!(first, content_hash(&kind, &PeerId::new("127.0.0.1", 4001), 1.0).unwrap());
    }

    #[test]
    fn test_message_size_limit() {
        let oversized = vec![b' '; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Envelope::from_bytes(&oversized),
            Err(NodeError::Protocol(ProtocolError::MessageTooLarge { .. }))
        ));

        let oversized = Envelope::originate(
            EnvelopeKind::ChannelMessage {
                channel: "default".to_string(),
                text: "x".repeat(MAX_PAYLOAD_SIZE),
            },
            alice(),
        );
        assert!(matches!(
            oversized,
            Err(NodeError::Protocol(ProtocolError::MessageTooLarge { .. }))
        ));
    }
}
