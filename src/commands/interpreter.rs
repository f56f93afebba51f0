//! Execution of console commands against the node state.
//!
//! Commands read and mutate the self state and the directory, render
//! replies to the console and originate envelopes through the engine.
//! Command errors are shown to the user and never emit an envelope.

use crate::commands::{parse, Command};
use crate::console::Text;
use crate::gossip::{PropagationEngine, SelfState};
use crate::network::ChannelRecord;
use crate::transport::{EnvelopeKind, Invitation};
use crate::utils::{CommandError, NodeError, Result};
use std::sync::Arc;

/// Whether the console loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line
    Continue,
    /// The user asked to leave
    Exit,
}

/// Turns commands into state changes and envelopes
pub struct CommandInterpreter {
    engine: Arc<PropagationEngine>,
}

impl CommandInterpreter {
    /// Create an interpreter driving an engine
    pub fn new(engine: Arc<PropagationEngine>) -> Self {
        Self { engine }
    }

    /// Current self state
    pub async fn local(&self) -> Arc<SelfState> {
        self.engine.state().local().await
    }

    /// Parse and execute one console line
    pub async fn handle_line(&self, line: &str) -> Flow {
        self.execute(parse(line)).await
    }

    /// Execute a parsed command, reporting errors to the console
    pub async fn execute(&self, command: Command) -> Flow {
        let result = match command {
            Command::Away { message } => self.away(message).await,
            Command::Help => {
                self.show(&Text::Help);
                Ok(Flow::Continue)
            }
            Command::List => self.list().await,
            Command::Invite { nickname } => self.invite(nickname).await,
            Command::Names { channel } => self.names(channel).await,
            Command::Msg { target, text } => self.msg(target, text).await,
            Command::Join { channel, key } => self.join(channel, key).await,
            Command::Exit => self.exit().await,
            Command::Invalid => {
                self.show(&Text::InvalidCommand);
                Ok(Flow::Continue)
            }
        };

        match result {
            Ok(flow) => flow,
            Err(NodeError::Command(error)) => {
                log::debug!("Command rejected: {}", error);
                let line = self.engine.strings().command_error(&error);
                self.engine.console().add_line(&line);
                Flow::Continue
            }
            Err(e) => {
                log::error!("Command failed: {}", e);
                Flow::Continue
            }
        }
    }

    async fn away(&self, message: Option<String>) -> Result<Flow> {
        let default_message = self.engine.strings().render(&Text::UserAbsent);
        let local = self
            .engine
            .state()
            .update_local(|current| {
                let mut next = current.clone();
                next.record.away = !current.record.away;
                next.record.away_msg = next.record.away.then(|| {
                    message
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or(default_message)
                });
                next
            })
            .await;

        self.show(&Text::AwayStatus {
            away: local.record.away,
            message: local.record.away_msg.as_deref(),
        });
        self.engine.originate(local.update()).await?;
        Ok(Flow::Continue)
    }

    async fn list(&self) -> Result<Flow> {
        let channels = self.engine.state().directory().await.channel_names();
        self.show(&Text::ChannelList {
            channels: &channels,
        });
        Ok(Flow::Continue)
    }

    async fn invite(&self, nickname: String) -> Result<Flow> {
        let state = self.engine.state();
        let local = state.local().await;
        let (to, key) = {
            let directory = state.directory().await;
            let to = directory
                .find_peer_by_nickname(&nickname)
                .ok_or(CommandError::UnknownNickname { nickname })?;
            let key = directory
                .channel(&local.record.current_channel)
                .and_then(|channel| channel.key.clone());
            (to, key)
        };

        log::info!("Inviting {} to {}", to, local.record.current_channel);
        self.engine
            .originate(EnvelopeKind::InviteMessage {
                to,
                invitation: Invitation {
                    from: local.record.nickname.clone(),
                    channel: local.record.current_channel.clone(),
                    key,
                },
            })
            .await?;
        Ok(Flow::Continue)
    }

    async fn names(&self, channel: Option<String>) -> Result<Flow> {
        let state = self.engine.state();
        let local = state.local().await;
        let mut names = {
            let directory = state.directory().await;
            match &channel {
                Some(channel) if !directory.channel_exists(channel) => {
                    return Err(CommandError::UnknownChannel {
                        channel: channel.clone(),
                    }
                    .into());
                }
                Some(channel) => directory.peers_in_channel(channel),
                None => directory.list_peer_nicknames(),
            }
        };

        let includes_self = channel
            .as_ref()
            .map_or(true, |channel| *channel == local.record.current_channel);
        if includes_self {
            names.push(local.record.nickname.clone());
            names.sort();
        }

        self.show(&Text::Names {
            channel: channel.as_deref(),
            names: &names,
        });
        Ok(Flow::Continue)
    }

    async fn msg(&self, target: Option<String>, text: String) -> Result<Flow> {
        let state = self.engine.state();
        let local = state.local().await;
        let (kind, away) = {
            let directory = state.directory().await;
            match target {
                None => (
                    EnvelopeKind::ChannelMessage {
                        channel: local.record.current_channel.clone(),
                        text,
                    },
                    None,
                ),
                Some(channel) if directory.channel_exists(&channel) => {
                    (EnvelopeKind::ChannelMessage { channel, text }, None)
                }
                Some(nickname) => {
                    let record = directory
                        .find_peer_by_nickname(&nickname)
                        .and_then(|id| directory.peer(&id).cloned())
                        .ok_or_else(|| CommandError::UnknownTarget {
                            target: nickname.clone(),
                        })?;
                    let away = record
                        .away
                        .then(|| record.away_msg.clone().unwrap_or_default());
                    (EnvelopeKind::PrivateMessage { nickname, text }, away)
                }
            }
        };

        if let (EnvelopeKind::PrivateMessage { nickname, .. }, Some(message)) = (&kind, &away) {
            self.show(&Text::PeerAway { nickname, message });
        }
        self.engine.originate(kind).await?;
        Ok(Flow::Continue)
    }

    async fn join(&self, channel: String, key: Option<String>) -> Result<Flow> {
        let state = self.engine.state();
        let created = {
            let mut directory = state.directory_mut().await;
            let existing_key = directory.channel(&channel).map(|record| record.key.clone());
            match existing_key {
                Some(Some(expected)) if key.as_deref() != Some(expected.as_str()) => {
                    return Err(CommandError::IncorrectKey { channel }.into());
                }
                Some(_) => false,
                None => {
                    directory.upsert_channel(channel.clone(), ChannelRecord::new(key.clone()));
                    true
                }
            }
        };

        if created {
            log::info!("Created channel {}", channel);
            self.engine
                .originate(EnvelopeKind::NewChannel {
                    name: channel.clone(),
                    record: ChannelRecord::new(key.clone()),
                })
                .await?;
        }

        let local = state
            .update_local(|current| {
                let mut next = current.clone();
                next.record.current_channel = channel.clone();
                next
            })
            .await;
        self.show(&Text::Joined {
            channel: &channel,
            key: key.as_deref(),
            created,
        });
        self.engine.originate(local.update()).await?;
        Ok(Flow::Continue)
    }

    async fn exit(&self) -> Result<Flow> {
        let local = self.engine.state().local().await;
        self.show(&Text::Goodbye);
        let report = self
            .engine
            .originate(EnvelopeKind::ClosedNode {
                node: local.id.clone(),
            })
            .await?;
        log::info!(
            "Announced departure to {} peers ({} unreachable)",
            report.delivered,
            report.failed
        );
        Ok(Flow::Exit)
    }

    fn show(&self, text: &Text<'_>) {
        let line = self.engine.strings().render(text);
        self.engine.console().add_line(&line);
    }
}
