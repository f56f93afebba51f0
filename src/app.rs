//! Node lifecycle and coordination.
//!
//! This module provides the main application structure that ties the
//! listener, the propagation engine and the console loop together.

use crate::{
    commands::{Command, CommandInterpreter, Flow},
    console::{Console, Strings, Text},
    gossip::{BroadcastReport, EngineSettings, NodeState, PropagationEngine, SelfState},
    network::{Directory, PeerId},
    transport::{receive_frame, Envelope, Listener},
    utils::{NodeConfig, Result},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Main application structure
pub struct App {
    /// Application configuration
    config: NodeConfig,
    /// Identity other nodes reach this one at
    local_id: PeerId,
    /// Bound listener, until the accept loop takes it over
    listener: Option<Listener>,
    /// Propagation engine shared with connection tasks
    engine: Arc<PropagationEngine>,
    /// Console command interpreter
    interpreter: CommandInterpreter,
    /// Stops the accept loop
    stop: watch::Sender<bool>,
    /// Running accept loop
    accept_task: Option<JoinHandle<()>>,
}

impl App {
    /// Bind the listener and build the node state
    ///
    /// The advertised host and the bound port become the node identity, so
    /// port `0` in the configuration yields an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the listener cannot
    /// be bound.
    pub async fn bind(config: NodeConfig, console: Arc<dyn Console>) -> Result<Self> {
        config.validate()?;

        let network = &config.network;
        let listener =
            Listener::bind(&network.listen_host, network.listen_port, network.listen_backlog)
                .await?;
        let local_id = PeerId::new(network.advertised_host(), listener.local_addr().port());

        let mut directory = Directory::new();
        for seed in network.seed_peer_ids()? {
            if seed == local_id {
                log::warn!("Ignoring seed {} pointing at this node", seed);
                continue;
            }
            log::debug!("Adding seed peer {}", seed);
            directory.add_seed(seed);
        }

        let local = SelfState::new(local_id.clone(), config.node.nickname.clone());
        let state = Arc::new(NodeState::new(local, directory));
        let engine = Arc::new(PropagationEngine::new(
            state,
            console,
            Strings::new(config.node.language),
            EngineSettings::from(&config),
        ));
        let interpreter = CommandInterpreter::new(Arc::clone(&engine));
        let (stop, _) = watch::channel(false);

        Ok(Self {
            config,
            local_id,
            listener: Some(listener),
            engine,
            interpreter,
            stop,
            accept_task: None,
        })
    }

    /// Identity of this node
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Propagation engine of this node
    pub fn engine(&self) -> &Arc<PropagationEngine> {
        &self.engine
    }

    /// Start accepting inbound envelopes in the background
    ///
    /// Calling it again once started does nothing.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        let engine = Arc::clone(&self.engine);
        let max_size = self.config.network.max_recv_size;
        let limit = self.config.network.connection_timeout();
        let stop = self.stop.subscribe();

        self.accept_task = Some(tokio::spawn(accept_loop(
            listener, engine, max_size, limit, stop,
        )));
    }

    /// Publish self state and known channels to every known peer
    pub async fn announce(&self) -> Result<BroadcastReport> {
        let report = self.engine.announce().await?;
        log::info!(
            "Announced to {} peers ({} unreachable)",
            report.delivered,
            report.failed
        );
        Ok(report)
    }

    /// Execute one console line
    pub async fn handle_line(&self, line: &str) -> Flow {
        self.interpreter.handle_line(line).await
    }

    /// Run the node with commands read from standard input
    pub async fn run(self) -> Result<()> {
        self.run_with_input(BufReader::new(tokio::io::stdin())).await
    }

    /// Run the node with commands read from `input`
    ///
    /// Returns after `/exit`, end of input or Ctrl-C. The last two leave the
    /// mesh the same way `/exit` does.
    pub async fn run_with_input<R>(mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.start();
        log::info!("Node {} ({}) started", self.local_id, self.config.node.nickname);

        if self.config.gossip.announce_on_start {
            if let Err(e) = self.announce().await {
                log::warn!("Initial announce failed: {}", e);
            }
        }

        let address = self.local_id.to_string();
        let banner = self.engine.strings().render(&Text::Listening { address: &address });
        self.engine.console().add_line(&banner);

        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        if self.handle_line(&line).await == Flow::Exit {
                            break;
                        }
                    }
                    Ok(None) => {
                        log::info!("Console input closed");
                        self.interpreter.execute(Command::Exit).await;
                        break;
                    }
                    Err(e) => {
                        log::error!("Failed to read console input: {}", e);
                        self.interpreter.execute(Command::Exit).await;
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Shutdown signal received");
                    self.interpreter.execute(Command::Exit).await;
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Get node statistics
    pub async fn stats(&self) -> NodeStats {
        let state = self.engine.state();
        let local = state.local().await;
        let (known_peers, known_channels) = {
            let directory = state.directory().await;
            (directory.peer_count(), directory.channel_names().len())
        };

        NodeStats {
            id: local.id.clone(),
            nickname: local.record.nickname.clone(),
            current_channel: local.record.current_channel.clone(),
            known_peers,
            known_channels,
            seen_envelopes: state.history_len().await,
        }
    }

    /// Stop accepting connections and release the listening socket
    pub async fn shutdown(mut self) -> Result<()> {
        log::info!("Shutting down node {}", self.local_id);

        self.stop.send_replace(true);
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                log::warn!("Accept loop ended abnormally: {}", e);
            }
        }

        Ok(())
    }
}

/// Node statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStats {
    /// Node identity
    pub id: PeerId,
    /// Own nickname
    pub nickname: String,
    /// Channel the user is in
    pub current_channel: String,
    /// Peers in the directory, seeds included
    pub known_peers: usize,
    /// Channels in the directory, default included
    pub known_channels: usize,
    /// Distinct envelopes seen or originated
    pub seen_envelopes: usize,
}

async fn accept_loop(
    listener: Listener,
    engine: Arc<PropagationEngine>,
    max_size: usize,
    limit: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, from)) => {
                    let engine = Arc::clone(&engine);
                    tokio::spawn(handle_connection(stream, from, engine, max_size, limit));
                }
                Err(e) => log::warn!("Failed to accept connection: {}", e),
            },
        }
    }
    log::debug!("Accept loop on {} stopped", listener.local_addr());
}

async fn handle_connection(
    mut stream: TcpStream,
    from: SocketAddr,
    engine: Arc<PropagationEngine>,
    max_size: usize,
    limit: Duration,
) {
    let payload = match receive_frame(&mut stream, max_size, limit).await {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Dropping connection from {}: {}", from, e);
            return;
        }
    };
    drop(stream);

    match Envelope::from_bytes(&payload) {
        Ok(envelope) => {
            let outcome = engine.ingest(envelope).await;
            log::trace!("Envelope from {}: {:?}", from, outcome);
        }
        Err(e) => log::warn!("Discarding malformed envelope from {}: {}", from, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;
    use crate::network::DEFAULT_CHANNEL;

    fn test_config(nickname: &str) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.nickname = nickname.to_string();
        config.network.listen_port = 0;
        config.network.connection_timeout_ms = 500;
        config
    }

    #[tokio::test]
    async fn test_bind_uses_ephemeral_port() {
        let app = App::bind(test_config("alice"), Arc::new(MemoryConsole::new()))
            .await
            .unwrap();

        assert_ne!(app.local_id().port, 0);
        let stats = app.stats().await;
        assert_eq!(stats.nickname, "alice");
        assert_eq!(stats.current_channel, DEFAULT_CHANNEL);
        assert_eq!(stats.known_peers, 0);
        assert_eq!(stats.known_channels, 1);
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let mut config = test_config("alice");
        config.network.connection_timeout_ms = 0;
        assert!(App::bind(config, Arc::new(MemoryConsole::new())).await.is_err());
    }

    #[tokio::test]
    async fn test_wildcard_bind_advertises_reachable_host() {
        let mut config = test_config("alice");
        config.network.listen_host = "0.0.0.0".to_string();
        assert!(App::bind(config.clone(), Arc::new(MemoryConsole::new()))
            .await
            .is_err());

        config.network.advertise_host = Some("127.0.0.1".to_string());
        let app = App::bind(config, Arc::new(MemoryConsole::new())).await.unwrap();
        assert_eq!(app.local_id().host, "127.0.0.1");
        assert_eq!(app.stats().await.id, *app.local_id());
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_seeds_are_known_peers() {
        let mut config = test_config("alice");
        config.network.seed_peers = vec!["127.0.0.1:1".to_string()];
        let app = App::bind(config, Arc::new(MemoryConsole::new())).await.unwrap();

        assert_eq!(app.stats().await.known_peers, 1);
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_of_input_exits() {
        let console = Arc::new(MemoryConsole::new());
        let mut config = test_config("alice");
        config.gossip.announce_on_start = false;
        let app = App::bind(config, console.clone()).await.unwrap();

        app.run_with_input(&b"/list\n\n"[..]).await.unwrap();

        let lines = console.lines();
        assert!(lines[0].starts_with("The node is operational"));
        assert_eq!(lines[1], "List of channels :\n- default");
        assert_eq!(lines[2], "Closing connections.");
    }
}
