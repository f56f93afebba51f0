//! Shared helpers for integration tests.

#![allow(dead_code)]

use irc_mesh::console::MemoryConsole;
use irc_mesh::transport::{read_frame, Envelope};
use irc_mesh::{App, NodeConfig, PeerId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How long a mesh gets to settle before a check gives up
pub const SETTLE: Duration = Duration::from_secs(5);

/// Configuration of a test node on an ephemeral local port
pub fn node_config(nickname: &str, seeds: &[&PeerId]) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node.nickname = nickname.to_string();
    config.network.listen_host = "127.0.0.1".to_string();
    config.network.listen_port = 0;
    config.network.connection_timeout_ms = 1000;
    config.network.seed_peers = seeds.iter().map(ToString::to_string).collect();
    config
}

/// Bind and start a node, returning it with its captured console
pub async fn spawn_node(nickname: &str, seeds: &[&PeerId]) -> (App, Arc<MemoryConsole>) {
    let console = Arc::new(MemoryConsole::new());
    let mut app = App::bind(node_config(nickname, seeds), console.clone())
        .await
        .expect("node should bind");
    app.start();
    (app, console)
}

/// A local port with nothing listening on it
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind a free port");
    listener.local_addr().expect("free port address").port()
}

/// A bare listener that decodes every envelope it receives
pub async fn capture_peer() -> (PeerId, mpsc::UnboundedReceiver<Envelope>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind capture");
    let id = PeerId::new("127.0.0.1", listener.local_addr().expect("capture address").port());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(payload) = read_frame(&mut stream, irc_mesh::MAX_MESSAGE_SIZE).await {
                    if let Ok(envelope) = Envelope::from_bytes(&payload) {
                        let _ = tx.send(envelope);
                    }
                }
            });
        }
    });

    (id, rx)
}

/// Poll `check` until it holds or [`SETTLE`] elapses
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + SETTLE;
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check().await
}

/// Number of console lines equal to `line`
pub fn count_lines(console: &MemoryConsole, line: &str) -> usize {
    console.lines().iter().filter(|l| l.as_str() == line).count()
}

/// Whether a node knows exactly the given nicknames
pub async fn knows_exactly(app: &App, nicknames: &[&str]) -> bool {
    app.engine().state().directory().await.list_peer_nicknames() == nicknames
}

/// Wait for a console line containing `needle`
pub async fn shows(console: &MemoryConsole, needle: &str) -> bool {
    eventually(move || async move { console.contains(needle) }).await
}

/// Wait for a node to know exactly the given nicknames
pub async fn converges(app: &App, nicknames: &[&str]) -> bool {
    eventually(move || async move { knows_exactly(app, nicknames).await }).await
}

/// Three nodes in a line: bob seeds alice, carol seeds bob
pub struct LineMesh {
    /// First node, seeded by nobody
    pub alice: App,
    /// Console of alice
    pub alice_console: Arc<MemoryConsole>,
    /// Middle node
    pub bob: App,
    /// Console of bob
    pub bob_console: Arc<MemoryConsole>,
    /// Last node, only aware of bob at startup
    pub carol: App,
    /// Console of carol
    pub carol_console: Arc<MemoryConsole>,
}

impl LineMesh {
    /// Start the three nodes and wait until everyone knows everyone
    pub async fn converged() -> Self {
        let (alice, alice_console) = spawn_node("alice", &[]).await;
        let (bob, bob_console) = spawn_node("bob", &[alice.local_id()]).await;
        let (carol, carol_console) = spawn_node("carol", &[bob.local_id()]).await;

        bob.announce().await.expect("bob announces");
        carol.announce().await.expect("carol announces");

        assert!(converges(&alice, &["bob", "carol"]).await);
        assert!(converges(&bob, &["alice", "carol"]).await);
        assert!(converges(&carol, &["alice", "bob"]).await);

        Self {
            alice,
            alice_console,
            bob,
            bob_console,
            carol,
            carol_console,
        }
    }

    /// Stop every node
    pub async fn shutdown(self) {
        for app in [self.alice, self.bob, self.carol] {
            app.shutdown().await.expect("node shuts down");
        }
    }
}
