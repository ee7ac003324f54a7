//! The listener (C8): binds the Bolt TCP socket, accepts connections,
//! spawns one task per connection, and tracks the live-connection set for
//! graceful shutdown on SIGINT/SIGTERM (§4.8, §6.4).

pub mod bolt_protocol;

use std::collections::HashMap;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::graph_engine::sample::{SampleEngine, SampleGraph};
use bolt_protocol::{BoltConfig, BoltServer};

/// The set of currently-connected peers, keyed by a per-connection sequence
/// number. Exists purely for introspection (§4.8) — nothing reads the
/// handle back out of it, so entries are removed as soon as a connection
/// task finishes, cancelled or not.
#[derive(Default)]
struct LiveConnections {
    next_id: u64,
    peers: HashMap<u64, String>,
}

impl LiveConnections {
    fn insert(&mut self, peer_addr: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.peers.insert(id, peer_addr);
        id
    }

    fn remove(&mut self, id: u64) {
        self.peers.remove(&id);
    }

    fn len(&self) -> usize {
        self.peers.len()
    }
}

/// Entry point used by main.rs: build the bundled sample graph (or, in the
/// future, load `config.graph`), wire it into a `BoltServer`, and run the
/// accept loop to completion.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    dotenv().ok();

    let graph = match &config.graph {
        Some(path) => {
            log::warn!(
                "--graph {} was given, but file-format loaders are out of scope (§1); falling back to the bundled sample graph",
                path
            );
            SampleGraph::sample()
        }
        None => SampleGraph::sample(),
    };

    let bolt_config = BoltConfig {
        max_message_size: config.max_message_size,
        idle_timeout_secs: config.idle_timeout_secs,
        server_agent: format!("boltgraph/{}", env!("CARGO_PKG_VERSION")),
        advertised_host: config.host.clone(),
        advertised_port: config.port,
    };

    let server = BoltServer::new(bolt_config, SampleEngine::new(), graph);

    let bind_address = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            log::info!("bolt: listening on {}", bind_address);
            listener
        }
        Err(e) => {
            log::error!("bolt: failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };

    if config.daemon {
        log::info!("bolt: running in daemon mode");
    }

    run_with_graceful_shutdown(listener, server).await
}

/// Runs the accept loop alongside SIGINT/SIGTERM handlers; whichever
/// resolves first wins (§4.8: "stop accepting, allow in-flight connections
/// to drain, then close the listening socket").
async fn run_with_graceful_shutdown(listener: TcpListener, server: BoltServer<SampleGraph, SampleEngine>) -> anyhow::Result<()> {
    let live = Arc::new(Mutex::new(LiveConnections::default()));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            result = accept_loop(listener, server, Some(live.clone())) => result,
            _ = sigterm.recv() => {
                log::info!("bolt: received SIGTERM, draining {} connection(s) and shutting down", live.lock().await.len());
                Ok(())
            }
            _ = sigint.recv() => {
                log::info!("bolt: received SIGINT, draining {} connection(s) and shutting down", live.lock().await.len());
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = accept_loop(listener, server, Some(live.clone())) => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("bolt: received shutdown signal, draining {} connection(s)", live.lock().await.len());
                Ok(())
            }
        }
    }
}

/// Accepts connections until the socket errors out, spawning one
/// independent task per connection (§5: no cross-connection sharing of
/// mutable state except the graph handle, which `BoltServer` already owns
/// behind an `Arc<Mutex<_>>`).
async fn accept_loop(
    listener: TcpListener,
    server: BoltServer<SampleGraph, SampleEngine>,
    live: Option<Arc<Mutex<LiveConnections>>>,
) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("bolt: accept failed: {}", e);
                return Err(e.into());
            }
        };

        let peer_addr = addr.to_string();
        log::debug!("bolt: accepted connection from {}", peer_addr);

        let server = server.clone();
        let live = live.clone();
        let conn_peer_addr = peer_addr.clone();

        tokio::spawn(async move {
            let slot = match &live {
                Some(live) => Some((live.clone(), live.lock().await.insert(conn_peer_addr.clone()))),
                None => None,
            };

            match server.handle_connection(stream, conn_peer_addr.clone()).await {
                Ok(()) => log::debug!("{}: connection closed", conn_peer_addr),
                Err(e) => log::warn!("{}: connection error: {}", conn_peer_addr, e),
            }

            // Drop the live-set entry unconditionally, even if the task
            // above was effectively cancelled by a transport error, so a
            // cancelled task never leaves a stale entry behind (§5).
            if let Some((live, id)) = slot {
                live.lock().await.remove(id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_connections_tracks_insert_and_remove() {
        let mut live = LiveConnections::default();
        let a = live.insert("127.0.0.1:1".to_string());
        let b = live.insert("127.0.0.1:2".to_string());
        assert_eq!(live.len(), 2);
        live.remove(a);
        assert_eq!(live.len(), 1);
        live.remove(b);
        assert_eq!(live.len(), 0);
    }

    #[tokio::test]
    async fn accept_loop_serves_one_connection_end_to_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound = listener.local_addr().unwrap();

        let bolt_config = BoltConfig::default();
        let server = BoltServer::new(bolt_config, SampleEngine::new(), SampleGraph::sample());

        let live = Arc::new(Mutex::new(LiveConnections::default()));
        let accept_task = tokio::spawn(accept_loop(listener, server, Some(live.clone())));

        let mut stream = tokio::net::TcpStream::connect(bound).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(&bolt_protocol::handshake::MAGIC_PREAMBLE.to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&[0x00, 0x00, 0x04, 0x04]).await.unwrap();
        stream.write_all(&[0u8; 12]).await.unwrap();
        stream.flush().await.unwrap();

        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x00, 0x00, 0x04, 0x04]);

        drop(stream);
        accept_task.abort();
    }
}
