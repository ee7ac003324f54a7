//! Bolt protocol stack: PackStream-over-chunked-TCP wire protocol
//! compatible with Neo4j drivers (§1, §2).
//!
//! Each accepted connection owns exactly one task and one `StateMachine` /
//! `Session`; there is no cross-task locking in this module (§5).

pub mod auth;
pub mod connection;
pub mod converter;
pub mod errors;
pub mod framer;
pub mod handler;
pub mod handshake;
pub mod messages;
pub mod session;
pub mod state;

use std::sync::Arc;

use crate::graph_engine::{Graph, GraphEngine};

/// Tunables for the handshake, framer and idle-timeout (§4.7, §6.4).
#[derive(Debug, Clone)]
pub struct BoltConfig {
    pub max_message_size: usize,
    pub idle_timeout_secs: u64,
    pub server_agent: String,
    pub advertised_host: String,
    pub advertised_port: u16,
}

impl Default for BoltConfig {
    fn default() -> Self {
        BoltConfig {
            max_message_size: 65536,
            idle_timeout_secs: 300,
            server_agent: format!("boltgraph/{}", env!("CARGO_PKG_VERSION")),
            advertised_host: "127.0.0.1".to_string(),
            advertised_port: 7687,
        }
    }
}

/// Ties the wire protocol to a graph engine and a shared graph handle (C8).
pub struct BoltServer<G: Graph, E: GraphEngine<G>> {
    pub config: Arc<BoltConfig>,
    pub engine: Arc<E>,
    pub graph: Arc<tokio::sync::Mutex<G>>,
}

impl<G: Graph, E: GraphEngine<G>> Clone for BoltServer<G, E> {
    fn clone(&self) -> Self {
        BoltServer {
            config: self.config.clone(),
            engine: self.engine.clone(),
            graph: self.graph.clone(),
        }
    }
}

impl<G: Graph, E: GraphEngine<G>> BoltServer<G, E> {
    pub fn new(config: BoltConfig, engine: E, graph: G) -> Self {
        BoltServer {
            config: Arc::new(config),
            engine: Arc::new(engine),
            graph: Arc::new(tokio::sync::Mutex::new(graph)),
        }
    }

    /// Drive one connection end to end: handshake, then dispatch until the
    /// client disconnects or the connection is marked defunct.
    pub async fn handle_connection<S>(&self, stream: S, peer_addr: String) -> errors::BoltResult<()>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
    {
        connection::Connection::new(stream, self.config.clone(), self.engine.clone(), self.graph.clone(), peer_addr)
            .run()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = BoltConfig::default();
        assert_eq!(config.max_message_size, 65536);
        assert_eq!(config.idle_timeout_secs, 300);
    }
}
