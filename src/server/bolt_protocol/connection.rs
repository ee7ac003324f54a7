//! Per-connection wire loop (C7): handshake, then chunk-framed
//! decode/dispatch/encode until the peer disconnects or the handler signals
//! close.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

use super::errors::{BoltError, BoltResult};
use super::handler::Handler;
use super::handshake::{self, MAGIC_PREAMBLE};
use super::messages::Message;
use super::state::ConnectionState;
use super::{framer, BoltConfig};
use crate::graph_engine::{Graph, GraphEngine};
use crate::packstream;

pub struct Connection<S, G: Graph, E: GraphEngine<G>> {
    stream: S,
    config: Arc<BoltConfig>,
    engine: Arc<E>,
    graph: Arc<tokio::sync::Mutex<G>>,
    peer_addr: String,
}

impl<S, G, E> Connection<S, G, E>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    G: Graph,
    E: GraphEngine<G>,
{
    pub fn new(
        stream: S,
        config: Arc<BoltConfig>,
        engine: Arc<E>,
        graph: Arc<tokio::sync::Mutex<G>>,
        peer_addr: String,
    ) -> Self {
        Connection {
            stream,
            config,
            engine,
            graph,
            peer_addr,
        }
    }

    pub async fn run(mut self) -> BoltResult<()> {
        let Some(version) = self.handshake().await? else {
            return Ok(());
        };
        log::info!("{}: negotiated Bolt {}.{}", self.peer_addr, version.major, version.minor);

        let connection_id = format!("bolt-{}", uuid::Uuid::new_v4());
        let mut handler = Handler::new(version, connection_id, self.config.clone(), self.engine.clone(), self.graph.clone());

        let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);
        let writer = framer::ChunkWriter::new(self.config.max_message_size.min(framer::MAX_CHUNK_SIZE));
        let mut reader = framer::ChunkReader::new();
        let mut buf = vec![0u8; 8192];

        loop {
            let n = match timeout(idle_timeout, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    log::info!("{}: peer closed the connection", self.peer_addr);
                    return Ok(());
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(BoltError::Io(e)),
                Err(_) => {
                    handler.state.mark_defunct();
                    return Err(BoltError::ConnectionTimeout {
                        timeout_secs: self.config.idle_timeout_secs,
                    });
                }
            };

            for raw in reader.feed(&buf[..n]) {
                if raw.len() > self.config.max_message_size {
                    let err = BoltError::MessageTooLarge {
                        size: raw.len(),
                        max_size: self.config.max_message_size,
                    };
                    let _ = handler.state.transition_to(ConnectionState::Failed);
                    self.write_message(&writer, Message::failure(err.error_code(), &err.to_string())).await?;
                    continue;
                }

                let message = match packstream::decode(&raw) {
                    Ok(value) => match Message::from_value(value) {
                        Some(message) => message,
                        None => {
                            let err = BoltError::invalid_message("decoded value is not a request struct");
                            let _ = handler.state.transition_to(ConnectionState::Failed);
                            self.write_message(&writer, Message::failure(err.error_code(), &err.to_string())).await?;
                            continue;
                        }
                    },
                    Err(e) => {
                        let err = BoltError::Codec(e);
                        let _ = handler.state.transition_to(ConnectionState::Failed);
                        self.write_message(&writer, Message::failure(err.error_code(), &err.to_string())).await?;
                        continue;
                    }
                };

                let outcome = handler.dispatch(message).await;
                for response in outcome.responses {
                    self.write_message(&writer, response).await?;
                }
                if outcome.close {
                    return Ok(());
                }
            }
        }
    }

    async fn write_message(&mut self, writer: &framer::ChunkWriter, message: Message) -> BoltResult<()> {
        let bytes = packstream::encode(&message.to_value());
        let framed = writer.write(&bytes);
        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the magic preamble and version proposals, negotiate, and reply.
    /// Returns `None` (after writing the rejection reply) if no proposal
    /// matched.
    async fn handshake(&mut self) -> BoltResult<Option<handshake::ProtocolVersion>> {
        let mut preamble = [0u8; 4];
        self.stream.read_exact(&mut preamble).await?;
        if u32::from_be_bytes(preamble) != MAGIC_PREAMBLE {
            return Err(BoltError::invalid_message("bad magic preamble"));
        }

        let mut proposal_bytes = [0u8; 16];
        self.stream.read_exact(&mut proposal_bytes).await?;
        let mut proposals = [0u32; 4];
        for (i, chunk) in proposal_bytes.chunks_exact(4).enumerate() {
            proposals[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        match handshake::negotiate(proposals) {
            Some(version) => {
                self.stream.write_all(&version.to_reply_bytes()).await?;
                self.stream.flush().await?;
                Ok(Some(version))
            }
            None => {
                self.stream.write_all(&[0, 0, 0, 0]).await?;
                self.stream.flush().await?;
                log::warn!("{}: handshake version negotiation failed", self.peer_addr);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_engine::sample::{SampleEngine, SampleGraph};
    use crate::server::bolt_protocol::messages::signatures;

    fn test_server() -> (Arc<BoltConfig>, Arc<SampleEngine>, Arc<tokio::sync::Mutex<SampleGraph>>) {
        (
            Arc::new(BoltConfig::default()),
            Arc::new(SampleEngine::new()),
            Arc::new(tokio::sync::Mutex::new(SampleGraph::sample())),
        )
    }

    #[tokio::test]
    async fn handshake_negotiates_and_then_hello_succeeds() {
        let (client, server) = tokio::io::duplex(4096);
        let (config, engine, graph) = test_server();
        let conn = Connection::new(server, config, engine, graph, "test".to_string());
        let task = tokio::spawn(conn.run());

        let (mut read_half, mut write_half) = tokio::io::split(client);

        write_half.write_all(&MAGIC_PREAMBLE.to_be_bytes()).await.unwrap();
        write_half.write_all(&[0x00, 0x00, 0x04, 0x04]).await.unwrap();
        write_half.write_all(&[0u8; 12]).await.unwrap();
        write_half.flush().await.unwrap();

        let mut reply = [0u8; 4];
        read_half.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x00, 0x00, 0x04, 0x04]);

        let hello = Message::new(
            signatures::HELLO,
            vec![crate::packstream::Value::Map(vec![(
                "user_agent".to_string(),
                crate::packstream::Value::String("test/1.0".to_string()),
            )])],
        );
        let encoded = packstream::encode(&hello.to_value());
        let framed = framer::ChunkWriter::default().write(&encoded);
        write_half.write_all(&framed).await.unwrap();
        write_half.flush().await.unwrap();

        let goodbye = Message::new(signatures::GOODBYE, vec![]);
        let framed = framer::ChunkWriter::default().write(&packstream::encode(&goodbye.to_value()));
        write_half.write_all(&framed).await.unwrap();
        write_half.flush().await.unwrap();

        drop(write_half);
        task.await.unwrap().unwrap();
    }
}
