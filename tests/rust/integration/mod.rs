//! End-to-end integration test driving the full handshake -> HELLO -> RUN
//! -> PULL -> GOODBYE flow over an in-memory duplex stream (§8 end-to-end
//! scenarios), mirroring the unit-level `MockStream`/duplex precedent in
//! `connection.rs` but exercised here as a standalone `tests/` binary per
//! the teacher's `tempfile`/`serial_test` dev-dependency set.

use std::collections::HashSet;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use boltgraph::graph_engine::sample::{SampleEngine, SampleGraph};
use boltgraph::packstream::{self, Value};
use boltgraph::server::bolt_protocol::handshake::MAGIC_PREAMBLE;
use boltgraph::server::bolt_protocol::messages::{signatures, Message};
use boltgraph::server::bolt_protocol::{framer, BoltConfig, BoltServer};

struct Client {
    read_half: tokio::io::ReadHalf<tokio::io::DuplexStream>,
    write_half: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    reader: framer::ChunkReader,
    writer: framer::ChunkWriter,
}

impl Client {
    async fn handshake(mut stream: tokio::io::DuplexStream, proposal: [u8; 4]) -> (Self, [u8; 4]) {
        stream.write_all(&MAGIC_PREAMBLE.to_be_bytes()).await.unwrap();
        stream.write_all(&proposal).await.unwrap();
        stream.write_all(&[0u8; 12]).await.unwrap();
        stream.flush().await.unwrap();

        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await.unwrap();

        let (read_half, write_half) = tokio::io::split(stream);
        (
            Client {
                read_half,
                write_half,
                reader: framer::ChunkReader::new(),
                writer: framer::ChunkWriter::default(),
            },
            reply,
        )
    }

    async fn send(&mut self, message: Message) {
        let encoded = packstream::encode(&message.to_value());
        let framed = self.writer.write(&encoded);
        self.write_half.write_all(&framed).await.unwrap();
        self.write_half.flush().await.unwrap();
    }

    /// Read bytes off the wire until the framer yields at least one more
    /// message than we've already returned, then decode and return it.
    async fn recv(&mut self) -> Message {
        loop {
            let mut buf = [0u8; 4096];
            let n = self.read_half.read(&mut buf).await.unwrap();
            assert!(n > 0, "peer closed before a message arrived");
            for raw in self.reader.feed(&buf[..n]) {
                let value = packstream::decode(&raw).unwrap();
                return Message::from_value(value).unwrap();
            }
        }
    }
}

fn bolt_server() -> BoltServer<SampleGraph, SampleEngine> {
    BoltServer::new(BoltConfig::default(), SampleEngine::new(), SampleGraph::sample())
}

fn spawn_connection(server: BoltServer<SampleGraph, SampleEngine>) -> tokio::io::DuplexStream {
    let (client, server_side) = tokio::io::duplex(8192);
    tokio::spawn(async move {
        let _ = server.handle_connection(server_side, "test-peer".to_string()).await;
    });
    client
}

fn hello_message() -> Message {
    Message::new(
        signatures::HELLO,
        vec![Value::Map(vec![(
            "user_agent".to_string(),
            Value::String("integration-test/1.0".to_string()),
        )])],
    )
}

#[tokio::test]
async fn handshake_negotiates_v4_4() {
    let stream = spawn_connection(bolt_server());
    let (_client, reply) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;
    assert_eq!(reply, [0x00, 0x00, 0x04, 0x04]);
}

#[tokio::test]
async fn hello_succeeds_and_reaches_ready() {
    let stream = spawn_connection(bolt_server());
    let (mut client, _) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;

    client.send(hello_message()).await;
    let response = client.recv().await;
    assert_eq!(response.tag, signatures::SUCCESS);
    let metadata = response.field(0).unwrap().as_map().unwrap();
    assert!(metadata.iter().any(|(k, _)| k == "server"));
    assert!(metadata.iter().any(|(k, _)| k == "connection_id"));
}

#[tokio::test]
async fn run_then_pull_all_returns_three_records() {
    let stream = spawn_connection(bolt_server());
    let (mut client, _) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;
    client.send(hello_message()).await;
    client.recv().await; // HELLO SUCCESS

    let run = Message::new(
        signatures::RUN,
        vec![
            Value::String("MATCH (n:Person) RETURN n.name".to_string()),
            Value::Map(vec![]),
            Value::Map(vec![]),
        ],
    );
    client.send(run).await;
    let run_success = client.recv().await;
    assert_eq!(run_success.tag, signatures::SUCCESS);
    let fields = run_success.field(0).unwrap().map_get("fields").unwrap().as_list().unwrap();
    assert_eq!(fields, &[Value::String("n.name".to_string())]);

    let pull = Message::new(signatures::PULL, vec![Value::Map(vec![("n".to_string(), Value::Int(-1))])]);
    client.send(pull).await;

    let mut names = HashSet::new();
    let mut final_success = None;
    for _ in 0..4 {
        let msg = client.recv().await;
        if msg.tag == signatures::RECORD {
            let row = msg.field(0).unwrap().as_list().unwrap();
            names.insert(row[0].as_str().unwrap().to_string());
        } else {
            final_success = Some(msg);
            break;
        }
    }

    assert_eq!(names, HashSet::from(["Alice".to_string(), "Bob".to_string(), "Carol".to_string()]));
    let final_success = final_success.expect("expected a trailing SUCCESS after the records");
    assert_eq!(final_success.tag, signatures::SUCCESS);
    let meta = final_success.field(0).unwrap().as_map().unwrap();
    assert_eq!(meta.iter().find(|(k, _)| k == "has_more").unwrap().1.clone(), Value::Bool(false));
}

#[tokio::test]
async fn partial_pull_then_discard_drains_remainder() {
    let server = bolt_server();
    {
        // Pad the graph to 5 Person nodes so a PULL{n:2} leaves a remainder.
        let mut guard = server.graph.lock().await;
        guard.create_node(vec!["Person".to_string()], vec![("name".to_string(), Value::String("Dave".to_string()))]);
        guard.create_node(vec!["Person".to_string()], vec![("name".to_string(), Value::String("Eve".to_string()))]);
    }

    let stream = spawn_connection(server);
    let (mut client, _) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;
    client.send(hello_message()).await;
    client.recv().await;

    let run = Message::new(
        signatures::RUN,
        vec![
            Value::String("MATCH (n:Person) RETURN n.name".to_string()),
            Value::Map(vec![]),
            Value::Map(vec![]),
        ],
    );
    client.send(run).await;
    client.recv().await;

    let pull_two = Message::new(signatures::PULL, vec![Value::Map(vec![("n".to_string(), Value::Int(2))])]);
    client.send(pull_two).await;

    let r1 = client.recv().await;
    let r2 = client.recv().await;
    assert_eq!(r1.tag, signatures::RECORD);
    assert_eq!(r2.tag, signatures::RECORD);
    let partial_success = client.recv().await;
    assert_eq!(partial_success.tag, signatures::SUCCESS);
    let meta = partial_success.field(0).unwrap().as_map().unwrap();
    assert_eq!(meta.iter().find(|(k, _)| k == "has_more").unwrap().1.clone(), Value::Bool(true));

    let discard_rest = Message::new(signatures::DISCARD, vec![Value::Map(vec![("n".to_string(), Value::Int(-1))])]);
    client.send(discard_rest).await;
    let discard_success = client.recv().await;
    assert_eq!(discard_success.tag, signatures::SUCCESS);
    let meta = discard_success.field(0).unwrap().as_map().unwrap();
    assert_eq!(meta.iter().find(|(k, _)| k == "has_more").unwrap().1.clone(), Value::Bool(false));
}

#[tokio::test]
async fn run_in_failed_state_is_ignored_until_reset() {
    let stream = spawn_connection(bolt_server());
    let (mut client, _) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;
    client.send(hello_message()).await;
    client.recv().await;

    let bad_run = Message::new(
        signatures::RUN,
        vec![Value::String("NOT A QUERY".to_string()), Value::Map(vec![]), Value::Map(vec![])],
    );
    client.send(bad_run).await;
    let failure = client.recv().await;
    assert_eq!(failure.tag, signatures::FAILURE);

    let run_again = Message::new(
        signatures::RUN,
        vec![Value::String("MATCH (n:Person) RETURN n.name".to_string()), Value::Map(vec![]), Value::Map(vec![])],
    );
    client.send(run_again.clone()).await;
    let ignored = client.recv().await;
    assert_eq!(ignored.tag, signatures::IGNORED);

    client.send(Message::new(signatures::RESET, vec![])).await;
    let reset_success = client.recv().await;
    assert_eq!(reset_success.tag, signatures::SUCCESS);

    client.send(run_again).await;
    let success = client.recv().await;
    assert_eq!(success.tag, signatures::SUCCESS);
}

#[tokio::test]
async fn relationship_match_returns_both_endpoints_as_records() {
    let stream = spawn_connection(bolt_server());
    let (mut client, _) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;
    client.send(hello_message()).await;
    client.recv().await; // HELLO SUCCESS

    let run = Message::new(
        signatures::RUN,
        vec![
            Value::String("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN a, b".to_string()),
            Value::Map(vec![]),
            Value::Map(vec![]),
        ],
    );
    client.send(run).await;
    let run_success = client.recv().await;
    assert_eq!(run_success.tag, signatures::SUCCESS);
    let fields = run_success.field(0).unwrap().map_get("fields").unwrap().as_list().unwrap();
    assert_eq!(fields, &[Value::String("a".to_string()), Value::String("b".to_string())]);

    client.send(Message::new(signatures::PULL, vec![Value::Map(vec![("n".to_string(), Value::Int(-1))])])).await;

    let record = client.recv().await;
    assert_eq!(record.tag, signatures::RECORD);
    let row = record.field(0).unwrap().as_list().unwrap();

    let node_name = |node: &Value| -> Value {
        let Value::Struct { tag, fields } = node else {
            panic!("expected a Node struct, got {node:?}");
        };
        assert_eq!(*tag, signatures::NODE);
        let properties = fields[2].as_map().unwrap();
        properties.iter().find(|(k, _)| k == "name").unwrap().1.clone()
    };
    assert_eq!(node_name(&row[0]), Value::String("Alice".to_string()));
    assert_eq!(node_name(&row[1]), Value::String("Bob".to_string()));

    let final_success = client.recv().await;
    assert_eq!(final_success.tag, signatures::SUCCESS);
}

#[tokio::test]
async fn transaction_rollback_leaves_graph_untouched() {
    let server = bolt_server();
    let before = { server.graph.lock().await.nodes.len() };

    let stream = spawn_connection(server.clone());
    let (mut client, _) = Client::handshake(stream, [0x00, 0x00, 0x04, 0x04]).await;
    client.send(hello_message()).await;
    client.recv().await;

    client.send(Message::new(signatures::BEGIN, vec![Value::Map(vec![])])).await;
    let begin_success = client.recv().await;
    assert_eq!(begin_success.tag, signatures::SUCCESS);

    let mutating_run = Message::new(
        signatures::RUN,
        vec![
            Value::String("CREATE (n:Person {name: 'Zed'})".to_string()),
            Value::Map(vec![]),
            Value::Map(vec![]),
        ],
    );
    client.send(mutating_run).await;
    let run_success = client.recv().await;
    assert_eq!(run_success.tag, signatures::SUCCESS);

    client.send(Message::new(signatures::PULL, vec![Value::Map(vec![("n".to_string(), Value::Int(-1))])])).await;
    let pull_success = client.recv().await;
    assert_eq!(pull_success.tag, signatures::SUCCESS);

    client.send(Message::new(signatures::ROLLBACK, vec![])).await;
    let rollback_success = client.recv().await;
    assert_eq!(rollback_success.tag, signatures::SUCCESS);

    let after = server.graph.lock().await.nodes.len();
    assert_eq!(before, after, "ROLLBACK must leave the live graph byte-for-byte unchanged");
}
