//! Message dispatch (C7): the per-message state/action/response contract
//! table from the handshake's successor state onward.

use std::sync::Arc;

use super::auth::AuthContext;
use super::converter::ResultConverter;
use super::errors::BoltError;
use super::handshake::ProtocolVersion;
use super::messages::{signatures, Message};
use super::session::Session;
use super::state::{ConnectionState, StateMachine};
use super::BoltConfig;
use crate::graph_engine::{Graph, GraphEngine};
use crate::packstream::Value;

pub struct Handler<G: Graph, E: GraphEngine<G>> {
    pub state: StateMachine,
    session: Session<G>,
    converter: ResultConverter,
    auth: AuthContext,
    version: ProtocolVersion,
    connection_id: String,
    config: Arc<BoltConfig>,
    engine: Arc<E>,
    graph: Arc<tokio::sync::Mutex<G>>,
}

/// Signals the connection loop that no further messages should be read.
pub struct DispatchOutcome {
    pub responses: Vec<Message>,
    pub close: bool,
}

impl<G: Graph, E: GraphEngine<G>> Handler<G, E> {
    pub fn new(
        version: ProtocolVersion,
        connection_id: String,
        config: Arc<BoltConfig>,
        engine: Arc<E>,
        graph: Arc<tokio::sync::Mutex<G>>,
    ) -> Self {
        Handler {
            state: StateMachine::new_at(ConnectionState::Authentication),
            session: Session::new(),
            converter: ResultConverter::new(),
            auth: AuthContext::default(),
            version,
            connection_id,
            config,
            engine,
            graph,
        }
    }

    pub async fn dispatch(&mut self, message: Message) -> DispatchOutcome {
        if self.state.state() == ConnectionState::Failed
            && !matches!(message.tag, signatures::RESET | signatures::GOODBYE)
        {
            return DispatchOutcome {
                responses: vec![Message::ignored()],
                close: false,
            };
        }

        match message.tag {
            signatures::HELLO | signatures::LOGON => self.handle_hello(&message),
            signatures::GOODBYE => self.handle_goodbye(),
            signatures::RESET => self.handle_reset(),
            signatures::RUN => self.handle_run(&message).await,
            signatures::PULL => self.handle_pull(&message),
            signatures::DISCARD => self.handle_discard(&message),
            signatures::BEGIN => self.handle_begin().await,
            signatures::COMMIT => self.handle_commit().await,
            signatures::ROLLBACK => self.handle_rollback(),
            signatures::ROUTE => self.handle_route(&message),
            signatures::LOGOFF => self.handle_logoff(),
            signatures::TELEMETRY => self.single(Message::success(vec![])),
            other => self.fail(format!("unhandled message tag 0x{:02X}", other)),
        }
    }

    fn single(&self, message: Message) -> DispatchOutcome {
        DispatchOutcome {
            responses: vec![message],
            close: false,
        }
    }

    fn fail(&mut self, reason: impl Into<String>) -> DispatchOutcome {
        self.fail_with(BoltError::invalid_message(reason))
    }

    /// Emit a single FAILURE carrying `err`'s taxonomy-mapped code (§7) and
    /// move the connection to FAILED.
    fn fail_with(&mut self, err: BoltError) -> DispatchOutcome {
        let msg = Message::failure(err.error_code(), &err.to_string());
        let _ = self.state.transition_to(ConnectionState::Failed);
        self.single(msg)
    }

    fn ignored(&self) -> DispatchOutcome {
        self.single(Message::ignored())
    }

    // --- HELLO / LOGON -----------------------------------------------------

    fn handle_hello(&mut self, message: &Message) -> DispatchOutcome {
        if self.state.state() != ConnectionState::Authentication {
            return self.ignored();
        }
        self.auth = AuthContext::accept(message.field(0));

        let mut metadata = vec![
            ("server".to_string(), Value::String(self.config.server_agent.clone())),
            ("connection_id".to_string(), Value::String(self.connection_id.clone())),
        ];
        if self.version.major >= 5 {
            metadata.push((
                "hints".to_string(),
                Value::Map(vec![("telemetry.enabled".to_string(), Value::Bool(false))]),
            ));
        }

        self.state.transition_to(ConnectionState::Ready).expect("AUTHENTICATION -> READY is valid");
        self.single(Message::success(metadata))
    }

    // --- GOODBYE / RESET -----------------------------------------------------

    fn handle_goodbye(&mut self) -> DispatchOutcome {
        self.state.mark_defunct();
        DispatchOutcome {
            responses: vec![],
            close: true,
        }
    }

    fn handle_reset(&mut self) -> DispatchOutcome {
        self.session.clear_result();
        if self.session.in_transaction {
            let _ = self.session.rollback_transaction();
        }
        self.state.reset();
        self.single(Message::success(vec![]))
    }

    // --- RUN / PULL / DISCARD -----------------------------------------------------

    async fn handle_run(&mut self, message: &Message) -> DispatchOutcome {
        use ConnectionState::*;
        if !matches!(self.state.state(), Ready | TxReady) {
            return self.ignored();
        }
        let Some((query, params)) = message.extract_run() else {
            return self.fail("RUN missing query");
        };

        let run_outcome = if self.session.in_transaction {
            let tx_graph = self.session.tx_graph_mut().expect("TX_READY implies an open transaction");
            self.engine.run(&query, &params, tx_graph)
        } else {
            let mut guard = self.graph.lock().await;
            self.engine.run(&query, &params, &mut guard)
        };

        match run_outcome {
            Ok(columnar) => {
                let converted = self.converter.convert_result(columnar);
                let fields: Vec<Value> = converted.fields.iter().cloned().map(Value::String).collect();
                self.session.set_result(converted);

                let mut metadata = vec![
                    ("fields".to_string(), Value::List(fields)),
                    ("t_first".to_string(), Value::Int(0)),
                ];
                if self.version.major >= 4 {
                    metadata.push(("qid".to_string(), Value::Int(self.session.last_qid)));
                }

                let next_state = if self.session.in_transaction { TxStreaming } else { Streaming };
                self.state.transition_to(next_state).expect("READY/TX_READY -> STREAMING is valid");
                self.single(Message::success(metadata))
            }
            Err(e) => self.fail_with(BoltError::query_error(e.to_string())),
        }
    }

    fn handle_pull(&mut self, message: &Message) -> DispatchOutcome {
        use ConnectionState::*;
        if !matches!(self.state.state(), Streaming | TxStreaming) {
            return self.ignored();
        }
        let n = message.extract_n();
        let Some(cursor) = self.session.current_result.as_mut() else {
            return self.fail("PULL with no staged result");
        };

        let mut responses: Vec<Message> = cursor.pull(n).into_iter().map(Message::record).collect();
        let has_more = cursor.has_more();

        let mut metadata = vec![("has_more".to_string(), Value::Bool(has_more))];
        if !has_more {
            metadata.push(("type".to_string(), Value::String("r".to_string())));
            self.session.clear_result();
        }
        responses.push(Message::success(metadata));

        if !has_more {
            let next = if self.session.in_transaction { TxReady } else { Ready };
            self.state.transition_to(next).expect("STREAMING/TX_STREAMING -> READY|TX_READY is valid");
        }

        DispatchOutcome { responses, close: false }
    }

    fn handle_discard(&mut self, message: &Message) -> DispatchOutcome {
        use ConnectionState::*;
        if !matches!(self.state.state(), Streaming | TxStreaming) {
            return self.ignored();
        }
        let n = message.extract_n();
        let Some(cursor) = self.session.current_result.as_mut() else {
            return self.fail("DISCARD with no staged result");
        };
        cursor.discard(n);
        let has_more = cursor.has_more();
        if !has_more {
            self.session.clear_result();
        }

        if !has_more {
            let next = if self.session.in_transaction { TxReady } else { Ready };
            self.state.transition_to(next).expect("STREAMING/TX_STREAMING -> READY|TX_READY is valid");
        }

        self.single(Message::success(vec![("has_more".to_string(), Value::Bool(has_more))]))
    }

    // --- Transactions -----------------------------------------------------

    async fn handle_begin(&mut self) -> DispatchOutcome {
        if self.state.state() != ConnectionState::Ready {
            return self.ignored();
        }
        let guard = self.graph.lock().await;
        if let Err(e) = self.session.begin_transaction(&guard) {
            drop(guard);
            return self.fail_with(BoltError::from(e));
        }
        drop(guard);
        self.state.transition_to(ConnectionState::TxReady).expect("READY -> TX_READY is valid");
        self.single(Message::success(vec![]))
    }

    async fn handle_commit(&mut self) -> DispatchOutcome {
        if self.state.state() != ConnectionState::TxReady {
            return self.ignored();
        }
        let mut guard = self.graph.lock().await;
        if let Err(e) = self.session.commit_transaction(&mut guard) {
            drop(guard);
            return self.fail_with(BoltError::from(e));
        }
        drop(guard);
        self.state.transition_to(ConnectionState::Ready).expect("TX_READY -> READY is valid");
        self.single(Message::success(vec![]))
    }

    fn handle_rollback(&mut self) -> DispatchOutcome {
        if self.state.state() != ConnectionState::TxReady {
            return self.ignored();
        }
        if let Err(e) = self.session.rollback_transaction() {
            return self.fail_with(BoltError::from(e));
        }
        self.state.transition_to(ConnectionState::Ready).expect("TX_READY -> READY is valid");
        self.single(Message::success(vec![]))
    }

    // --- ROUTE / LOGOFF -----------------------------------------------------

    fn handle_route(&mut self, message: &Message) -> DispatchOutcome {
        if self.state.state().is_defunct() {
            return self.ignored();
        }
        let db = message.extract_route_db().map(Value::String).unwrap_or(Value::Null);
        let address = format!("{}:{}", self.config.advertised_host, self.config.advertised_port);
        let servers = Value::List(vec![
            route_entry("WRITE", &address),
            route_entry("READ", &address),
            route_entry("ROUTE", &address),
        ]);
        let routing_table = Value::Map(vec![
            ("ttl".to_string(), Value::Int(300)),
            ("db".to_string(), db),
            ("servers".to_string(), servers),
        ]);
        self.single(Message::success(vec![("rt".to_string(), routing_table)]))
    }

    fn handle_logoff(&mut self) -> DispatchOutcome {
        if self.state.state().is_defunct() {
            return self.ignored();
        }
        self.single(Message::success(vec![]))
    }
}

fn route_entry(role: &str, address: &str) -> Value {
    Value::Map(vec![
        ("role".to_string(), Value::String(role.to_string())),
        ("addresses".to_string(), Value::List(vec![Value::String(address.to_string())])),
    ])
}
