//! Message catalog (C3): tags and constructors for Bolt wire messages and
//! graph structures.

use crate::packstream::Value;

/// Wire tags for requests, responses, and graph structures (§4.3).
pub mod signatures {
    // Requests
    pub const HELLO: u8 = 0x01;
    pub const GOODBYE: u8 = 0x02;
    pub const RESET: u8 = 0x0F;
    pub const RUN: u8 = 0x10;
    pub const BEGIN: u8 = 0x11;
    pub const COMMIT: u8 = 0x12;
    pub const ROLLBACK: u8 = 0x13;
    pub const DISCARD: u8 = 0x2F;
    pub const PULL: u8 = 0x3F;
    pub const TELEMETRY: u8 = 0x54;
    pub const ROUTE: u8 = 0x66;
    pub const LOGON: u8 = 0x6A;
    pub const LOGOFF: u8 = 0x6B;

    // Responses
    pub const SUCCESS: u8 = 0x70;
    pub const RECORD: u8 = 0x71;
    pub const IGNORED: u8 = 0x7E;
    pub const FAILURE: u8 = 0x7F;

    // Graph structures
    pub const NODE: u8 = 0x4E;
    pub const RELATIONSHIP: u8 = 0x52;
    pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
    pub const PATH: u8 = 0x50;
}

/// A decoded Bolt message: a `Struct` whose tag is drawn from the request or
/// response catalog, with positional fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub tag: u8,
    pub fields: Vec<Value>,
}

impl Message {
    pub fn new(tag: u8, fields: Vec<Value>) -> Self {
        Message { tag, fields }
    }

    pub fn to_value(&self) -> Value {
        Value::Struct {
            tag: self.tag,
            fields: self.fields.clone(),
        }
    }

    pub fn from_value(value: Value) -> Option<Message> {
        match value {
            Value::Struct { tag, fields } => Some(Message { tag, fields }),
            _ => None,
        }
    }

    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    pub fn is_request(&self) -> bool {
        use signatures::*;
        matches!(
            self.tag,
            HELLO | GOODBYE | RESET | RUN | BEGIN | COMMIT | ROLLBACK | DISCARD | PULL
                | TELEMETRY | ROUTE | LOGON | LOGOFF
        )
    }

    pub fn is_response(&self) -> bool {
        use signatures::*;
        matches!(self.tag, SUCCESS | RECORD | IGNORED | FAILURE)
    }

    // --- Response constructors -------------------------------------------------

    pub fn success(metadata: Vec<(String, Value)>) -> Message {
        Message::new(signatures::SUCCESS, vec![Value::Map(metadata)])
    }

    pub fn record(fields: Vec<Value>) -> Message {
        Message::new(signatures::RECORD, vec![Value::List(fields)])
    }

    pub fn ignored() -> Message {
        Message::new(signatures::IGNORED, vec![Value::Map(vec![])])
    }

    pub fn failure(code: &str, message: &str) -> Message {
        Message::new(
            signatures::FAILURE,
            vec![Value::Map(vec![
                ("code".to_string(), Value::String(code.to_string())),
                ("message".to_string(), Value::String(message.to_string())),
            ])],
        )
    }

    // --- Request field extractors ------------------------------------------------

    /// `HELLO [extra:Map]` / `LOGON [auth:Map]` — honored key: `user_agent`.
    pub fn extract_user_agent(&self) -> Option<String> {
        self.field(0)?
            .map_get("user_agent")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// `RUN [query:String, params:Map, extra:Map]`.
    pub fn extract_run(&self) -> Option<(String, Vec<(String, Value)>)> {
        let query = self.field(0)?.as_str()?.to_string();
        let params = self
            .field(1)
            .and_then(Value::as_map)
            .map(|m| m.to_vec())
            .unwrap_or_default();
        Some((query, params))
    }

    /// `PULL [extra:Map]` / `DISCARD [extra:Map]` — honored key: `n:Int` (-1 = all).
    pub fn extract_n(&self) -> i64 {
        self.field(0)
            .and_then(|v| v.map_get("n"))
            .and_then(Value::as_int)
            .unwrap_or(-1)
    }

    /// `ROUTE [ctx:Map, bookmarks:List, db:String?]`.
    pub fn extract_route_db(&self) -> Option<String> {
        self.field(2).and_then(Value::as_str).map(str::to_string)
    }
}

// --- Graph structure constructors (subtypes of Struct, §3) ----------------

pub fn node_struct(id: i64, labels: Vec<String>, properties: Vec<(String, Value)>, element_id: String) -> Value {
    Value::Struct {
        tag: signatures::NODE,
        fields: vec![
            Value::Int(id),
            Value::List(labels.into_iter().map(Value::String).collect()),
            Value::Map(properties),
            Value::String(element_id),
        ],
    }
}

#[allow(clippy::too_many_arguments)]
pub fn relationship_struct(
    id: i64,
    start_id: i64,
    end_id: i64,
    rel_type: String,
    properties: Vec<(String, Value)>,
    element_id: String,
    start_element_id: String,
    end_element_id: String,
) -> Value {
    Value::Struct {
        tag: signatures::RELATIONSHIP,
        fields: vec![
            Value::Int(id),
            Value::Int(start_id),
            Value::Int(end_id),
            Value::String(rel_type),
            Value::Map(properties),
            Value::String(element_id),
            Value::String(start_element_id),
            Value::String(end_element_id),
        ],
    }
}

pub fn unbound_relationship_struct(
    id: i64,
    rel_type: String,
    properties: Vec<(String, Value)>,
    element_id: String,
) -> Value {
    Value::Struct {
        tag: signatures::UNBOUND_RELATIONSHIP,
        fields: vec![
            Value::Int(id),
            Value::String(rel_type),
            Value::Map(properties),
            Value::String(element_id),
        ],
    }
}

pub fn path_struct(nodes: Vec<Value>, relationships: Vec<Value>, indices: Vec<i64>) -> Value {
    Value::Struct {
        tag: signatures::PATH,
        fields: vec![
            Value::List(nodes),
            Value::List(relationships),
            Value::List(indices.into_iter().map(Value::Int).collect()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_message_extracts_user_agent() {
        let msg = Message::new(
            signatures::HELLO,
            vec![Value::Map(vec![(
                "user_agent".to_string(),
                Value::String("test/1.0".to_string()),
            )])],
        );
        assert_eq!(msg.extract_user_agent(), Some("test/1.0".to_string()));
    }

    #[test]
    fn run_message_extracts_query_and_params() {
        let msg = Message::new(
            signatures::RUN,
            vec![
                Value::String("RETURN 1".to_string()),
                Value::Map(vec![("x".to_string(), Value::Int(1))]),
                Value::Map(vec![]),
            ],
        );
        let (query, params) = msg.extract_run().unwrap();
        assert_eq!(query, "RETURN 1");
        assert_eq!(params, vec![("x".to_string(), Value::Int(1))]);
    }

    #[test]
    fn pull_defaults_to_all_when_n_absent() {
        let msg = Message::new(signatures::PULL, vec![Value::Map(vec![])]);
        assert_eq!(msg.extract_n(), -1);
    }

    #[test]
    fn pull_extracts_explicit_n() {
        let msg = Message::new(
            signatures::PULL,
            vec![Value::Map(vec![("n".to_string(), Value::Int(2))])],
        );
        assert_eq!(msg.extract_n(), 2);
    }

    #[test]
    fn message_type_identification() {
        assert!(Message::new(signatures::HELLO, vec![]).is_request());
        assert!(!Message::new(signatures::HELLO, vec![]).is_response());
        assert!(Message::new(signatures::SUCCESS, vec![]).is_response());
    }

    #[test]
    fn failure_message_shape() {
        let msg = Message::failure("Neo.ClientError.Statement.SyntaxError", "bad query");
        assert_eq!(msg.tag, signatures::FAILURE);
        let map = msg.field(0).unwrap().as_map().unwrap();
        assert_eq!(map[0], ("code".to_string(), Value::String("Neo.ClientError.Statement.SyntaxError".to_string())));
    }
}
