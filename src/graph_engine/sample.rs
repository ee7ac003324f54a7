//! A bundled in-memory graph and a narrow query executor recognizing a
//! literal subset of Cypher shapes. This is explicitly NOT a Cypher engine
//! (that remains out of scope, §1) — it exists only so the crate is
//! runnable end to end without external wiring, the way a teacher's
//! startup path needs *something* to bind the listener to.

use std::collections::HashMap;

use super::{ColumnarResult, EngineError, Graph, GraphEngine};
use crate::packstream::Value;

#[derive(Debug, Clone, Default)]
pub struct SampleNode {
    pub key: String,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Value)>,
}

impl SampleNode {
    fn get(&self, prop: &str) -> Value {
        self.properties
            .iter()
            .find(|(k, _)| k == prop)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }

    /// The engine-side representation handed to the result converter (§4.6):
    /// a map carrying `__`-prefixed metadata alongside plain properties.
    fn to_engine_value(&self) -> Value {
        let mut entries = vec![
            ("__node_id__".to_string(), Value::String(self.key.clone())),
            (
                "__labels__".to_string(),
                Value::List(self.labels.iter().cloned().map(Value::String).collect()),
            ),
        ];
        entries.extend(self.properties.clone());
        Value::Map(entries)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleEdge {
    pub key: String,
    pub start: String,
    pub end: String,
    pub rel_type: String,
    pub properties: Vec<(String, Value)>,
}

impl SampleEdge {
    fn to_engine_value(&self) -> Value {
        let mut entries = vec![
            ("__edge_key__".to_string(), Value::String(self.key.clone())),
            ("__rel_type__".to_string(), Value::String(self.rel_type.clone())),
            ("__start_node__".to_string(), Value::String(self.start.clone())),
            ("__end_node__".to_string(), Value::String(self.end.clone())),
        ];
        entries.extend(self.properties.clone());
        Value::Map(entries)
    }
}

/// An in-memory labeled property graph: the opaque store behind the
/// `Graph` contract.
#[derive(Debug, Clone, Default)]
pub struct SampleGraph {
    pub nodes: Vec<SampleNode>,
    pub edges: Vec<SampleEdge>,
    next_key: u64,
}

impl Graph for SampleGraph {}

impl SampleGraph {
    pub fn new() -> Self {
        SampleGraph::default()
    }

    /// The bundled demo graph used when `--graph` is absent: three `Person`
    /// nodes (matching the end-to-end scenario in §8) plus one `KNOWS`
    /// relationship so the single-hop relationship pattern has something to
    /// match against.
    pub fn sample() -> Self {
        let mut g = SampleGraph::new();
        let mut keys = Vec::new();
        for name in ["Alice", "Bob", "Carol"] {
            let key = g.create_node(
                vec!["Person".to_string()],
                vec![("name".to_string(), Value::String(name.to_string()))],
            );
            keys.push(key);
        }
        g.create_edge("KNOWS".to_string(), keys[0].clone(), keys[1].clone(), vec![]);
        g
    }

    fn fresh_key(&mut self, prefix: &str) -> String {
        let key = format!("{}:{}", prefix, self.next_key);
        self.next_key += 1;
        key
    }

    pub fn create_node(&mut self, labels: Vec<String>, properties: Vec<(String, Value)>) -> String {
        let key = self.fresh_key(labels.first().map(String::as_str).unwrap_or("Node"));
        self.nodes.push(SampleNode {
            key: key.clone(),
            labels,
            properties,
        });
        key
    }

    pub fn create_edge(&mut self, rel_type: String, start: String, end: String, properties: Vec<(String, Value)>) -> String {
        let key = self.fresh_key(&rel_type);
        self.edges.push(SampleEdge {
            key: key.clone(),
            start,
            end,
            rel_type,
            properties,
        });
        key
    }

    fn find_matching<'a>(&'a self, label: &str, filter: &[(String, Value)]) -> Vec<&'a SampleNode> {
        self.nodes
            .iter()
            .filter(|n| n.labels.iter().any(|l| l == label))
            .filter(|n| filter.iter().all(|(k, v)| &n.get(k) == v))
            .collect()
    }

    fn node_by_key(&self, key: &str) -> Option<&SampleNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// `(a:LabelA)-[:REL]->(b:LabelB)` single-hop relationship matches,
    /// filtered by each endpoint's label and property predicate.
    fn find_matching_edges<'a>(
        &'a self,
        left: &Pattern,
        rel_type: &str,
        right: &Pattern,
    ) -> Vec<(&'a SampleNode, &'a SampleEdge, &'a SampleNode)> {
        self.edges
            .iter()
            .filter(|e| e.rel_type == rel_type)
            .filter_map(|e| {
                let start = self.node_by_key(&e.start)?;
                let end = self.node_by_key(&e.end)?;
                let left_ok = start.labels.iter().any(|l| l == &left.label)
                    && left.props.iter().all(|(k, v)| &start.get(k) == v);
                let right_ok = end.labels.iter().any(|l| l == &right.label)
                    && right.props.iter().all(|(k, v)| &end.get(k) == v);
                (left_ok && right_ok).then_some((start, e, end))
            })
            .collect()
    }
}

/// Executes the narrow query subset described in SPEC_FULL.md §6.5 against
/// a `SampleGraph`.
#[derive(Debug, Default)]
pub struct SampleEngine;

impl SampleEngine {
    pub fn new() -> Self {
        SampleEngine
    }
}

impl GraphEngine<SampleGraph> for SampleEngine {
    fn run(
        &self,
        query: &str,
        params: &[(String, Value)],
        graph: &mut SampleGraph,
    ) -> Result<ColumnarResult, EngineError> {
        let query = query.trim();
        if let Some(rest) = strip_ci_prefix(query, "MATCH") {
            run_match(rest, params, graph)
        } else if let Some(rest) = strip_ci_prefix(query, "CREATE") {
            run_create(rest, params, graph)
        } else {
            Err(EngineError::Query(format!(
                "unsupported query shape: {query}"
            )))
        }
    }
}

fn strip_ci_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(s[prefix.len()..].trim_start())
    } else {
        None
    }
}

/// `(var:Label {k: v, ...})` or `(var:Label)`.
struct Pattern {
    var: String,
    label: String,
    props: Vec<(String, Value)>,
}

fn parse_pattern(src: &str, params: &[(String, Value)]) -> Option<(Pattern, &str)> {
    let src = src.trim_start();
    let src = src.strip_prefix('(')?;
    let close = src.find(')')?;
    let (inner, rest) = (&src[..close], &src[close + 1..]);

    let (head, props_src) = match inner.find('{') {
        Some(idx) => (&inner[..idx], Some(&inner[idx + 1..inner.rfind('}')?])),
        None => (inner, None),
    };
    let mut parts = head.splitn(2, ':');
    let var = parts.next()?.trim().to_string();
    let label = parts.next()?.trim().to_string();

    let props = match props_src {
        Some(p) => parse_props(p, params),
        None => vec![],
    };

    Some((Pattern { var, label, props }, rest))
}

/// `-[:TYPE]->(var:Label)` immediately following a node pattern — the one
/// relationship hop this engine recognizes (SPEC_FULL.md §6.5).
fn parse_rel_hop<'a>(src: &'a str, params: &[(String, Value)]) -> Option<(String, Pattern, &'a str)> {
    let src = src.trim_start().strip_prefix("-[:")?;
    let close = src.find(']')?;
    let rel_type = src[..close].trim().to_string();
    let rest = src[close + 1..].strip_prefix("->")?;
    let (right, rest) = parse_pattern(rest, params)?;
    Some((rel_type, right, rest))
}

fn parse_props(src: &str, params: &[(String, Value)]) -> Vec<(String, Value)> {
    src.split(',')
        .filter_map(|pair| {
            let mut kv = pair.splitn(2, ':');
            let key = kv.next()?.trim().to_string();
            let value_src = kv.next()?.trim();
            Some((key, parse_literal(value_src, params)))
        })
        .collect()
}

fn parse_literal(src: &str, params: &[(String, Value)]) -> Value {
    if let Some(name) = src.strip_prefix('$') {
        return params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null);
    }
    if let Some(stripped) = src.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::String(stripped.to_string());
    }
    if let Some(stripped) = src.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Value::String(stripped.to_string());
    }
    if src.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if src.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = src.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = src.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Null
}

fn run_create(
    rest: &str,
    params: &[(String, Value)],
    graph: &mut SampleGraph,
) -> Result<ColumnarResult, EngineError> {
    let (left, rest) =
        parse_pattern(rest, params).ok_or_else(|| EngineError::Query("bad CREATE pattern".into()))?;

    if let Some((rel_type, right, _)) = parse_rel_hop(rest, params) {
        let start = graph.create_node(vec![left.label], left.props);
        let end = graph.create_node(vec![right.label], right.props);
        graph.create_edge(rel_type, start, end, vec![]);
    } else {
        graph.create_node(vec![left.label], left.props);
    }
    Ok(vec![])
}

fn run_match(
    rest: &str,
    params: &[(String, Value)],
    graph: &mut SampleGraph,
) -> Result<ColumnarResult, EngineError> {
    let (pattern, rest) =
        parse_pattern(rest, params).ok_or_else(|| EngineError::Query("bad MATCH pattern".into()))?;

    if let Some((rel_type, right, rest)) = parse_rel_hop(rest, params) {
        return run_match_relationship(&pattern, &rel_type, &right, rest, graph);
    }

    let rest = rest.trim_start();

    if let Some(assign) = strip_ci_prefix(rest, "SET") {
        return run_set(&pattern, assign, params, graph);
    }
    if let Some(del) = strip_ci_prefix(rest, "DELETE") {
        return run_delete(&pattern, del, graph);
    }
    let projection = strip_ci_prefix(rest, "RETURN")
        .ok_or_else(|| EngineError::Query("expected RETURN, SET, or DELETE after MATCH".into()))?;

    let matches = graph.find_matching(&pattern.label, &pattern.props);
    let mut column_name = String::new();
    let mut values = Vec::with_capacity(matches.len());

    let projection = projection.trim();
    if let Some(prop) = projection
        .strip_prefix(&format!("{}.", pattern.var))
        .map(str::trim)
    {
        column_name = format!("{}.{}", pattern.var, prop);
        for node in &matches {
            values.push(node.get(prop));
        }
    } else if projection == pattern.var {
        column_name = pattern.var.clone();
        for node in &matches {
            values.push(node.to_engine_value());
        }
    } else {
        return Err(EngineError::Query(format!(
            "unsupported RETURN projection: {projection}"
        )));
    }

    Ok(vec![(column_name, values)])
}

/// `MATCH (a:LabelA)-[:REL]->(b:LabelB) RETURN a, b` style single-hop
/// relationship reads (SPEC_FULL.md §6.5).
fn run_match_relationship(
    left: &Pattern,
    rel_type: &str,
    right: &Pattern,
    rest: &str,
    graph: &SampleGraph,
) -> Result<ColumnarResult, EngineError> {
    let projection = strip_ci_prefix(rest.trim_start(), "RETURN")
        .ok_or_else(|| EngineError::Query("expected RETURN after a relationship pattern".into()))?;
    let vars: Vec<&str> = projection.split(',').map(str::trim).collect();
    for var in &vars {
        if *var != left.var && *var != right.var {
            return Err(EngineError::Query(format!("unsupported RETURN projection: {var}")));
        }
    }

    let matches = graph.find_matching_edges(left, rel_type, right);
    let mut columns: Vec<(String, Vec<Value>)> = vars.iter().map(|v| (v.to_string(), Vec::with_capacity(matches.len()))).collect();
    for (start, _edge, end) in &matches {
        for (var, values) in columns.iter_mut() {
            let node = if *var == left.var { start } else { end };
            values.push(node.to_engine_value());
        }
    }
    Ok(columns)
}

fn run_set(
    pattern: &Pattern,
    assign: &str,
    params: &[(String, Value)],
    graph: &mut SampleGraph,
) -> Result<ColumnarResult, EngineError> {
    let mut parts = assign.splitn(2, '=');
    let target = parts.next().ok_or_else(|| EngineError::Query("bad SET".into()))?.trim();
    let value_src = parts.next().ok_or_else(|| EngineError::Query("bad SET".into()))?.trim();
    let prop = target
        .strip_prefix(&format!("{}.", pattern.var))
        .ok_or_else(|| EngineError::Query("SET target must reference the matched variable".into()))?;
    let value = parse_literal(value_src, params);

    for node in graph.nodes.iter_mut() {
        if node.labels.iter().any(|l| l == &pattern.label)
            && pattern.props.iter().all(|(k, v)| &node.get(k) == v)
        {
            match node.properties.iter_mut().find(|(k, _)| k == prop) {
                Some(entry) => entry.1 = value.clone(),
                None => node.properties.push((prop.to_string(), value.clone())),
            }
        }
    }
    Ok(vec![])
}

fn run_delete(
    pattern: &Pattern,
    del: &str,
    graph: &mut SampleGraph,
) -> Result<ColumnarResult, EngineError> {
    if del.trim() != pattern.var {
        return Err(EngineError::Query("DELETE target must be the matched variable".into()));
    }
    graph
        .nodes
        .retain(|n| !(n.labels.iter().any(|l| l == &pattern.label) && pattern.props.iter().all(|(k, v)| &n.get(k) == v)));
    Ok(vec![])
}

/// Engine-facing value indices by node key, used by tests that assert on
/// graph contents without going through the converter.
#[allow(dead_code)]
pub fn node_keys(graph: &SampleGraph) -> HashMap<String, usize> {
    graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.key.clone(), i))
        .collect()
}
