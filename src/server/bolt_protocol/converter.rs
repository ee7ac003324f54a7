//! Result converter (C6): maps the engine's columnar `{field: [values]}`
//! results into protocol records, assigning stable per-connection integer
//! ids to nodes and relationships and building `Node`/`Relationship`/`Path`
//! structures from `__`-prefixed engine metadata.

use std::collections::HashMap;

use super::messages::{node_struct, path_struct, relationship_struct, unbound_relationship_struct};
use crate::graph_engine::ColumnarResult;
use crate::packstream::Value;

/// A converted query result: column names plus row-major records.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub fields: Vec<String>,
    pub records: Vec<Vec<Value>>,
}

/// Assigns stable monotonic integer ids to node/edge keys for the lifetime
/// of one connection (§4.6). IDs never decrease and are not recycled.
#[derive(Debug, Default)]
pub struct ResultConverter {
    node_ids: HashMap<String, i64>,
    edge_ids: HashMap<String, i64>,
    next_node_id: i64,
    next_edge_id: i64,
}

impl ResultConverter {
    pub fn new() -> Self {
        ResultConverter::default()
    }

    /// Convert a column-major engine result into row-major protocol records,
    /// preserving field insertion order.
    pub fn convert_result(&mut self, result: ColumnarResult) -> QueryResult {
        if result.is_empty() {
            return QueryResult {
                fields: vec![],
                records: vec![],
            };
        }

        let fields: Vec<String> = result.iter().map(|(name, _)| name.clone()).collect();
        let num_rows = result[0].1.len();

        let mut records = Vec::with_capacity(num_rows);
        for i in 0..num_rows {
            let mut row = Vec::with_capacity(fields.len());
            for (_, column) in &result {
                row.push(self.convert_value(&column[i]));
            }
            records.push(row);
        }

        QueryResult { fields, records }
    }

    fn node_id(&mut self, key: &str) -> i64 {
        if let Some(id) = self.node_ids.get(key) {
            return *id;
        }
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.node_ids.insert(key.to_string(), id);
        id
    }

    fn edge_id(&mut self, key: &str) -> i64 {
        if let Some(id) = self.edge_ids.get(key) {
            return *id;
        }
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edge_ids.insert(key.to_string(), id);
        id
    }

    fn convert_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Map(entries) => {
                if entries.iter().any(|(k, _)| k == "__node_id__") {
                    self.convert_node(entries)
                } else if entries.iter().any(|(k, _)| k == "__rel_type__" || k == "__edge_key__") {
                    self.convert_relationship(entries)
                } else if entries.iter().any(|(k, _)| k == "__path__") {
                    self.convert_path(entries)
                } else {
                    Value::Map(
                        entries
                            .iter()
                            .map(|(k, v)| (k.clone(), self.convert_value(v)))
                            .collect(),
                    )
                }
            }
            Value::List(items) => Value::List(items.iter().map(|v| self.convert_value(v)).collect()),
            other => other.clone(),
        }
    }

    fn properties_of(entries: &[(String, Value)]) -> Vec<(String, Value)> {
        entries
            .iter()
            .filter(|(k, _)| !k.starts_with("__"))
            .cloned()
            .collect()
    }

    fn convert_node(&mut self, entries: &[(String, Value)]) -> Value {
        let node_key = entries
            .iter()
            .find(|(k, _)| k == "__node_id__")
            .and_then(|(_, v)| v.as_str())
            .unwrap_or_default()
            .to_string();
        let id = self.node_id(&node_key);
        let labels = entries
            .iter()
            .find(|(k, _)| k == "__labels__")
            .and_then(|(_, v)| v.as_list())
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let properties = Self::properties_of(entries);
        node_struct(id, labels, properties, node_key)
    }

    fn convert_relationship(&mut self, entries: &[(String, Value)]) -> Value {
        let start = Self::field_str(entries, "__start_node__");
        let end = Self::field_str(entries, "__end_node__");
        let edge_key = entries.iter().find(|(k, _)| k == "__edge_key__").map(|(_, v)| v);
        let rel_type = entries
            .iter()
            .find(|(k, _)| k == "__rel_type__")
            .and_then(|(_, v)| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                entries
                    .iter()
                    .find(|(k, _)| k == "__labels__")
                    .and_then(|(_, v)| v.as_list())
                    .and_then(|items| items.first())
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        let edge_tuple = edge_tuple_key(&start, &end, edge_key);
        let id = self.edge_id(&edge_tuple);
        let start_id = self.node_id(&start);
        let end_id = self.node_id(&end);
        let properties = Self::properties_of(entries);

        relationship_struct(id, start_id, end_id, rel_type, properties, edge_tuple, start, end)
    }

    fn field_str(entries: &[(String, Value)], key: &str) -> String {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// A map containing `__path__` (a sequence alternating node-map,
    /// rel-map, ...). Direction is forward iff the following node matches
    /// the relationship's `__end_node__`; nodes are deduplicated by key.
    fn convert_path(&mut self, entries: &[(String, Value)]) -> Value {
        let path_data = entries
            .iter()
            .find(|(k, _)| k == "__path__")
            .and_then(|(_, v)| v.as_list())
            .unwrap_or_default();

        let mut nodes = Vec::new();
        let mut relationships = Vec::new();
        let mut indices = Vec::new();
        let mut node_index: HashMap<String, i64> = HashMap::new();
        let mut rel_index: i64 = 0;

        for (i, element) in path_data.iter().enumerate() {
            if i % 2 == 0 {
                let Some(map_entries) = element.as_map() else { continue };
                let Some(node_key) = map_entries
                    .iter()
                    .find(|(k, _)| k == "__node_id__")
                    .and_then(|(_, v)| v.as_str())
                else {
                    continue;
                };
                let node_key = node_key.to_string();
                let idx = *node_index.entry(node_key.clone()).or_insert_with(|| {
                    let id = self.node_id(&node_key);
                    let labels = map_entries
                        .iter()
                        .find(|(k, _)| k == "__labels__")
                        .and_then(|(_, v)| v.as_list())
                        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    let properties = Self::properties_of(map_entries);
                    nodes.push(node_struct(id, labels, properties, node_key.clone()));
                    (nodes.len() - 1) as i64
                });
                indices.push(idx);
            } else {
                let Some(map_entries) = element.as_map() else { continue };
                let rel_type = map_entries
                    .iter()
                    .find(|(k, _)| k == "__rel_type__")
                    .and_then(|(_, v)| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let start = Self::field_str(map_entries, "__start_node__");
                let end = Self::field_str(map_entries, "__end_node__");
                let edge_key = map_entries.iter().find(|(k, _)| k == "__edge_key__").map(|(_, v)| v);
                let edge_tuple = edge_tuple_key(&start, &end, edge_key);
                let id = self.edge_id(&edge_tuple);
                let properties = Self::properties_of(map_entries);

                let forward = path_data.get(i + 1).and_then(Value::as_map).and_then(|next| {
                    next.iter()
                        .find(|(k, _)| k == "__node_id__")
                        .and_then(|(_, v)| v.as_str())
                }) == Some(end.as_str());

                rel_index += 1;
                indices.push(if forward { rel_index } else { -rel_index });

                relationships.push(unbound_relationship_struct(id, rel_type, properties, edge_tuple));
            }
        }

        path_struct(nodes, relationships, indices)
    }
}

fn edge_tuple_key(start: &str, end: &str, edge_key: Option<&Value>) -> String {
    match edge_key.and_then(Value::as_str) {
        Some(k) => format!("({start}, {end}, {k})"),
        None => format!("({start}, {end})"),
    }
}
