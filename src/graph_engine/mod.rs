//! The external collaborator contract (§6.5): the Cypher query engine and
//! the graph data store themselves are deliberately out of scope (§1) and
//! are seen only through this narrow interface. `sample` provides one
//! bundled implementation so the crate is runnable end to end without
//! external wiring.

pub mod sample;

use crate::packstream::Value;
use thiserror::Error;

/// An opaque graph handle, seen only through deep-clone (BEGIN) and
/// replace (COMMIT).
pub trait Graph: Clone + Send + Sync + 'static {
    fn clone_deep(&self) -> Self {
        self.clone()
    }

    fn replace_with(&mut self, other: Self) {
        *self = other;
    }
}

/// A column-major result: `{fieldName: [value0, value1, ...]}`, preserving
/// field insertion order. All columns must have equal length.
pub type ColumnarResult = Vec<(String, Vec<Value>)>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Query(String),
}

/// `engine.run(query, params, graph) -> columnar result` (§6.5).
pub trait GraphEngine<G: Graph>: Send + Sync {
    fn run(&self, query: &str, params: &[(String, Value)], graph: &mut G) -> Result<ColumnarResult, EngineError>;
}
