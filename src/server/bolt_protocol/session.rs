//! Session state (C5): the PULL/DISCARD cursor over the last RUN result and
//! the transaction working-copy, grounded on the source's `BoltSession` and
//! `QueryResult`.

use super::converter::QueryResult;
use super::errors::TxError;
use crate::graph_engine::Graph;

/// A `RUN` result paired with a read cursor so PULL/DISCARD can consume it
/// incrementally (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCursor {
    pub fields: Vec<String>,
    records: Vec<Vec<crate::packstream::Value>>,
    cursor: usize,
}

impl ResultCursor {
    pub fn new(result: QueryResult) -> Self {
        ResultCursor {
            fields: result.fields,
            records: result.records,
            cursor: 0,
        }
    }

    /// Return up to `n` records starting at the cursor, advancing it.
    /// `n == -1` means "all remaining records".
    pub fn pull(&mut self, n: i64) -> Vec<Vec<crate::packstream::Value>> {
        let take = if n < 0 {
            self.records.len() - self.cursor
        } else {
            (n as usize).min(self.records.len() - self.cursor)
        };
        let end = self.cursor + take;
        let batch = self.records[self.cursor..end].to_vec();
        self.cursor = end;
        batch
    }

    /// Advance the cursor past `n` records (or all remaining, if `n == -1`)
    /// without returning them.
    pub fn discard(&mut self, n: i64) -> usize {
        let skip = if n < 0 {
            self.records.len() - self.cursor
        } else {
            (n as usize).min(self.records.len() - self.cursor)
        };
        self.cursor += skip;
        skip
    }

    pub fn has_more(&self) -> bool {
        self.cursor < self.records.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }
}

/// Per-connection session state: the active result cursor plus the
/// transaction working copy of the graph (§4.5, §5).
#[derive(Debug)]
pub struct Session<G: Graph> {
    pub current_result: Option<ResultCursor>,
    pub in_transaction: bool,
    tx_graph: Option<G>,
    pub bookmarks: Vec<String>,
    pub database: Option<String>,
    pub last_qid: i64,
}

impl<G: Graph> Session<G> {
    pub fn new() -> Self {
        Session {
            current_result: None,
            in_transaction: false,
            tx_graph: None,
            bookmarks: Vec::new(),
            database: None,
            last_qid: -1,
        }
    }

    /// Snapshot `graph` into a transaction-local working copy (§5: BEGIN
    /// deep-clones rather than locking).
    pub fn begin_transaction(&mut self, graph: &G) -> Result<(), TxError> {
        if self.in_transaction {
            return Err(TxError::AlreadyInTx);
        }
        self.tx_graph = Some(graph.clone_deep());
        self.in_transaction = true;
        Ok(())
    }

    /// Publish the transaction's working copy back onto the shared graph.
    pub fn commit_transaction(&mut self, graph: &mut G) -> Result<(), TxError> {
        let tx_graph = self.tx_graph.take().ok_or(TxError::NotInTx)?;
        if !self.in_transaction {
            return Err(TxError::NotInTx);
        }
        graph.replace_with(tx_graph);
        self.in_transaction = false;
        Ok(())
    }

    /// Discard the transaction's working copy, leaving the shared graph
    /// untouched.
    pub fn rollback_transaction(&mut self) -> Result<(), TxError> {
        if !self.in_transaction {
            return Err(TxError::NotInTx);
        }
        self.tx_graph = None;
        self.in_transaction = false;
        Ok(())
    }

    /// The graph a RUN should execute against: the transaction's working
    /// copy if one is open, otherwise the shared connection graph.
    pub fn working_graph<'a>(&'a mut self, shared: &'a mut G) -> &'a mut G {
        if self.in_transaction {
            self.tx_graph.as_mut().expect("in_transaction implies tx_graph is set")
        } else {
            shared
        }
    }

    /// The transaction's working copy, if one is open. Lets callers avoid
    /// taking the shared graph's lock while a transaction is in progress.
    pub fn tx_graph_mut(&mut self) -> Option<&mut G> {
        self.tx_graph.as_mut()
    }

    pub fn set_result(&mut self, result: QueryResult) {
        self.last_qid += 1;
        self.current_result = Some(ResultCursor::new(result));
    }

    pub fn clear_result(&mut self) {
        self.current_result = None;
    }
}

impl<G: Graph> Default for Session<G> {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packstream::Value;

    #[derive(Debug, Clone, PartialEq)]
    struct TestGraph(i64);
    impl Graph for TestGraph {}

    fn sample_result(n: usize) -> QueryResult {
        QueryResult {
            fields: vec!["x".to_string()],
            records: (0..n).map(|i| vec![Value::Int(i as i64)]).collect(),
        }
    }

    #[test]
    fn pull_respects_requested_count() {
        let mut cursor = ResultCursor::new(sample_result(5));
        let batch = cursor.pull(2);
        assert_eq!(batch, vec![vec![Value::Int(0)], vec![Value::Int(1)]]);
        assert!(cursor.has_more());
        let batch = cursor.pull(2);
        assert_eq!(batch, vec![vec![Value::Int(2)], vec![Value::Int(3)]]);
        assert!(cursor.has_more());
    }

    #[test]
    fn pull_all_with_negative_n() {
        let mut cursor = ResultCursor::new(sample_result(3));
        let batch = cursor.pull(-1);
        assert_eq!(batch.len(), 3);
        assert!(!cursor.has_more());
    }

    #[test]
    fn discard_advances_without_returning_records() {
        let mut cursor = ResultCursor::new(sample_result(4));
        let skipped = cursor.discard(2);
        assert_eq!(skipped, 2);
        assert!(cursor.has_more());
        assert_eq!(cursor.pull(-1).len(), 2);
    }

    #[test]
    fn begin_commit_replaces_shared_graph() {
        let mut session: Session<TestGraph> = Session::new();
        let mut shared = TestGraph(1);
        session.begin_transaction(&shared).unwrap();
        session.working_graph(&mut shared).0 = 42;
        session.commit_transaction(&mut shared).unwrap();
        assert_eq!(shared, TestGraph(42));
        assert!(!session.in_transaction);
    }

    #[test]
    fn rollback_leaves_shared_graph_untouched() {
        let mut session: Session<TestGraph> = Session::new();
        let mut shared = TestGraph(1);
        session.begin_transaction(&shared).unwrap();
        session.working_graph(&mut shared).0 = 42;
        session.rollback_transaction().unwrap();
        assert_eq!(shared, TestGraph(1));
        assert!(!session.in_transaction);
    }

    #[test]
    fn begin_while_already_in_tx_errors() {
        let mut session: Session<TestGraph> = Session::new();
        let shared = TestGraph(1);
        session.begin_transaction(&shared).unwrap();
        assert_eq!(session.begin_transaction(&shared), Err(TxError::AlreadyInTx));
    }

    #[test]
    fn commit_without_tx_errors() {
        let mut session: Session<TestGraph> = Session::new();
        let mut shared = TestGraph(1);
        assert_eq!(session.commit_transaction(&mut shared), Err(TxError::NotInTx));
    }
}
