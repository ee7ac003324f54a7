//! Bolt Protocol Error Types
//!
//! Error taxonomy for the Bolt protocol stack (§7): codec, state,
//! transaction, and transport-level failures, each mapped to a Neo4j
//! compatible error code for FAILURE responses.

use thiserror::Error;

use crate::packstream::CodecError;

/// Errors raised by connection state-machine transitions (C4).
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum StateError {
    #[error("invalid state transition: {from} -> {to}")]
    BadTransition { from: String, to: String },
}

/// Errors raised by transaction lifecycle operations (C5).
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum TxError {
    #[error("BEGIN while already in a transaction")]
    AlreadyInTx,
    #[error("COMMIT or ROLLBACK while not in a transaction")]
    NotInTx,
}

/// Top-level Bolt protocol error type.
#[derive(Error, Debug)]
pub enum BoltError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("invalid message: {message}")]
    InvalidMessage { message: String },

    #[error("message too large: {size} bytes, maximum allowed {max_size}")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("connection idle timeout after {timeout_secs}s")]
    ConnectionTimeout { timeout_secs: u64 },

    #[error("query error: {message}")]
    QueryError { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

pub type BoltResult<T> = Result<T, BoltError>;

impl BoltError {
    pub fn invalid_message<S: Into<String>>(message: S) -> Self {
        BoltError::InvalidMessage {
            message: message.into(),
        }
    }

    pub fn query_error<S: Into<String>>(message: S) -> Self {
        BoltError::QueryError {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        BoltError::Internal {
            message: message.into(),
        }
    }

    /// Neo4j-compatible status code for a FAILURE response (§7).
    pub fn error_code(&self) -> &'static str {
        match self {
            BoltError::Io(_) => "Neo.ClientError.General.ConnectionError",
            BoltError::Codec(_) => "Neo.ClientError.Request.Invalid",
            BoltError::State(_) => "Neo.ClientError.Request.Invalid",
            BoltError::Transaction(TxError::AlreadyInTx) => {
                "Neo.ClientError.Transaction.TransactionStartFailed"
            }
            BoltError::Transaction(TxError::NotInTx) => {
                "Neo.ClientError.Transaction.TransactionNotFound"
            }
            BoltError::InvalidMessage { .. } => "Neo.ClientError.Request.InvalidFormat",
            BoltError::MessageTooLarge { .. } => "Neo.ClientError.Request.InvalidFormat",
            BoltError::ConnectionTimeout { .. } => "Neo.TransientError.General.DatabaseUnavailable",
            BoltError::QueryError { .. } => "Neo.ClientError.Statement.SyntaxError",
            BoltError::Internal { .. } => "Neo.DatabaseError.General.UnknownError",
        }
    }
}
