use thiserror::Error;

use crate::schema::Field;
use crate::transform::Selector;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors raised while loading benchmark rows or deriving series from them.
///
/// Every variant is fatal to the computation that produced it; callers decide
/// whether to abort the run or skip the affected view.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no rows match selector {0}")]
    EmptySelection(Selector),

    #[error("data integrity violated at selected row {index}: {reason}")]
    DataIntegrity { index: usize, reason: String },

    #[error("no representative row for {0}")]
    MissingRow(String),

    #[error("ads count is zero or missing at selected row {index}")]
    DivisionByZero { index: usize },

    #[error("{0} does not fit in 64 bits")]
    Overflow(String),

    #[error("no column for {field} (accepted headers: {accepted})")]
    MissingColumn { field: Field, accepted: String },

    #[error("record {record}: column {column} holds {value:?}, expected a non-negative integer")]
    InvalidValue {
        record: usize,
        column: String,
        value: String,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReportError {
    pub(crate) fn integrity(index: usize, reason: impl Into<String>) -> Self {
        ReportError::DataIntegrity {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(what: impl Into<String>) -> Self {
        ReportError::Overflow(what.into())
    }
}
