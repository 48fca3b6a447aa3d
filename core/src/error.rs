use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cannot {action} database file {path}: {source}")]
    StoreFile {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Column '{column}' rejects value {value}: {reason}")]
    ColumnType {
        column: String,
        value: String,
        reason: String,
    },

    #[error("Cannot load staging from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to build '{table}': {source}")]
    Build {
        table: &'static str,
        #[source]
        source: Box<EtlError>,
    },

    #[error("Report '{report}' failed: {source}")]
    Query {
        report: &'static str,
        #[source]
        source: Box<EtlError>,
    },

    #[error("Cannot export to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cannot write report to the console: {0}")]
    Console(#[source] std::io::Error),

    #[error("Row has {found} values but the table has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// The six failure classes surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    Load,
    Build,
    Query,
    Export,
    InvalidArgument,
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Database(_)
            | EtlError::StoreFile { .. }
            | EtlError::ColumnType { .. } => ErrorKind::Storage,
            EtlError::Load { .. } => ErrorKind::Load,
            EtlError::Build { .. } | EtlError::RowWidth { .. } => ErrorKind::Build,
            EtlError::Query { .. } => ErrorKind::Query,
            EtlError::Export { .. } | EtlError::Console(_) => ErrorKind::Export,
            EtlError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
