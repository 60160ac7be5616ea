// src/error.rs

use arrow::datatypes::DataType;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the pipelines classify explicitly. Everything else travels as
/// an `anyhow::Error` with context attached at the call site.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuration error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("input not found: {0}")]
    MissingInput(PathBuf),

    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    #[error("column `{column}` has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },
}

impl EtlError {
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        EtlError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(table: &str, column: &str) -> Self {
        EtlError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
