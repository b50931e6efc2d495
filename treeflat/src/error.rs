//! Error types for the treeflat pipeline.
//!
//! One enum per layer:
//!
//! - [`TableError`] - reading and writing delimited tables
//! - [`SchemaError`] - configured columns that do not fit the table
//! - [`ExpandError`] - range denormalization failures
//! - [`ConfigError`] - loading pipeline options
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Conversion is automatic via `From` implementations,
//! so `?` works across layer boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Table I/O Errors
// =============================================================================

/// Errors while loading or storing a delimited table.
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to read or write a file.
    #[error("Failed to access file: {0}")]
    Io(#[from] std::io::Error),

    /// The csv reader or writer rejected the data.
    #[error("Invalid CSV data: {0}")]
    Csv(#[from] csv::Error),

    /// Bytes could not be decoded with the detected encoding.
    #[error("Failed to decode content as {0}")]
    Encoding(String),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Header line has no columns.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Delimiter must be a single-byte character.
    #[error("Unsupported delimiter '{0}'")]
    InvalidDelimiter(char),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// The table does not have the shape the options describe.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A configured column is absent from the header.
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// No `<prefix>1` column exists.
    #[error("No root level column '{prefix}1' found")]
    MissingRootLevel { prefix: String },

    /// A depth cell is not a non-negative integer.
    #[error("Invalid depth value '{value}' on data row {row}")]
    InvalidDepth { row: usize, value: String },
}

// =============================================================================
// Expansion Errors
// =============================================================================

/// Errors while expanding leaf ranges.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// Schema failure discovered while expanding.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A span would exceed the configured ceiling and the policy is to abort.
    #[error(
        "Expansion of rows {first_row}..={last_row} would create {projected} rows (limit {limit})"
    )]
    Oversized {
        first_row: usize,
        last_row: usize,
        projected: u64,
        limit: u64,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading pipeline options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Options file unreadable.
    #[error("Cannot read options file: {0}")]
    Io(#[from] std::io::Error),

    /// Options file is not valid JSON for [`crate::config::PipelineOptions`].
    #[error("Invalid options file: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_file`]
/// and the other pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Table I/O error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Schema error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Expansion error.
    #[error("Expansion error: {0}")]
    Expand(#[from] ExpandError),

    /// Options error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Batch mode found nothing to process.
    #[error("No input files matching '{suffix}' under {}", .dir.display())]
    NoInputFiles { dir: PathBuf, suffix: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table I/O.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for schema resolution.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for expansion.
pub type ExpandResult<T> = Result<T, ExpandError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
