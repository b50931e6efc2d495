//! # treeflat - flatten ragged hierarchy exports
//!
//! Tree exports (account trees, business-unit trees) list each node once and
//! close every branch with a leaf row holding a compact member range such as
//! `A01-A05`. treeflat rebuilds the full ancestor path on every row and expands
//! each range into one row per member.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Parser    │────▶│   Filler    │────▶│ Denormalizer│────▶ CSV
//! │ (ISO/UTF8)  │     │ (auto-enc)  │     │ (ffill+dep) │     │ (ranges)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use treeflat::{run_file, PipelineOptions};
//!
//! let summary = run_file("tree.csv".as_ref(), None, &PipelineOptions::default())?;
//! println!("{} output rows", summary.expansion.output_rows);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`config`] - Pipeline options
//! - [`logs`] - Log output
//! - [`models`] - Table model
//! - [`parser`] - Delimited table I/O with auto-detection
//! - [`validation`] - Column resolution and depth coercion
//! - [`transform`] - Filler, range grammar, denormalizer, pipeline

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// I/O
pub mod parser;

// Schema
pub mod validation;

// Transformation
pub mod transform;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    ConfigError, ExpandError, PipelineError, PipelineResult, SchemaError, TableError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    BoundaryFill, ExpandMode, ExpandOptions, FillOptions, OversizePolicy, PipelineOptions,
    DEFAULT_MAX_EXPANSION_ROWS,
};

// =============================================================================
// Re-exports - Models and I/O
// =============================================================================

pub use models::{Cell, Row, Table};

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, load_table, output_path_for,
    parse_bytes, parse_table, store_table, write_table, LoadedTable,
};

pub use validation::{coerce_depth, parse_depth, HierarchySchema, LevelColumn};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    denormalize, fill, parse_range, plan, range_size, Expansion, ExpansionReport, FillReport,
    Filled, Plan, RangeExpr, Step,
};

pub use transform::pipeline::{
    fill_file, plan_file, process_table, run_dir, run_file, with_new_rows, BatchSummary,
    Processed, RunSummary, NEW_ROWS_COLUMN,
};
