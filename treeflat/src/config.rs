//! Pipeline options.
//!
//! Options are plain serde structs with defaults matching the usual
//! `Level_1..Level_N` / `Level_Nr` export layout. They can be loaded from a
//! JSON file and then overridden field by field from the command line.
//!
//! ```json
//! {
//!   "terminal_column": "Account_Range",
//!   "expand": { "mode": "span", "max_expansion_rows": 100000, "oversize": "abort" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default ceiling for one expansion step.
pub const DEFAULT_MAX_EXPANSION_ROWS: u64 = 50_000;

/// Which rows the run forward-fill touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryFill {
    /// Only rows strictly between two boundary rows
    Exclusive,
    /// Rows between boundaries plus the closing boundary row itself.
    /// Leaf expansion copies boundary rows, so they need their ancestors.
    #[default]
    Inclusive,
}

/// How leaf ranges are crossed with table rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandMode {
    /// Each boundary row is expanded by its own range
    #[default]
    Leaf,
    /// Rows between boundaries are crossed with the ranges of the boundary
    /// block that closes them
    Span,
}

/// What to do when one expansion step exceeds `max_expansion_rows`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Report the projected size, then expand anyway
    #[default]
    Warn,
    /// Report the projected size and emit nothing for the span
    Skip,
    /// Fail the run
    Abort,
}

/// Hierarchy filler options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    pub boundary: BoundaryFill,
}

/// Range denormalizer options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandOptions {
    pub mode: ExpandMode,

    /// Ceiling on `span rows × members` for a single expansion step
    pub max_expansion_rows: u64,

    pub oversize: OversizePolicy,

    /// Name of the provenance column appended to the output
    pub provenance_column: String,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            mode: ExpandMode::default(),
            max_expansion_rows: DEFAULT_MAX_EXPANSION_ROWS,
            oversize: OversizePolicy::default(),
            provenance_column: "filename".to_string(),
        }
    }
}

/// Options for a full pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Column holding leaf range expressions. `None` selects the last column.
    pub terminal_column: Option<String>,

    /// Column holding the per-row depth indicator
    pub depth_column: String,

    /// Prefix of the level columns (`Level_` for `Level_1..Level_N`)
    pub level_prefix: String,

    /// Input delimiter. `None` auto-detects; output uses the same delimiter.
    pub delimiter: Option<char>,

    /// Where to persist the filled, not yet expanded table
    pub intermediate_path: Option<PathBuf>,

    pub fill: FillOptions,

    pub expand: ExpandOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            terminal_column: None,
            depth_column: "Level_Nr".to_string(),
            level_prefix: "Level_".to_string(),
            delimiter: None,
            intermediate_path: None,
            fill: FillOptions::default(),
            expand: ExpandOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Parse options from a JSON string; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
