//! Hierarchy schema resolution.
//!
//! Maps the configured column names onto a loaded [`Table`] and checks that the
//! table can be processed at all. Everything here is fatal on failure: there is
//! no partial-success mode for structurally invalid input.
//!
//! # Columns
//!
//! - terminal column: configured by name, or the last column when unset
//! - depth column: `Level_Nr` by default, integer-or-empty
//! - level columns: every header `<prefix><n>` with `n >= 1`, ordered by `n`;
//!   `<prefix>1` must exist

use crate::config::PipelineOptions;
use crate::error::{SchemaError, SchemaResult};
use crate::models::Table;

/// One `Level_<n>` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelColumn {
    /// The `n` in `Level_<n>`
    pub depth: usize,
    /// Column index in the table
    pub index: usize,
}

/// Resolved column positions for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchySchema {
    pub terminal: usize,
    pub depth: usize,
    /// Sorted by depth; the first entry is the root level
    pub levels: Vec<LevelColumn>,
}

impl HierarchySchema {
    /// Resolve column names against the table header.
    pub fn resolve(
        table: &Table,
        terminal_column: Option<&str>,
        depth_column: &str,
        level_prefix: &str,
    ) -> SchemaResult<Self> {
        let terminal = match terminal_column {
            Some(name) => table
                .column_index(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?,
            None => table
                .width()
                .checked_sub(1)
                .ok_or_else(|| SchemaError::MissingColumn("<last column>".to_string()))?,
        };

        let depth = table
            .column_index(depth_column)
            .ok_or_else(|| SchemaError::MissingColumn(depth_column.to_string()))?;

        let mut levels: Vec<LevelColumn> = table
            .headers()
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != terminal && *index != depth)
            .filter_map(|(index, header)| {
                level_number(header, level_prefix).map(|depth| LevelColumn { depth, index })
            })
            .collect();
        levels.sort_by_key(|l| l.depth);

        if levels.first().map(|l| l.depth) != Some(1) {
            return Err(SchemaError::MissingRootLevel {
                prefix: level_prefix.to_string(),
            });
        }

        Ok(Self {
            terminal,
            depth,
            levels,
        })
    }

    pub fn from_options(table: &Table, options: &PipelineOptions) -> SchemaResult<Self> {
        Self::resolve(
            table,
            options.terminal_column.as_deref(),
            &options.depth_column,
            &options.level_prefix,
        )
    }

    /// Column index of the root level
    pub fn root(&self) -> usize {
        self.levels[0].index
    }

    /// Column index of `Level_<depth>`, if the table has one
    pub fn level(&self, depth: usize) -> Option<usize> {
        self.levels
            .iter()
            .find(|l| l.depth == depth)
            .map(|l| l.index)
    }

    /// Indices of rows with a non-empty terminal cell
    pub fn boundaries(&self, table: &Table) -> Vec<usize> {
        table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_empty_at(self.terminal))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Depth indicator of a row, after [`coerce_depth`]
    pub fn depth_of(&self, table: &Table, row: usize) -> Option<usize> {
        table
            .get(row, self.depth)
            .and_then(parse_depth)
            .map(|d| d as usize)
    }
}

/// `Level_12` with prefix `Level_` -> `Some(12)`
fn level_number(header: &str, prefix: &str) -> Option<usize> {
    let rest = header.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok().filter(|n: &usize| *n >= 1)
}

/// Parse a depth cell. Accepts integers and integral floats (`3`, `3.0`).
pub fn parse_depth(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return Some(n);
    }
    let f: f64 = value.parse().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

/// Copy of `table` with every depth cell normalized to a plain integer.
///
/// Fails on the first cell that is not integer-or-empty.
pub fn coerce_depth(table: &Table, schema: &HierarchySchema) -> SchemaResult<Table> {
    let mut out = table.clone();
    for idx in 0..out.len() {
        let Some(raw) = table.get(idx, schema.depth) else {
            continue;
        };
        let depth = parse_depth(raw).ok_or_else(|| SchemaError::InvalidDepth {
            row: idx + 1,
            value: raw.to_string(),
        })?;
        if let Some(row) = out.row_mut(idx) {
            row.set(schema.depth, Some(depth.to_string()));
        }
    }
    Ok(out)
}
