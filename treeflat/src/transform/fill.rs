//! Hierarchy filler.
//!
//! Sparse hierarchy exports only write a level label on the row that introduces
//! the node. Filling restores the missing labels in three steps:
//!
//! 1. **Run fill** - inside each run (rows up to a boundary row, see
//!    [`HierarchySchema::boundaries`]) every column except the terminal column is
//!    forward-filled from the nearest preceding value of the same run.
//! 2. **Root fill** - the root level column is forward-filled over the whole table.
//! 3. **Depth backfill** - a row with depth `L` gets every still-empty
//!    `Level_2..=Level_L` cell from the first non-empty cell of that column
//!    above it.
//!
//! The steps repeat until nothing changes, so filling a filled table is a no-op.

use std::ops::Range;

use serde::Serialize;

use crate::config::{BoundaryFill, FillOptions};
use crate::error::SchemaResult;
use crate::logs::log_debug;
use crate::models::Table;
use crate::validation::{coerce_depth, HierarchySchema};

/// Upper bound on fill passes. Two passes reach the fixpoint.
const MAX_PASSES: usize = 8;

/// Counters from one fill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Closed runs found
    pub runs: usize,
    /// Cells filled inside runs
    pub run_filled: usize,
    /// Root level cells filled
    pub root_filled: usize,
    /// Level cells filled from the depth indicator
    pub depth_filled: usize,
    /// Passes until no cell changed
    pub passes: usize,
}

impl FillReport {
    pub fn total(&self) -> usize {
        self.run_filled + self.root_filled + self.depth_filled
    }
}

/// A filled table with its counters
#[derive(Debug, Clone)]
pub struct Filled {
    pub table: Table,
    pub report: FillReport,
}

/// Fill a sparse hierarchy table. The input is left untouched.
pub fn fill(table: &Table, schema: &HierarchySchema, options: &FillOptions) -> SchemaResult<Filled> {
    let mut out = coerce_depth(table, schema)?;

    // The terminal column is never written, so boundaries are stable.
    let boundaries = schema.boundaries(&out);
    let runs = closed_runs(&boundaries, options.boundary);

    let mut report = FillReport {
        runs: runs.len(),
        ..FillReport::default()
    };

    while report.passes < MAX_PASSES {
        report.passes += 1;

        let mut run_filled = 0;
        for run in &runs {
            run_filled += fill_run(&mut out, run.clone(), schema.terminal);
        }
        let root_filled = forward_fill(&mut out, 0..table.len(), schema.root());
        let depth_filled = backfill_depth(&mut out, schema);

        report.run_filled += run_filled;
        report.root_filled += root_filled;
        report.depth_filled += depth_filled;

        if run_filled + root_filled + depth_filled == 0 {
            break;
        }
    }

    Ok(Filled { table: out, report })
}

/// Row ranges of the closed runs
///
/// A run starts after the previous boundary (or at row 0) and ends before its
/// closing boundary, or right after it with [`BoundaryFill::Inclusive`]. Rows
/// after the last boundary do not belong to a closed run.
pub fn closed_runs(boundaries: &[usize], mode: BoundaryFill) -> Vec<Range<usize>> {
    let mut start = 0;
    boundaries
        .iter()
        .map(|&b| {
            let end = match mode {
                BoundaryFill::Exclusive => b,
                BoundaryFill::Inclusive => b + 1,
            };
            let run = start..end;
            start = b + 1;
            run
        })
        .collect()
}

fn fill_run(table: &mut Table, rows: Range<usize>, terminal: usize) -> usize {
    (0..table.width())
        .filter(|&col| col != terminal)
        .map(|col| forward_fill(table, rows.clone(), col))
        .sum()
}

/// Forward-fill one column over `rows`; returns the number of cells written.
fn forward_fill(table: &mut Table, rows: Range<usize>, col: usize) -> usize {
    let mut last: Option<String> = None;
    let mut filled = 0;

    for idx in rows {
        let Some(row) = table.row_mut(idx) else {
            break;
        };
        match row.get(col) {
            Some(value) => last = Some(value.to_string()),
            None => {
                if let Some(ref value) = last {
                    row.set(col, Some(value.clone()));
                    filled += 1;
                }
            }
        }
    }

    filled
}

fn backfill_depth(table: &mut Table, schema: &HierarchySchema) -> usize {
    // First non-empty cell of each level column. Filling only copies values
    // downwards, so these never move.
    let first: Vec<Option<(usize, String)>> = schema
        .levels
        .iter()
        .map(|level| {
            table
                .rows()
                .iter()
                .enumerate()
                .find_map(|(idx, row)| row.get(level.index).map(|v| (idx, v.to_string())))
        })
        .collect();

    let max_depth = schema.levels.last().map(|l| l.depth).unwrap_or(1);
    let mut filled = 0;

    for idx in 0..table.len() {
        let Some(depth) = schema.depth_of(table, idx) else {
            continue;
        };
        let depth = depth.min(max_depth);

        for (level, first) in schema.levels.iter().zip(&first) {
            if level.depth < 2 || level.depth > depth {
                continue;
            }
            let Some((first_idx, value)) = first else {
                continue;
            };
            if *first_idx >= idx {
                continue;
            }
            let Some(row) = table.row_mut(idx) else {
                continue;
            };
            if row.is_empty_at(level.index) {
                log_debug(format!(
                    "Filling level {} on row {} with '{}'",
                    level.depth,
                    idx + 1,
                    value
                ));
                row.set(level.index, Some(value.clone()));
                filled += 1;
            }
        }
    }

    filled
}
