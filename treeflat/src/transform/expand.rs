//! Range denormalizer.
//!
//! Turns a filled hierarchy table into one row per leaf member. Expansion is
//! split in two phases:
//!
//! 1. [`plan`] finds the boundary rows, parses their ranges and groups them into
//!    [`Step`]s (template rows × member ranges) without materializing anything.
//! 2. [`denormalize`] executes the steps, applying the oversize guard to each
//!    step before any row is copied.
//!
//! # Modes
//!
//! ```text
//! row  Level_1  Range        Leaf mode            Span mode
//!  0   Root                                       rows 0..=1 × (A01 A02 B1)
//!  1   Root
//!  2   Root     A01-A02      row 2 × (A01 A02)
//!  3   Root     B1           row 3 × (B1)
//! ```
//!
//! In span mode the boundary list is walked from the table end upwards.
//! Adjacent boundary rows append their members to a pending buffer, so a
//! block of boundaries contributes its ranges bottom row first. The first gap
//! of real rows is crossed with the whole buffer, which is then cleared. Steps
//! are emitted in walk order.

use std::ops::Range;

use serde::Serialize;

use crate::config::{ExpandMode, ExpandOptions, OversizePolicy};
use crate::error::{ExpandError, ExpandResult, SchemaError};
use crate::logs::{log_debug, log_info, log_warning};
use crate::models::Table;

use super::range::RangeExpr;

/// Spans at least this large log their progress
const PROGRESS_MIN_ROWS: u64 = 10_000;

/// One expansion step: every template row crossed with every member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Template rows, in table order
    pub rows: Range<usize>,
    /// Ranges whose members replace the terminal cell, in order
    pub members: Vec<RangeExpr>,
}

impl Step {
    pub fn member_count(&self) -> u64 {
        self.members.iter().map(RangeExpr::len).sum()
    }

    /// Output rows this step produces
    pub fn projected(&self) -> u64 {
        (self.rows.len() as u64).saturating_mul(self.member_count())
    }

    /// 1-based first and last data row
    fn display_rows(&self) -> (usize, usize) {
        (self.rows.start + 1, self.rows.end)
    }
}

/// A range cell that did not parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRange {
    /// 1-based data row
    pub row: usize,
    pub text: String,
}

/// Steps for one table, not yet executed
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub malformed: Vec<MalformedRange>,
    /// Members left in the pending buffer with no rows to apply to
    pub dropped_members: u64,
}

impl Plan {
    pub fn total_projected(&self) -> u64 {
        self.steps
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.projected()))
    }
}

/// A step that went over the ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversizeEvent {
    /// 1-based first data row of the span
    pub first_row: usize,
    /// 1-based last data row of the span
    pub last_row: usize,
    pub span_rows: usize,
    pub members: u64,
    pub projected: u64,
    pub policy: OversizePolicy,
}

/// What happened during one expansion
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionReport {
    /// Steps executed (including skipped oversized ones)
    pub spans: usize,
    pub output_rows: usize,
    pub malformed: Vec<MalformedRange>,
    pub oversized: Vec<OversizeEvent>,
    pub dropped_members: u64,
}

/// Expanded table with its report
#[derive(Debug, Clone)]
pub struct Expansion {
    pub table: Table,
    pub report: ExpansionReport,
}

/// Group the boundary rows of `table` into expansion steps.
///
/// `terminal` is the index of the range column, as resolved by
/// [`crate::validation::HierarchySchema`].
pub fn plan(table: &Table, terminal: usize, mode: ExpandMode) -> ExpandResult<Plan> {
    check_terminal(table, terminal)?;

    let mut result = Plan::default();
    let mut boundaries = Vec::new();
    let mut exprs = Vec::new();

    for (idx, row) in table.rows().iter().enumerate() {
        let Some(text) = row.get(terminal) else {
            continue;
        };
        let expr = RangeExpr::parse(text);
        if expr.is_malformed() {
            log_warning(format!(
                "Row {}: could not parse range '{}', keeping raw bounds",
                idx + 1,
                text
            ));
            result.malformed.push(MalformedRange {
                row: idx + 1,
                text: text.to_string(),
            });
        }
        boundaries.push(idx);
        exprs.push(expr);
    }

    match mode {
        ExpandMode::Leaf => {
            result.steps = boundaries
                .iter()
                .zip(exprs)
                .map(|(&b, expr)| Step {
                    rows: b..b + 1,
                    members: vec![expr],
                })
                .collect();
        }
        ExpandMode::Span => {
            let mut pending: Vec<RangeExpr> = Vec::new();

            for (j, expr) in exprs.into_iter().enumerate().rev() {
                let b = boundaries[j];
                let span_start = if j == 0 { 0 } else { boundaries[j - 1] + 1 };

                pending.push(expr);

                if span_start < b {
                    result.steps.push(Step {
                        rows: span_start..b,
                        members: std::mem::take(&mut pending),
                    });
                }
            }

            result.dropped_members = pending.iter().map(RangeExpr::len).sum();
        }
    }

    Ok(result)
}

/// Expand every leaf range of a filled table into one row per member.
///
/// `source` is written to the provenance column of every output row.
pub fn denormalize(
    table: &Table,
    terminal: usize,
    options: &ExpandOptions,
    source: &str,
) -> ExpandResult<Expansion> {
    let plan = plan(table, terminal, options.mode)?;
    execute(table, terminal, &plan, options, source)
}

/// Execute a plan produced by [`plan`] for the same table.
pub fn execute(
    table: &Table,
    terminal: usize,
    plan: &Plan,
    options: &ExpandOptions,
    source: &str,
) -> ExpandResult<Expansion> {
    check_terminal(table, terminal)?;

    let mut out = table.empty_like();
    let mut report = ExpansionReport {
        malformed: plan.malformed.clone(),
        dropped_members: plan.dropped_members,
        ..ExpansionReport::default()
    };

    if plan.dropped_members > 0 {
        log_warning(format!(
            "{} range members above the first data row have no rows to apply to",
            plan.dropped_members
        ));
    }

    for step in &plan.steps {
        report.spans += 1;
        let projected = step.projected();
        let (first_row, last_row) = step.display_rows();

        log_debug(format!(
            "Rows {}..={}: {} rows × {} members = {} new rows",
            first_row,
            last_row,
            step.rows.len(),
            step.member_count(),
            projected
        ));

        if projected > options.max_expansion_rows {
            log_warning(format!(
                "Rows {}..={} would create {} rows ({} × {}), limit is {}",
                first_row,
                last_row,
                projected,
                step.rows.len(),
                step.member_count(),
                options.max_expansion_rows
            ));
            report.oversized.push(OversizeEvent {
                first_row,
                last_row,
                span_rows: step.rows.len(),
                members: step.member_count(),
                projected,
                policy: options.oversize,
            });

            match options.oversize {
                OversizePolicy::Warn => {}
                OversizePolicy::Skip => {
                    log_warning(format!("Skipping rows {}..={}", first_row, last_row));
                    continue;
                }
                OversizePolicy::Abort => {
                    return Err(ExpandError::Oversized {
                        first_row,
                        last_row,
                        projected,
                        limit: options.max_expansion_rows,
                    });
                }
            }
        }

        expand_step(table, terminal, step, projected, &mut out);
    }

    report.output_rows = out.len();
    out.push_column(options.provenance_column.clone(), |_, _| {
        Some(source.to_string())
    });

    Ok(Expansion { table: out, report })
}

fn check_terminal(table: &Table, terminal: usize) -> ExpandResult<()> {
    if terminal < table.width() {
        Ok(())
    } else {
        Err(SchemaError::MissingColumn(format!("#{}", terminal)).into())
    }
}

/// Percentage to report after `done` of `total` rows, once per crossed 10 % mark
fn crossed_decile(done: usize, total: usize, last: &mut usize) -> Option<usize> {
    let decile = done * 10 / total.max(1);
    if decile > *last {
        *last = decile;
        Some(decile * 10)
    } else {
        None
    }
}

fn expand_step(table: &Table, terminal: usize, step: &Step, projected: u64, out: &mut Table) {
    out.reserve(usize::try_from(projected).unwrap_or(usize::MAX).min(1 << 20));

    let total = step.rows.len();
    let show_progress = projected >= PROGRESS_MIN_ROWS;
    let mut last_decile = 0;

    for (done, idx) in step.rows.clone().enumerate() {
        let Some(template) = table.row(idx) else {
            break;
        };
        for expr in &step.members {
            for member in expr.members() {
                out.push_row(template.with_cell(terminal, member));
            }
        }
        if !show_progress {
            continue;
        }
        if let Some(percent) = crossed_decile(done + 1, total, &mut last_decile) {
            log_info(format!("Progress: {}% ({}/{} rows)", percent, done + 1, total));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{column, table};

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn range(t: &Table) -> usize {
        t.column_index("Range").unwrap()
    }

    fn opts(mode: ExpandMode) -> ExpandOptions {
        ExpandOptions {
            mode,
            ..ExpandOptions::default()
        }
    }

    fn sample() -> Table {
        table(
            &["Level_1", "Level_2", "Level_Nr", "Range"],
            &[
                &["Root", "", "1", ""],
                &["Root", "Ops", "2", ""],
                &["Root", "Ops", "", "A01-A03"],
                &["Root", "Ops", "", "B1"],
                &["Root", "Sales", "2", ""],
                &["Root", "Sales", "", "100-101"],
            ],
        )
    }

    #[test]
    fn test_scenario_leaf() {
        let filled = table(
            &["Level_1", "Level_Nr", "Range"],
            &[&["Root", "1", ""], &["Root", "", ""], &["Root", "", "A01-A03"]],
        );
        let result = denormalize(&filled, range(&filled), &opts(ExpandMode::Leaf), "tree.csv").unwrap();

        assert_eq!(result.table.len(), 3);
        assert_eq!(column(&result.table, "Range"), vec![s("A01"), s("A02"), s("A03")]);
        assert_eq!(column(&result.table, "Level_1"), vec![s("Root"); 3]);
        assert_eq!(column(&result.table, "filename"), vec![s("tree.csv"); 3]);
        assert_eq!(result.report.output_rows, 3);
    }

    #[test]
    fn test_leaf_cardinality() {
        let t = sample();
        let result = denormalize(&t, range(&t), &opts(ExpandMode::Leaf), "x").unwrap();
        // 3 + 1 + 2
        assert_eq!(result.table.len(), 6);
        assert_eq!(
            column(&result.table, "Range"),
            vec![s("A01"), s("A02"), s("A03"), s("B1"), s("100"), s("101")]
        );
        assert_eq!(result.table.get(5, 1), Some("Sales"));
    }

    #[test]
    fn test_span_walk() {
        let t = sample();
        let plan = plan(&t, range(&t), ExpandMode::Span).unwrap();

        // processed from the table end: rows 4 then rows 0..=1
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].rows, 4..5);
        assert_eq!(plan.steps[0].member_count(), 2);
        assert_eq!(plan.steps[1].rows, 0..2);
        // the boundary block B1, A01-A03 (walk order) applies to the span above it
        assert_eq!(plan.steps[1].member_count(), 4);
        assert_eq!(plan.steps[1].members[0], RangeExpr::parse("B1"));
        assert_eq!(plan.dropped_members, 0);

        let result = execute(&t, range(&t), &plan, &opts(ExpandMode::Span), "x").unwrap();
        assert_eq!(result.table.len(), 2 + 2 * 4);
        assert_eq!(
            column(&result.table, "Range"),
            vec![
                s("100"), s("101"),
                s("B1"), s("A01"), s("A02"), s("A03"),
                s("B1"), s("A01"), s("A02"), s("A03"),
            ]
        );
        assert_eq!(result.table.get(0, 1), Some("Sales"));
        assert_eq!(result.table.get(2, 1), None);
        assert_eq!(result.table.get(6, 1), Some("Ops"));
    }

    #[test]
    fn test_span_cardinality_law() {
        let t = sample();
        let plan = plan(&t, range(&t), ExpandMode::Span).unwrap();
        let expected: u64 = plan
            .steps
            .iter()
            .map(|s| s.rows.len() as u64 * s.member_count())
            .sum();
        let result = execute(&t, range(&t), &plan, &opts(ExpandMode::Span), "x").unwrap();
        assert_eq!(result.table.len() as u64, expected);
        assert_eq!(plan.total_projected(), expected);
    }

    #[test]
    fn test_span_block_members_in_walk_order() {
        let t = table(
            &["Level_1", "Level_Nr", "Range"],
            &[
                &["Root", "1", ""],
                &["Root", "", ""],
                &["Root", "", "A01-A02"],
                &["Root", "", "B1"],
            ],
        );
        let result = denormalize(&t, range(&t), &opts(ExpandMode::Span), "x").unwrap();
        assert_eq!(
            column(&result.table, "Range"),
            vec![s("B1"), s("A01"), s("A02"), s("B1"), s("A01"), s("A02")]
        );
        assert_eq!(result.table.get(0, 1), Some("1"));
        assert_eq!(result.table.get(3, 1), None);
    }

    #[test]
    fn test_span_long_boundary_block() {
        let mut rows: Vec<Vec<String>> = vec![
            vec!["Root".into(), "1".into(), String::new()],
            vec!["Root".into(), String::new(), String::new()],
        ];
        for i in 0..200_000 {
            rows.push(vec!["Root".into(), String::new(), format!("M{}", i)]);
        }
        let t = Table::with_rows(
            vec!["Level_1".into(), "Level_Nr".into(), "Range".into()],
            rows.into_iter().map(crate::models::Row::from_fields).collect(),
        );

        let plan = plan(&t, range(&t), ExpandMode::Span).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].rows, 0..2);
        assert_eq!(plan.steps[0].member_count(), 200_000);
        assert_eq!(plan.steps[0].members[0], RangeExpr::parse("M199999"));
        assert_eq!(plan.steps[0].members[199_999], RangeExpr::parse("M0"));
    }

    #[test]
    fn test_span_drops_leading_block() {
        let t = table(
            &["Level_1", "Level_Nr", "Range"],
            &[&["Root", "1", "A1-A2"], &["Root", "", "B1"], &["Root", "", ""], &["Root", "", "C1"]],
        );
        let result = denormalize(&t, range(&t), &opts(ExpandMode::Span), "x").unwrap();
        assert_eq!(column(&result.table, "Range"), vec![s("C1")]);
        assert_eq!(result.report.dropped_members, 3);
    }

    #[test]
    fn test_rows_without_range_not_emitted() {
        let t = table(&["Level_1", "Level_Nr", "Range"], &[&["Root", "1", ""], &["Root", "", ""]]);
        let result = denormalize(&t, range(&t), &opts(ExpandMode::Leaf), "x").unwrap();
        assert!(result.table.is_empty());
        assert_eq!(result.table.headers().last().map(String::as_str), Some("filename"));
    }

    #[test]
    fn test_malformed_range_reported_and_kept() {
        let t = table(&["Level_1", "Level_Nr", "Range"], &[&["Root", "1", "A01-B03"]]);
        let result = denormalize(&t, range(&t), &opts(ExpandMode::Leaf), "x").unwrap();
        assert_eq!(column(&result.table, "Range"), vec![s("A01"), s("B03")]);
        assert_eq!(
            result.report.malformed,
            vec![MalformedRange { row: 1, text: "A01-B03".into() }]
        );
    }

    #[test]
    fn test_missing_terminal_column() {
        let t = sample();
        let err = denormalize(&t, 9, &opts(ExpandMode::Leaf), "x").unwrap_err();
        assert!(matches!(err, ExpandError::Schema(SchemaError::MissingColumn(_))));
    }

    fn oversize_opts(policy: OversizePolicy) -> ExpandOptions {
        ExpandOptions {
            mode: ExpandMode::Leaf,
            max_expansion_rows: 2,
            oversize: policy,
            ..ExpandOptions::default()
        }
    }

    #[test]
    fn test_oversize_warn_reports_then_expands() {
        let t = sample();
        let result = denormalize(&t, range(&t), &oversize_opts(OversizePolicy::Warn), "x").unwrap();
        assert_eq!(result.table.len(), 6);
        assert_eq!(result.report.oversized.len(), 1);
        let event = &result.report.oversized[0];
        assert_eq!(event.first_row, 3);
        assert_eq!(event.last_row, 3);
        assert_eq!(event.projected, 3);
        assert_eq!(event.policy, OversizePolicy::Warn);
    }

    #[test]
    fn test_oversize_skip_emits_nothing_for_span() {
        let t = sample();
        let result = denormalize(&t, range(&t), &oversize_opts(OversizePolicy::Skip), "x").unwrap();
        assert_eq!(column(&result.table, "Range"), vec![s("B1"), s("100"), s("101")]);
        assert_eq!(result.report.oversized.len(), 1);
        assert_eq!(result.report.spans, 3);
    }

    #[test]
    fn test_oversize_abort_fails() {
        let t = sample();
        let err = denormalize(&t, range(&t), &oversize_opts(OversizePolicy::Abort), "x").unwrap_err();
        match err {
            ExpandError::Oversized { first_row, projected, limit, .. } => {
                assert_eq!(first_row, 3);
                assert_eq!(projected, 3);
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expands_resolved_column_with_duplicate_name() {
        let t = table(
            &["Level_1", "Level_Nr", "Range", "Range"],
            &[&["Root", "1", "", ""], &["Root", "", "note", "A1-A2"]],
        );
        let result = denormalize(&t, 3, &opts(ExpandMode::Leaf), "x").unwrap();
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.get(0, 3), Some("A1"));
        assert_eq!(result.table.get(1, 3), Some("A2"));
        assert_eq!(result.table.get(1, 2), Some("note"));
    }

    fn deciles(total: usize) -> Vec<usize> {
        let mut last = 0;
        (1..=total)
            .filter_map(|done| crossed_decile(done, total, &mut last))
            .collect()
    }

    #[test]
    fn test_progress_every_ten_percent() {
        let expected: Vec<usize> = (1..=10).map(|d| d * 10).collect();
        assert_eq!(deciles(10_000), expected);
        assert_eq!(deciles(12_345), expected);
        assert_eq!(deciles(25), expected);
        // fewer rows than marks: each row reports the mark it reaches
        assert_eq!(deciles(3), vec![30, 60, 100]);
        assert_eq!(deciles(1), vec![100]);
    }

    #[test]
    fn test_large_step_expands_with_progress() {
        let mut rows = vec![vec!["Root".to_string(), "1".to_string(), String::new()]];
        rows.extend((0..10_000).map(|_| vec!["Root".to_string(), String::new(), String::new()]));
        rows.push(vec!["Root".to_string(), String::new(), "X1".to_string()]);
        let t = Table::with_rows(
            vec!["Level_1".into(), "Level_Nr".into(), "Range".into()],
            rows.into_iter().map(crate::models::Row::from_fields).collect(),
        );

        let result = denormalize(&t, range(&t), &opts(ExpandMode::Span), "x").unwrap();
        assert_eq!(result.table.len(), 10_001);
        assert_eq!(result.report.oversized.len(), 0);
    }

    #[test]
    fn test_huge_range_guarded_before_materializing() {
        let t = table(&["Level_1", "Level_Nr", "Range"], &[&["Root", "1", "A1-A999999999999"]]);
        let err = denormalize(&t, range(&t), &oversize_opts(OversizePolicy::Abort), "x").unwrap_err();
        assert!(matches!(err, ExpandError::Oversized { projected: 999_999_999_999, .. }));
    }
}
