//! High-level pipeline API: load, fill, expand, store.
//!
//! # Example
//!
//! ```rust,ignore
//! use treeflat::{run_file, PipelineOptions};
//! use std::path::Path;
//!
//! let mut options = PipelineOptions::default();
//! options.terminal_column = Some("Account_Range".to_string());
//!
//! let summary = run_file(Path::new("PS_TREE_ACCOUNT.csv"), None, &options)?;
//! println!("{} rows -> {}", summary.input_rows, summary.expansion.output_rows);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PipelineOptions;
use crate::error::{PipelineError, PipelineResult, TableResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::Table;
use crate::parser::{load_table, output_path_for, store_table, LoadedTable};
use crate::validation::HierarchySchema;

use super::expand::{denormalize, plan, Expansion, ExpansionReport, Plan};
use super::fill::{fill, FillReport, Filled};
use super::range::range_size;

/// Name of the per-row projected size column in the intermediate table
pub const NEW_ROWS_COLUMN: &str = "new_rows";

/// Result of running the pipeline on an in-memory table
#[derive(Debug, Clone)]
pub struct Processed {
    pub filled: Filled,
    pub expansion: Expansion,
}

/// What one file run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub encoding: String,
    pub delimiter: char,
    pub input_rows: usize,
    pub terminal_column: String,
    pub fill: FillReport,
    pub expansion: ExpansionReport,
}

/// Outcome of a batch run
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub processed: Vec<RunSummary>,
    /// Files that failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

/// Fill and expand one table.
pub fn process_table(
    table: &Table,
    options: &PipelineOptions,
    source: &str,
) -> PipelineResult<Processed> {
    let schema = HierarchySchema::from_options(table, options)?;
    let filled = fill(table, &schema, &options.fill)?;
    let expansion = denormalize(&filled.table, schema.terminal, &options.expand, source)?;
    Ok(Processed { filled, expansion })
}

/// Copy of a filled table with a [`NEW_ROWS_COLUMN`] holding each row's
/// projected member count.
pub fn with_new_rows(filled: &Table, schema: &HierarchySchema) -> Table {
    let mut out = filled.clone();
    out.push_column(NEW_ROWS_COLUMN, |_, row| {
        let size = row.get(schema.terminal).map(range_size).unwrap_or(0);
        Some(size.to_string())
    });
    out
}

/// Run the full pipeline on a file.
///
/// Without an explicit output path the result goes next to the input as
/// `<stem>_new.<ext>`.
pub fn run_file(
    input: &Path,
    output: Option<&Path>,
    options: &PipelineOptions,
) -> PipelineResult<RunSummary> {
    log_info(format!("📖 Reading {}", input.display()));
    let loaded = load_table(input, options.delimiter)?;
    log_loaded(&loaded);

    let table = &loaded.table;
    let schema = HierarchySchema::from_options(table, options)?;
    let terminal = terminal_name(table, &schema);
    log_info_indent(format!("Terminal column: {}", terminal), 1);
    log_info_indent(format!("Level columns: {}", schema.levels.len()), 1);

    log_info("🌳 Filling hierarchy...");
    let filled = fill(table, &schema, &options.fill)?;
    log_fill(&filled.report);

    if let Some(ref path) = options.intermediate_path {
        store_table(&with_new_rows(&filled.table, &schema), path, loaded.delimiter)?;
        log_success(format!("Intermediate table written to {}", path.display()));
    }

    log_info("⚙️  Expanding ranges...");
    let source = source_name(input);
    let expansion = denormalize(&filled.table, schema.terminal, &options.expand, &source)?;
    log_expansion(&expansion.report);

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_path_for(input));
    store_table(&expansion.table, &output, loaded.delimiter)?;
    log_success(format!("💾 Output written to {}", output.display()));

    Ok(RunSummary {
        input: input.to_path_buf(),
        output,
        encoding: loaded.encoding,
        delimiter: loaded.delimiter,
        input_rows: table.len(),
        terminal_column: terminal,
        fill: filled.report,
        expansion: expansion.report,
    })
}

/// Load and fill a file without expanding it.
pub fn fill_file(input: &Path, options: &PipelineOptions) -> PipelineResult<(LoadedTable, Filled)> {
    log_info(format!("📖 Reading {}", input.display()));
    let loaded = load_table(input, options.delimiter)?;
    log_loaded(&loaded);

    let schema = HierarchySchema::from_options(&loaded.table, options)?;
    let filled = fill(&loaded.table, &schema, &options.fill)?;
    log_fill(&filled.report);

    Ok((loaded, filled))
}

/// Load, fill and plan a file; nothing is expanded.
pub fn plan_file(input: &Path, options: &PipelineOptions) -> PipelineResult<(Table, Plan)> {
    let (loaded, filled) = fill_file(input, options)?;
    let schema = HierarchySchema::from_options(&loaded.table, options)?;
    let plan = plan(&filled.table, schema.terminal, options.expand.mode)?;

    log_info(format!(
        "{} expansion steps, {} projected rows",
        plan.steps.len(),
        plan.total_projected()
    ));

    Ok((filled.table, plan))
}

/// Run every file under `dir` whose name ends with `suffix`.
///
/// Previous outputs (`*_new.*`) are skipped. A failing file is logged and
/// recorded; the batch continues with the next one.
pub fn run_dir(dir: &Path, suffix: &str, options: &PipelineOptions) -> PipelineResult<BatchSummary> {
    let mut files = Vec::new();
    collect_files(dir, suffix, &mut files).map_err(crate::error::TableError::from)?;
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::NoInputFiles {
            dir: dir.to_path_buf(),
            suffix: suffix.to_string(),
        });
    }

    log_info(format!("Found {} file(s) under {}", files.len(), dir.display()));

    let mut summary = BatchSummary::default();
    for file in files {
        match run_file(&file, None, options) {
            Ok(run) => summary.processed.push(run),
            Err(e) => {
                log_error(format!("{}: {}", file.display(), e));
                summary.failed.push((file, e.to_string()));
            }
        }
    }

    if summary.failed.is_empty() {
        log_success(format!("Processed {} file(s)", summary.processed.len()));
    } else {
        log_warning(format!(
            "Processed {} file(s), {} failed",
            summary.processed.len(),
            summary.failed.len()
        ));
    }

    Ok(summary)
}

fn collect_files(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, suffix, out)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_output = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with("_new"));
        if name.ends_with(suffix) && !is_output {
            out.push(path);
        }
    }
    Ok(())
}

/// Provenance value for rows produced from `input`
pub fn source_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| input.display().to_string())
}

fn terminal_name(table: &Table, schema: &HierarchySchema) -> String {
    table.headers()[schema.terminal].clone()
}

/// Store a table, logging where it went
pub fn store_logged(table: &Table, path: &Path, delimiter: char) -> TableResult<()> {
    store_table(table, path, delimiter)?;
    log_success(format!("💾 Output written to {}", path.display()));
    Ok(())
}

fn log_loaded(loaded: &LoadedTable) {
    log_success(format!("Detected encoding: {}", loaded.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(loaded.delimiter)));
    log_success(format!(
        "Read {} rows, {} columns",
        loaded.table.len(),
        loaded.table.width()
    ));
}

fn log_fill(report: &FillReport) {
    log_success(format!(
        "Filled {} cells in {} runs ({} run, {} root, {} depth) after {} pass(es)",
        report.total(),
        report.runs,
        report.run_filled,
        report.root_filled,
        report.depth_filled,
        report.passes
    ));
}

fn log_expansion(report: &ExpansionReport) {
    log_success(format!(
        "Expanded {} spans into {} rows",
        report.spans, report.output_rows
    ));
    if !report.malformed.is_empty() {
        log_warning(format!("{} range(s) could not be parsed", report.malformed.len()));
        for m in report.malformed.iter().take(5) {
            log_info_indent(format!("row {}: '{}'", m.row, m.text), 1);
        }
    }
    if !report.oversized.is_empty() {
        log_warning(format!(
            "{} span(s) exceeded the expansion limit",
            report.oversized.len()
        ));
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExpandMode, OversizePolicy};
    use crate::error::{ExpandError, SchemaError};
    use crate::models::fixtures::{column, table};
    use crate::parser::load_table;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    const ACCOUNTS: &str = "\
Level_1,Level_2,Level_3,Node_ID,Level_Nr,Account_Range
Assets,,,N1,1,
,Current,,N2,2,
,,,,,[A01-A03]
,,Cash,N3,3,
,,,,,100-101
,Fixed,,N4,2,
,,,,,X9
";

    fn options() -> PipelineOptions {
        PipelineOptions {
            terminal_column: Some("Account_Range".to_string()),
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_process_scenario() {
        let t = table(
            &["Level_1", "Level_Nr", "Range"],
            &[&["Root", "1", ""], &["", "", ""], &["", "", "A01-A03"]],
        );
        let mut opts = PipelineOptions::default();
        opts.terminal_column = Some("Range".to_string());

        let processed = process_table(&t, &opts, "scenario.csv").unwrap();
        assert_eq!(
            column(&processed.filled.table, "Level_1"),
            vec![s("Root"), s("Root"), s("Root")]
        );
        let out = &processed.expansion.table;
        assert_eq!(column(out, "Range"), vec![s("A01"), s("A02"), s("A03")]);
        assert_eq!(column(out, "Level_1"), vec![s("Root"); 3]);
    }

    #[test]
    fn test_process_uses_resolved_terminal_column() {
        // unset terminal column resolves to the last one, not the first "Range"
        let t = table(
            &["Level_1", "Level_Nr", "Range", "Range"],
            &[&["Root", "1", "", ""], &["", "", "memo", "B1-B2"]],
        );
        let processed = process_table(&t, &PipelineOptions::default(), "dup.csv").unwrap();
        let out = &processed.expansion.table;
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0, 3), Some("B1"));
        assert_eq!(out.get(1, 3), Some("B2"));
        assert_eq!(out.get(1, 2), Some("memo"));
        assert_eq!(out.get(1, 0), Some("Root"));
    }

    #[test]
    fn test_run_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("accounts.csv");
        fs::write(&input, ACCOUNTS).unwrap();

        let summary = run_file(&input, None, &options()).unwrap();
        assert_eq!(summary.output, dir.path().join("accounts_new.csv"));
        assert_eq!(summary.input_rows, 7);
        assert_eq!(summary.terminal_column, "Account_Range");

        let out = load_table(&summary.output, None).unwrap().table;
        assert_eq!(
            column(&out, "Account_Range"),
            vec![s("A01"), s("A02"), s("A03"), s("100"), s("101"), s("X9")]
        );
        assert_eq!(column(&out, "Level_1"), vec![s("Assets"); 6]);
        assert_eq!(
            column(&out, "Level_2"),
            vec![s("Current"), s("Current"), s("Current"), s("Current"), s("Current"), s("Fixed")]
        );
        assert_eq!(
            column(&out, "Level_3"),
            vec![None, None, None, s("Cash"), s("Cash"), None]
        );
        assert_eq!(out.get(5, 3), Some("N4"));
        assert_eq!(column(&out, "filename"), vec![s("accounts.csv"); 6]);
    }

    #[test]
    fn test_intermediate_has_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("accounts.csv");
        let intermediate = dir.path().join("intermediate.csv");
        fs::write(&input, ACCOUNTS).unwrap();

        let mut opts = options();
        opts.intermediate_path = Some(intermediate.clone());
        run_file(&input, Some(&dir.path().join("out.csv")), &opts).unwrap();

        let inter = load_table(&intermediate, None).unwrap().table;
        assert_eq!(
            column(&inter, NEW_ROWS_COLUMN),
            vec![s("0"), s("0"), s("3"), s("0"), s("2"), s("0"), s("1")]
        );
    }

    #[test]
    fn test_missing_terminal_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("accounts.csv");
        fs::write(&input, ACCOUNTS).unwrap();

        let mut opts = options();
        opts.terminal_column = Some("BU_Range".to_string());
        let err = run_file(&input, None, &opts).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(SchemaError::MissingColumn(_))));
        assert!(!dir.path().join("accounts_new.csv").exists());
    }

    #[test]
    fn test_abort_policy_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("accounts.csv");
        fs::write(&input, ACCOUNTS).unwrap();

        let mut opts = options();
        opts.expand.max_expansion_rows = 2;
        opts.expand.oversize = OversizePolicy::Abort;
        let err = run_file(&input, None, &opts).unwrap_err();
        assert!(matches!(err, PipelineError::Expand(ExpandError::Oversized { .. })));
    }

    #[test]
    fn test_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("accounts.csv");
        fs::write(&input, ACCOUNTS).unwrap();

        let mut opts = options();
        let (_, leaf) = plan_file(&input, &opts).unwrap();
        assert_eq!(leaf.steps.len(), 3);
        assert_eq!(leaf.total_projected(), 6);

        opts.expand.mode = ExpandMode::Span;
        let (_, span) = plan_file(&input, &opts).unwrap();
        // rows 6, 4 and 1..=2, walked from the bottom
        assert_eq!(span.steps.len(), 3);
        assert_eq!(span.total_projected(), 1 + 2 + 2 * 3);
    }

    #[test]
    fn test_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2015");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.csv"), ACCOUNTS).unwrap();
        fs::write(nested.join("b.csv"), ACCOUNTS).unwrap();
        fs::write(nested.join("broken.csv"), "Level_1,Account_Range\nRoot,A1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let summary = run_dir(dir.path(), ".csv", &options()).unwrap();
        assert_eq!(summary.processed.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert!(nested.join("b_new.csv").exists());

        // outputs of the previous run are not picked up again
        let again = run_dir(dir.path(), ".csv", &options()).unwrap();
        assert_eq!(again.processed.len(), 2);
    }

    #[test]
    fn test_run_dir_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_dir(dir.path(), ".csv", &options()).unwrap_err();
        assert!(matches!(err, PipelineError::NoInputFiles { .. }));
    }

    #[test]
    fn test_source_name() {
        assert_eq!(source_name(Path::new("/data/PS_TREE.csv")), "PS_TREE.csv");
    }
}
