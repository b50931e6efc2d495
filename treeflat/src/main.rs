//! treeflat CLI - flatten ragged hierarchy exports
//!
//! # Main Commands
//!
//! ```bash
//! treeflat run PS_TREE_BU.csv              # Fill + expand, writes PS_TREE_BU_new.csv
//! treeflat batch ./exports                 # Same for every .csv under a directory
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! treeflat fill PS_TREE_BU.csv             # Fill only, no expansion
//! treeflat plan PS_TREE_BU.csv             # Projected expansion sizes
//! treeflat range "A01-A05"                 # Members of a range expression
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use treeflat::logs::{log_debug, log_info, log_success, log_warning, Verbosity, LOGGER};
use treeflat::transform::pipeline::{format_delimiter, store_logged};
use treeflat::{
    fill_file, parse_range, plan_file, range_size, run_dir, run_file, write_table,
    BoundaryFill, ExpandMode, OversizePolicy, PipelineOptions, RangeExpr,
};

#[derive(Parser)]
#[command(name = "treeflat")]
#[command(about = "Flatten ragged hierarchy exports and expand leaf ranges", long_about = None)]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: fill the hierarchy, then expand leaf ranges
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: <stem>_new.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the filled table with a new_rows column
        #[arg(long)]
        intermediate: Option<PathBuf>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        opts: OptionArgs,
    },

    /// Fill the hierarchy without expanding ranges
    Fill {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        opts: OptionArgs,
    },

    /// Show the expansion steps and their projected sizes
    Plan {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        opts: OptionArgs,
    },

    /// Print the members of a range expression
    Range {
        /// Range expression, e.g. "A01-A05"
        expr: String,
    },

    /// Run the pipeline on every matching file under a directory
    Batch {
        /// Directory to walk recursively
        dir: PathBuf,

        /// File name suffix to match
        #[arg(long, default_value = ".csv")]
        suffix: String,

        /// Print the batch summary as JSON on stdout
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        opts: OptionArgs,
    },
}

/// Flags shared by every command that reads a hierarchy table
#[derive(Args)]
struct OptionArgs {
    /// JSON options file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Column holding leaf ranges (default: last column)
    #[arg(long)]
    terminal_column: Option<String>,

    /// Column holding the row depth
    #[arg(long)]
    depth_column: Option<String>,

    /// Prefix of the level columns
    #[arg(long)]
    level_prefix: Option<String>,

    /// CSV delimiter (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Whether the run fill also covers the closing boundary row
    #[arg(long, value_enum)]
    boundary: Option<BoundaryArg>,

    /// How ranges are crossed with rows
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// What to do when a step exceeds --max-rows
    #[arg(long, value_enum)]
    oversize: Option<OversizeArg>,

    /// Ceiling on rows produced by one expansion step
    #[arg(long)]
    max_rows: Option<u64>,

    /// Name of the appended provenance column
    #[arg(long)]
    provenance_column: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BoundaryArg {
    Exclusive,
    Inclusive,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Leaf,
    Span,
}

#[derive(Clone, Copy, ValueEnum)]
enum OversizeArg {
    Warn,
    Skip,
    Abort,
}

impl From<BoundaryArg> for BoundaryFill {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Exclusive => BoundaryFill::Exclusive,
            BoundaryArg::Inclusive => BoundaryFill::Inclusive,
        }
    }
}

impl From<ModeArg> for ExpandMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Leaf => ExpandMode::Leaf,
            ModeArg::Span => ExpandMode::Span,
        }
    }
}

impl From<OversizeArg> for OversizePolicy {
    fn from(arg: OversizeArg) -> Self {
        match arg {
            OversizeArg::Warn => OversizePolicy::Warn,
            OversizeArg::Skip => OversizePolicy::Skip,
            OversizeArg::Abort => OversizePolicy::Abort,
        }
    }
}

impl OptionArgs {
    /// Options file (or defaults) with command line overrides applied
    fn resolve(self) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
        let mut options = match self.config {
            Some(ref path) => {
                log_info(format!("Loading options from {}", path.display()));
                PipelineOptions::from_file(path)?
            }
            None => PipelineOptions::default(),
        };

        if let Some(c) = self.terminal_column {
            options.terminal_column = Some(c);
        }
        if let Some(c) = self.depth_column {
            options.depth_column = c;
        }
        if let Some(p) = self.level_prefix {
            options.level_prefix = p;
        }
        if let Some(d) = self.delimiter {
            options.delimiter = Some(d);
        }
        if let Some(b) = self.boundary {
            options.fill.boundary = b.into();
        }
        if let Some(m) = self.mode {
            options.expand.mode = m.into();
        }
        if let Some(o) = self.oversize {
            options.expand.oversize = o.into();
        }
        if let Some(n) = self.max_rows {
            options.expand.max_expansion_rows = n;
        }
        if let Some(c) = self.provenance_column {
            options.expand.provenance_column = c;
        }

        Ok(options)
    }
}

fn main() {
    let cli = Cli::parse();

    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    LOGGER.set_verbosity(verbosity);
    LOGGER.set_json(cli.log_json);

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            intermediate,
            json,
            opts,
        } => cmd_run(&input, output.as_deref(), intermediate, json, opts),

        Commands::Fill {
            input,
            output,
            opts,
        } => cmd_fill(&input, output.as_deref(), opts),

        Commands::Plan { input, opts } => cmd_plan(&input, opts),

        Commands::Range { expr } => cmd_range(&expr),

        Commands::Batch {
            dir,
            suffix,
            json,
            opts,
        } => cmd_batch(&dir, &suffix, json, opts),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    input: &Path,
    output: Option<&Path>,
    intermediate: Option<PathBuf>,
    json: bool,
    opts: OptionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = opts.resolve()?;
    if intermediate.is_some() {
        options.intermediate_path = intermediate;
    }

    let summary = run_file(input, output, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    log_success(format!(
        "✨ Done! {} rows -> {} rows",
        summary.input_rows, summary.expansion.output_rows
    ));
    Ok(())
}

fn cmd_fill(
    input: &Path,
    output: Option<&Path>,
    opts: OptionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = opts.resolve()?;
    let (loaded, filled) = fill_file(input, &options)?;

    match output {
        Some(path) => store_logged(&filled.table, path, loaded.delimiter)?,
        None => {
            let stdout = std::io::stdout();
            write_table(&filled.table, stdout.lock(), loaded.delimiter)?;
        }
    }

    Ok(())
}

fn cmd_plan(input: &Path, opts: OptionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = opts.resolve()?;
    let (_, plan) = plan_file(input, &options)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "rows\tmembers\tprojected")?;
    for step in &plan.steps {
        writeln!(
            out,
            "{}..={}\t{}\t{}",
            step.rows.start + 1,
            step.rows.end,
            step.member_count(),
            step.projected()
        )?;
    }
    writeln!(out, "total\t\t{}", plan.total_projected())?;

    for m in &plan.malformed {
        writeln!(out, "malformed\trow {}\t'{}'", m.row, m.text)?;
    }
    if plan.dropped_members > 0 {
        writeln!(out, "dropped\t{}\t", plan.dropped_members)?;
    }

    Ok(())
}

fn cmd_range(expr: &str) -> Result<(), Box<dyn std::error::Error>> {
    log_debug(format!("Parsed: {:?}", RangeExpr::parse(expr)));

    let stdout = std::io::stdout();
    let (members, size) = write_range(expr, stdout.lock())?;

    if size == members as u64 {
        log_success(format!("{} member(s)", size));
    } else {
        log_warning(format!(
            "{} raw member(s) printed, but the range counts as {} row(s)",
            members, size
        ));
    }
    Ok(())
}

/// Write the members of `expr`, one per line. Returns the member count and
/// the size used for `new_rows`.
fn write_range<W: Write>(expr: &str, mut out: W) -> std::io::Result<(usize, u64)> {
    let members = parse_range(expr);
    for member in &members {
        writeln!(out, "{}", member)?;
    }
    Ok((members.len(), range_size(expr)))
}

fn cmd_batch(
    dir: &Path,
    suffix: &str,
    json: bool,
    opts: OptionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = opts.resolve()?;
    let summary = run_dir(dir, suffix, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    for run in &summary.processed {
        log_info(format!(
            "   {} ({}, '{}') -> {} rows",
            run.input.display(),
            run.encoding,
            format_delimiter(run.delimiter),
            run.expansion.output_rows
        ));
    }

    if summary.failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} file(s) failed", summary.failed.len()).into())
    }
}
