//! Aggregation commands: `add`, `sum`, `normalize`, `stats` and `filter`.
//!
//! These tools rewrite tabular streams. Data goes to stdout; warnings go to
//! the diagnostic stream through a [`DiagnosticSink`] owned by each run.

use crate::config::{self, write_row};
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use minimantics_core::config::{DEFAULT_KEY_FIELD, DEFAULT_SUBKEY_FIELD};
use minimantics_core::record::{RecordStream, StreamItem};
use minimantics_core::statistics::GroupedStatistics;
use minimantics_core::vectors::{CombinePolicy, Combination, GroupNormalizer, KeyedVectorStore, NormMode};
use minimantics_core::DiagnosticSink;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Key and sub-key columns of a profile stream.
#[derive(Args, Debug, Clone)]
pub struct KeyColumns {
    /// Column holding the entity key
    #[arg(long, default_value = DEFAULT_KEY_FIELD)]
    pub key_field: String,

    /// Column holding the context sub-key
    #[arg(long, default_value = DEFAULT_SUBKEY_FIELD)]
    pub subkey_field: String,
}

impl KeyColumns {
    fn policy(&self) -> CombinePolicy {
        CombinePolicy::new(&self.key_field, &self.subkey_field)
    }
}

/// Normalization requested on the aggregated vectors.
#[derive(Args, Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Normalize every vector after aggregation
    #[arg(long)]
    pub normalize: bool,

    /// Columns to normalize (default: every non-identifier column)
    #[arg(short = 'c', long = "columns", num_args = 1..)]
    pub columns: Option<Vec<String>>,

    /// Use the L1 norm instead of L2
    #[arg(long)]
    pub l1: bool,
}

impl NormalizeOptions {
    fn mode(&self) -> NormMode {
        if self.l1 {
            NormMode::L1
        } else {
            NormMode::L2
        }
    }

    fn apply(&self, store: &mut KeyedVectorStore) -> Result<()> {
        if !self.normalize {
            return Ok(());
        }
        let columns = match &self.columns {
            Some(columns) => columns.clone(),
            None => store.measure_fields(),
        };
        store
            .normalize(&columns, self.mode())
            .context("Failed to normalize vectors")
    }
}

/// Arguments of `mm add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    #[command(flatten)]
    pub keys: KeyColumns,

    #[command(flatten)]
    pub norm: NormalizeOptions,

    /// Files whose entries are added up (`-` for stdin)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Arguments of `mm sum`.
#[derive(Args, Debug)]
pub struct SumArgs {
    #[command(flatten)]
    pub keys: KeyColumns,

    #[command(flatten)]
    pub norm: NormalizeOptions,

    /// Combinations file: result key, then operand keys
    pub combinations: PathBuf,

    /// Profile stream (default: stdin)
    pub input: Option<PathBuf>,
}

/// Arguments of `mm normalize`.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Column the input is grouped on
    #[arg(long, default_value = DEFAULT_KEY_FIELD)]
    pub key_field: String,

    /// Columns to normalize (default: every numeric column)
    #[arg(short = 'c', long = "columns", num_args = 1..)]
    pub columns: Option<Vec<String>>,

    /// Use the L1 norm instead of L2
    #[arg(long)]
    pub l1: bool,

    /// Input grouped on the key column (default: stdin)
    pub input: Option<PathBuf>,
}

/// Arguments of `mm stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Columns discriminating the groups (input must be sorted on them)
    #[arg(short = 'd', long = "discriminate-by", num_args = 1..)]
    pub discriminate: Vec<String>,

    /// Also print statistics over the group means
    #[arg(short = 'g', long)]
    pub print_global: bool,

    /// Numeric column to summarize
    #[arg(default_value = "cosine")]
    pub column: String,

    /// Input stream (default: stdin)
    pub input: Option<PathBuf>,
}

/// Arguments of `mm filter`.
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// File of accepted values, one per line
    #[arg(long)]
    pub values: PathBuf,

    /// Column whose value must be accepted
    pub column: String,

    /// Input stream (default: stdin)
    pub input: Option<PathBuf>,
}

// ============================================================================
// Commands
// ============================================================================

/// Merges every input by (key, sub-key), summing numeric columns.
pub fn run_add(args: &AddArgs) -> Result<()> {
    let mut sink = DiagnosticSink::new();
    let mut store = KeyedVectorStore::new(args.keys.policy());
    for path in &args.inputs {
        load_source(&mut store, Some(path.as_path()), &mut sink)?;
    }
    args.norm.apply(&mut store)?;
    info!(keys = store.len(), warnings = sink.messages().len(), "merged inputs");

    let mut out = config::output();
    write_row(&mut out, store.fields())?;
    for (_, _, cell) in store.rows() {
        write_row(&mut out, &store.render(cell))?;
    }
    out.flush()?;
    Ok(())
}

/// Builds the summed vector of every combination and prints the results.
pub fn run_sum(args: &SumArgs) -> Result<()> {
    let combinations = Combination::load(config::open_file(&args.combinations)?)
        .with_context(|| format!("Failed to read {}", args.combinations.display()))?;

    let mut sink = DiagnosticSink::new();
    let mut store = KeyedVectorStore::new(args.keys.policy());
    store.retain_only(Combination::keys_of_interest(&combinations));
    load_source(&mut store, args.input.as_deref(), &mut sink)?;
    info!(
        kept = store.len(),
        dropped = store.dropped(),
        "loaded operand vectors"
    );

    store.apply_combinations(&combinations, &mut sink);
    args.norm.apply(&mut store)?;

    let mut out = config::output();
    write_row(&mut out, store.fields())?;
    let mut printed = HashSet::new();
    for combination in &combinations {
        if !printed.insert(combination.result.as_str()) {
            continue;
        }
        let Some(vector) = store.vector(&combination.result) else {
            continue;
        };
        for (_, cell) in vector.iter() {
            write_row(&mut out, &store.render(cell))?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Normalizes chosen columns within each key group of a grouped stream.
pub fn run_normalize(args: &NormalizeArgs) -> Result<()> {
    let name = config::source_name(args.input.as_deref());
    let mode = if args.l1 { NormMode::L1 } else { NormMode::L2 };
    let mut normalizer = GroupNormalizer::new(&args.key_field, args.columns.clone(), mode);

    let mut out = config::output();
    for item in RecordStream::new(config::open_input(args.input.as_deref())?) {
        match item.with_context(|| format!("Failed to read {}", name))? {
            StreamItem::Comment(_) => {}
            StreamItem::Header { line, schema } => {
                normalizer
                    .bind(&schema)
                    .with_context(|| format!("Bad header in {}", name))?;
                writeln!(out, "{}", line)?;
            }
            StreamItem::Data(record) => {
                for row in normalizer.push(record)? {
                    write_row(&mut out, &row)?;
                }
            }
        }
    }
    for row in normalizer.finish() {
        write_row(&mut out, &row)?;
    }
    out.flush()?;
    Ok(())
}

/// Prints count, mean and sample deviation of a column per group.
pub fn run_stats(args: &StatsArgs) -> Result<()> {
    let name = config::source_name(args.input.as_deref());
    let mut stats = GroupedStatistics::new(args.discriminate.clone(), &args.column);

    let mut out = config::output();
    write_row(&mut out, &output::statistics_header(stats.discriminate()))?;
    for item in RecordStream::new(config::open_input(args.input.as_deref())?) {
        match item.with_context(|| format!("Failed to read {}", name))? {
            StreamItem::Comment(_) => {}
            StreamItem::Header { schema, .. } => {
                stats
                    .bind(&schema)
                    .with_context(|| format!("Bad header in {}", name))?;
            }
            StreamItem::Data(record) => {
                let closed = stats
                    .observe(&record)
                    .with_context(|| format!("Bad record in {}", name))?;
                if let Some(summary) = closed {
                    write_row(&mut out, &output::statistics_row(&summary))?;
                }
            }
        }
    }
    if let Some(summary) = stats.finish() {
        write_row(&mut out, &output::statistics_row(&summary))?;
    }
    if args.print_global {
        if let Some(line) = output::statistics_global(stats.global()) {
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Keeps the records whose column value is listed in the values file.
pub fn run_filter(args: &FilterArgs) -> Result<()> {
    let accepted: HashSet<String> = config::read_value_list(&args.values)?.into_iter().collect();
    let name = config::source_name(args.input.as_deref());

    let mut out = config::output();
    let mut column = None;
    let mut kept = 0usize;
    for item in RecordStream::new(config::open_input(args.input.as_deref())?) {
        match item.with_context(|| format!("Failed to read {}", name))? {
            StreamItem::Comment(_) => {}
            StreamItem::Header { line, schema } => {
                column = Some(
                    schema
                        .require(&args.column)
                        .with_context(|| format!("Bad header in {}", name))?,
                );
                writeln!(out, "{}", line)?;
            }
            StreamItem::Data(record) => {
                let value = column.and_then(|c| record.field(c)).unwrap_or_default();
                if accepted.contains(value) {
                    write_row(&mut out, record.fields())?;
                    kept += 1;
                }
            }
        }
    }
    info!(kept, "filtered records");
    out.flush()?;
    Ok(())
}

/// Reads one profile stream into the store.
pub(crate) fn load_source(store: &mut KeyedVectorStore, path: Option<&Path>, sink: &mut DiagnosticSink) -> Result<()> {
    let name = config::source_name(path);
    store.begin_source(&name);
    for item in RecordStream::new(config::open_input(path)?) {
        if let StreamItem::Data(record) = item.with_context(|| format!("Failed to read {}", name))? {
            store
                .add_record(&record, sink)
                .with_context(|| format!("Bad record in {}", name))?;
        }
    }
    Ok(())
}
