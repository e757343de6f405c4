//! CLI argument parsing for the award pipeline.
//!
//! The CLI stays thin: each subcommand maps onto one handler in `workflow`.
use crate::merge::MergePolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "awards",
    version,
    about = "Merge, enrich and export book award catalogs",
    after_help = "Commands:\n  merge --primary <P> --secondary <S> --out <O>  Merge two record sets\n  enrich --input <I> --output <O>               Enrich records via the lookup service (resumable)\n  fetch --table <T> --out <O>                   Read award rows from the collaborative store\n  push --input <I> --table <T>                  Write curated rows back to the store\n  export --input <I> --output <X.xlsx>          Render a collection to a workbook\n  query --input <I> --name <N>                  Look up awards in a collection\n\nExamples:\n  awards merge --primary seed.json --secondary airtable.json --out merged.json\n  awards enrich --input merged.json --output enriched.json --limit 20\n  awards export --input enriched.json --output awards.xlsx",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Merge(MergeArgs),
    Enrich(EnrichArgs),
    Fetch(FetchArgs),
    Push(PushArgs),
    Export(ExportArgs),
    Query(QueryArgs),
}

impl Command {
    /// Whether progress output should be suppressed.
    pub fn quiet(&self) -> bool {
        match self {
            Command::Merge(args) => args.quiet,
            Command::Enrich(args) => args.quiet,
            Command::Fetch(args) => args.quiet,
            Command::Push(args) => args.quiet,
            Command::Export(_) | Command::Query(_) => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Merge two record collections by award identity")]
pub struct MergeArgs {
    /// Primary collection (wins conflicts by default)
    #[arg(long, value_name = "FILE")]
    pub primary: PathBuf,

    /// Secondary collection
    #[arg(long, value_name = "FILE")]
    pub secondary: PathBuf,

    /// Output path for the merged collection
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Which side wins when both carry different non-empty values
    #[arg(long, value_enum, default_value_t = MergePolicy::PrimaryWins)]
    pub policy: MergePolicy,

    /// Emit machine-readable merge stats on stdout
    #[arg(long)]
    pub json: bool,

    /// Suppress progress output
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Enrich records through the lookup service; re-run to resume")]
pub struct EnrichArgs {
    /// Collection to enrich
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output path for the enriched collection
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    /// Maximum records sent to the service in this run
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Retries per record for transient failures (overrides config)
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Checkpoint log (default: <output stem>.checkpoint.jsonl)
    #[arg(long, value_name = "FILE")]
    pub checkpoint: Option<PathBuf>,

    /// Progressive snapshot (default: <output stem>.partial.json)
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Pipeline config JSON
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress per-record progress and the final summary
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Read award rows from the collaborative store")]
pub struct FetchArgs {
    /// Table name or id
    #[arg(long, default_value = "Awards Overview")]
    pub table: String,

    /// Column holding the award name (overrides config)
    #[arg(long)]
    pub field: Option<String>,

    /// Column holding categories (overrides config)
    #[arg(long)]
    pub category_field: Option<String>,

    /// Write only the list of names instead of records
    #[arg(long)]
    pub names_only: bool,

    /// Output path
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Pipeline config JSON
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write curated records back to the collaborative store")]
pub struct PushArgs {
    /// Collection whose records carry remote row ids
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Table name or id
    #[arg(long, default_value = "Awards Overview")]
    pub table: String,

    /// Pipeline config JSON
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show what would be written without sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Render a collection to a four-sheet xlsx workbook")]
pub struct ExportArgs {
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Query a collection by name, category or organization")]
pub struct QueryArgs {
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Award name (matched by identity key)
    #[arg(long, conflicts_with_all = ["category", "organization", "categories"])]
    pub name: Option<String>,

    /// Exact category
    #[arg(long, conflicts_with_all = ["organization", "categories"])]
    pub category: Option<String>,

    /// Organization (case-insensitive)
    #[arg(long, conflicts_with = "categories")]
    pub organization: Option<String>,

    /// List every distinct category
    #[arg(long)]
    pub categories: bool,
}
