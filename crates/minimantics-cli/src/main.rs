//! Minimantics CLI - tools for building and evaluating distributional thesauri.
//!
//! # Usage
//!
//! ```bash
//! # Merge count files and normalize the result
//! mm add counts-a.tsv counts-b.tsv --normalize
//!
//! # Build compound vectors from their parts
//! mm sum compounds.tsv profiles.tsv
//!
//! # Compare predicted similarities with a gold standard
//! mm evalrank --gold-threshold 7 simlex.tsv predictions.tsv
//! mm evalrank simlex.tsv predictions.tsv --json
//!
//! # Rank a thesaurus, then score it against gold resources
//! mm rank-neighbors thesaurus.tsv | mm eval-neighbors
//!
//! # Show help
//! mm --help
//! ```
//!
//! Diagnostics go to stderr; set `MINIMANTICS_LOG` (e.g. `debug`) to
//! override the log level.

mod aggregate;
mod config;
mod evaluate;
mod output;
mod similarity;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Minimantics distributional semantics toolkit.
///
/// Aggregates count-based word profiles, computes similarities, and
/// evaluates predicted similarities and neighbor lists against gold data.
#[derive(Parser)]
#[command(name = "mm", version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add up files entry by entry, keyed by target and context
    Add(aggregate::AddArgs),
    /// Sum the vectors of operand keys into compound vectors
    Sum(aggregate::SumArgs),
    /// Normalize columns within each target group of a grouped stream
    Normalize(aggregate::NormalizeArgs),
    /// Count, mean and sample deviation of a column per group
    Stats(aggregate::StatsArgs),
    /// Cosine between the vectors of target pairs
    Cosine(similarity::CosineArgs),
    /// Keep records whose column value is in a list
    Filter(aggregate::FilterArgs),
    /// Append the embedding cosine of target and neighbor
    EmbeddingCosine(similarity::EmbeddingCosineArgs),
    /// Compare predicted scores with gold-standard scores
    Evalrank(evaluate::EvalRankArgs),
    /// Solve TOEFL synonym problems
    Toefl(similarity::ToeflArgs),
    /// Rank the neighbors of each target by similarity
    RankNeighbors(evaluate::RankNeighborsArgs),
    /// Score ranked neighbor lists against gold resources
    EvalNeighbors(evaluate::EvalNeighborsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Add(args) => aggregate::run_add(args),
        Command::Sum(args) => aggregate::run_sum(args),
        Command::Normalize(args) => aggregate::run_normalize(args),
        Command::Stats(args) => aggregate::run_stats(args),
        Command::Cosine(args) => similarity::run_cosine(args),
        Command::Filter(args) => aggregate::run_filter(args),
        Command::EmbeddingCosine(args) => similarity::run_embedding_cosine(args),
        Command::Evalrank(args) => evaluate::run_evalrank(args),
        Command::Toefl(args) => similarity::run_toefl(args),
        Command::RankNeighbors(args) => evaluate::run_rank_neighbors(args),
        Command::EvalNeighbors(args) => evaluate::run_eval_neighbors(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommand_names() {
        let cli = Cli::parse_from(["mm", "embedding-cosine", "w2v.txt"]);
        assert!(matches!(cli.command, Command::EmbeddingCosine(_)));

        let cli = Cli::parse_from(["mm", "eval-neighbors", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::EvalNeighbors(_)));
    }

    #[test]
    fn test_add_requires_an_input() {
        assert!(Cli::try_parse_from(["mm", "add"]).is_err());
        assert!(Cli::try_parse_from(["mm", "add", "-"]).is_ok());
    }
}
