//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};

/// aerorag: intent-routed retrieval engine for UAV/DATCOM design queries.
///
/// Answers engineering questions from a vector-indexed design archive, or
/// assembles a DATCOM input file from parameters stated in the query.
#[derive(Parser, Debug)]
#[command(name = "aerorag")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one query through the engine.
    ///
    /// Routes the query to either DATCOM generation or tool-using
    /// retrieval, and prints the answer on stdout.
    #[command(after_help = r#"Examples:
  aerorag query "What is the FLTCON namelist?"
  aerorag query "為 F-4 生成 .dat：S=530, A=2.8, λ=0.3, 後掠角=45, Mach=0.8, 高度=10000"
  aerorag query "wing sweep data for the F-4" --collection 空氣動力學
  aerorag query "fuselage stations" --collection 空氣動力學 --retrieve-only | jq .
"#)]
    Query {
        /// The engineering question or generation request.
        query: String,

        /// Force a design-area collection, bypassing the routing tool.
        #[arg(short, long)]
        collection: Option<String>,

        /// Number of documents to retrieve.
        #[arg(long)]
        top_k: Option<usize>,

        /// Retrieve documents as JSON without any LLM generation.
        #[arg(long)]
        retrieve_only: bool,
    },
}
