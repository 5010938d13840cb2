//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "tabscribe", version, about = "Speaker-attributed transcripts from chunked tab recordings")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest chunk files for a session and mark its stream ended
    Ingest {
        /// Session id; a fresh one is generated when omitted
        #[arg(long)]
        session: Option<Uuid>,
        /// WAV chunk files in sequence order
        #[arg(required = true)]
        chunks: Vec<PathBuf>,
    },
    /// Run the processing pipeline for a session
    Process {
        /// Session id
        session: Uuid,
    },
    /// Print the persisted transcript of a session
    Show {
        /// Session id
        session: Uuid,
    },
}
