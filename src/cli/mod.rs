//! CLI commands and interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "contact-handler")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display information about a replay scenario
    Info {
        /// Path to the scenario file (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Run the recorded steps of a scenario through a collision handler
    Replay {
        /// Path to the scenario file (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output JSON report path
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the handler's final aux state to this file
        #[arg(short, long, value_name = "FILE")]
        checkpoint: Option<PathBuf>,

        /// Print a summary for every step instead of only the last
        #[arg(long)]
        all_steps: bool,
    },

    /// Decode a checkpoint file written by `replay`
    State {
        /// Path to the checkpoint file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}
