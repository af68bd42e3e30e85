use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "notewise")]
#[command(version, about = "Notewise - conversation memory for AI document tasks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./notewise.toml, then ~/.notewise/config.toml)
    #[arg(long, global = true, env = "NOTEWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or reset stored conversations
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Print the session id a request would use
    Resolve {
        /// Task type (optimize, advise, edit)
        task: String,

        /// Document path or name
        #[arg(long)]
        filename: String,
    },

    /// Delete sessions whose note no longer exists
    Cleanup {
        /// Notes directory (overrides notes_root from config)
        #[arg(long)]
        notes_root: Option<PathBuf>,
    },

    /// Run a task against a document
    Run(RunArgs),
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List stored sessions
    List,

    /// Show the effective history of a session
    Show {
        /// Session id (document base name)
        session_id: String,
    },

    /// Empty a session's history
    Clear {
        /// Session id (document base name)
        session_id: String,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Task type (optimize, advise, edit)
    pub task: String,

    /// Document to work on
    #[arg(short, long)]
    pub file: PathBuf,

    /// Question for the advise task
    #[arg(short, long)]
    pub question: Option<String>,

    /// Editing instructions for the edit task
    #[arg(short, long)]
    pub requirement: Option<String>,
}
