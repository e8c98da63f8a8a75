//! Command-line argument definitions.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Closure-table tree store: create, inspect, and prune named trees
#[derive(Parser, Debug)]
#[command(name = "treeclosure")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "TREECLOSURE_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides config; implies the sqlite backend)
    #[arg(long, global = true, env = "TREECLOSURE_DB", value_hint = ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Directory for rolling log files (logs go to stderr when unset)
    #[arg(long, global = true, env = "TREECLOSURE_LOG_DIR", value_hint = ValueHint::DirPath)]
    pub log_dir: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a tree by name, creating it with a root node when missing
    Tree {
        /// Tree name
        name: String,
    },

    /// Load an existing tree by id
    Show {
        /// Tree id
        tree_id: i64,
    },

    /// Create a node under a parent (or as root of an empty tree)
    Create {
        /// Node name
        name: String,
        /// Parent node id
        #[arg(short, long)]
        parent: Option<i64>,
        /// Tree id; taken from the parent when omitted
        #[arg(short, long)]
        tree: Option<i64>,
    },

    /// Delete a childless, non-root node
    Delete {
        /// Node id
        node_id: i64,
    },

    /// Rename a node
    Rename {
        /// Node id
        node_id: i64,
        /// New name
        name: String,
    },

    /// List a node's ancestors, nearest first
    Ancestors {
        /// Node id
        node_id: i64,
    },
}
