//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Versioned configuration updater: relocate keys across schema versions, keep user values
#[derive(Parser, Debug)]
#[command(name = "cfgshift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (repeat for more: -d -d -d)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory for local config lookup (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relocate, merge defaults and stamp the defaults' version
    Update {
        /// User YAML document
        #[arg(value_hint = ValueHint::FilePath)]
        user: PathBuf,
        /// Defaults YAML document carrying the target version
        #[arg(long, value_hint = ValueHint::FilePath)]
        defaults: PathBuf,
        /// Relocation file (.toml, .yml, .yaml); falls back to config
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        relocations: Option<PathBuf>,
        /// Write here instead of updating in place
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Show the changes without writing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Apply relocations between two versions only
    Relocate {
        /// User YAML document
        #[arg(value_hint = ValueHint::FilePath)]
        user: PathBuf,
        /// Relocation file (.toml, .yml, .yaml); falls back to config
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        relocations: Option<PathBuf>,
        /// Current version of the document
        #[arg(long)]
        from: String,
        /// Target version (inclusive)
        #[arg(long)]
        to: String,
        /// Write here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Show a document as a tree
    Tree {
        /// YAML document
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// List the configured version catalog
    Versions,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a commented config template
    Template,
    /// Show config file locations
    Path,
}
