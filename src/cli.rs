//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Icecake static site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Site root containing content/, layouts/ and static/ (default: current dir)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the site root
    #[arg(short = 'C', long, global = true, default_value = "icecake.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags every subcommand accepts
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Verbose logging
    #[arg(long)]
    pub debug: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a project in the specified directory.
    /// The path will be created if it does not exist.
    Init {
        /// Directory to scaffold the site into
        path: PathBuf,

        /// Initialize even if the directory is not empty
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Render every page and copy static files into output/
    Build {
        /// Delete output/ before building
        #[arg(long)]
        clean: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Serve output/ over HTTP for local preview
    Preview {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Re-render pages as their source files change
    Watch {
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Cli {
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }

    /// Whether `--debug` was passed to the active subcommand.
    pub const fn debug(&self) -> bool {
        match &self.command {
            Commands::Init { common, .. }
            | Commands::Build { common, .. }
            | Commands::Preview { common, .. }
            | Commands::Watch { common } => common.debug,
        }
    }
}
