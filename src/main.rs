//! Icecake - a small static site builder with a live-rebuild watcher.

mod cache;
mod cli;
mod config;
mod date;
mod feed;
mod highlight;
mod init;
mod logger;
mod metadata;
mod page;
mod query;
mod render;
mod serve;
mod site;
mod watch;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use logger::Logger;
use serve::serve_site;
use site::Site;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use watch::{NotifySource, Watcher};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new(cli.debug());
    let root = site_root(&cli);
    let config = load_config(&cli, &root, logger)?;

    match &cli.command {
        Commands::Init { force, .. } => init::new_site(&root, *force, config, logger).map(|_| ()),
        Commands::Build { .. } => Site::open(&root, config, logger)?.build(),
        Commands::Preview { .. } => serve_site(&root, &config, logger),
        Commands::Watch { .. } => watch_site(&root, config, logger),
    }
}

/// Site root: the init target, or `--root`, or the current directory.
fn site_root(cli: &Cli) -> PathBuf {
    let base = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
    match &cli.command {
        Commands::Init { path, .. } => base.join(path),
        _ => base,
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli, root: &Path, logger: Logger) -> Result<SiteConfig> {
    let mut config = SiteConfig::load(root, &cli.config)?;
    // init writes the file itself
    if !cli.is_init() && !config.config_path.is_file() {
        log!(logger; "config"; "{} not found, using defaults", config.config_path.display());
    }
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}

/// Build once, then re-render on change until Ctrl+C.
fn watch_site(root: &Path, config: SiteConfig, logger: Logger) -> Result<()> {
    let mut site = Site::open(root, config, logger)?;
    site.build()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to set Ctrl+C handler")?;

    Watcher::new(site, NotifySource::new()?).watch(&shutdown)
}
