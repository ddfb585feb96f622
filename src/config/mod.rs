//! Site configuration management for `icecake.toml`.
//!
//! The file is optional: a site without one builds with the defaults below.
//!
//! # Sections
//!
//! | Section      | Purpose                                   |
//! |--------------|-------------------------------------------|
//! | `[build]`    | Build behaviour (clean output first)      |
//! | `[markdown]` | Markdown extensions handed to the renderer|
//! | `[serve]`    | Preview server (interface, port)          |
//!
//! # Example
//!
//! ```toml
//! [build]
//! clean = true
//!
//! [markdown]
//! extensions = ["tables", "footnotes", "smart_punctuation", "highlight"]
//!
//! [serve]
//! port = 8000
//! ```

pub mod defaults;
mod error;
mod serve;

pub use error::ConfigError;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

/// Default config filename
pub const CONFIG_FILE: &str = "icecake.toml";

// ============================================================================
// Sections
// ============================================================================

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Remove `output/` before building.
    #[serde(default)]
    pub clean: bool,
}

/// Markdown syntax extensions beyond CommonMark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownExtension {
    Tables,
    Footnotes,
    Strikethrough,
    Tasklists,
    SmartPunctuation,
    HeadingAttributes,
    /// Syntax highlighting of code blocks.
    Highlight,
}

/// `[markdown]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct MarkdownConfig {
    #[serde(default = "defaults::markdown::extensions")]
    #[educe(Default = defaults::markdown::extensions())]
    pub extensions: Vec<MarkdownExtension>,
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing icecake.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path of the config file (set after loading, may not exist)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub markdown: MarkdownConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new(CONFIG_FILE))
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content, path)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Parse `content`, naming `path` in errors.
    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Load `file` under `root` if it exists, defaults otherwise.
    pub fn load(root: &Path, file: &Path) -> Result<Self> {
        let path = root.join(file);
        if path.is_file() {
            return Self::from_path(&path);
        }
        Ok(Self {
            config_path: path,
            ..Self::default()
        })
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Build { clean, .. } => {
                self.build.clean |= *clean;
            }
            Commands::Preview {
                interface, port, ..
            } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
            _ => {}
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration values that serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.serve.interface.parse::<IpAddr>().is_err() {
            bail!(ConfigError::Invalid {
                section: "serve",
                key: "interface",
                reason: format!("`{}` is not an IP address", self.serve.interface),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
