//! Layered configuration
//!
//! Settings are merged from built-in defaults, the global config file, the
//! project-local `.devrunner.toml`, and finally command-line flags. Each layer
//! only overrides the keys it actually sets.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::paths::Paths;

/// Highest accepted search depth
pub const MAX_LEVELS_LIMIT: u8 = 10;

/// Default number of parent directories searched
pub const DEFAULT_MAX_LEVELS: u8 = 2;

/// One source of configuration. Every key is optional.
///
/// Unknown keys in the file are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ConfigLayer {
    pub max_levels: Option<i64>,
    pub auto_update: Option<bool>,
    pub ignore_tools: Option<Vec<String>>,
    pub verbose: Option<bool>,
    pub quiet: Option<bool>,
    pub show_timing: Option<bool>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl ConfigLayer {
    /// Parse a layer from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load a layer from disk. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let layer = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(Some(layer))
    }
}

/// Fully merged configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub max_levels: u8,
    pub auto_update: bool,
    pub ignore_tools: Vec<String>,
    pub verbose: bool,
    pub quiet: bool,
    pub show_timing: bool,
    pub aliases: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            auto_update: true,
            ignore_tools: Vec::new(),
            verbose: false,
            quiet: false,
            show_timing: false,
            aliases: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Merge layers in ascending precedence on top of the defaults
    pub fn from_layers<'a, I>(layers: I) -> Self
    where
        I: IntoIterator<Item = &'a ConfigLayer>,
    {
        let mut settings = Self::default();
        let mut levels = i64::from(settings.max_levels);

        for layer in layers {
            if let Some(v) = layer.max_levels {
                levels = v;
            }
            if let Some(v) = layer.auto_update {
                settings.auto_update = v;
            }
            if let Some(tools) = &layer.ignore_tools {
                settings.ignore_tools = split_tool_list(tools);
            }
            if let Some(v) = layer.verbose {
                settings.verbose = v;
            }
            if let Some(v) = layer.quiet {
                settings.quiet = v;
            }
            if let Some(v) = layer.show_timing {
                settings.show_timing = v;
            }
            for (name, command) in &layer.aliases {
                settings.aliases.insert(name.clone(), command.clone());
            }
        }

        settings.max_levels = clamp_levels(levels);
        settings
    }

    /// Load global and local files, then apply `cli` on top.
    ///
    /// A file that cannot be read or parsed is skipped with a warning.
    pub fn load(paths: &Paths, cwd: &Path, cli: &ConfigLayer) -> Self {
        let mut layers = Vec::with_capacity(3);

        for path in [paths.global_config(), Paths::local_config(cwd)] {
            match ConfigLayer::load(&path) {
                Ok(Some(layer)) => {
                    debug!(path = %path.display(), "loaded config layer");
                    layers.push(layer);
                }
                Ok(None) => {}
                Err(e) => warn!("{:#}", e),
            }
        }

        layers.push(cli.clone());
        Self::from_layers(&layers)
    }

    /// Expand a user alias (`t` -> `test`); unknown names pass through
    pub fn resolve_alias(&self, command: &str) -> String {
        self.aliases
            .get(command)
            .cloned()
            .unwrap_or_else(|| command.to_string())
    }
}

fn clamp_levels(levels: i64) -> u8 {
    let clamped = levels.clamp(0, i64::from(MAX_LEVELS_LIMIT));
    if clamped != levels {
        warn!(requested = levels, used = clamped, "max_levels out of range, clamped");
    }
    // Within 0..=10 after the clamp above
    u8::try_from(clamped).unwrap_or(MAX_LEVELS_LIMIT)
}

/// Flatten repeated and comma-joined tool names (`a,b` `c` -> `a` `b` `c`)
pub fn split_tool_list<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.as_ref().split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}
