use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::compiler::parser::{DEFAULT_MAX_DEPTH, MAX_DEPTH_LIMIT};

pub const CONFIG_FILE: &str = "gox.toml";

/// Contents of `gox.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    pub parser: ParserConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Deepest expression or block nesting accepted before reporting an error.
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pretty: bool,
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            extension: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "warn".to_string() }
    }
}

impl FrontendConfig {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: FrontendConfig =
            toml::from_str(content).map_err(|e| format!("Malformed configuration: {}", e))?;
        if !(1..=MAX_DEPTH_LIMIT).contains(&config.parser.max_depth) {
            return Err(format!("parser.max_depth must be between 1 and {}", MAX_DEPTH_LIMIT));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml(&content).map_err(|e| format!("{} ({})", e, path.display()))
    }

    /// Reads `gox.toml` from the working directory when there is one. A broken
    /// file is not fatal here: it is logged and the defaults are used.
    pub fn discover() -> Self {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!("{}; using default configuration", e);
            Self::default()
        })
    }
}
