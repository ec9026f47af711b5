use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sbdb_eval::VerifyOptions;

use crate::CliError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG: &str = "sbdb.toml";

/// Contents of `sbdb.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SbdbConfig {
    pub run: RunSection,
    pub generate: GenerateSection,
    pub verify: VerifyOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Parent directory of per-run artifact directories.
    pub run_dir: PathBuf,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from("runs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateSection {
    /// Log a progress line every this many objects.
    pub progress_interval: usize,
    /// Base directory holding `datasets/` and the generation record.
    pub out_dir: PathBuf,
}

impl Default for GenerateSection {
    fn default() -> Self {
        Self {
            progress_interval: 1000,
            out_dir: PathBuf::from("."),
        }
    }
}

/// Load `path`, or `sbdb.toml` when no path is given. A missing default
/// file yields the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<SbdbConfig, CliError> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };

    if !path.is_file() {
        if explicit {
            return Err(CliError::InvalidConfig(format!(
                "config file {} not found",
                path.display()
            )));
        }
        return Ok(SbdbConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<SbdbConfig, CliError> {
    let config: SbdbConfig = toml::from_str(content)?;
    config.verify.validate()?;
    Ok(config)
}
