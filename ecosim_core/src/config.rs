//! World configuration: grid dimensions, seed and the tuning table.
//!
//! Loaded from `ecology_config.json` with support for an environment variable override.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::params::{EcologyParams, ParamKey, ParamKind, ParamSpec, ParamValue};

pub const BUILTIN_ECOLOGY_CONFIG: &str = include_str!("data/ecology_config.json");

pub const ECOLOGY_CONFIG_PATH_ENV: &str = "ECOLOGY_CONFIG_PATH";

pub const MIN_DIMENSION: u32 = 8;
pub const MAX_DIMENSION: u32 = 2048;

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcologyConfig {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub params: EcologyParams,
}

impl Default for EcologyConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            seed: 1,
            params: EcologyParams::default(),
        }
    }
}

impl EcologyConfig {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
            ..Self::default()
        }
        .sanitized()
    }

    pub fn builtin() -> Self {
        match Self::from_json_str(BUILTIN_ECOLOGY_CONFIG) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    target: "ecosim::config",
                    error = %err,
                    "ecology_config.builtin_invalid"
                );
                Self::default()
            }
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, EcologyConfigError> {
        let config: EcologyConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn from_file(path: &Path) -> Result<Self, EcologyConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| EcologyConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        EcologyConfig::from_json_str(&contents)
    }

    /// Clamp dimensions and every parameter into range.
    pub fn sanitized(mut self) -> Self {
        self.width = self.width.clamp(MIN_DIMENSION, MAX_DIMENSION);
        self.height = self.height.clamp(MIN_DIMENSION, MAX_DIMENSION);
        self.params.clamp_all();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Error)]
pub enum EcologyConfigError {
    #[error("failed to parse ecology config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read ecology config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the ecology configuration from `ECOLOGY_CONFIG_PATH`, falling back to
/// the builtin file. Returns the path that was used, if any.
pub fn load_ecology_config_from_env() -> (EcologyConfig, Option<PathBuf>) {
    if let Some(path) = env::var(ECOLOGY_CONFIG_PATH_ENV).ok().map(PathBuf::from) {
        match EcologyConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "ecosim::config",
                    path = %path.display(),
                    "ecology_config.loaded=file"
                );
                return (config, Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "ecosim::config",
                    path = %path.display(),
                    error = %err,
                    "ecology_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "ecosim::config", "ecology_config.loaded=builtin");
    (EcologyConfig::builtin(), None)
}
