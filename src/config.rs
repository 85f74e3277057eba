//! YAML mount configuration.
//!
//! ```yaml
//! disks:
//!   - disk1.img
//!   - disk2.img
//! mountpoint: mnt
//! options: [allow_other]
//! log_level: debug
//! ```
//!
//! Relative paths resolve against the directory holding the file.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config: can't read {path}: {source}")]
  Read { path: PathBuf, source: std::io::Error },
  #[error("config: can't parse {path}: {source}")]
  Parse { path: PathBuf, source: serde_yaml::Error },
  #[error("config: {0}")]
  Invalid(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
  #[serde(default)]
  pub disks: Vec<PathBuf>,
  #[serde(default)]
  pub mountpoint: Option<PathBuf>,
  /// Passed through as `-o` mount options
  #[serde(default)]
  pub options: Vec<String>,
  /// `env_logger` filter, used when `RUST_LOG` is unset
  #[serde(default)]
  pub log_level: Option<String>,
}

impl MountConfig {
  pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
    let reader = File::open(config_path).map_err(|source| ConfigError::Read {
      path: config_path.to_owned(),
      source,
    })?;
    let config = serde_yaml::from_reader::<_, MountConfig>(reader).map_err(|source| ConfigError::Parse {
      path: config_path.to_owned(),
      source,
    })?;

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.relative_to(base))
  }

  /// Anchor relative paths at `base`.
  pub fn relative_to(mut self, base: &Path) -> Self {
    self.disks = self.disks.into_iter().map(|disk| base.join(disk)).collect();
    self.mountpoint = self.mountpoint.map(|mountpoint| base.join(mountpoint));
    self
  }

  /// Command-line values win over the file; options accumulate.
  pub fn merge(mut self, disks: Vec<PathBuf>, mountpoint: Option<PathBuf>, options: Vec<String>) -> Self {
    if !disks.is_empty() {
      self.disks = disks;
    }
    if mountpoint.is_some() {
      self.mountpoint = mountpoint;
    }
    self.options.extend(options);
    self
  }

  pub fn validate(&self) -> Result<(&[PathBuf], &Path), ConfigError> {
    let mountpoint = self
      .mountpoint
      .as_deref()
      .ok_or(ConfigError::Invalid("no mountpoint given"))?;
    if self.disks.is_empty() {
      return Err(ConfigError::Invalid("no disk images given"));
    }
    Ok((&self.disks, mountpoint))
  }
}


// vim:ts=2 sw=2
