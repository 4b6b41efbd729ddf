//! Battle configuration loaded from `~/.fray/fray.toml`.
//!
//! Every field has a safe default so a missing or partial config file never
//! prevents a run. The loaded `Config` is passed explicitly into the
//! orchestrator entry point; there is no process-wide mutable state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{flog_debug, Error, Result};

/// Branch-pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BranchingConfig {
    /// Upper bound on the working-branch pool.
    pub max_working_branches: usize,
    /// Size of the staging-branch pool (used directly, not derived).
    pub max_staging_branches: usize,
    /// Branch-name template with `{taskId}`, `{type}` and `{index}` placeholders.
    pub naming_template: String,
}

impl Default for BranchingConfig {
    fn default() -> Self {
        Self {
            max_working_branches: 16,
            max_staging_branches: 2,
            naming_template: "battle/{taskId}/{type}-{index}".to_string(),
        }
    }
}

/// Parallel-executor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum concurrently running subtask invocations.
    pub max_workers: usize,
    /// Maximum subtasks per batch within a layer.
    pub batch_size: usize,
    /// Per-subtask timeout in milliseconds.
    pub subtask_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            batch_size: 8,
            subtask_timeout_ms: 60_000,
        }
    }
}

/// VCS settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Branch that working and staging branches are created from, and that
    /// staging branches are promoted into.
    pub default_base_branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            default_base_branch: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub branching: BranchingConfig,
    pub execution: ExecutionConfig,
    pub git: GitConfig,
}

impl Config {
    pub fn fray_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".fray"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::fray_dir()?.join("fray.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        flog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            flog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        flog_debug!(
            "Config loaded: max_working_branches={} max_workers={} base={}",
            config.branching.max_working_branches,
            config.execution.max_workers,
            config.git.default_base_branch
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let fray_dir = Self::fray_dir()?;
        if !fray_dir.exists() {
            fs::create_dir_all(&fray_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        flog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
