//! Configuration
//!
//! Settings come from `covenant.toml` (all keys optional) and are then
//! overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CovenantError, Result};

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "covenant.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Worker threads for verification (1 = sequential)
    pub jobs: usize,
    pub cache: CacheConfig,
    pub solver: SolverConfig,
}

/// Verification cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Maximum total size of cache entries in bytes (0 = unlimited)
    pub max_size_bytes: u64,
    /// Empty the cache when it is opened
    pub clear_before_run: bool,
}

/// SMT solver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Solver executable, resolved through PATH when not absolute
    pub path: PathBuf,
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: 1,
            cache: CacheConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".covenant-cache"),
            max_size_bytes: 50 * 1024 * 1024, // 50 MiB
            clear_before_run: false,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("z3"),
            timeout_ms: 10_000,
        }
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CacheConfig {
    /// A cache that never touches the filesystem
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enabled cache rooted at `directory`
    pub fn at(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CovenantError::config(format!("invalid config: {e}")))
    }

    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CovenantError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| CovenantError::config(format!("{}: {e}", path.display())))
    }

    /// Load `explicit` if given, else `covenant.toml` in `dir` if present,
    /// else defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        if overrides.no_cache {
            self.cache.enabled = false;
        }
        if let Some(dir) = &overrides.cache_dir {
            self.cache.directory = dir.clone();
        }
        if let Some(max) = overrides.max_cache_size {
            self.cache.max_size_bytes = max;
        }
        if overrides.clear_cache {
            self.cache.clear_before_run = true;
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.solver.timeout_ms = timeout;
        }
        if let Some(path) = &overrides.solver_path {
            self.solver.path = path.clone();
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        self.jobs = self.jobs.max(1);
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub no_cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub max_cache_size: Option<u64>,
    pub clear_cache: bool,
    pub timeout_ms: Option<u64>,
    pub solver_path: Option<PathBuf>,
    pub jobs: Option<usize>,
}
