//! Configuration module for the terminology index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TI_` and use double underscores
//! to separate nested levels:
//! - `TI_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `TI_INDEX__ROOT=/var/lib/search` sets `index.root`
//! - `TI_REFRESH__MAX_STALE_MS=500` sets `refresh.max_stale_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the workspace configuration.
pub const CONFIG_DIR: &str = ".termindex";

/// Smallest writer heap tantivy accepts.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Index location and writer settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Write pipeline settings
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Background reopen cadence
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Query engine settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging settings for the binary
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Root search-data folder; each named index gets its own directory below it
    #[serde(default = "default_index_root")]
    pub root: PathBuf,

    /// Name of this index instance
    #[serde(default = "default_index_name")]
    pub name: String,

    /// Tantivy writer heap in megabytes
    #[serde(default = "default_writer_heap_mb")]
    pub writer_heap_mb: usize,

    /// When false, jobs still run but documents are not added
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Records whose versions live in this module get the metadata marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_module: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of worker threads building documents
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Maximum queued jobs before submitters block
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Whether plain concepts produce tag-only documents
    #[serde(default = "default_false")]
    pub index_concepts: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RefreshConfig {
    /// Reopen interval when nobody waits for a generation (milliseconds)
    #[serde(default = "default_max_stale_ms")]
    pub max_stale_ms: u64,

    /// Reopen interval while a caller waits for a generation (milliseconds)
    #[serde(default = "default_min_stale_ms")]
    pub min_stale_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Extra hits fetched to make up for collapsed duplicates
    #[serde(default = "default_dedup_headroom_percent")]
    pub dedup_headroom_percent: usize,

    /// Upper bound on generation waits; 0 waits without a bound
    #[serde(default)]
    pub default_wait_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_root() -> PathBuf {
    PathBuf::from(".termindex/search")
}
fn default_index_name() -> String {
    "terminology".to_string()
}
fn default_writer_heap_mb() -> usize {
    50
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_queue_depth() -> usize {
    1024
}
fn default_max_stale_ms() -> u64 {
    1_000
}
fn default_min_stale_ms() -> u64 {
    25
}
fn default_dedup_headroom_percent() -> usize {
    25
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index: IndexConfig::default(),
            indexing: IndexingConfig::default(),
            refresh: RefreshConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: default_index_root(),
            name: default_index_name(),
            writer_heap_mb: default_writer_heap_mb(),
            enabled: true,
            metadata_module: None,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            queue_depth: default_queue_depth(),
            index_concepts: false,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_stale_ms: default_max_stale_ms(),
            min_stale_ms: default_min_stale_ms(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dedup_headroom_percent: default_dedup_headroom_percent(),
            default_wait_timeout_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl IndexConfig {
    /// Directory of this named index instance
    pub fn directory(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    /// Writer heap in bytes, clamped to the tantivy minimum
    pub fn writer_heap_bytes(&self) -> usize {
        (self.writer_heap_mb * 1_000_000).max(MIN_WRITER_HEAP_BYTES)
    }
}

impl RefreshConfig {
    pub fn max_stale(&self) -> Duration {
        Duration::from_millis(self.max_stale_ms.max(1))
    }

    pub fn min_stale(&self) -> Duration {
        Duration::from_millis(self.min_stale_ms.clamp(1, self.max_stale_ms.max(1)))
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores stay
            .merge(Env::prefixed("TI_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace config by looking for the config directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Check the settings for values the service cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.index.name.trim().is_empty() {
            return Err("index.name must not be empty".to_string());
        }
        if self.index.name.contains(['/', '\\']) {
            return Err(format!(
                "index.name '{}' must be a single directory name",
                self.index.name
            ));
        }
        if self.indexing.parallel_threads == 0 {
            return Err("indexing.parallel_threads must be at least 1".to_string());
        }
        if self.indexing.queue_depth == 0 {
            return Err("indexing.queue_depth must be at least 1".to_string());
        }
        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# termindex configuration

# Version of the configuration schema
version = 1

[index]
# Root search-data folder; one directory per named index lives below it
root = ".termindex/search"

# Name of this index instance
name = "terminology"

# Tantivy writer heap in megabytes (minimum 15)
writer_heap_mb = 50

# Set to false to skip adding documents while still releasing waiters
enabled = true

# Component id of the metadata module (documents get the metadata marker)
# metadata_module = 1

[indexing]
# Worker threads building documents (defaults to CPU count)
# parallel_threads = {}

# Queued jobs before the commit path blocks
queue_depth = 1024

# Index plain concepts as tag-only documents
index_concepts = false

[refresh]
# Reopen interval with no waiters (ms)
max_stale_ms = 1000

# Reopen interval while someone waits for a generation (ms)
min_stale_ms = 25

[search]
# Extra hits fetched to make up for collapsed duplicates (percent)
dedup_headroom_percent = 25

# Upper bound on generation waits in ms; 0 waits without a bound
default_wait_timeout_ms = 0

[logging]
# Filter directive used when RUST_LOG is unset
level = "info"
"#,
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.index.name, "terminology");
        assert!(settings.indexing.parallel_threads > 0);
        assert_eq!(settings.search.dedup_headroom_percent, 25);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[index]
name = "snomed"
writer_heap_mb = 20
metadata_module = 77

[indexing]
parallel_threads = 4
queue_depth = 16
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.index.name, "snomed");
        assert_eq!(settings.index.metadata_module, Some(77));
        assert_eq!(settings.indexing.parallel_threads, 4);
        assert_eq!(settings.indexing.queue_depth, 16);
        // Untouched sections keep their defaults
        assert_eq!(settings.refresh.max_stale_ms, 1_000);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.parallel_threads = 2;
        settings.refresh.min_stale_ms = 5;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.parallel_threads, 2);
        assert_eq!(loaded.refresh.min_stale_ms, 5);
    }

    #[test]
    fn test_init_config_file_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.exists());

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.index.writer_heap_mb, 50);

        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_writer_heap_is_clamped() {
        let config = IndexConfig {
            writer_heap_mb: 1,
            ..IndexConfig::default()
        };
        assert_eq!(config.writer_heap_bytes(), MIN_WRITER_HEAP_BYTES);
    }

    #[test]
    fn test_min_stale_never_exceeds_max_stale() {
        let refresh = RefreshConfig {
            max_stale_ms: 10,
            min_stale_ms: 500,
        };
        assert_eq!(refresh.min_stale(), Duration::from_millis(10));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.index.name = "a/b".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.indexing.queue_depth = 0;
        assert!(settings.validate().is_err());
    }
}
