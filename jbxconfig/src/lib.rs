//! # JBXMusic Configuration Module
//!
//! This module provides configuration management for JBXMusic, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use jbxconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let timeout = config.get_search_timeout_secs();
//! let nodes = config.get_node_entries();
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("jbxmusic.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load JBXMusic configuration"));
}

const ENV_CONFIG_DIR: &str = "JBXMUSIC_CONFIG";
const ENV_PREFIX: &str = "JBXMUSIC_CONFIG__";

// Default values for configuration
const DEFAULT_PROVIDER: &str = "generic";
const DEFAULT_SEARCH_TIMEOUT_SECS: usize = 20;
const DEFAULT_FETCH_TIMEOUT_SECS: usize = 10;
const DEFAULT_EXTRACT_WORKERS: usize = 2;
const DEFAULT_EXTRACT_CALL_TIMEOUT_SECS: usize = 90;
const DEFAULT_COOKIE_FILENAME: &str = "gistfile1.txt";
const DEFAULT_EXTRACTOR_BINARY: &str = "yt-dlp";

/// Macro to generate a getter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> usize {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap() as usize,
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as usize,
                _ => $default,
            }
        }
    };
}

/// Macro to generate a getter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => s,
                _ => $default.to_string(),
            }
        }
    };
}

/// A backend node described in the configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    /// Stable identifier of the node
    pub identifier: String,
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl NodeEntry {
    /// Formats the node address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration manager for JBXMusic
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters for configuration values
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".jbxmusic").exists() {
            return ".jbxmusic".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".jbxmusic");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".jbxmusic".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("Configured path is not a directory"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        // Test read permission
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `JBXMUSIC_CONFIG` environment variable
    /// 3. `.jbxmusic` in the current directory
    /// 4. `.jbxmusic` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for
    /// read/write permissions.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created or validated
    pub fn config_dir(directory: &str) -> String {
        let dir_path = Self::find_config_dir(directory);
        let path = Path::new(&dir_path);

        Self::validate_config_dir(path).expect("Unable to validate the configuration directory");

        dir_path
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["search", "timeout_secs"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key);
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        let new_key = Value::String(s.to_lowercase());
                        let new_val = Self::lower_keys_value(v);
                        new_map.insert(new_key, new_val);
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    // ============ Player ============

    impl_string_config!(
        get_default_provider,
        &["player", "default_provider"],
        DEFAULT_PROVIDER
    );

    // ============ Search ============

    impl_usize_config!(
        get_search_timeout_secs,
        &["search", "timeout_secs"],
        DEFAULT_SEARCH_TIMEOUT_SECS
    );

    // ============ Nodes ============

    /// Returns the backend nodes declared in the configuration
    ///
    /// Malformed entries are skipped with a warning rather than failing the
    /// whole list; node registration happens at startup and a single bad
    /// entry should not take the player down.
    pub fn get_node_entries(&self) -> Vec<NodeEntry> {
        let Ok(Value::Sequence(seq)) = self.get_value(&["nodes"]) else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        for item in seq {
            let Value::Mapping(map) = item else {
                warn!("Ignoring malformed node entry (not a mapping)");
                continue;
            };
            let identifier = map
                .get(&Value::String("identifier".into()))
                .and_then(Value::as_str)
                .map(str::to_string);
            let host = map
                .get(&Value::String("host".into()))
                .and_then(Value::as_str)
                .map(str::to_string);
            let port = map
                .get(&Value::String("port".into()))
                .and_then(Value::as_u64)
                .and_then(|p| u16::try_from(p).ok());
            match (identifier, host, port) {
                (Some(identifier), Some(host), Some(port)) => entries.push(NodeEntry {
                    identifier,
                    host,
                    port,
                }),
                _ => warn!("Ignoring node entry missing identifier, host or port"),
            }
        }
        entries
    }

    /// Replaces the configured node list
    pub fn set_node_entries(&self, entries: &[NodeEntry]) -> Result<()> {
        let seq = entries
            .iter()
            .map(|e| {
                let mut map = Mapping::new();
                map.insert(
                    Value::String("identifier".into()),
                    Value::String(e.identifier.clone()),
                );
                map.insert(Value::String("host".into()), Value::String(e.host.clone()));
                map.insert(
                    Value::String("port".into()),
                    Value::Number(Number::from(e.port)),
                );
                Value::Mapping(map)
            })
            .collect();
        self.set_value(&["nodes"], Value::Sequence(seq))
    }

    // ============ Cookies ============

    /// Returns the configured cookie source, if any
    ///
    /// An empty string in the configuration means "no source configured" and
    /// maps to `None`.
    pub fn get_cookie_source(&self) -> Option<String> {
        match self.get_value(&["cookies", "source"]) {
            Ok(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    impl_string_config!(
        get_cookie_filename,
        &["cookies", "filename"],
        DEFAULT_COOKIE_FILENAME
    );

    impl_usize_config!(
        get_cookie_fetch_timeout_secs,
        &["cookies", "fetch_timeout_secs"],
        DEFAULT_FETCH_TIMEOUT_SECS
    );

    // ============ Extractor ============

    impl_string_config!(
        get_extractor_binary,
        &["extractor", "binary"],
        DEFAULT_EXTRACTOR_BINARY
    );

    impl_usize_config!(
        get_extract_workers,
        &["extractor", "workers"],
        DEFAULT_EXTRACT_WORKERS
    );

    impl_usize_config!(
        get_extract_call_timeout_secs,
        &["extractor", "call_timeout_secs"],
        DEFAULT_EXTRACT_CALL_TIMEOUT_SECS
    );

    /// Domains routed straight to the extraction pipeline
    pub fn get_extract_domains(&self) -> Vec<String> {
        self.get_string_list(&["extractor", "domains"])
    }

    /// Provider kind names that always resolve through the extraction pipeline
    pub fn get_extract_kinds(&self) -> Vec<String> {
        self.get_string_list(&["extractor", "kinds"])
    }

    fn get_string_list(&self, path: &[&str]) -> Vec<String> {
        match self.get_value(path) {
            Ok(Value::Sequence(seq)) => seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Gets the global configuration singleton
///
/// The configuration is loaded once on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges two YAML values recursively
///
/// # Arguments
///
/// * `default` - The default configuration to merge into (modified in place)
/// * `external` - The external configuration to merge from
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // scalars and sequences are replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in_tempdir() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn defaults_are_applied() {
        let (_dir, config) = load_in_tempdir();

        assert_eq!(config.get_default_provider(), "generic");
        assert_eq!(config.get_search_timeout_secs(), 20);
        assert_eq!(config.get_cookie_fetch_timeout_secs(), 10);
        assert_eq!(config.get_extract_workers(), 2);
        assert_eq!(config.get_cookie_filename(), "gistfile1.txt");
        assert_eq!(config.get_extractor_binary(), "yt-dlp");
        assert_eq!(config.get_extract_call_timeout_secs(), 90);
        assert!(config.get_cookie_source().is_none());
        assert!(config.get_node_entries().is_empty());
    }

    #[test]
    fn default_extract_classifier_lists_are_seeded() {
        let (_dir, config) = load_in_tempdir();

        let domains = config.get_extract_domains();
        assert!(domains.iter().any(|d| d == "youtube.com"));
        assert!(domains.iter().any(|d| d == "youtu.be"));
        assert_eq!(config.get_extract_kinds(), vec!["generic".to_string()]);
    }

    #[test]
    fn external_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "search:\n  timeout_secs: 5\ncookies:\n  source: \"https://example.org/raw/c.txt\"\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_search_timeout_secs(), 5);
        assert_eq!(
            config.get_cookie_source().as_deref(),
            Some("https://example.org/raw/c.txt")
        );
        // Untouched sections keep their defaults
        assert_eq!(config.get_extract_workers(), 2);
    }

    #[test]
    fn node_entries_round_trip() {
        let (_dir, config) = load_in_tempdir();

        let nodes = vec![
            NodeEntry {
                identifier: "main".into(),
                host: "127.0.0.1".into(),
                port: 2333,
            },
            NodeEntry {
                identifier: "backup".into(),
                host: "10.0.0.2".into(),
                port: 2333,
            },
        ];
        config.set_node_entries(&nodes).unwrap();
        assert_eq!(config.get_node_entries(), nodes);
        assert_eq!(nodes[0].address(), "127.0.0.1:2333");
    }

    #[test]
    fn malformed_node_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "nodes:\n  - identifier: ok\n    host: localhost\n    port: 2333\n  - host: nohost.example\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        let entries = config.get_node_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, "ok");
    }
}
