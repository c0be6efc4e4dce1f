//! Configuration loader with multi-source merging.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. ~/.config/ccm-harness/config.toml (user defaults)
//! 3. ccm-harness.toml (project config)
//! 4. ccm-harness.local.toml (gitignored, local overrides)
//! 5. Environment variables (CCMH_* prefix)
//!
//! CLI flags are applied on top by the binary.

use crate::{ClusterConfig, Result};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "ccm-harness.toml";

/// Local, uncommitted override file name.
pub const LOCAL_CONFIG_FILE: &str = "ccm-harness.local.toml";

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_vars: Option<HashMap<String, String>>,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "CCMH".to_string(),
            env_vars: None,
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "CCMH")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process environment
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Skip the per-user config file
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Path of the per-user config file, if a home directory is known
    pub fn user_config_file() -> Option<PathBuf> {
        ProjectDirs::from("org", "ccm-harness", "ccm-harness")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<ClusterConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = ClusterConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config
        if self.user_config {
            if let Some(user_config_file) = Self::user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(Self::toml_file(user_config_file));
                }
            }
        }

        // 3. Project config
        let project_config_file = self.project_dir.join(PROJECT_CONFIG_FILE);
        if project_config_file.exists() {
            builder = builder.add_source(Self::toml_file(project_config_file));
        }

        // 4. Local config
        let local_config_file = self.project_dir.join(LOCAL_CONFIG_FILE);
        if local_config_file.exists() {
            builder = builder.add_source(Self::toml_file(local_config_file));
        }

        // 5. Environment variables (CCMH_NODE_COUNT, CCMH_IP_PREFIX, ...)
        let mut environment = config::Environment::with_prefix(&self.env_prefix).try_parsing(true);
        if let Some(vars) = self.env_vars {
            environment = environment.source(Some(vars.into_iter().collect()));
        }
        builder = builder.add_source(environment);

        let config: ClusterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn toml_file(path: PathBuf) -> config::File<config::FileSourceFile, config::FileFormat> {
        config::File::from(path)
            .required(false)
            .format(config::FileFormat::Toml)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_vars(HashMap::new())
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, ClusterConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
name = "auth_test"
node_count = 5
ip_prefix = "127.0.9."
manage_interfaces = true
interface_prefix = "lo:it"
"#;
        fs::write(project_dir.join(PROJECT_CONFIG_FILE), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.name, "auth_test");
        assert_eq!(config.node_count, 5);
        assert_eq!(config.ip_prefix, "127.0.9.");
        assert!(config.manage_interfaces);
        assert_eq!(config.interface_prefix.as_deref(), Some("lo:it"));
        assert_eq!(config.cassandra_version, "3.7");
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(project_dir.join(PROJECT_CONFIG_FILE), "node_count = 4\n")
            .expect("Failed to write project config");
        fs::write(project_dir.join(LOCAL_CONFIG_FILE), "node_count = 2\n")
            .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.node_count, 2);
    }

    #[test]
    fn test_environment_overrides_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(project_dir.join(PROJECT_CONFIG_FILE), "node_count = 4\n")
            .expect("Failed to write project config");

        let vars = HashMap::from([
            ("CCMH_NODE_COUNT".to_string(), "6".to_string()),
            ("CCMH_ENABLED".to_string(), "true".to_string()),
            ("CCMH_KILL_ALL_ON_CONFLICT".to_string(), "true".to_string()),
        ]);

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_vars(vars)
            .without_user_config()
            .load()
            .expect("Failed to load config");

        assert_eq!(config.node_count, 6);
        assert!(config.enabled);
        assert!(config.kill_all_on_conflict);
    }

    #[test]
    fn test_invalid_node_count_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join(PROJECT_CONFIG_FILE), "node_count = 0\n")
            .expect("Failed to write project config");

        let result = loader(temp_dir.path()).load();
        assert!(matches!(result, Err(Error::InvalidNodeCount(0))));
    }
}
