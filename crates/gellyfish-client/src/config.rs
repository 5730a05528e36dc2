//! Configuration loading and client factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gellyfish_core::progress::DEFAULT_APP_ID;
use gellyfish_core::schema_cache::DEFAULT_CAPACITY;

use crate::error::ConfigError;
use crate::gadget::GadgetClient;

/// One deployment of the hosted backend.
///
/// Note: Custom Debug impl masks the API key to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// App URL, e.g. `https://gelly-fish.gadget.app`.
    pub base_url: String,
    /// API key sent as a bearer token. Public read access needs none.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Top-level gellyfish configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GellyfishConfig {
    /// App identity used to namespace local storage keys.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// Environment used when a command doesn't name one.
    #[serde(default = "default_environment")]
    pub default_environment: String,
    /// Environments keyed by name.
    #[serde(default = "default_environments")]
    pub environments: BTreeMap<String, EnvironmentConfig>,
    /// File holding anonymous progress.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Number of schema lookups to keep cached.
    #[serde(default = "default_schema_cache_capacity")]
    pub schema_cache_capacity: usize,
    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_environments() -> BTreeMap<String, EnvironmentConfig> {
    BTreeMap::from([
        (
            "development".to_string(),
            EnvironmentConfig {
                base_url: "https://gelly-fish--development.gadget.app".to_string(),
                api_key: None,
            },
        ),
        (
            "production".to_string(),
            EnvironmentConfig {
                base_url: "https://gelly-fish.gadget.app".to_string(),
                api_key: None,
            },
        ),
    ])
}
fn default_storage_path() -> PathBuf {
    PathBuf::from(".gellyfish/storage.json")
}
fn default_schema_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_timeout() -> u64 {
    30
}

impl Default for GellyfishConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            default_environment: default_environment(),
            environments: default_environments(),
            storage_path: default_storage_path(),
            schema_cache_capacity: default_schema_cache_capacity(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl GellyfishConfig {
    /// Look up an environment, falling back to the default one.
    pub fn environment(&self, name: Option<&str>) -> Result<(&str, &EnvironmentConfig)> {
        let name = name.unwrap_or(&self.default_environment);
        self.environments
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| {
                ConfigError::UnknownEnvironment {
                    name: name.to_string(),
                    available: self.environments.keys().cloned().collect(),
                }
                .into()
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_environment(config: &EnvironmentConfig) -> EnvironmentConfig {
    EnvironmentConfig {
        base_url: resolve_env_vars(&config.base_url),
        api_key: config
            .api_key
            .as_deref()
            .map(resolve_env_vars)
            .filter(|k| !k.is_empty()),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `gellyfish.toml` in the current directory
/// 2. `~/.config/gellyfish/config.toml`
///
/// Environment variable override: `GELLYFISH_API_KEY` sets the key of the
/// default environment.
pub fn load_config() -> Result<GellyfishConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<GellyfishConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            return Err(ConfigError::NotFound(p.to_path_buf()).into());
        }
    } else {
        let local = PathBuf::from("gellyfish.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<GellyfishConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => GellyfishConfig::default(),
    };

    config.environments = config
        .environments
        .iter()
        .map(|(k, v)| (k.clone(), resolve_environment(v)))
        .collect();

    if let Ok(key) = std::env::var("GELLYFISH_API_KEY") {
        if let Some(env) = config.environments.get_mut(&config.default_environment) {
            env.api_key = Some(key);
        }
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gellyfish"))
}

/// Create a client for the named (or default) environment.
pub fn create_client(name: Option<&str>, config: &GellyfishConfig) -> Result<GadgetClient> {
    let (name, env) = config.environment(name)?;
    tracing::debug!(environment = name, base_url = %env.base_url, "creating client");
    GadgetClient::new(&env.base_url, env.api_key.clone())
        .map(|client| client.with_timeout(config.request_timeout()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_GELLYFISH_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_GELLYFISH_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_GELLYFISH_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_GELLYFISH_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = GellyfishConfig::default();
        assert_eq!(config.app_id, "gelly-fish");
        assert_eq!(config.default_environment, "development");
        assert_eq!(config.schema_cache_capacity, 32);
        assert!(config.environments.contains_key("production"));
    }

    #[test]
    fn parse_environment_config() {
        let toml_str = r#"
app_id = "gelly-wiggle"
default_environment = "production"

[environments.production]
base_url = "https://gelly-wiggle.gadget.app"
api_key = "gsk-test"
"#;
        let config: GellyfishConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app_id, "gelly-wiggle");
        assert_eq!(config.environments.len(), 1);
        let (name, env) = config.environment(None).unwrap();
        assert_eq!(name, "production");
        assert_eq!(env.api_key.as_deref(), Some("gsk-test"));
        assert!(config.environment(Some("staging")).is_err());
    }

    #[test]
    fn debug_masks_api_key() {
        let env = EnvironmentConfig {
            base_url: "https://gelly-fish.gadget.app".into(),
            api_key: Some("gsk-secret".into()),
        };
        let debug = format!("{env:?}");
        assert!(!debug.contains("gsk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn explicit_missing_config_fails() {
        let err = load_config_from(Some(Path::new("/no/such/gellyfish.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_resolves_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gellyfish.toml");
        std::fs::write(
            &path,
            r#"
default_environment = "staging"

[environments.staging]
base_url = "https://gelly-fish--staging.gadget.app"
api_key = "${_GELLYFISH_STAGING_KEY}"
"#,
        )
        .unwrap();

        std::env::set_var("_GELLYFISH_STAGING_KEY", "gsk-staging");
        let config = load_config_from(Some(&path)).unwrap();
        std::env::remove_var("_GELLYFISH_STAGING_KEY");

        let (_, env) = config.environment(None).unwrap();
        assert!(env.api_key.is_some());
    }
}
