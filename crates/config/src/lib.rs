#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration for devlease
//!
//! TOML configuration with four sections: `[general]` (opt-in triggers
//! and baseline injections), `[device]` (pooled device discovery and
//! device-specific injections), `[container]` (privileged/auto-remove
//! handling), and `[user]` (user rewriting). Every field has a default,
//! so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use devlease_errors::{ConfigError, Error};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub container: ContainerConfig,

    #[serde(default)]
    pub user: UserConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FileRead` when the file cannot be read and
    /// `ConfigError::ParseError` when it is not valid TOML. A missing
    /// file is an error: running with injection silently unconfigured
    /// is worse than failing loudly at startup.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::FileRead {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` on invalid TOML and
    /// `ConfigError::Invalid` when a value cannot work at injection
    /// time (see [`Config::validate`]).
    pub fn parse(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that TOML parsing alone cannot reject.
    ///
    /// Injected environment entries must be `KEY=VALUE`; a malformed
    /// entry here is an operator mistake and fails loading rather than
    /// being silently dropped per container later.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending entry.
    pub fn validate(&self) -> Result<(), Error> {
        for (section, environment) in [
            ("general", &self.general.environment),
            ("device", &self.device.environment),
        ] {
            if let Some(entry) = environment
                .iter()
                .find(|entry| !entry.contains('=') || entry.starts_with('='))
            {
                return Err(ConfigError::Invalid {
                    message: format!("{section}.environment entry '{entry}' is not KEY=VALUE"),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Opt-in triggers and baseline injections applied to every
/// participating container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Apply injection to every container, ignoring triggers.
    #[serde(default)]
    pub force: bool,

    /// Label that opts a container in when set to `"true"`.
    #[serde(default = "default_enabled_label")]
    pub enabled_label: String,

    /// Environment variable that opts a container in when `"true"`.
    #[serde(default = "default_enabled_env")]
    pub enabled_env: String,

    /// `KEY=VALUE` pairs injected into participating containers.
    #[serde(default)]
    pub environment: Vec<String>,

    /// Overwrite environment keys the container already sets.
    #[serde(default)]
    pub force_environment: bool,

    /// Bind mount specs (`src:dst[:opts]`) added to every participating
    /// container.
    #[serde(default)]
    pub mounts: Vec<String>,

    /// Static host device paths injected when present on the host.
    #[serde(default)]
    pub devices: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            force: false,
            enabled_label: default_enabled_label(),
            enabled_env: default_enabled_env(),
            environment: Vec::new(),
            force_environment: false,
            mounts: Vec::new(),
            devices: Vec::new(),
        }
    }
}

/// Pooled device discovery and device-specific injections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Directory scanned once at startup for claimable devices.
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// Regex a device's file name must match to join the pool.
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,

    /// Label that requests device injection when set to `"true"`.
    #[serde(default = "default_device_trigger_label")]
    pub trigger_label: String,

    /// Environment variable that requests device injection when `"true"`.
    #[serde(default = "default_device_trigger_env")]
    pub trigger_env: String,

    /// Environment variable naming visible devices (`all` or a comma
    /// list of indices).
    #[serde(default = "default_visible_env")]
    pub visible_env: String,

    /// Environment variable carrying the number of pooled devices the
    /// container requests.
    #[serde(default = "default_request_env")]
    pub request_env: String,

    /// Control nodes injected alongside any granted device, when they
    /// exist on the host.
    #[serde(default)]
    pub companion_devices: Vec<String>,

    /// `KEY=VALUE` pairs injected when devices are injected.
    #[serde(default)]
    pub environment: Vec<String>,

    #[serde(default)]
    pub force_environment: bool,

    /// Bind mount specs added when devices are injected.
    #[serde(default)]
    pub mounts: Vec<String>,

    /// Directories searched for shared libraries to bind read-only into
    /// the container.
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,

    /// File-name prefixes selecting which libraries to bind.
    #[serde(default)]
    pub library_prefixes: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            name_pattern: default_name_pattern(),
            trigger_label: default_device_trigger_label(),
            trigger_env: default_device_trigger_env(),
            visible_env: default_visible_env(),
            request_env: default_request_env(),
            companion_devices: Vec::new(),
            environment: Vec::new(),
            force_environment: false,
            mounts: Vec::new(),
            library_paths: Vec::new(),
            library_prefixes: Vec::new(),
        }
    }
}

/// Privileged-mode and auto-remove handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Environment variable that switches the container to privileged
    /// mode when `"true"`.
    #[serde(default = "default_privileged_env")]
    pub privileged_env: String,

    /// Label controlling auto-removal of the container.
    #[serde(default = "default_remove_label")]
    pub remove_label: String,

    /// Auto-remove every participating container (unless building).
    #[serde(default)]
    pub remove: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            privileged_env: default_privileged_env(),
            remove_label: default_remove_label(),
            remove: false,
        }
    }
}

/// How the container's user is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserMode {
    /// Use `default_user` when set, otherwise leave the user alone.
    #[default]
    Default,
    /// Always overwrite with `default_user`, without resolving it.
    Static,
    /// Take the user from the container's `user_env` variable, falling
    /// back to `default_user`.
    Env,
}

/// User rewriting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub mode: UserMode,

    /// User (name or uid[:gid]) injected according to `mode`.
    #[serde(default)]
    pub default_user: Option<String>,

    /// Environment variable consulted in `env` mode.
    #[serde(default = "default_user_env")]
    pub user_env: String,

    /// Label that keeps the container's own user when set to `"true"`.
    #[serde(default = "default_keep_label")]
    pub keep_label: String,

    /// Environment variable that keeps the container's own user.
    #[serde(default = "default_keep_env")]
    pub keep_env: String,

    /// Also set `HOME` to the resolved user's home directory.
    #[serde(default)]
    pub set_home_env: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            mode: UserMode::Default,
            default_user: None,
            user_env: default_user_env(),
            keep_label: default_keep_label(),
            keep_env: default_keep_env(),
            set_home_env: false,
        }
    }
}

// Default value functions for serde
fn default_enabled_label() -> String {
    "devlease".to_string()
}

fn default_enabled_env() -> String {
    "DEVLEASE_ENABLED".to_string()
}

fn default_source_path() -> PathBuf {
    PathBuf::from("/dev")
}

fn default_name_pattern() -> String {
    r"^accel\d+$".to_string()
}

fn default_device_trigger_label() -> String {
    "devlease-device-enabled".to_string()
}

fn default_device_trigger_env() -> String {
    "DEVLEASE_DEVICE_ENABLED".to_string()
}

fn default_visible_env() -> String {
    "DEVLEASE_VISIBLE_DEVICES".to_string()
}

fn default_request_env() -> String {
    "DEVLEASE_DEVICES_REQUESTED".to_string()
}

fn default_privileged_env() -> String {
    "DEVLEASE_PRIVILEGED".to_string()
}

fn default_remove_label() -> String {
    "devlease.container.remove".to_string()
}

fn default_user_env() -> String {
    "DEVLEASE_USER".to_string()
}

fn default_keep_label() -> String {
    "devlease.user.keep".to_string()
}

fn default_keep_env() -> String {
    "DEVLEASE_USER_KEEP".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = Config::parse("").unwrap();
        assert!(!config.general.force);
        assert_eq!(config.general.enabled_label, "devlease");
        assert_eq!(config.device.source_path, PathBuf::from("/dev"));
        assert_eq!(config.device.name_pattern, r"^accel\d+$");
        assert_eq!(config.user.mode, UserMode::Default);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = Config::parse(
            r#"
[device]
source_path = "/dev/accelerators"
name_pattern = "^card\\d+$"

[user]
mode = "env"
default_user = "svc"
"#,
        )
        .unwrap();
        assert_eq!(config.device.source_path, PathBuf::from("/dev/accelerators"));
        assert_eq!(config.device.name_pattern, r"^card\d+$");
        assert_eq!(config.device.request_env, "DEVLEASE_DEVICES_REQUESTED");
        assert_eq!(config.user.mode, UserMode::Env);
        assert_eq!(config.user.default_user.as_deref(), Some("svc"));
        assert_eq!(config.container.remove_label, "devlease.container.remove");
    }

    #[test]
    fn malformed_environment_entry_is_rejected() {
        let err = Config::parse(
            r#"
[general]
environment = ["OK=1", "BROKEN"]
"#,
        )
        .unwrap_err();
        match err {
            Error::Config(ConfigError::Invalid { message }) => {
                assert!(message.contains("BROKEN"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = Config::parse(
            r#"
[device]
environment = ["=nokey"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::parse("[general\nforce = yes").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::ParseError { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let err = Config::load("/no/such/devlease.toml").await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::FileRead { .. })));
    }

    #[tokio::test]
    async fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devlease.toml");
        std::fs::write(&path, "[general]\nforce = true\n").unwrap();

        let config = Config::load(&path).await.unwrap();
        assert!(config.general.force);
    }
}
