use crate::error::LauncherError;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable the hosting platform uses to hand out the listening port
pub const PORT_ENV: &str = "PORT";

/// Port used when the platform does not provide one
pub const DEFAULT_PORT: &str = "7860";

/// Pick the listening port from the raw value of `PORT`.
///
/// An unset or empty variable falls back to [`DEFAULT_PORT`]. Anything else is
/// passed through byte for byte, unvalidated; see [`LauncherConfig::port_number`].
pub fn resolve_port_from(value: Option<OsString>) -> OsString {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| OsString::from(DEFAULT_PORT))
}

/// Resolve `PORT` and export the result back into this process's environment, so
/// the child and anything it starts see the same value.
///
/// # Safety
///
/// Writes the process environment. No other thread may read or write the
/// environment while this runs; in practice it must be called before any threads
/// (including an async runtime) have been started.
pub unsafe fn resolve_port() -> OsString {
    let port = resolve_port_from(std::env::var_os(PORT_ENV));
    // SAFETY: upheld by the caller.
    unsafe { std::env::set_var(PORT_ENV, &port) };
    port
}

/// Everything the launcher needs to start and supervise the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    /// Name shown in the banner and in shutdown and error notices
    #[builder(default = "default_app_name()")]
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[builder(default = "default_tagline()")]
    #[serde(default = "default_tagline")]
    pub tagline: String,

    /// Listening port, exported to the child as `PORT`
    #[builder(default = "default_port()")]
    #[serde(default = "default_port", with = "port_serde")]
    pub port: OsString,

    #[builder(default = "default_command()")]
    #[serde(default = "default_command")]
    pub command: String,

    #[builder(default = "default_args()", setter(custom))]
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Extra variables set on the child on top of the inherited environment
    #[builder(default, setter(custom))]
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[builder(default)]
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// How long a terminated child may keep running before it is killed (in milliseconds)
    #[builder(default = "default_grace_period_ms()")]
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            tagline: default_tagline(),
            port: default_port(),
            command: default_command(),
            args: default_args(),
            env: HashMap::new(),
            working_directory: None,
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

impl LauncherConfig {
    pub fn builder() -> LauncherConfigBuilder {
        LauncherConfigBuilder::default()
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LauncherError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LauncherError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            LauncherError::Configuration(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LauncherError> {
        validate_command(&self.command).map_err(LauncherError::Configuration)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// The port as a number, if it is one. Non-numeric ports are still forwarded.
    pub fn port_number(&self) -> Option<u16> {
        self.port.to_str()?.parse().ok()
    }

    /// Environment overrides for the child, always including the resolved port
    pub fn child_env(&self) -> HashMap<OsString, OsString> {
        let mut env: HashMap<OsString, OsString> = self
            .env
            .iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value)))
            .collect();
        env.insert(OsString::from(PORT_ENV), self.port.clone());
        env
    }

    /// Human readable `command arg1 arg2` form, used in logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl LauncherConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }

    fn validate(&self) -> Result<(), String> {
        match &self.command {
            Some(command) => validate_command(command),
            None => Ok(()),
        }
    }
}

fn validate_command(command: &str) -> Result<(), String> {
    if command.trim().is_empty() {
        return Err("command must not be empty".to_string());
    }
    Ok(())
}

// Default value functions for serde and the builder
fn default_app_name() -> String {
    "Raadhya Tantra".to_string()
}
fn default_tagline() -> String {
    "Divine AI Wisdom Platform".to_string()
}
fn default_port() -> OsString {
    OsString::from(DEFAULT_PORT)
}
fn default_command() -> String {
    "npm".to_string()
}
fn default_args() -> Vec<String> {
    vec!["start".to_string()]
}
fn default_grace_period_ms() -> u64 {
    5_000
}

/// JSON has no byte strings; config files carry the port as text
mod port_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::ffi::OsString;

    pub fn serialize<S: Serializer>(port: &OsString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&port.to_string_lossy())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OsString, D::Error> {
        String::deserialize(deserializer).map(OsString::from)
    }
}
