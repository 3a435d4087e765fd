//! Configuration sources

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::application::errors::ConfigError;

/// One source of configuration data, merged into the store in load order
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Snapshot of the process environment
    Env {
        /// JSON-parse values that look like objects or arrays
        parse: bool,
    },
    JsonFile { path: PathBuf, drill: Vec<String> },
    YamlFile { path: PathBuf, drill: Vec<String> },
    Raw(Map<String, Value>),
}

impl ConfigSource {
    pub fn env(parse: bool) -> Self {
        ConfigSource::Env { parse }
    }

    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        ConfigSource::JsonFile {
            path: path.into(),
            drill: Vec::new(),
        }
    }

    pub fn yaml_file(path: impl Into<PathBuf>) -> Self {
        ConfigSource::YamlFile {
            path: path.into(),
            drill: Vec::new(),
        }
    }

    /// Pick the file format from the extension; anything but `.yaml`/`.yml` is JSON
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::yaml_file(path),
            _ => Self::json_file(path),
        }
    }

    /// Build a raw source. Anything but an object contributes no keys.
    pub fn raw(value: Value) -> Self {
        match value {
            Value::Object(map) => ConfigSource::Raw(map),
            _ => ConfigSource::Raw(Map::new()),
        }
    }

    /// Narrow a file source to a nested object. Other sources ignore the drill path.
    pub fn drill<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let ConfigSource::JsonFile { drill, .. } | ConfigSource::YamlFile { drill, .. } = &mut self {
            *drill = keys.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Resolve the source into its top-level key/value pairs
    pub fn resolve(&self) -> Result<Map<String, Value>, ConfigError> {
        match self {
            ConfigSource::Env { parse } => Ok(env_snapshot(std::env::vars(), *parse)),
            ConfigSource::JsonFile { path, drill } => {
                let value: Value = serde_json::from_str(&read(path)?)
                    .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
                drill_into(value, drill)
            }
            ConfigSource::YamlFile { path, drill } => {
                let value: Value = serde_yaml::from_str(&read(path)?)
                    .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
                drill_into(value, drill)
            }
            ConfigSource::Raw(map) => Ok(map.clone()),
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    Ok(std::fs::read_to_string(path)?)
}

pub(crate) fn env_snapshot(vars: impl Iterator<Item = (String, String)>, parse: bool) -> Map<String, Value> {
    vars.map(|(key, raw)| {
        let value = if parse { parse_env_value(raw) } else { Value::String(raw) };
        (key, value)
    })
    .collect()
}

/// Values starting with `{` or `[` are parsed as JSON; a failed parse keeps the raw string
fn parse_env_value(raw: String) -> Value {
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(value) = serde_json::from_str(&raw) {
            return value;
        }
    }
    Value::String(raw)
}

fn drill_into(mut value: Value, path: &[String]) -> Result<Map<String, Value>, ConfigError> {
    for key in path {
        value = match value {
            Value::Object(mut map) => map.remove(key).unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::Drill {
            path: if path.is_empty() { "(root)".to_string() } else { path.join(".") },
        }),
    }
}
