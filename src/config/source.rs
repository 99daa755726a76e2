//! Property sources the environment is layered from.

use std::collections::HashMap;

use super::ConfigError;

/// A source of string properties keyed by name.
pub trait PropertySource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Look up `key`. `Some("")` means the key exists with an empty value.
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory properties, usually loaded from a TOML document.
#[derive(Debug, Clone, Default)]
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, String>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// Add a property (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Parse a TOML document, flattening nested tables into dotted keys.
    ///
    /// ```toml
    /// [mq]
    /// name-server-address = "127.0.0.1:9876"
    ///
    /// [overrides]
    /// "order-group" = "order-group-prod"
    /// ```
    ///
    /// yields `mq.name-server-address` and `overrides.order-group`. Top-level keys
    /// stay as they are, so `"order-group" = "..."` at the root overrides the nominal
    /// value `order-group` directly.
    pub fn from_toml_str(name: impl Into<String>, document: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = document.parse()?;
        let mut source = Self::new(name);
        flatten(&mut source.properties, None, &table)?;
        Ok(source)
    }
}

fn flatten(
    out: &mut HashMap<String, String>,
    prefix: Option<&str>,
    table: &toml::Table,
) -> Result<(), ConfigError> {
    for (key, value) in table {
        let full = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        match value {
            toml::Value::Table(inner) => flatten(out, Some(&full), inner)?,
            toml::Value::String(s) => {
                out.insert(full, s.clone());
            }
            toml::Value::Integer(i) => {
                out.insert(full, i.to_string());
            }
            toml::Value::Float(f) => {
                out.insert(full, f.to_string());
            }
            toml::Value::Boolean(b) => {
                out.insert(full, b.to_string());
            }
            toml::Value::Datetime(d) => {
                out.insert(full, d.to_string());
            }
            toml::Value::Array(_) => {
                return Err(ConfigError::UnsupportedValue { key: full });
            }
        }
    }
    Ok(())
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }
}

/// Process environment variables.
///
/// Tries the key verbatim, then its relaxed form: upper case with `.` and `-`
/// replaced by `_` (`mq.name-server-address` → `MQ_NAME_SERVER_ADDRESS`).
#[derive(Debug, Clone, Default)]
pub struct EnvPropertySource {
    prefix: Option<String>,
}

impl EnvPropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consult variables named `<PREFIX>_<KEY>`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn relaxed(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for EnvPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        let candidates = match &self.prefix {
            Some(p) => vec![
                format!("{}_{}", p, key),
                format!("{}_{}", p, Self::relaxed(key)),
            ],
            None => vec![key.to_string(), Self::relaxed(key)],
        };
        candidates
            .iter()
            .filter(|k| !k.is_empty() && !k.contains(['=', '\0']))
            .find_map(|k| std::env::var(k).ok())
    }
}
