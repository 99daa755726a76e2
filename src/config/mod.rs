//! Configuration: property sources, the override resolver, and broker properties.
//!
//! Role metadata declares *nominal* values (a group name, a topic name). At bind
//! time each nominal value is looked up as a key in the [`Environment`]; a non-empty
//! property under that key replaces it, otherwise the nominal value is used as is.
//!
//! ```
//! use mq_starter::config::{Environment, MapPropertySource};
//!
//! let env = Environment::new()
//!     .with_source(MapPropertySource::new("overrides").with("G1", "G1-prod"));
//!
//! assert_eq!(env.resolve("G1"), "G1-prod");
//! assert_eq!(env.resolve("T1"), "T1");
//! ```

mod source;

pub use source::{EnvPropertySource, MapPropertySource, PropertySource};

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

/// Property key of the name server address.
pub const NAME_SERVER_ADDRESS_KEY: &str = "mq.name-server-address";
/// Property key of the producer group.
pub const PRODUCER_GROUP_KEY: &str = "mq.producer-group";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Arrays cannot be expressed as a single property value.
    #[error("unsupported value for key `{key}`")]
    UnsupportedValue { key: String },
}

/// Layered property sources. The first source that contains a key decides its value.
#[derive(Default)]
pub struct Environment {
    sources: Vec<Box<dyn PropertySource>>,
}

impl Environment {
    /// An environment without any source: every nominal value resolves to itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process environment variables only.
    pub fn from_process_env() -> Self {
        Self::new().with_source(EnvPropertySource::new())
    }

    /// Process environment variables layered over a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let file = MapPropertySource::from_toml_str("inline", document)?;
        Ok(Self::from_process_env().with_source(file))
    }

    /// Process environment variables layered over a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path)?;
        let file = MapPropertySource::from_toml_str(path.display().to_string(), &document)?;
        Ok(Self::from_process_env().with_source(file))
    }

    /// Append a source with lower precedence than the existing ones.
    pub fn with_source(mut self, source: impl PropertySource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Raw lookup: the value from the first source that has `key`.
    pub fn property(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|s| {
            let value = s.get(key)?;
            trace!(key, source = s.name(), "property found");
            Some(value)
        })
    }

    /// Resolve a nominal value to its effective value.
    ///
    /// An empty override counts as no override.
    pub fn resolve(&self, nominal: &str) -> String {
        match self.property(nominal) {
            Some(value) if !value.is_empty() => value,
            _ => nominal.to_string(),
        }
    }
}

/// Process-wide broker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MqProperties {
    /// Name server address, required whenever any component is bound
    pub name_server_address: Option<String>,
    /// Producer group, required only when producer components exist
    pub producer_group: Option<String>,
}

impl MqProperties {
    pub fn new(name_server_address: impl Into<String>) -> Self {
        Self {
            name_server_address: Some(name_server_address.into()),
            producer_group: None,
        }
    }

    pub fn with_producer_group(mut self, group: impl Into<String>) -> Self {
        self.producer_group = Some(group.into());
        self
    }

    /// Read `mq.name-server-address` and `mq.producer-group`.
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            name_server_address: env.property(NAME_SERVER_ADDRESS_KEY),
            producer_group: env.property(PRODUCER_GROUP_KEY),
        }
    }

    pub fn name_server_address(&self) -> Option<&str> {
        self.name_server_address.as_deref()
    }

    pub fn producer_group(&self) -> Option<&str> {
        self.producer_group.as_deref()
    }
}
