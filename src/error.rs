//! Startup binding errors.
//!
//! Every variant is fatal: the pipeline stops at the first one and hands it back to
//! the caller. Nothing is logged-and-skipped.

use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::client::ClientError;

/// A configuration value the binders refuse to run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    NameServerAddress,
    ConsumerGroup,
    Topic,
    ProducerGroup,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequiredField::NameServerAddress => "name server address",
            RequiredField::ConsumerGroup => "consumer group",
            RequiredField::Topic => "topic",
            RequiredField::ProducerGroup => "producer group",
        };
        f.write_str(name)
    }
}

/// Error raised while discovering, validating, or starting bound components.
#[derive(Debug, Error)]
pub enum BindError {
    /// A required value is missing or empty.
    #[error("{field} must be defined (component `{component}`)")]
    MissingField {
        component: String,
        field: RequiredField,
    },

    /// A consumer implements neither the push nor the pull capability.
    #[error("consumer `{component}` ({type_name}) implements neither a push nor a pull consumer")]
    MissingConsumerCapability { component: String, type_name: String },

    /// A consumer implements both capabilities, so the binding strategy is ambiguous.
    #[error("consumer `{component}` ({type_name}) implements both a push and a pull consumer")]
    AmbiguousConsumerCapability { component: String, type_name: String },

    /// A producer does not expose the producer capability.
    #[error("producer `{component}` ({type_name}) does not implement ProducerComponent")]
    MissingProducerCapability { component: String, type_name: String },

    /// The declared consume mode is not one of the recognised values.
    #[error(
        "consumer `{component}` declares unknown consume mode {value:?}, only CONCURRENTLY and ORDERLY are supported"
    )]
    UnsupportedConsumeMode { component: String, value: String },

    /// The declared message model is not one of the recognised values.
    #[error(
        "consumer `{component}` declares unknown message model {value:?}, only CLUSTERING and BROADCASTING are supported"
    )]
    UnsupportedMessageModel { component: String, value: String },

    /// Two components were registered under the same identity.
    #[error("component `{component}` is already registered")]
    DuplicateComponent { component: String },

    /// The broker client refused a configuration call or failed to start.
    #[error("broker client for `{component}` failed: {source}")]
    Client {
        component: String,
        #[source]
        source: ClientError,
    },

    /// A pull consumer's own startup hook failed.
    #[error("pull consumer `{component}` failed to start: {source}")]
    InnerStartup {
        component: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    /// An internal lock was poisoned by a panicking thread.
    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl BindError {
    /// Identity of the component the error refers to, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            BindError::MissingField { component, .. }
            | BindError::MissingConsumerCapability { component, .. }
            | BindError::AmbiguousConsumerCapability { component, .. }
            | BindError::MissingProducerCapability { component, .. }
            | BindError::UnsupportedConsumeMode { component, .. }
            | BindError::UnsupportedMessageModel { component, .. }
            | BindError::DuplicateComponent { component }
            | BindError::Client { component, .. }
            | BindError::InnerStartup { component, .. } => Some(component),
            BindError::LockPoisoned(_) => None,
        }
    }

    pub(crate) fn client(component: &str, source: ClientError) -> Self {
        BindError::Client {
            component: component.to_string(),
            source,
        }
    }
}

/// Require a non-empty value, naming the field and component otherwise.
pub(crate) fn require<'a>(
    value: Option<&'a str>,
    field: RequiredField,
    component: &str,
) -> Result<&'a str, BindError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BindError::MissingField {
            component: component.to_string(),
            field,
        }),
    }
}
