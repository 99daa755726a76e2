//! Role metadata declared on handler components.
//!
//! Consumers declare [`ConsumerAttributes`] (plain strings, exactly as written in a
//! `#[mq_consumer(...)]` attribute). Registration validates them into
//! [`ConsumerMetadata`], whose consume mode and message model are closed enums.

use std::fmt;
use std::str::FromStr;

use crate::client::MessageModel;
use crate::error::BindError;

/// How a push consumer's listener is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConsumeMode {
    /// Batches may be processed in parallel across queues.
    #[default]
    Concurrently,
    /// Batches of one queue are processed one at a time, in order.
    Orderly,
}

impl FromStr for ConsumeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONCURRENTLY" => Ok(ConsumeMode::Concurrently),
            "ORDERLY" => Ok(ConsumeMode::Orderly),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ConsumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeMode::Concurrently => f.write_str("CONCURRENTLY"),
            ConsumeMode::Orderly => f.write_str("ORDERLY"),
        }
    }
}

/// Consumer role metadata as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerAttributes {
    pub consumer_group: String,
    pub topic: String,
    /// Tag filters, OR-ed together. Empty subscribes to every tag.
    pub tag: Vec<String>,
    pub message_model: String,
    pub consume_mode: String,
}

impl Default for ConsumerAttributes {
    fn default() -> Self {
        Self {
            consumer_group: String::new(),
            topic: String::new(),
            tag: Vec::new(),
            message_model: MessageModel::Clustering.to_string(),
            consume_mode: ConsumeMode::Concurrently.to_string(),
        }
    }
}

impl ConsumerAttributes {
    pub fn new(consumer_group: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag.push(tag.into());
        self
    }

    pub fn message_model(mut self, model: impl Into<String>) -> Self {
        self.message_model = model.into();
        self
    }

    pub fn consume_mode(mut self, mode: impl Into<String>) -> Self {
        self.consume_mode = mode.into();
        self
    }

    /// Parse the mode strings for `component`.
    ///
    /// Group and topic are not checked here; an empty value is reported when the
    /// component is bound, together with the other required fields.
    pub fn validate(self, component: &str) -> Result<ConsumerMetadata, BindError> {
        let consume_mode =
            self.consume_mode
                .parse::<ConsumeMode>()
                .map_err(|value| BindError::UnsupportedConsumeMode {
                    component: component.to_string(),
                    value,
                })?;
        let message_model =
            self.message_model
                .parse::<MessageModel>()
                .map_err(|value| BindError::UnsupportedMessageModel {
                    component: component.to_string(),
                    value,
                })?;

        Ok(ConsumerMetadata {
            consumer_group: self.consumer_group,
            topic: self.topic,
            tag: self.tag,
            message_model,
            consume_mode,
        })
    }
}

/// Validated consumer role metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerMetadata {
    pub consumer_group: String,
    pub topic: String,
    pub tag: Vec<String>,
    pub message_model: MessageModel,
    pub consume_mode: ConsumeMode,
}

impl ConsumerMetadata {
    /// Subscription expression: tags joined with `||`, or `*` when none are declared.
    pub fn tag_expression(&self) -> String {
        if self.tag.is_empty() {
            "*".to_string()
        } else {
            self.tag.join("||")
        }
    }
}

/// Producer role metadata. Both values are nominal and optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerMetadata {
    pub topic: Option<String>,
    pub tag: Option<String>,
}

impl ProducerMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// A type that declares consumer role metadata. Usually derived with
/// `#[derive(MqConsumer)]`.
pub trait ConsumerRole {
    fn consumer_attributes() -> ConsumerAttributes;
}

/// A type that declares producer role metadata. Usually derived with
/// `#[derive(MqProducer)]`.
pub trait ProducerRole {
    fn producer_metadata() -> ProducerMetadata;
}
