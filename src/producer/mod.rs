//! Producer side: the shared producer client and its injection into components.

mod binder;
mod slot;

pub use binder::ProducerBinder;
pub use slot::ProducerSlot;

use std::fmt;
use std::sync::Arc;

use crate::client::{ClientError, Message, ProducerClient, SendResult};

/// What a producer component receives at bind time: a reference to the shared
/// client plus its effective default topic and tag.
#[derive(Clone)]
pub struct ProducerBinding {
    client: Arc<dyn ProducerClient>,
    topic: Option<String>,
    tag: Option<String>,
}

impl ProducerBinding {
    pub fn new(client: Arc<dyn ProducerClient>, topic: Option<String>, tag: Option<String>) -> Self {
        Self { client, topic, tag }
    }

    pub fn client(&self) -> &Arc<dyn ProducerClient> {
        &self.client
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Send `body` to the default topic, tagged with the default tag.
    pub fn send(&self, body: impl Into<Vec<u8>>) -> Result<SendResult, ClientError> {
        self.send_message(Message {
            body: body.into(),
            ..Message::default()
        })
    }

    /// Send a message, filling in the default topic and tag where it has none.
    pub fn send_message(&self, mut message: Message) -> Result<SendResult, ClientError> {
        if message.topic.is_empty() {
            message.topic = self.topic.clone().ok_or(ClientError::MissingTopic)?;
        }
        if message.tag.is_none() {
            message.tag = self.tag.clone();
        }
        self.client.send(message)
    }

    /// Send `body` to an explicit topic, ignoring the defaults.
    pub fn send_to(
        &self,
        topic: &str,
        tag: Option<&str>,
        body: impl Into<Vec<u8>>,
    ) -> Result<SendResult, ClientError> {
        if topic.is_empty() {
            return Err(ClientError::MissingTopic);
        }
        let mut message = Message::new(topic, body.into());
        message.tag = tag.map(str::to_string);
        self.client.send(message)
    }
}

impl fmt::Debug for ProducerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerBinding")
            .field("group", &self.client.group())
            .field("topic", &self.topic)
            .field("tag", &self.tag)
            .finish()
    }
}

/// A component that sends messages through the shared producer client.
pub trait ProducerComponent: Send + Sync {
    /// Receive the binding. Called once, during startup.
    fn bind_producer(&self, binding: ProducerBinding);
}
