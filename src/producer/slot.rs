use std::sync::{PoisonError, RwLock};

use crate::client::{ClientError, Message, SendResult};

use super::ProducerBinding;

/// Holder a producer component embeds to keep its binding.
///
/// ```
/// use mq_starter::{component, ProducerBinding, ProducerComponent, ProducerSlot};
///
/// #[derive(Default)]
/// struct OrderService {
///     producer: ProducerSlot,
/// }
///
/// impl ProducerComponent for OrderService {
///     fn bind_producer(&self, binding: ProducerBinding) {
///         self.producer.set(binding);
///     }
/// }
///
/// component!(OrderService: producer);
///
/// assert!(!OrderService::default().producer.is_bound());
/// ```
#[derive(Debug, Default)]
pub struct ProducerSlot {
    binding: RwLock<Option<ProducerBinding>>,
}

impl ProducerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, binding: ProducerBinding) {
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = Some(binding);
    }

    pub fn binding(&self) -> Option<ProducerBinding> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.binding().is_some()
    }

    fn bound(&self) -> Result<ProducerBinding, ClientError> {
        self.binding().ok_or(ClientError::NotStarted)
    }

    /// See [`ProducerBinding::send`].
    pub fn send(&self, body: impl Into<Vec<u8>>) -> Result<SendResult, ClientError> {
        self.bound()?.send(body)
    }

    /// See [`ProducerBinding::send_message`].
    pub fn send_message(&self, message: Message) -> Result<SendResult, ClientError> {
        self.bound()?.send_message(message)
    }

    /// See [`ProducerBinding::send_to`].
    pub fn send_to(
        &self,
        topic: &str,
        tag: Option<&str>,
        body: impl Into<Vec<u8>>,
    ) -> Result<SendResult, ClientError> {
        self.bound()?.send_to(topic, tag, body)
    }
}
