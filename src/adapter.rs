//! Delivery adapter: the bridge between a push client's listener and a handler.
//!
//! The broker invokes listeners with one of two callback shapes (concurrent or
//! orderly). Handlers implement a single [`PushConsumer::process`] entry point; the
//! adapter forwards the batch and context untouched and maps the handler's outcome
//! back onto the mode's status.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::client::{
    ConcurrentContext, ConcurrentStatus, Message, MessageListener, OrderlyContext, OrderlyStatus,
    PushClient,
};
use crate::role::ConsumeMode;

/// Result of processing one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The batch was consumed.
    Success,
    /// Hand the batch back to the broker to be delivered again later.
    Retry,
}

impl From<ConsumeOutcome> for ConcurrentStatus {
    fn from(outcome: ConsumeOutcome) -> Self {
        match outcome {
            ConsumeOutcome::Success => ConcurrentStatus::ConsumeSuccess,
            ConsumeOutcome::Retry => ConcurrentStatus::ReconsumeLater,
        }
    }
}

impl From<ConsumeOutcome> for OrderlyStatus {
    fn from(outcome: ConsumeOutcome) -> Self {
        match outcome {
            ConsumeOutcome::Success => OrderlyStatus::Success,
            ConsumeOutcome::Retry => OrderlyStatus::SuspendCurrentQueueAMoment,
        }
    }
}

/// The broker's per-mode delivery context, borrowed for the duration of one call.
#[derive(Debug)]
pub enum DeliveryContext<'a> {
    Concurrent(&'a mut ConcurrentContext),
    Orderly(&'a mut OrderlyContext),
}

impl DeliveryContext<'_> {
    pub fn mode(&self) -> ConsumeMode {
        match self {
            DeliveryContext::Concurrent(_) => ConsumeMode::Concurrently,
            DeliveryContext::Orderly(_) => ConsumeMode::Orderly,
        }
    }

    pub fn queue_id(&self) -> u32 {
        match self {
            DeliveryContext::Concurrent(ctx) => ctx.queue_id,
            DeliveryContext::Orderly(ctx) => ctx.queue_id,
        }
    }
}

/// A handler the broker pushes batches to.
///
/// Called from broker-managed threads. In concurrent mode calls may overlap.
pub trait PushConsumer: Send + Sync {
    fn process(&self, messages: &[Message], context: DeliveryContext<'_>) -> ConsumeOutcome;

    /// Called once with the client after it started delivering to this consumer.
    fn on_started(&self, _client: &dyn PushClient) {}
}

/// Wraps a [`PushConsumer`] behind the listener shape a push client expects.
#[derive(Clone)]
pub struct DeliveryAdapter {
    component: String,
    handler: Arc<dyn PushConsumer>,
}

impl DeliveryAdapter {
    pub fn new(component: impl Into<String>, handler: Arc<dyn PushConsumer>) -> Self {
        Self {
            component: component.into(),
            handler,
        }
    }

    pub fn consume_concurrently(
        &self,
        messages: &[Message],
        context: &mut ConcurrentContext,
    ) -> ConcurrentStatus {
        trace!(component = %self.component, batch = messages.len(), "consume concurrently");
        self.handler
            .process(messages, DeliveryContext::Concurrent(context))
            .into()
    }

    pub fn consume_orderly(
        &self,
        messages: &[Message],
        context: &mut OrderlyContext,
    ) -> OrderlyStatus {
        trace!(component = %self.component, batch = messages.len(), "consume orderly");
        self.handler
            .process(messages, DeliveryContext::Orderly(context))
            .into()
    }

    /// Turn the adapter into the listener for `mode`.
    pub fn into_listener(self, mode: ConsumeMode) -> MessageListener {
        match mode {
            ConsumeMode::Concurrently => MessageListener::concurrently(move |messages, context| {
                self.consume_concurrently(messages, context)
            }),
            ConsumeMode::Orderly => MessageListener::orderly(move |messages, context| {
                self.consume_orderly(messages, context)
            }),
        }
    }
}

impl fmt::Debug for DeliveryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryAdapter")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}
