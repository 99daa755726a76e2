//! Consumer side: one broker client per consumer component, push or pull.

mod binder;
mod pull;

pub use binder::ConsumerBinder;
pub use pull::{PullSlot, PullStats, PullWorker};

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::adapter::PushConsumer;
use crate::client::{MessageModel, PullClient, PushClient};
use crate::error::BindError;
use crate::registry::ComponentHandle;
use crate::role::ConsumeMode;

/// A component that pulls batches on its own schedule.
pub trait PullConsumer: Send + Sync {
    /// Called once the pull client has started, with the effective topic.
    ///
    /// An error aborts startup.
    fn start_inner(
        &self,
        topic: &str,
        client: Arc<dyn PullClient>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// The consumer capability a component exposes. Exactly one is allowed.
#[derive(Clone)]
pub enum ConsumerCapability {
    Push(Arc<dyn PushConsumer>),
    Pull(Arc<dyn PullConsumer>),
}

impl ConsumerCapability {
    pub fn of(handle: &ComponentHandle) -> Result<Self, BindError> {
        match (handle.push_consumer(), handle.pull_consumer()) {
            (Some(push), None) => Ok(ConsumerCapability::Push(push)),
            (None, Some(pull)) => Ok(ConsumerCapability::Pull(pull)),
            (None, None) => Err(BindError::MissingConsumerCapability {
                component: handle.name().to_string(),
                type_name: handle.type_name().to_string(),
            }),
            (Some(_), Some(_)) => Err(BindError::AmbiguousConsumerCapability {
                component: handle.name().to_string(),
                type_name: handle.type_name().to_string(),
            }),
        }
    }
}

impl fmt::Debug for ConsumerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerCapability::Push(_) => f.write_str("ConsumerCapability::Push"),
            ConsumerCapability::Pull(_) => f.write_str("ConsumerCapability::Pull"),
        }
    }
}

/// Steps a consumer goes through while being bound. Never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Validated,
    ClientConstructed,
    ListenerInstalled,
    Started,
    Ready,
}

/// The started client of a bound consumer.
pub enum BoundClient {
    /// Owns the installed delivery adapter.
    Push(Box<dyn PushClient>),
    /// Shared with the component.
    Pull(Arc<dyn PullClient>),
}

impl fmt::Debug for BoundClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundClient::Push(c) => f.debug_tuple("Push").field(&c.group()).finish(),
            BoundClient::Pull(c) => f.debug_tuple("Pull").field(&c.group()).finish(),
        }
    }
}

/// A consumer component with its started client.
#[derive(Debug)]
pub struct BoundConsumer {
    pub(crate) component: String,
    pub(crate) instance_name: String,
    pub(crate) group: String,
    pub(crate) topic: String,
    pub(crate) expression: String,
    pub(crate) message_model: MessageModel,
    pub(crate) consume_mode: Option<ConsumeMode>,
    pub(crate) client: BoundClient,
}

impl BoundConsumer {
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Unique per bound consumer.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Effective consumer group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Effective topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscription expression (push only; pull consumers choose their own).
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn message_model(&self) -> MessageModel {
        self.message_model
    }

    /// `None` for pull consumers.
    pub fn consume_mode(&self) -> Option<ConsumeMode> {
        self.consume_mode
    }

    pub fn client(&self) -> &BoundClient {
        &self.client
    }

    pub fn is_push(&self) -> bool {
        matches!(self.client, BoundClient::Push(_))
    }
}
