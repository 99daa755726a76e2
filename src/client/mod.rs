//! Broker client seam.
//!
//! The binders never talk to a broker directly. They go through the traits in this
//! module, which mirror the client SDK's contract: construct a client for a group,
//! configure it, register a listener (push) and start it, then send or pull.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ClientFactory                           │
//! │  push_consumer(group) / pull_consumer(group) / producer(group)│
//! └──────────────────────────────────────────────────────────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//! ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐
//! │   PushClient    │   │   PullClient    │   │ ProducerClient  │
//! │ subscribe       │   │ start           │   │ start           │
//! │ register_listener│  │ pull(offset)    │   │ send(message)   │
//! │ start           │   │                 │   │                 │
//! └─────────────────┘   └─────────────────┘   └─────────────────┘
//! ```
//!
//! `memory::InMemoryBroker` (feature `memory`) implements the factory in-process.

mod message;

#[cfg(feature = "memory")]
pub mod memory;

pub use message::Message;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors reported by a broker client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The name server could not be reached (or none was configured).
    #[error("name server unreachable: {0}")]
    NameServerUnreachable(String),

    /// The client was used before `start()`.
    #[error("client not started")]
    NotStarted,

    /// `start()` was called twice.
    #[error("client already started")]
    AlreadyStarted,

    /// A push client was started without a listener.
    #[error("no message listener registered")]
    MissingListener,

    /// A push client was started without a subscription.
    #[error("no subscription registered")]
    MissingSubscription,

    /// A message was sent without a topic and no default topic was bound.
    #[error("message has no topic and no default topic is bound")]
    MissingTopic,

    /// The message body could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<bitcode::Error> for ClientError {
    fn from(err: bitcode::Error) -> Self {
        ClientError::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Encode(err.to_string())
    }
}

/// How a consumer group shares the messages of a topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MessageModel {
    /// Each message goes to one consumer instance of the group.
    #[default]
    Clustering,
    /// Each message goes to every consumer instance of the group.
    Broadcasting,
}

impl FromStr for MessageModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLUSTERING" => Ok(MessageModel::Clustering),
            "BROADCASTING" => Ok(MessageModel::Broadcasting),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for MessageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageModel::Clustering => f.write_str("CLUSTERING"),
            MessageModel::Broadcasting => f.write_str("BROADCASTING"),
        }
    }
}

/// Delivery context handed to concurrent listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrentContext {
    pub queue_id: u32,
    /// Delay level applied when the batch is handed back (0 lets the broker decide)
    pub delay_level_when_next_consume: i32,
    /// Index of the last successfully consumed message in the batch
    pub ack_index: i32,
}

/// Delivery context handed to orderly listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderlyContext {
    pub queue_id: u32,
    pub auto_commit: bool,
    /// Suspend time applied when the queue is suspended (-1 lets the broker decide)
    pub suspend_current_queue_time_millis: i64,
}

impl Default for OrderlyContext {
    fn default() -> Self {
        Self {
            queue_id: 0,
            auto_commit: true,
            suspend_current_queue_time_millis: -1,
        }
    }
}

/// Status a concurrent listener returns to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrentStatus {
    ConsumeSuccess,
    ReconsumeLater,
}

/// Status an orderly listener returns to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderlyStatus {
    Success,
    SuspendCurrentQueueAMoment,
}

type ConcurrentFn = dyn Fn(&[Message], &mut ConcurrentContext) -> ConcurrentStatus + Send + Sync;
type OrderlyFn = dyn Fn(&[Message], &mut OrderlyContext) -> OrderlyStatus + Send + Sync;

/// Listener registered on a push client, one shape per delivery mode.
pub enum MessageListener {
    Concurrently(Box<ConcurrentFn>),
    Orderly(Box<OrderlyFn>),
}

impl MessageListener {
    /// Wrap a concurrent callback.
    pub fn concurrently<F>(f: F) -> Self
    where
        F: Fn(&[Message], &mut ConcurrentContext) -> ConcurrentStatus + Send + Sync + 'static,
    {
        MessageListener::Concurrently(Box::new(f))
    }

    /// Wrap an orderly callback.
    pub fn orderly<F>(f: F) -> Self
    where
        F: Fn(&[Message], &mut OrderlyContext) -> OrderlyStatus + Send + Sync + 'static,
    {
        MessageListener::Orderly(Box::new(f))
    }

    /// Whether this listener requires serialized, in-order delivery.
    pub fn is_orderly(&self) -> bool {
        matches!(self, MessageListener::Orderly(_))
    }
}

impl fmt::Debug for MessageListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageListener::Concurrently(_) => f.write_str("MessageListener::Concurrently"),
            MessageListener::Orderly(_) => f.write_str("MessageListener::Orderly"),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub message_id: String,
    pub topic: String,
    pub queue_offset: u64,
}

/// Outcome of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullStatus {
    Found,
    NoNewMessage,
}

/// Result of a pull request.
#[derive(Debug, Clone)]
pub struct PullResult {
    pub status: PullStatus,
    pub messages: Vec<Message>,
    /// Offset to pass to the next pull
    pub next_offset: u64,
}

/// Client the broker pushes batches to.
pub trait PushClient: Send + Sync {
    /// Consumer group the client was constructed for.
    fn group(&self) -> &str;

    fn set_name_server_address(&mut self, address: &str);

    fn set_message_model(&mut self, model: MessageModel);

    /// Subscribe to `topic` with a tag filter expression (`*` or `a||b`).
    fn subscribe(&mut self, topic: &str, expression: &str) -> Result<(), ClientError>;

    fn set_instance_name(&mut self, name: &str);

    /// Register the delivery callback. Must happen before `start()`.
    fn register_listener(&mut self, listener: MessageListener);

    fn start(&mut self) -> Result<(), ClientError>;
}

/// Client the application pulls batches from.
pub trait PullClient: Send + Sync {
    /// Consumer group the client was constructed for.
    fn group(&self) -> &str;

    fn set_name_server_address(&mut self, address: &str);

    fn set_message_model(&mut self, model: MessageModel);

    fn set_instance_name(&mut self, name: &str);

    fn start(&mut self) -> Result<(), ClientError>;

    /// Pull up to `max` messages matching `expression` from `offset` on.
    fn pull(
        &self,
        topic: &str,
        expression: &str,
        offset: u64,
        max: usize,
    ) -> Result<PullResult, ClientError>;
}

/// Client used to send messages. Safe to share between callers once started.
pub trait ProducerClient: Send + Sync {
    /// Producer group the client was constructed for.
    fn group(&self) -> &str;

    fn set_name_server_address(&mut self, address: &str);

    fn start(&mut self) -> Result<(), ClientError>;

    fn send(&self, message: Message) -> Result<SendResult, ClientError>;
}

/// Constructs broker clients bound to a group.
///
/// Implementations might include:
/// - `InMemoryBroker` - For testing and single-process scenarios
/// - an adapter over a native broker SDK
pub trait ClientFactory: Send + Sync {
    fn push_consumer(&self, group: &str) -> Box<dyn PushClient>;

    fn pull_consumer(&self, group: &str) -> Box<dyn PullClient>;

    fn producer(&self, group: &str) -> Box<dyn ProducerClient>;
}
