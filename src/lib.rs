//! Declarative producer/consumer binding for message broker clients.
//!
//! Handler components declare a role (`#[derive(MqConsumer)]`, `#[derive(MqProducer)]`)
//! and the capabilities they implement (`component!`). At startup [`MqStarter`]
//! resolves their configuration through the [`Environment`], builds one shared
//! producer client and one client per consumer, and wires push consumers into the
//! broker's delivery callbacks.

pub mod adapter;
pub mod client;
pub mod config;
pub mod consumer;
mod error;
pub mod producer;
pub mod registry;
mod role;
mod starter;

pub use adapter::{ConsumeOutcome, DeliveryAdapter, DeliveryContext, PushConsumer};
pub use client::{ClientError, ClientFactory, Message, MessageModel, ProducerClient, PullClient, PushClient};
pub use config::{ConfigError, Environment, MqProperties};
pub use consumer::{BoundConsumer, ConsumerBinder, PullConsumer, PullSlot, PullWorker};
pub use error::{BindError, RequiredField};
pub use producer::{ProducerBinder, ProducerBinding, ProducerComponent, ProducerSlot};
pub use registry::{Component, ComponentHandle, ComponentRegistry, Role};
pub use role::{
    ConsumeMode, ConsumerAttributes, ConsumerMetadata, ConsumerRole, ProducerMetadata,
    ProducerRole,
};
pub use starter::{Bindings, MqStarter, CONSUMER_READY, PRODUCER_READY};

// Derives for ConsumerRole / ProducerRole
pub use mq_starter_macros::{MqConsumer, MqProducer};

// Re-export the EventEmitter readiness callbacks are registered on
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
