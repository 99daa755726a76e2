//! Startup pipeline: bind producers, then consumers, once.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
use tracing::info;

use crate::client::{ClientFactory, ProducerClient};
use crate::config::{Environment, MqProperties};
use crate::consumer::{BoundConsumer, ConsumerBinder};
use crate::error::BindError;
use crate::producer::ProducerBinder;
use crate::registry::ComponentRegistry;

/// Event emitted once per bound producer, with the component identity.
pub const PRODUCER_READY: &str = "mq.producer.ready";
/// Event emitted once per bound consumer, with the component identity.
pub const CONSUMER_READY: &str = "mq.consumer.ready";

/// Everything the pipeline started.
///
/// Dropping it releases the handles only; whether a client keeps delivering after
/// that is up to the client implementation. The in-memory broker keeps every
/// started subscription live.
pub struct Bindings {
    producer: Option<Arc<dyn ProducerClient>>,
    producers: Vec<String>,
    consumers: Vec<BoundConsumer>,
}

impl Bindings {
    /// The shared producer client, if any producer component exists.
    pub fn producer_client(&self) -> Option<&Arc<dyn ProducerClient>> {
        self.producer.as_ref()
    }

    /// Identities of the bound producer components.
    pub fn producers(&self) -> &[String] {
        &self.producers
    }

    pub fn consumers(&self) -> &[BoundConsumer] {
        &self.consumers
    }

    pub fn consumer(&self, component: &str) -> Option<&BoundConsumer> {
        self.consumers.iter().find(|c| c.component() == component)
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("producer", &self.producer.as_ref().map(|p| p.group().to_string()))
            .field("producers", &self.producers)
            .field("consumers", &self.consumers)
            .finish()
    }
}

/// Runs the producer binder, then the consumer binder, against a registry.
///
/// ```
/// use std::sync::Arc;
/// use mq_starter::client::memory::InMemoryBroker;
/// use mq_starter::{ComponentRegistry, Environment, MqProperties, MqStarter};
///
/// let broker = InMemoryBroker::new("127.0.0.1:9876");
/// let mut starter = MqStarter::new(Environment::new(), Arc::new(broker))
///     .with_properties(MqProperties::new("127.0.0.1:9876"));
///
/// let bindings = starter.start(&ComponentRegistry::new()).unwrap();
/// assert!(bindings.producer_client().is_none());
/// assert!(bindings.consumers().is_empty());
/// ```
pub struct MqStarter {
    environment: Environment,
    properties: MqProperties,
    producers: ProducerBinder,
    consumers: ConsumerBinder,
    #[cfg(feature = "emitter")]
    events: EventEmitter,
}

impl MqStarter {
    /// Properties are read from `environment` (`mq.name-server-address`,
    /// `mq.producer-group`).
    pub fn new(environment: Environment, factory: Arc<dyn ClientFactory>) -> Self {
        let properties = MqProperties::from_environment(&environment);
        Self {
            environment,
            properties,
            producers: ProducerBinder::new(Arc::clone(&factory)),
            consumers: ConsumerBinder::new(factory),
            #[cfg(feature = "emitter")]
            events: EventEmitter::new(),
        }
    }

    /// Replace the properties read from the environment.
    pub fn with_properties(mut self, properties: MqProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn properties(&self) -> &MqProperties {
        &self.properties
    }

    /// Register a readiness callback for [`PRODUCER_READY`] or [`CONSUMER_READY`].
    #[cfg(feature = "emitter")]
    pub fn on_ready<F>(mut self, event: &str, listener: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.events.on(event, listener);
        self
    }

    /// Bind every registered component. The first error aborts startup.
    pub fn start(&mut self, registry: &ComponentRegistry) -> Result<Bindings, BindError> {
        let producers =
            self.producers
                .bind_all(registry, &self.properties, &self.environment)?;
        for name in &producers {
            self.ready(PRODUCER_READY, name);
        }

        let consumers =
            self.consumers
                .bind_all(registry, &self.properties, &self.environment)?;
        for bound in &consumers {
            self.ready(CONSUMER_READY, bound.component());
        }

        info!(
            producers = producers.len(),
            consumers = consumers.len(),
            "message broker bindings started"
        );
        Ok(Bindings {
            producer: self.producers.shared_client()?,
            producers,
            consumers,
        })
    }

    #[cfg(feature = "emitter")]
    fn ready(&mut self, event: &str, component: &str) {
        self.events.emit(event, component.to_string());
    }

    #[cfg(not(feature = "emitter"))]
    fn ready(&mut self, _event: &str, _component: &str) {}
}
