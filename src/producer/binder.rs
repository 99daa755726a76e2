use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::client::{ClientFactory, ProducerClient};
use crate::config::{Environment, MqProperties};
use crate::error::{require, BindError, RequiredField};
use crate::registry::ComponentRegistry;

use super::ProducerBinding;

/// Creates the process-wide producer client and injects it into producer components.
pub struct ProducerBinder {
    factory: Arc<dyn ClientFactory>,
    shared: Mutex<Option<Arc<dyn ProducerClient>>>,
}

impl ProducerBinder {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            shared: Mutex::new(None),
        }
    }

    /// The shared client, once it has been created.
    pub fn shared_client(&self) -> Result<Option<Arc<dyn ProducerClient>>, BindError> {
        let shared = self
            .shared
            .lock()
            .map_err(|_| BindError::LockPoisoned("producer client lookup"))?;
        Ok(shared.clone())
    }

    /// Bind every producer component, returning their identities in bind order.
    ///
    /// Does nothing when no producer component is registered. The shared client is
    /// created on the first call that finds one and reused afterwards.
    pub fn bind_all(
        &self,
        registry: &ComponentRegistry,
        properties: &MqProperties,
        environment: &Environment,
    ) -> Result<Vec<String>, BindError> {
        let producers: Vec<_> = registry.producers().collect();
        let Some((first, _)) = producers.first() else {
            debug!("no producer components registered");
            return Ok(Vec::new());
        };

        let client = self.ensure_client(properties, first.name())?;

        let mut bound = Vec::with_capacity(producers.len());
        for (handle, metadata) in producers {
            let component =
                handle
                    .producer()
                    .ok_or_else(|| BindError::MissingProducerCapability {
                        component: handle.name().to_string(),
                        type_name: handle.type_name().to_string(),
                    })?;

            let topic = effective(metadata.topic.as_deref(), environment);
            let tag = effective(metadata.tag.as_deref(), environment);

            component.bind_producer(ProducerBinding::new(
                Arc::clone(&client),
                topic.clone(),
                tag.clone(),
            ));
            info!(
                component = %handle.name(),
                topic = topic.as_deref().unwrap_or_default(),
                tag = tag.as_deref().unwrap_or_default(),
                "producer bound"
            );
            bound.push(handle.name().to_string());
        }
        Ok(bound)
    }

    fn ensure_client(
        &self,
        properties: &MqProperties,
        component: &str,
    ) -> Result<Arc<dyn ProducerClient>, BindError> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| BindError::LockPoisoned("producer client creation"))?;
        if let Some(client) = shared.as_ref() {
            return Ok(Arc::clone(client));
        }

        let group = require(
            properties.producer_group(),
            RequiredField::ProducerGroup,
            component,
        )?;
        let address = require(
            properties.name_server_address(),
            RequiredField::NameServerAddress,
            component,
        )?;

        let mut client = self.factory.producer(group);
        client.set_name_server_address(address);
        client
            .start()
            .map_err(|e| BindError::client(component, e))?;
        info!(group, name_server_address = address, "shared producer started");

        let client: Arc<dyn ProducerClient> = Arc::from(client);
        *shared = Some(Arc::clone(&client));
        Ok(client)
    }
}

/// Declared empty stays unset; otherwise resolve through the environment.
fn effective(declared: Option<&str>, environment: &Environment) -> Option<String> {
    declared
        .filter(|value| !value.is_empty())
        .map(|value| environment.resolve(value))
}
