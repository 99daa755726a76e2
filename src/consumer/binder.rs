use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::adapter::{DeliveryAdapter, PushConsumer};
use crate::client::{ClientFactory, PullClient};
use crate::config::{Environment, MqProperties};
use crate::error::{require, BindError, RequiredField};
use crate::registry::{ComponentHandle, ComponentRegistry};
use crate::role::ConsumerMetadata;

use super::{BindState, BoundClient, BoundConsumer, ConsumerCapability, PullConsumer};

/// Creates and starts one broker client per consumer component.
pub struct ConsumerBinder {
    factory: Arc<dyn ClientFactory>,
}

/// Values shared by both client strategies once a consumer is validated.
struct Resolved<'a> {
    component: &'a str,
    address: &'a str,
    group: String,
    topic: String,
    metadata: &'a ConsumerMetadata,
}

fn transition(component: &str, state: BindState) {
    debug!(component, ?state, "consumer state");
}

impl ConsumerBinder {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory }
    }

    /// Bind every consumer component in identity order. The first failure aborts.
    pub fn bind_all(
        &self,
        registry: &ComponentRegistry,
        properties: &MqProperties,
        environment: &Environment,
    ) -> Result<Vec<BoundConsumer>, BindError> {
        registry
            .consumers()
            .map(|(handle, metadata)| self.bind(handle, metadata, properties, environment))
            .collect()
    }

    fn bind(
        &self,
        handle: &ComponentHandle,
        metadata: &ConsumerMetadata,
        properties: &MqProperties,
        environment: &Environment,
    ) -> Result<BoundConsumer, BindError> {
        let component = handle.name();
        transition(component, BindState::Unbound);

        let address = require(
            properties.name_server_address(),
            RequiredField::NameServerAddress,
            component,
        )?;
        let group = require(
            Some(metadata.consumer_group.as_str()),
            RequiredField::ConsumerGroup,
            component,
        )?;
        let topic = require(Some(metadata.topic.as_str()), RequiredField::Topic, component)?;
        let capability = ConsumerCapability::of(handle)?;

        let resolved = Resolved {
            component,
            address,
            group: environment.resolve(group),
            topic: environment.resolve(topic),
            metadata,
        };
        transition(component, BindState::Validated);

        let bound = match capability {
            ConsumerCapability::Push(consumer) => self.bind_push(resolved, consumer)?,
            ConsumerCapability::Pull(consumer) => self.bind_pull(resolved, consumer)?,
        };

        transition(component, BindState::Ready);
        info!(
            component,
            group = %bound.group,
            topic = %bound.topic,
            instance = %bound.instance_name,
            "{} is ready to subscribe message",
            handle.type_name()
        );
        Ok(bound)
    }

    fn bind_push(
        &self,
        resolved: Resolved<'_>,
        consumer: Arc<dyn PushConsumer>,
    ) -> Result<BoundConsumer, BindError> {
        let Resolved {
            component,
            address,
            group,
            topic,
            metadata,
        } = resolved;
        let expression = metadata.tag_expression();
        let instance_name = Uuid::new_v4().to_string();

        let mut client = self.factory.push_consumer(&group);
        transition(component, BindState::ClientConstructed);

        client.set_name_server_address(address);
        client.set_message_model(metadata.message_model);
        client
            .subscribe(&topic, &expression)
            .map_err(|e| BindError::client(component, e))?;
        client.set_instance_name(&instance_name);

        let adapter = DeliveryAdapter::new(component, Arc::clone(&consumer));
        client.register_listener(adapter.into_listener(metadata.consume_mode));
        transition(component, BindState::ListenerInstalled);

        client
            .start()
            .map_err(|e| BindError::client(component, e))?;
        transition(component, BindState::Started);
        consumer.on_started(&*client);

        Ok(BoundConsumer {
            component: component.to_string(),
            instance_name,
            group,
            topic,
            expression,
            message_model: metadata.message_model,
            consume_mode: Some(metadata.consume_mode),
            client: BoundClient::Push(client),
        })
    }

    fn bind_pull(
        &self,
        resolved: Resolved<'_>,
        consumer: Arc<dyn PullConsumer>,
    ) -> Result<BoundConsumer, BindError> {
        let Resolved {
            component,
            address,
            group,
            topic,
            metadata,
        } = resolved;
        let instance_name = Uuid::new_v4().to_string();

        let mut client = self.factory.pull_consumer(&group);
        transition(component, BindState::ClientConstructed);

        client.set_name_server_address(address);
        client.set_message_model(metadata.message_model);
        client.set_instance_name(&instance_name);
        client
            .start()
            .map_err(|e| BindError::client(component, e))?;
        transition(component, BindState::Started);

        let client: Arc<dyn PullClient> = Arc::from(client);
        consumer
            .start_inner(&topic, Arc::clone(&client))
            .map_err(|source| BindError::InnerStartup {
                component: component.to_string(),
                source,
            })?;

        Ok(BoundConsumer {
            component: component.to_string(),
            instance_name,
            group,
            topic,
            expression: metadata.tag_expression(),
            message_model: metadata.message_model,
            consume_mode: None,
            client: BoundClient::Pull(client),
        })
    }
}
