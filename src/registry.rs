//! Explicit component registry.
//!
//! Handler components are registered under a unique identity together with their
//! role metadata. The binders enumerate them per role, in identity order.
//!
//! A component advertises what it can do through the [`Component`] capability
//! accessors, usually generated with the [`component!`](crate::component) macro:
//!
//! ```
//! use std::sync::Arc;
//! use mq_starter::{component, ConsumeOutcome, DeliveryContext, Message, PushConsumer};
//!
//! struct AuditLog;
//!
//! impl PushConsumer for AuditLog {
//!     fn process(&self, _: &[Message], _: DeliveryContext<'_>) -> ConsumeOutcome {
//!         ConsumeOutcome::Success
//!     }
//! }
//!
//! component!(AuditLog: push);
//! ```

use std::any::type_name;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::PushConsumer;
use crate::consumer::PullConsumer;
use crate::error::BindError;
use crate::producer::ProducerComponent;
use crate::role::{
    ConsumerAttributes, ConsumerMetadata, ConsumerRole, ProducerMetadata, ProducerRole,
};

/// Capability accessors of a registered component.
///
/// Each accessor returns the component viewed through one capability trait, or
/// `None` when the component does not implement it.
pub trait Component: Send + Sync + 'static {
    fn push_consumer(self: Arc<Self>) -> Option<Arc<dyn PushConsumer>> {
        None
    }

    fn pull_consumer(self: Arc<Self>) -> Option<Arc<dyn PullConsumer>> {
        None
    }

    fn producer(self: Arc<Self>) -> Option<Arc<dyn ProducerComponent>> {
        None
    }
}

/// Implement [`Component`] for a type, listing the capabilities it exposes.
///
/// Capabilities are `push`, `pull` and `producer`:
///
/// ```ignore
/// component!(OrderListener: push);
/// component!(OrderService: producer);
/// component!(Inert);
/// ```
#[macro_export]
macro_rules! component {
    (@capability push) => {
        fn push_consumer(
            self: ::std::sync::Arc<Self>,
        ) -> ::std::option::Option<::std::sync::Arc<dyn $crate::PushConsumer>> {
            ::std::option::Option::Some(self)
        }
    };
    (@capability pull) => {
        fn pull_consumer(
            self: ::std::sync::Arc<Self>,
        ) -> ::std::option::Option<::std::sync::Arc<dyn $crate::PullConsumer>> {
            ::std::option::Option::Some(self)
        }
    };
    (@capability producer) => {
        fn producer(
            self: ::std::sync::Arc<Self>,
        ) -> ::std::option::Option<::std::sync::Arc<dyn $crate::ProducerComponent>> {
            ::std::option::Option::Some(self)
        }
    };
    ($ty:ty $(: $($capability:ident),+ )?) => {
        impl $crate::Component for $ty {
            $($( $crate::component!(@capability $capability); )+)?
        }
    };
}

/// Role a component is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Consumer,
    Producer,
}

/// A registered component: its identity, concrete type name, and the instance.
#[derive(Clone)]
pub struct ComponentHandle {
    name: String,
    type_name: &'static str,
    component: Arc<dyn Component>,
}

impl ComponentHandle {
    fn new<T: Component>(name: String, component: Arc<T>) -> Self {
        Self {
            name,
            type_name: type_name::<T>(),
            component,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn push_consumer(&self) -> Option<Arc<dyn PushConsumer>> {
        Arc::clone(&self.component).push_consumer()
    }

    pub fn pull_consumer(&self) -> Option<Arc<dyn PullConsumer>> {
        Arc::clone(&self.component).pull_consumer()
    }

    pub fn producer(&self) -> Option<Arc<dyn ProducerComponent>> {
        Arc::clone(&self.component).producer()
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

enum RoleMetadata {
    Consumer(ConsumerMetadata),
    Producer(ProducerMetadata),
}

struct Registration {
    handle: ComponentHandle,
    metadata: RoleMetadata,
}

/// Registry of role-bearing components, keyed by identity.
#[derive(Default)]
pub struct ComponentRegistry {
    components: BTreeMap<String, Registration>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer using its declared [`ConsumerRole`] metadata.
    pub fn consumer<T>(&mut self, name: impl Into<String>, component: Arc<T>) -> Result<(), BindError>
    where
        T: ConsumerRole + Component,
    {
        self.consumer_with(name, T::consumer_attributes(), component)
    }

    /// Register a consumer with explicit attributes.
    ///
    /// The consume mode and message model are validated here.
    pub fn consumer_with<T: Component>(
        &mut self,
        name: impl Into<String>,
        attributes: ConsumerAttributes,
        component: Arc<T>,
    ) -> Result<(), BindError> {
        let name = name.into();
        let metadata = attributes.validate(&name)?;
        self.insert(name, component, RoleMetadata::Consumer(metadata))
    }

    /// Register a producer using its declared [`ProducerRole`] metadata.
    pub fn producer<T>(&mut self, name: impl Into<String>, component: Arc<T>) -> Result<(), BindError>
    where
        T: ProducerRole + Component,
    {
        self.producer_with(name, T::producer_metadata(), component)
    }

    /// Register a producer with explicit metadata.
    pub fn producer_with<T: Component>(
        &mut self,
        name: impl Into<String>,
        metadata: ProducerMetadata,
        component: Arc<T>,
    ) -> Result<(), BindError> {
        self.insert(name.into(), component, RoleMetadata::Producer(metadata))
    }

    fn insert<T: Component>(
        &mut self,
        name: String,
        component: Arc<T>,
        metadata: RoleMetadata,
    ) -> Result<(), BindError> {
        match self.components.entry(name) {
            Entry::Occupied(entry) => Err(BindError::DuplicateComponent {
                component: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let handle = ComponentHandle::new(entry.key().clone(), component);
                debug!(component = %handle.name, type_name = handle.type_name, "component registered");
                entry.insert(Registration { handle, metadata });
                Ok(())
            }
        }
    }

    /// Every component registered with `role`, keyed by identity.
    pub fn find_components_with_role(&self, role: Role) -> BTreeMap<String, ComponentHandle> {
        self.components
            .iter()
            .filter(|(_, r)| r.role() == role)
            .map(|(name, r)| (name.clone(), r.handle.clone()))
            .collect()
    }

    pub fn consumer_metadata(&self, name: &str) -> Option<&ConsumerMetadata> {
        match &self.components.get(name)?.metadata {
            RoleMetadata::Consumer(meta) => Some(meta),
            RoleMetadata::Producer(_) => None,
        }
    }

    pub fn producer_metadata(&self, name: &str) -> Option<&ProducerMetadata> {
        match &self.components.get(name)?.metadata {
            RoleMetadata::Producer(meta) => Some(meta),
            RoleMetadata::Consumer(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn consumers(&self) -> impl Iterator<Item = (&ComponentHandle, &ConsumerMetadata)> {
        self.components.values().filter_map(|r| match &r.metadata {
            RoleMetadata::Consumer(meta) => Some((&r.handle, meta)),
            RoleMetadata::Producer(_) => None,
        })
    }

    pub(crate) fn producers(&self) -> impl Iterator<Item = (&ComponentHandle, &ProducerMetadata)> {
        self.components.values().filter_map(|r| match &r.metadata {
            RoleMetadata::Producer(meta) => Some((&r.handle, meta)),
            RoleMetadata::Consumer(_) => None,
        })
    }
}

impl Registration {
    fn role(&self) -> Role {
        match self.metadata {
            RoleMetadata::Consumer(_) => Role::Consumer,
            RoleMetadata::Producer(_) => Role::Producer,
        }
    }
}
