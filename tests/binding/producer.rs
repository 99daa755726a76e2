//! Producer binder: the shared client and per-component defaults.

use std::sync::Arc;

use mq_starter::client::memory::ClientKind;
use mq_starter::{
    BindError, ClientError, ComponentRegistry, Environment, Message, MqProperties, MqStarter,
    ProducerBinder, RequiredField,
};

use crate::support::{
    broker, overrides, properties, starter, Notifier, OrderListener, OrderPlaced, OrderService,
    NAME_SERVER, PRODUCER_GROUP,
};

#[test]
fn zero_producers_construct_no_client() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("orderListener", Arc::new(OrderListener::default()))
        .unwrap();

    // no producer group configured, and none is needed
    let bindings = MqStarter::new(Environment::new(), Arc::new(broker.clone()))
        .with_properties(MqProperties::new(NAME_SERVER))
        .start(&registry)
        .unwrap();

    assert!(bindings.producer_client().is_none());
    assert!(bindings.producers().is_empty());
    assert_eq!(broker.constructed(ClientKind::Producer), 0);
}

#[test]
fn one_shared_client_for_every_producer() {
    let broker = broker();
    let orders = Arc::new(OrderService::default());
    let notifier = Arc::new(Notifier::default());
    let mut registry = ComponentRegistry::new();
    registry.producer("orderService", orders.clone()).unwrap();
    registry.producer("notifier", notifier.clone()).unwrap();

    let bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    assert_eq!(broker.constructed(ClientKind::Producer), 1);
    let shared = bindings.producer_client().unwrap();
    assert_eq!(shared.group(), PRODUCER_GROUP);
    assert!(Arc::ptr_eq(
        orders.producer.binding().unwrap().client(),
        shared
    ));
    assert!(Arc::ptr_eq(
        notifier.producer.binding().unwrap().client(),
        shared
    ));
}

#[test]
fn repeated_binding_reuses_the_client() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .producer("orderService", Arc::new(OrderService::default()))
        .unwrap();

    let binder = ProducerBinder::new(Arc::new(broker.clone()));
    for _ in 0..3 {
        binder
            .bind_all(&registry, &properties(), &Environment::new())
            .unwrap();
    }

    assert_eq!(broker.constructed(ClientKind::Producer), 1);
    assert_eq!(broker.started_clients().len(), 1);
}

#[test]
fn concurrent_binding_builds_one_client() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .producer("orderService", Arc::new(OrderService::default()))
        .unwrap();
    let registry = Arc::new(registry);
    let binder = Arc::new(ProducerBinder::new(Arc::new(broker.clone())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let binder = Arc::clone(&binder);
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                binder
                    .bind_all(&registry, &properties(), &Environment::new())
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(broker.constructed(ClientKind::Producer), 1);
}

#[test]
fn missing_producer_group_is_fatal() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .producer("orderService", Arc::new(OrderService::default()))
        .unwrap();

    let err = MqStarter::new(Environment::new(), Arc::new(broker.clone()))
        .with_properties(MqProperties::new(NAME_SERVER))
        .start(&registry)
        .unwrap_err();

    assert!(matches!(
        err,
        BindError::MissingField {
            field: RequiredField::ProducerGroup,
            ..
        }
    ));
    assert_eq!(broker.constructed(ClientKind::Producer), 0);
}

#[test]
fn sends_use_resolved_defaults() {
    let broker = broker();
    let orders = Arc::new(OrderService::default());
    let mut registry = ComponentRegistry::new();
    registry.producer("orderService", orders.clone()).unwrap();

    let _bindings = starter(&broker, overrides(&[("T1", "orders-prod")]))
        .start(&registry)
        .unwrap();

    let order = OrderPlaced {
        id: "o-1".into(),
        amount: 42,
    };
    let id = orders.place(&order).unwrap();

    let stored = broker.messages("orders-prod");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].tag.as_deref(), Some("created"));
    assert_eq!(stored[0].decode_json::<OrderPlaced>().unwrap(), order);
}

#[test]
fn producer_without_topic_must_name_one() {
    let broker = broker();
    let notifier = Arc::new(Notifier::default());
    let mut registry = ComponentRegistry::new();
    registry.producer("notifier", notifier.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    assert!(matches!(
        notifier.producer.send("hello"),
        Err(ClientError::MissingTopic)
    ));
    notifier
        .producer
        .send_to("alerts", Some("email"), "hello")
        .unwrap();
    notifier
        .producer
        .send_message(Message::with_string_body("alerts", "again"))
        .unwrap();

    let alerts = broker.messages("alerts");
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].tag.as_deref(), Some("email"));
    assert_eq!(alerts[1].tag, None);
}

#[test]
fn producer_feeds_a_bound_consumer() {
    let broker = broker();
    let orders = Arc::new(OrderService::default());
    let listener = Arc::new(OrderListener::default());
    let mut registry = ComponentRegistry::new();
    registry.producer("orderService", orders.clone()).unwrap();
    registry.consumer("orderListener", listener.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    orders
        .place(&OrderPlaced {
            id: "o-7".into(),
            amount: 1,
        })
        .unwrap();

    assert_eq!(listener.bodies(), vec![r#"{"id":"o-7","amount":1}"#]);
}
