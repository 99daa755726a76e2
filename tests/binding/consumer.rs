//! Consumer binder: validation, override resolution, push and pull strategies.

use std::collections::HashSet;
use std::sync::Arc;

use mq_starter::client::memory::ClientKind;
use mq_starter::client::PullStatus;
use mq_starter::{
    BindError, ConsumeMode, ComponentRegistry, Environment, Message, MessageModel, MqProperties,
    MqStarter, RequiredField,
};

use crate::support::{
    broker, overrides, starter, AuditJournal, Confused, LedgerListener, OrderListener, Orphan,
    NAME_SERVER,
};

#[test]
fn binds_effective_group_from_override() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("orderListener", Arc::new(OrderListener::default()))
        .unwrap();

    let bindings = starter(&broker, overrides(&[("G1", "G1-prod")]))
        .start(&registry)
        .unwrap();

    let bound = bindings.consumer("orderListener").unwrap();
    assert_eq!(bound.group(), "G1-prod");
    assert_eq!(bound.topic(), "T1");
    assert_eq!(bound.consume_mode(), Some(ConsumeMode::Concurrently));

    let started = broker.started_clients();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].kind, ClientKind::Push);
    assert_eq!(started[0].group, "G1-prod");
    assert_eq!(started[0].name_server_address, NAME_SERVER);
    assert_eq!(
        started[0].subscription,
        Some(("T1".to_string(), "*".to_string()))
    );
}

#[test]
fn empty_override_keeps_nominal_values() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("orderListener", Arc::new(OrderListener::default()))
        .unwrap();

    let bindings = starter(&broker, overrides(&[("G1", ""), ("T1", "")]))
        .start(&registry)
        .unwrap();

    let bound = bindings.consumer("orderListener").unwrap();
    assert_eq!(bound.group(), "G1");
    assert_eq!(bound.topic(), "T1");
}

#[test]
fn topic_override_moves_the_subscription() {
    let broker = broker();
    let listener = Arc::new(OrderListener::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("orderListener", listener.clone()).unwrap();

    let _bindings = starter(&broker, overrides(&[("T1", "T1-staging")]))
        .start(&registry)
        .unwrap();

    broker
        .publish(Message::with_string_body("T1", "ignored"))
        .unwrap();
    broker
        .publish(Message::with_string_body("T1-staging", "seen"))
        .unwrap();

    assert_eq!(listener.bodies(), vec!["seen"]);
}

#[test]
fn tags_are_joined_into_the_subscription() {
    let broker = broker();
    let ledger = Arc::new(LedgerListener::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("ledger", ledger.clone()).unwrap();

    let bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();
    assert_eq!(bindings.consumers()[0].expression(), "debit||credit");
    assert_eq!(
        bindings.consumers()[0].consume_mode(),
        Some(ConsumeMode::Orderly)
    );

    for (body, tag) in [("1", "debit"), ("2", "refund"), ("3", "credit")] {
        broker
            .publish(Message::with_string_body("ledger", body).with_tag(tag))
            .unwrap();
    }
    assert_eq!(*ledger.entries.lock().unwrap(), vec!["1", "3"]);
}

#[test]
fn consumer_without_capability_is_fatal() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry.consumer("orphan", Arc::new(Orphan)).unwrap();

    let err = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap_err();

    assert!(matches!(err, BindError::MissingConsumerCapability { .. }));
    assert_eq!(err.component(), Some("orphan"));
    assert!(err.to_string().contains("Orphan"));
    assert_eq!(broker.constructed(ClientKind::Push), 0);
    assert_eq!(broker.constructed(ClientKind::Pull), 0);
}

#[test]
fn unknown_consume_mode_is_rejected_at_registration() {
    let mut registry = ComponentRegistry::new();
    let err = registry
        .consumer("confused", Arc::new(Confused::default()))
        .unwrap_err();

    assert!(matches!(
        err,
        BindError::UnsupportedConsumeMode { ref value, .. } if value == "UNKNOWN"
    ));
    assert!(registry.is_empty());
}

#[test]
fn missing_name_server_is_fatal_before_any_client() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("orderListener", Arc::new(OrderListener::default()))
        .unwrap();

    let err = MqStarter::new(Environment::new(), Arc::new(broker.clone()))
        .with_properties(MqProperties::default())
        .start(&registry)
        .unwrap_err();

    assert!(matches!(
        err,
        BindError::MissingField {
            field: RequiredField::NameServerAddress,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "name server address must be defined (component `orderListener`)"
    );
    assert_eq!(broker.constructed(ClientKind::Push), 0);
}

#[test]
fn first_failure_aborts_remaining_consumers() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("a-listener", Arc::new(OrderListener::default()))
        .unwrap();
    registry.consumer("b-orphan", Arc::new(Orphan)).unwrap();
    registry
        .consumer("c-listener", Arc::new(OrderListener::default()))
        .unwrap();

    let err = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap_err();

    assert_eq!(err.component(), Some("b-orphan"));
    // only the consumer ahead of the failure got a client
    assert_eq!(broker.constructed(ClientKind::Push), 1);
}

#[test]
fn pull_consumer_gets_topic_and_started_client() {
    let broker = broker();
    let journal = Arc::new(AuditJournal::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("auditJournal", journal.clone()).unwrap();

    let bindings = starter(&broker, overrides(&[("audit", "audit-prod")]))
        .start(&registry)
        .unwrap();

    let bound = bindings.consumer("auditJournal").unwrap();
    assert!(!bound.is_push());
    assert_eq!(bound.message_model(), MessageModel::Broadcasting);
    assert_eq!(journal.slot.topic().as_deref(), Some("audit-prod"));

    broker
        .publish(Message::with_string_body("audit-prod", "entry"))
        .unwrap();
    let result = journal.slot.pull("*", 10).unwrap();
    assert_eq!(result.status, PullStatus::Found);
    assert_eq!(result.messages[0].body_str(), Some("entry"));

    let started = broker.started_clients();
    assert_eq!(started[0].kind, ClientKind::Pull);
    assert_eq!(started[0].group, "audit-group");
    assert_eq!(started[0].message_model, Some(MessageModel::Broadcasting));
}

#[test]
fn every_consumer_gets_a_distinct_instance_name() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("one", Arc::new(OrderListener::default()))
        .unwrap();
    registry
        .consumer("two", Arc::new(OrderListener::default()))
        .unwrap();
    registry
        .consumer("journal", Arc::new(AuditJournal::default()))
        .unwrap();

    let bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    let names: HashSet<&str> = bindings
        .consumers()
        .iter()
        .map(|c| c.instance_name())
        .collect();
    assert_eq!(names.len(), 3);

    let started: HashSet<String> = broker
        .started_clients()
        .into_iter()
        .filter_map(|c| c.instance_name)
        .collect();
    assert_eq!(started.len(), 3);
}

#[test]
fn push_listener_is_registered_before_start() {
    let broker = broker();
    let mut registry = ComponentRegistry::new();
    registry
        .consumer("orderListener", Arc::new(OrderListener::default()))
        .unwrap();

    starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    // the in-memory push client refuses to start without a listener
    let started = broker.started_clients();
    assert_eq!(started.len(), 1);
    assert!(!started[0].orderly);
}
