//! Delivery through bound push consumers.

use std::sync::{Arc, Mutex};
use std::thread;

use mq_starter::client::memory::InMemoryBroker;
use mq_starter::client::{ConcurrentContext, ConcurrentStatus, OrderlyContext, OrderlyStatus};
use mq_starter::{
    ComponentRegistry, ConsumeOutcome, DeliveryAdapter, DeliveryContext, Environment, Message,
    PushConsumer,
};

use crate::support::{
    broker, init_tracing, starter, FlakyListener, LedgerListener, OrderListener, Relay,
    NAME_SERVER,
};

/// Echoes a fixed outcome and records what it was handed.
struct Probe {
    outcome: ConsumeOutcome,
    seen: Mutex<Vec<(Vec<String>, u32)>>,
}

impl PushConsumer for Probe {
    fn process(&self, messages: &[Message], context: DeliveryContext<'_>) -> ConsumeOutcome {
        let ids = messages.iter().map(|m| m.id.clone()).collect();
        self.seen.lock().unwrap().push((ids, context.queue_id()));
        self.outcome
    }
}

fn batch(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message {
            id: format!("m-{}", i),
            ..Message::with_string_body("T1", i.to_string())
        })
        .collect()
}

#[test]
fn adapter_hands_over_the_exact_batch() {
    init_tracing();
    let probe = Arc::new(Probe {
        outcome: ConsumeOutcome::Retry,
        seen: Mutex::new(Vec::new()),
    });
    let adapter = DeliveryAdapter::new("probe", probe.clone());

    let mut context = ConcurrentContext {
        queue_id: 7,
        ..ConcurrentContext::default()
    };
    let status = adapter.consume_concurrently(&batch(4), &mut context);

    assert_eq!(status, ConcurrentStatus::ReconsumeLater);
    let seen = probe.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, vec!["m-0", "m-1", "m-2", "m-3"]);
    assert_eq!(seen[0].1, 7);
}

#[test]
fn orderly_adapter_keeps_batch_order() {
    let probe = Arc::new(Probe {
        outcome: ConsumeOutcome::Success,
        seen: Mutex::new(Vec::new()),
    });
    let adapter = DeliveryAdapter::new("probe", probe.clone());

    let status = adapter.consume_orderly(&batch(10), &mut OrderlyContext::default());

    assert_eq!(status, OrderlyStatus::Success);
    let expected: Vec<String> = (0..10).map(|i| format!("m-{}", i)).collect();
    assert_eq!(probe.seen.lock().unwrap()[0].0, expected);
}

#[test]
fn produced_messages_reach_the_push_consumer() {
    let broker = broker();
    let listener = Arc::new(OrderListener::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("orderListener", listener.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    for i in 0..3 {
        broker
            .publish(Message::with_string_body("T1", format!("order-{}", i)))
            .unwrap();
    }

    assert_eq!(listener.bodies(), vec!["order-0", "order-1", "order-2"]);
}

#[test]
fn orderly_consumer_sees_messages_in_send_order() {
    let broker = broker();
    let ledger = Arc::new(LedgerListener::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("ledger", ledger.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    for body in &expected {
        broker
            .publish(Message::with_string_body("ledger", body.as_str()).with_tag("debit"))
            .unwrap();
    }

    assert_eq!(*ledger.entries.lock().unwrap(), expected);
}

#[test]
fn orderly_delivery_is_serialized_across_threads() {
    let broker = broker();
    let ledger = Arc::new(LedgerListener::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("ledger", ledger.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let broker = broker.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    broker
                        .publish(
                            Message::with_string_body("ledger", format!("{}-{}", t, i))
                                .with_tag("credit"),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = ledger.entries.lock().unwrap();
    assert_eq!(entries.len(), 100);
    // delivery follows the topic log, not just each sender
    let log: Vec<String> = broker
        .messages("ledger")
        .iter()
        .map(|m| m.body_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(*entries, log);
    // per-sender order survives
    for t in 0..4 {
        let prefix = format!("{}-", t);
        let sequence: Vec<u32> = entries
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(sequence, (0..25).collect::<Vec<u32>>());
    }
}

#[test]
fn retry_outcome_hands_the_message_back() {
    init_tracing();
    let broker = InMemoryBroker::with_max_reconsume_times(NAME_SERVER, 5);
    let flaky = Arc::new(FlakyListener {
        until: 2,
        attempts: Mutex::new(Vec::new()),
    });
    let mut registry = ComponentRegistry::new();
    registry.consumer("flaky", flaky.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();
    broker
        .publish(Message::with_string_body("retries", "x"))
        .unwrap();

    assert_eq!(*flaky.attempts.lock().unwrap(), vec![0, 1, 2]);
    let deliveries = broker.deliveries();
    assert_eq!(deliveries.len(), 3);
    assert!(deliveries[2].consumed);
    assert!(!deliveries[0].consumed);
}

#[test]
fn orderly_consumer_can_send_to_its_own_topic() {
    let broker = broker();
    let relay = Arc::new(Relay {
        broker: broker.clone(),
        hops: 3,
        seen: Mutex::new(Vec::new()),
        bound_group: Mutex::new(None),
    });
    let mut registry = ComponentRegistry::new();
    registry.consumer("relay", relay.clone()).unwrap();

    let _bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();
    broker
        .publish(Message::with_string_body("relay", "m"))
        .unwrap();

    assert_eq!(
        *relay.seen.lock().unwrap(),
        vec!["m", "m>", "m>>", "m>>>"]
    );
    assert_eq!(broker.messages("relay").len(), 4);
}

#[test]
fn push_consumer_is_handed_its_started_client() {
    let broker = broker();
    let relay = Arc::new(Relay {
        broker: broker.clone(),
        hops: 0,
        seen: Mutex::new(Vec::new()),
        bound_group: Mutex::new(None),
    });
    let mut registry = ComponentRegistry::new();
    registry.consumer("relay", relay.clone()).unwrap();

    let bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();

    assert_eq!(relay.bound_group.lock().unwrap().as_deref(), Some("relay-group"));
    assert_eq!(bindings.consumer("relay").unwrap().group(), "relay-group");
}

#[test]
fn subscriptions_outlive_the_bindings() {
    let broker = broker();
    let listener = Arc::new(OrderListener::default());
    let mut registry = ComponentRegistry::new();
    registry.consumer("orderListener", listener.clone()).unwrap();

    let bindings = starter(&broker, Environment::new())
        .start(&registry)
        .unwrap();
    drop(bindings);

    broker
        .publish(Message::with_string_body("T1", "after"))
        .unwrap();
    assert_eq!(listener.bodies(), vec!["after"]);
}
