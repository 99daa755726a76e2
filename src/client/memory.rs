//! In-memory broker for tests and local runs.
//!
//! `InMemoryBroker` implements [`ClientFactory`] without any network. It is useful
//! for:
//! - Unit and integration testing of bound handlers
//! - Inspecting what the binders constructed and started
//!
//! Producers append to a per-topic log, which is never truncated. Pull clients
//! read the log by offset.
//!
//! Sent messages are queued in log order and pushed to matching subscriptions one
//! at a time, by whichever sending thread finds the queue idle. A listener that
//! sends from inside its callback only queues the message; it is delivered after
//! the callback returns.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use super::{
    ClientError, ClientFactory, ConcurrentContext, ConcurrentStatus, Message, MessageListener,
    MessageModel, OrderlyContext, OrderlyStatus, ProducerClient, PullClient, PullResult,
    PullStatus, PushClient, SendResult,
};

/// Kind of client constructed through the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Push,
    Pull,
    Producer,
}

/// Snapshot of a client's configuration taken when it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub kind: ClientKind,
    pub group: String,
    pub name_server_address: String,
    pub instance_name: Option<String>,
    pub message_model: Option<MessageModel>,
    /// `(topic, expression)` for push clients
    pub subscription: Option<(String, String)>,
    pub orderly: bool,
}

/// One listener invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub group: String,
    pub instance_name: String,
    pub message_id: String,
    pub reconsume_times: u32,
    pub consumed: bool,
}

/// Parsed subscription expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    /// `*` or empty: every message of the topic
    All,
    /// `a||b||c`: messages tagged with one of these
    Tags(Vec<String>),
}

impl TagFilter {
    pub fn parse(expression: &str) -> Self {
        let expression = expression.trim();
        if expression.is_empty() || expression == "*" {
            return TagFilter::All;
        }
        let tags: Vec<String> = expression
            .split("||")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tags.iter().any(|t| t == "*") || tags.is_empty() {
            TagFilter::All
        } else {
            TagFilter::Tags(tags)
        }
    }

    pub fn matches(&self, tag: Option<&str>) -> bool {
        match self {
            TagFilter::All => true,
            TagFilter::Tags(tags) => tag.is_some_and(|t| tags.iter().any(|x| x == t)),
        }
    }
}

struct Subscription {
    group: String,
    instance_name: String,
    topic: String,
    filter: TagFilter,
    model: MessageModel,
    listener: MessageListener,
}

/// Messages appended but not yet pushed to subscriptions.
#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<Message>,
    draining: bool,
}

/// Releases the queue if a listener panics mid-drain.
struct DrainGuard<'a>(&'a Mutex<DispatchQueue>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

/// Delivery records kept for inspection; older ones are discarded.
pub const DELIVERY_HISTORY: usize = 1024;

struct BrokerState {
    name_server_address: String,
    max_reconsume_times: u32,
    topics: RwLock<HashMap<String, Vec<Message>>>,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    queue: Mutex<DispatchQueue>,
    constructed: Mutex<Vec<(ClientKind, String)>>,
    started: Mutex<Vec<ClientRecord>>,
    deliveries: Mutex<VecDeque<DeliveryRecord>>,
    /// Round-robin cursor per (group, topic) for clustering delivery
    cursors: Mutex<HashMap<(String, String), usize>>,
    next_id: AtomicU64,
}

// A panicking listener must not wedge the broker for everyone else.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl BrokerState {
    fn connect(&self, address: Option<&str>) -> Result<String, ClientError> {
        match address {
            Some(a) if a == self.name_server_address => Ok(a.to_string()),
            Some(a) => Err(ClientError::NameServerUnreachable(a.to_string())),
            None => Err(ClientError::NameServerUnreachable(
                "no name server address configured".to_string(),
            )),
        }
    }

    /// Append to the log, then push everything queued so far.
    fn send(&self, message: Message) -> Result<SendResult, ClientError> {
        let (message, offset) = self.append(message)?;
        self.drain();
        Ok(SendResult {
            message_id: message.id,
            topic: message.topic,
            queue_offset: offset,
        })
    }

    fn append(&self, mut message: Message) -> Result<(Message, u64), ClientError> {
        if message.topic.is_empty() {
            return Err(ClientError::MissingTopic);
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        message.id = format!("{:032X}", n);

        let offset = {
            let mut topics = write(&self.topics);
            let log = topics.entry(message.topic.clone()).or_default();
            log.push(message.clone());
            // queued under the log lock so dispatch follows offset order
            lock(&self.queue).pending.push_back(message.clone());
            (log.len() - 1) as u64
        };
        Ok((message, offset))
    }

    fn drain(&self) {
        {
            let mut queue = lock(&self.queue);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        let _guard = DrainGuard(&self.queue);

        loop {
            let next = {
                let mut queue = lock(&self.queue);
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            match next {
                Some(message) => self.dispatch(&message),
                None => return,
            }
        }
    }

    fn dispatch(&self, message: &Message) {
        let matching: Vec<Arc<Subscription>> = read(&self.subscriptions)
            .iter()
            .filter(|s| s.topic == message.topic && s.filter.matches(message.tag.as_deref()))
            .cloned()
            .collect();

        // Group by consumer group, keeping subscription order
        let mut groups: Vec<(String, Vec<Arc<Subscription>>)> = Vec::new();
        for sub in matching {
            match groups.iter_mut().find(|(g, _)| *g == sub.group) {
                Some((_, members)) => members.push(sub),
                None => groups.push((sub.group.clone(), vec![sub])),
            }
        }

        for (group, members) in groups {
            let targets = match members[0].model {
                MessageModel::Broadcasting => members,
                MessageModel::Clustering => {
                    let mut cursors = lock(&self.cursors);
                    let cursor = cursors
                        .entry((group.clone(), message.topic.clone()))
                        .or_insert(0);
                    let pick = Arc::clone(&members[*cursor % members.len()]);
                    *cursor += 1;
                    vec![pick]
                }
            };
            for sub in targets {
                self.deliver(&sub, message);
            }
        }
    }

    fn deliver(&self, sub: &Subscription, message: &Message) {
        let mut attempt = message.clone();
        loop {
            let batch = std::slice::from_ref(&attempt);
            let consumed = match &sub.listener {
                MessageListener::Concurrently(f) => {
                    let mut ctx = ConcurrentContext::default();
                    f(batch, &mut ctx) == ConcurrentStatus::ConsumeSuccess
                }
                MessageListener::Orderly(f) => {
                    let mut ctx = OrderlyContext::default();
                    f(batch, &mut ctx) == OrderlyStatus::Success
                }
            };
            trace!(
                group = %sub.group,
                instance = %sub.instance_name,
                message_id = %attempt.id,
                consumed,
                "delivered message"
            );
            let mut deliveries = lock(&self.deliveries);
            if deliveries.len() == DELIVERY_HISTORY {
                deliveries.pop_front();
            }
            deliveries.push_back(DeliveryRecord {
                group: sub.group.clone(),
                instance_name: sub.instance_name.clone(),
                message_id: attempt.id.clone(),
                reconsume_times: attempt.reconsume_times,
                consumed,
            });
            drop(deliveries);

            if consumed || attempt.reconsume_times >= self.max_reconsume_times {
                break;
            }
            attempt.reconsume_times += 1;
        }
    }
}

/// In-memory broker and client factory.
///
/// Thread-safe; clones share the same broker.
///
/// ## Example
///
/// ```
/// use mq_starter::client::memory::{ClientKind, InMemoryBroker};
/// use mq_starter::client::{ClientFactory, Message, ProducerClient};
///
/// let broker = InMemoryBroker::new("127.0.0.1:9876");
///
/// let mut producer = broker.producer("app-producer");
/// producer.set_name_server_address("127.0.0.1:9876");
/// producer.start().unwrap();
/// producer.send(Message::with_string_body("orders", "{}")).unwrap();
///
/// assert_eq!(broker.constructed(ClientKind::Producer), 1);
/// assert_eq!(broker.messages("orders").len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    /// Create a broker reachable at `name_server_address`.
    pub fn new(name_server_address: impl Into<String>) -> Self {
        Self::with_max_reconsume_times(name_server_address, 0)
    }

    /// Create a broker that hands a failed message back up to `times` more times.
    pub fn with_max_reconsume_times(name_server_address: impl Into<String>, times: u32) -> Self {
        Self {
            state: Arc::new(BrokerState {
                name_server_address: name_server_address.into(),
                max_reconsume_times: times,
                topics: RwLock::new(HashMap::new()),
                subscriptions: RwLock::new(Vec::new()),
                queue: Mutex::new(DispatchQueue::default()),
                constructed: Mutex::new(Vec::new()),
                started: Mutex::new(Vec::new()),
                deliveries: Mutex::new(VecDeque::new()),
                cursors: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Address clients must be configured with to start.
    pub fn name_server_address(&self) -> &str {
        &self.state.name_server_address
    }

    /// Publish a message without going through a producer client.
    pub fn publish(&self, message: Message) -> Result<SendResult, ClientError> {
        self.state.send(message)
    }

    /// Number of clients of `kind` constructed through the factory.
    pub fn constructed(&self, kind: ClientKind) -> usize {
        lock(&self.state.constructed)
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Configuration snapshots of every started client, in start order.
    pub fn started_clients(&self) -> Vec<ClientRecord> {
        lock(&self.state.started).clone()
    }

    /// The latest listener invocations, at most [`DELIVERY_HISTORY`], oldest first.
    pub fn deliveries(&self) -> Vec<DeliveryRecord> {
        lock(&self.state.deliveries).iter().cloned().collect()
    }

    /// All messages stored for `topic`.
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        read(&self.state.topics)
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }
}

impl ClientFactory for InMemoryBroker {
    fn push_consumer(&self, group: &str) -> Box<dyn PushClient> {
        lock(&self.state.constructed).push((ClientKind::Push, group.to_string()));
        Box::new(MemoryPushClient {
            state: Arc::clone(&self.state),
            group: group.to_string(),
            name_server_address: None,
            model: MessageModel::default(),
            subscription: None,
            instance_name: None,
            listener: None,
            started: false,
        })
    }

    fn pull_consumer(&self, group: &str) -> Box<dyn PullClient> {
        lock(&self.state.constructed).push((ClientKind::Pull, group.to_string()));
        Box::new(MemoryPullClient {
            state: Arc::clone(&self.state),
            group: group.to_string(),
            name_server_address: None,
            model: MessageModel::default(),
            instance_name: None,
            started: false,
        })
    }

    fn producer(&self, group: &str) -> Box<dyn ProducerClient> {
        lock(&self.state.constructed).push((ClientKind::Producer, group.to_string()));
        Box::new(MemoryProducerClient {
            state: Arc::clone(&self.state),
            group: group.to_string(),
            name_server_address: None,
            started: false,
        })
    }
}

struct MemoryPushClient {
    state: Arc<BrokerState>,
    group: String,
    name_server_address: Option<String>,
    model: MessageModel,
    subscription: Option<(String, String)>,
    instance_name: Option<String>,
    listener: Option<MessageListener>,
    started: bool,
}

impl PushClient for MemoryPushClient {
    fn group(&self) -> &str {
        &self.group
    }

    fn set_name_server_address(&mut self, address: &str) {
        self.name_server_address = Some(address.to_string());
    }

    fn set_message_model(&mut self, model: MessageModel) {
        self.model = model;
    }

    fn subscribe(&mut self, topic: &str, expression: &str) -> Result<(), ClientError> {
        if topic.is_empty() {
            return Err(ClientError::MissingTopic);
        }
        self.subscription = Some((topic.to_string(), expression.to_string()));
        Ok(())
    }

    fn set_instance_name(&mut self, name: &str) {
        self.instance_name = Some(name.to_string());
    }

    fn register_listener(&mut self, listener: MessageListener) {
        self.listener = Some(listener);
    }

    fn start(&mut self) -> Result<(), ClientError> {
        if self.started {
            return Err(ClientError::AlreadyStarted);
        }
        let address = self.state.connect(self.name_server_address.as_deref())?;
        let (topic, expression) = self
            .subscription
            .clone()
            .ok_or(ClientError::MissingSubscription)?;
        let listener = self.listener.take().ok_or(ClientError::MissingListener)?;
        let instance_name = self
            .instance_name
            .clone()
            .unwrap_or_else(|| "DEFAULT".to_string());
        let orderly = listener.is_orderly();

        write(&self.state.subscriptions).push(Arc::new(Subscription {
            group: self.group.clone(),
            instance_name: instance_name.clone(),
            topic: topic.clone(),
            filter: TagFilter::parse(&expression),
            model: self.model,
            listener,
        }));
        lock(&self.state.started).push(ClientRecord {
            kind: ClientKind::Push,
            group: self.group.clone(),
            name_server_address: address,
            instance_name: Some(instance_name),
            message_model: Some(self.model),
            subscription: Some((topic, expression)),
            orderly,
        });
        self.started = true;
        debug!(group = %self.group, "push client started");
        Ok(())
    }
}

struct MemoryPullClient {
    state: Arc<BrokerState>,
    group: String,
    name_server_address: Option<String>,
    model: MessageModel,
    instance_name: Option<String>,
    started: bool,
}

impl PullClient for MemoryPullClient {
    fn group(&self) -> &str {
        &self.group
    }

    fn set_name_server_address(&mut self, address: &str) {
        self.name_server_address = Some(address.to_string());
    }

    fn set_message_model(&mut self, model: MessageModel) {
        self.model = model;
    }

    fn set_instance_name(&mut self, name: &str) {
        self.instance_name = Some(name.to_string());
    }

    fn start(&mut self) -> Result<(), ClientError> {
        if self.started {
            return Err(ClientError::AlreadyStarted);
        }
        let address = self.state.connect(self.name_server_address.as_deref())?;
        lock(&self.state.started).push(ClientRecord {
            kind: ClientKind::Pull,
            group: self.group.clone(),
            name_server_address: address,
            instance_name: self.instance_name.clone(),
            message_model: Some(self.model),
            subscription: None,
            orderly: false,
        });
        self.started = true;
        debug!(group = %self.group, "pull client started");
        Ok(())
    }

    fn pull(
        &self,
        topic: &str,
        expression: &str,
        offset: u64,
        max: usize,
    ) -> Result<PullResult, ClientError> {
        if !self.started {
            return Err(ClientError::NotStarted);
        }
        let filter = TagFilter::parse(expression);
        let topics = read(&self.state.topics);
        let log = topics.get(topic).map(Vec::as_slice).unwrap_or_default();

        let mut messages = Vec::new();
        let mut next = offset as usize;
        while next < log.len() && messages.len() < max {
            if filter.matches(log[next].tag.as_deref()) {
                messages.push(log[next].clone());
            }
            next += 1;
        }

        let status = if messages.is_empty() {
            PullStatus::NoNewMessage
        } else {
            PullStatus::Found
        };
        Ok(PullResult {
            status,
            messages,
            next_offset: next.max(offset as usize) as u64,
        })
    }
}

struct MemoryProducerClient {
    state: Arc<BrokerState>,
    group: String,
    name_server_address: Option<String>,
    started: bool,
}

impl ProducerClient for MemoryProducerClient {
    fn group(&self) -> &str {
        &self.group
    }

    fn set_name_server_address(&mut self, address: &str) {
        self.name_server_address = Some(address.to_string());
    }

    fn start(&mut self) -> Result<(), ClientError> {
        if self.started {
            return Err(ClientError::AlreadyStarted);
        }
        let address = self.state.connect(self.name_server_address.as_deref())?;
        lock(&self.state.started).push(ClientRecord {
            kind: ClientKind::Producer,
            group: self.group.clone(),
            name_server_address: address,
            instance_name: None,
            message_model: None,
            subscription: None,
            orderly: false,
        });
        self.started = true;
        debug!(group = %self.group, "producer client started");
        Ok(())
    }

    fn send(&self, message: Message) -> Result<SendResult, ClientError> {
        if !self.started {
            return Err(ClientError::NotStarted);
        }
        self.state.send(message)
    }
}
