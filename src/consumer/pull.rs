//! Helpers for pull consumers: a slot for the injected client and a polling thread.

use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, trace, warn};

use crate::adapter::ConsumeOutcome;
use crate::client::{ClientError, Message, PullClient, PullResult};

/// Holder a pull consumer embeds to keep the topic and client it was started with.
///
/// Tracks the next offset, so repeated [`pull`](PullSlot::pull) calls walk the topic.
#[derive(Default)]
pub struct PullSlot {
    bound: RwLock<Option<(String, Arc<dyn PullClient>)>>,
    offset: Mutex<u64>,
}

impl PullSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, topic: &str, client: Arc<dyn PullClient>) {
        *self.bound.write().unwrap_or_else(PoisonError::into_inner) =
            Some((topic.to_string(), client));
    }

    pub fn topic(&self) -> Option<String> {
        self.bound
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(topic, _)| topic.clone())
    }

    pub fn client(&self) -> Option<Arc<dyn PullClient>> {
        self.bound
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, client)| Arc::clone(client))
    }

    /// Pull the next batch matching `expression` and advance the offset.
    pub fn pull(&self, expression: &str, max: usize) -> Result<PullResult, ClientError> {
        let (topic, client) = self
            .bound
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ClientError::NotStarted)?;

        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        let result = client.pull(&topic, expression, *offset, max)?;
        *offset = result.next_offset;
        Ok(result)
    }
}

/// Statistics from a pull worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullStats {
    pub polls: usize,
    pub messages_consumed: usize,
    pub batches_retried: usize,
    pub pull_errors: usize,
}

/// A background thread that pulls batches and hands them to a callback.
///
/// A batch answered with [`ConsumeOutcome::Retry`] is pulled again on the next poll.
///
/// ## Example
///
/// ```ignore
/// let worker = PullWorker::spawn(client, "orders", Duration::from_millis(20), |batch| {
///     println!("got {} messages", batch.len());
///     ConsumeOutcome::Success
/// });
///
/// // ... do work ...
///
/// let stats = worker.stop().expect("pull handler panicked");
/// println!("consumed {} messages", stats.messages_consumed);
/// ```
pub struct PullWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<PullStats>>,
}

impl PullWorker {
    /// Batch size used by [`PullWorker::spawn`].
    pub const DEFAULT_BATCH_SIZE: usize = 32;

    /// Pull every tag of `topic` from offset 0.
    pub fn spawn<F>(
        client: Arc<dyn PullClient>,
        topic: impl Into<String>,
        poll_interval: Duration,
        handler: F,
    ) -> Self
    where
        F: Fn(&[Message]) -> ConsumeOutcome + Send + 'static,
    {
        Self::spawn_with(
            client,
            topic,
            "*",
            Self::DEFAULT_BATCH_SIZE,
            poll_interval,
            handler,
        )
    }

    /// Pull `topic` filtered by `expression`, at most `batch_size` messages per poll.
    pub fn spawn_with<F>(
        client: Arc<dyn PullClient>,
        topic: impl Into<String>,
        expression: impl Into<String>,
        batch_size: usize,
        poll_interval: Duration,
        handler: F,
    ) -> Self
    where
        F: Fn(&[Message]) -> ConsumeOutcome + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel();
        let topic = topic.into();
        let expression = expression.into();

        let handle = thread::spawn(move || {
            let mut stats = PullStats::default();
            let mut offset = 0;

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;

                match client.pull(&topic, &expression, offset, batch_size) {
                    Ok(result) if result.messages.is_empty() => {
                        offset = result.next_offset;
                    }
                    Ok(result) => match handler(&result.messages) {
                        ConsumeOutcome::Success => {
                            stats.messages_consumed += result.messages.len();
                            offset = result.next_offset;
                        }
                        ConsumeOutcome::Retry => {
                            trace!(%topic, offset, "batch handed back");
                            stats.batches_retried += 1;
                        }
                    },
                    Err(e) => {
                        warn!(%topic, error = %e, "pull failed");
                        stats.pull_errors += 1;
                    }
                }

                thread::sleep(poll_interval);
            }

            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and wait for it to finish.
    ///
    /// Returns the handler's panic payload if the polling thread panicked.
    pub fn stop(mut self) -> thread::Result<PullStats> {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().inspect_err(|_| {
                error!("pull worker thread panicked");
            }),
            None => Ok(PullStats::default()),
        }
    }
}

impl Drop for PullWorker {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
