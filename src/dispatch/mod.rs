//! Delivery of change-sets to pattern-filtered subscribers.
//!
//! A dedicated actor task owns all subscriber state and processes commands
//! sequentially, so subscribing, unsubscribing and dispatching never contend
//! on a lock.

mod pattern;

#[cfg(test)]
mod tests;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::{Stream, stream};
use tokio::{
    sync::{
        mpsc::{self, Receiver, Sender, error::TryRecvError},
        oneshot,
    },
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::snapshot_store::{ChangeSet, Op};
use pattern::key_matches;

/// Capacity of the command channel and of each subscriber channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Errors returned by the dispatcher.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The actor task has stopped
    #[error("dispatch service unavailable: {details}")]
    ServiceUnavailable {
        /// Why the service could not be reached
        details: String,
    },
}

impl DispatchError {
    fn unavailable() -> Self {
        DispatchError::ServiceUnavailable {
            details: "dispatcher actor is not running".to_string(),
        }
    }
}

/// One op delivered to a subscriber, tagged with the generation that
/// published it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification<V> {
    /// Snapshot generation of the flush that produced the op.
    pub generation: u64,
    /// The change itself.
    pub op: Op<V>,
}

enum Command<V> {
    Subscribe {
        id: usize,
        pattern: String,
        sender: Sender<Notification<V>>,
    },
    Unsubscribe {
        id: usize,
    },
    Dispatch(ChangeSet<V>),
    Count {
        reply: oneshot::Sender<usize>,
    },
}

struct ActorSubscription<V> {
    id: usize,
    pattern: String,
    sender: Sender<Notification<V>>,
}

/// Handle to the dispatch actor.
///
/// Cloning the handle shares the same actor.
pub struct Dispatcher<V> {
    command_tx: Sender<Command<V>>,
    next_id: Arc<AtomicUsize>,
    capacity: usize,
    _handle: Arc<JoinHandle<()>>,
}

impl<V> Clone for Dispatcher<V> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            next_id: Arc::clone(&self.next_id),
            capacity: self.capacity,
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<V> Dispatcher<V>
where
    V: Clone + Send + 'static,
{
    /// Spawns the actor task with the default channel capacity.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Spawns the actor task. Each subscriber can buffer `capacity`
    /// notifications before it is considered lagging and dropped.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (command_tx, mut command_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            actor_loop(&mut command_rx).await;
        });

        Self {
            command_tx,
            next_id: Arc::new(AtomicUsize::new(1)),
            capacity,
            _handle: Arc::new(handle),
        }
    }

    /// Subscribes to ops whose key matches `pattern`.
    ///
    /// The subscription is removed when the returned handle is dropped.
    ///
    /// # Errors
    /// Returns `DispatchError::ServiceUnavailable` if the actor has stopped.
    pub async fn subscribe(&self, pattern: &str) -> Result<Subscription<V>, DispatchError> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.command_tx
            .send(Command::Subscribe {
                id,
                pattern: pattern.to_string(),
                sender,
            })
            .await
            .map_err(|_| DispatchError::unavailable())?;

        Ok(Subscription {
            id,
            pattern: pattern.to_string(),
            command_tx: self.command_tx.clone(),
            receiver,
        })
    }

    /// Delivers every op of `changes` to the matching subscribers.
    ///
    /// Subscribers whose channel is closed or full are dropped.
    ///
    /// # Errors
    /// Returns `DispatchError::ServiceUnavailable` if the actor has stopped.
    pub async fn dispatch(&self, changes: ChangeSet<V>) -> Result<(), DispatchError> {
        if changes.is_empty() {
            return Ok(());
        }

        self.command_tx
            .send(Command::Dispatch(changes))
            .await
            .map_err(|_| DispatchError::unavailable())
    }

    /// Number of live subscriptions, as seen by the actor.
    ///
    /// # Errors
    /// Returns `DispatchError::ServiceUnavailable` if the actor has stopped.
    pub async fn subscriber_count(&self) -> Result<usize, DispatchError> {
        let (reply, response) = oneshot::channel();

        self.command_tx
            .send(Command::Count { reply })
            .await
            .map_err(|_| DispatchError::unavailable())?;

        response.await.map_err(|_| DispatchError::unavailable())
    }
}

impl<V> Default for Dispatcher<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription handle that unsubscribes when dropped.
pub struct Subscription<V> {
    id: usize,
    pattern: String,
    command_tx: Sender<Command<V>>,
    receiver: Receiver<Notification<V>>,
}

impl<V> Subscription<V>
where
    V: Send + 'static,
{
    /// The pattern this subscription filters on.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Waits for the next notification. Returns `None` once the dispatcher
    /// has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Notification<V>> {
        self.receiver.recv().await
    }

    /// Takes a notification if one is buffered.
    ///
    /// # Errors
    /// Returns `TryRecvError::Empty` if nothing is buffered and
    /// `TryRecvError::Disconnected` once the dispatcher dropped this
    /// subscriber.
    pub fn try_recv(&mut self) -> Result<Notification<V>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Adapts the subscription into a stream of notifications.
    pub fn into_stream(self) -> impl Stream<Item = Notification<V>> + Send {
        stream::unfold(self, |mut subscription| async move {
            let notification = subscription.recv().await?;
            Some((notification, subscription))
        })
    }
}

impl<V> Drop for Subscription<V> {
    fn drop(&mut self) {
        // A full command channel loses this message; the actor then prunes
        // the closed sender before its next dispatch or count.
        self.receiver.close();
        let _ = self
            .command_tx
            .try_send(Command::Unsubscribe { id: self.id });
    }
}

async fn actor_loop<V: Clone>(command_rx: &mut Receiver<Command<V>>) {
    let mut subscriptions: Vec<ActorSubscription<V>> = Vec::new();

    while let Some(command) = command_rx.recv().await {
        match command {
            Command::Subscribe {
                id,
                pattern,
                sender,
            } => {
                trace!(id, pattern = %pattern, "subscriber added");
                subscriptions.push(ActorSubscription {
                    id,
                    pattern,
                    sender,
                });
            }

            Command::Unsubscribe { id } => {
                subscriptions.retain(|sub| sub.id != id);
            }

            Command::Dispatch(changes) => {
                prune_closed(&mut subscriptions);
                let generation = changes.generation;
                for op in changes {
                    subscriptions.retain(|sub| {
                        if !key_matches(&op.key, &sub.pattern) {
                            return true;
                        }

                        let delivered = sub
                            .sender
                            .try_send(Notification {
                                generation,
                                op: op.clone(),
                            })
                            .is_ok();
                        if !delivered {
                            debug!(id = sub.id, pattern = %sub.pattern, "dropping lagging subscriber");
                        }
                        delivered
                    });
                }
            }

            Command::Count { reply } => {
                prune_closed(&mut subscriptions);
                let _ = reply.send(subscriptions.len());
            }
        }
    }
}

fn prune_closed<V>(subscriptions: &mut Vec<ActorSubscription<V>>) {
    subscriptions.retain(|sub| {
        let open = !sub.sender.is_closed();
        if !open {
            trace!(id = sub.id, "pruned closed subscriber");
        }
        open
    });
}
