//! Priority-ordered asynchronous message bus with request/response
//! correlation (spec §4.1).
//!
//! ## Design
//!
//! A single background task owns the priority queue and pops the
//! highest-priority message first, FIFO within equal priority (spec §4.1,
//! §8 "strictly higher priority is never dequeued after strictly lower").
//! Dispatch fans out to every subscriber registered for the message's
//! recipient. When the message expects a response, the bus awaits the
//! *first* subscriber's result and routes it back to the waiting caller;
//! the remaining subscribers (if any) still receive the message, but
//! fire-and-forget, since only one response can satisfy the waiter.
//!
//! No trait objects are required on the hot path of `publish`/`subscribe`
//! itself - the queue is a plain struct - but subscriber handlers are
//! inherently polymorphic (recipients don't know each other's concrete
//! types), so `MessageHandler` is the one `dyn`-dispatched seam, mirroring
//! the teacher's `MessageRouterKind` enum-over-trait split: enum dispatch
//! where the variant set is closed, trait objects where callers genuinely
//! vary.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{TaskerError, TaskerResult};
use crate::types::{Message, Payload};

const RECENT_LOG_CAPACITY: usize = 10_000;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> TaskerResult<Payload>;
}

#[derive(Debug)]
struct QueuedMessage {
    message: Message,
    seq: u64,
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message.priority == other.message.priority && self.seq == other.seq
    }
}
impl Eq for QueuedMessage {}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority pops first. On a tie,
        // the message with the *smaller* sequence number (arrived first)
        // must compare greater so it pops first - FIFO within priority.
        self.message
            .priority
            .partial_cmp(&other.message.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BusStats {
    pub published: u64,
    pub dropped: u64,
    pub dispatched: u64,
}

struct Inner {
    queue: Mutex<BinaryHeap<QueuedMessage>>,
    notify: Notify,
    subscribers: DashMap<String, Vec<Arc<dyn MessageHandler>>>,
    pending: DashMap<Uuid, oneshot::Sender<Payload>>,
    recent_log: Mutex<VecDeque<Message>>,
    capacity: usize,
    seq: AtomicU64,
    running: AtomicBool,
    published: AtomicU64,
    dropped: AtomicU64,
    dispatched: AtomicU64,
}

/// Bounded, priority-ordered asynchronous message bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<Inner>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(BinaryHeap::new()),
                notify: Notify::new(),
                subscribers: DashMap::new(),
                pending: DashMap::new(),
                recent_log: Mutex::new(VecDeque::with_capacity(RECENT_LOG_CAPACITY)),
                capacity,
                seq: AtomicU64::new(0),
                running: AtomicBool::new(true),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                dispatched: AtomicU64::new(0),
            }),
        }
    }

    /// Spawn the background dispatch loop. Returns a handle the caller
    /// should keep; dropping it does not stop the loop, `shutdown()` does.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move { Self::run_loop(inner).await })
    }

    async fn run_loop(inner: Arc<Inner>) {
        loop {
            if !inner.running.load(AtomicOrdering::Relaxed) {
                break;
            }
            let next = {
                let mut q = inner.queue.lock().await;
                q.pop()
            };
            match next {
                Some(queued) => Self::dispatch(&inner, queued.message).await,
                None => {
                    tokio::select! {
                        _ = inner.notify.notified() => {}
                        _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
                    }
                }
            }
        }
    }

    async fn dispatch(inner: &Arc<Inner>, message: Message) {
        {
            let mut log = inner.recent_log.lock().await;
            if log.len() == RECENT_LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(message.clone());
        }
        inner.dispatched.fetch_add(1, AtomicOrdering::Relaxed);

        let handlers = inner
            .subscribers
            .get(&message.recipient)
            .map(|v| v.clone())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(recipient = %message.recipient, "no subscriber for message");
            if message.response_expected {
                Self::complete_pending(
                    inner,
                    message.correlation_id,
                    json_error_payload("no subscriber for recipient"),
                );
            }
            return;
        }

        if message.response_expected {
            let first = handlers[0].clone();
            let result = first.handle(message.clone()).await;
            let payload = match result {
                Ok(payload) => payload,
                Err(e) => json_error_payload(&e.to_string()),
            };
            Self::complete_pending(inner, message.correlation_id, payload);

            for handler in handlers.into_iter().skip(1) {
                let m = message.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(m).await {
                        warn!(error = %e, "fire-and-forget handler failed");
                    }
                });
            }
        } else {
            for handler in handlers {
                let m = message.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(m).await {
                        warn!(error = %e, "fire-and-forget handler failed");
                    }
                });
            }
        }
    }

    fn complete_pending(inner: &Arc<Inner>, correlation_id: Uuid, payload: Payload) {
        if let Some((_, tx)) = inner.pending.remove(&correlation_id) {
            let _ = tx.send(payload);
        }
    }

    /// Enqueue a message. Fails with `QueueFull` if bounded capacity is
    /// reached; the message is dropped and the drop logged. Never blocks
    /// indefinitely.
    pub async fn publish(&self, message: Message) -> TaskerResult<()> {
        let mut q = self.inner.queue.lock().await;
        if q.len() >= self.inner.capacity {
            self.inner.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            warn!(recipient = %message.recipient, capacity = self.inner.capacity, "bus queue full, dropping message");
            return Err(TaskerError::QueueFull {
                capacity: self.inner.capacity,
            });
        }
        let seq = self.inner.seq.fetch_add(1, AtomicOrdering::Relaxed);
        q.push(QueuedMessage { message, seq });
        drop(q);
        self.inner.published.fetch_add(1, AtomicOrdering::Relaxed);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Register a handler for `recipient`. Multiple handlers per
    /// recipient are allowed; all of them receive every message for that
    /// recipient (fan-out).
    pub fn subscribe(&self, recipient: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.inner
            .subscribers
            .entry(recipient.into())
            .or_default()
            .push(handler);
    }

    /// Publish `message` with `response_expected = true`, then wait up to
    /// `message.timeout` for a matching response. Always removes the
    /// pending record on exit, success or timeout.
    pub async fn send_request(&self, mut message: Message) -> TaskerResult<Payload> {
        message.response_expected = true;
        let correlation_id = message.correlation_id;
        let timeout = message.timeout;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(correlation_id, tx);

        if let Err(e) = self.publish(message).await {
            self.inner.pending.remove(&correlation_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => {
                self.inner.pending.remove(&correlation_id);
                Err(TaskerError::RequestTimeout {
                    correlation_id: correlation_id.to_string(),
                    timeout,
                })
            }
            Err(_) => {
                self.inner.pending.remove(&correlation_id);
                Err(TaskerError::RequestTimeout {
                    correlation_id: correlation_id.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Complete the pending wait keyed by `correlation_id`. No-op if no
    /// waiter is registered (already timed out, or never existed).
    pub fn send_response(&self, correlation_id: Uuid, payload: Payload) {
        Self::complete_pending(&self.inner, correlation_id, payload);
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.inner.published.load(AtomicOrdering::Relaxed),
            dropped: self.inner.dropped.load(AtomicOrdering::Relaxed),
            dispatched: self.inner.dispatched.load(AtomicOrdering::Relaxed),
        }
    }

    pub async fn recent_messages(&self) -> Vec<Message> {
        self.inner.recent_log.lock().await.iter().cloned().collect()
    }

    /// Graceful shutdown: stop the dispatch loop. Does not drain
    /// in-flight fire-and-forget handler tasks.
    pub fn shutdown(&self) {
        self.inner.running.store(false, AtomicOrdering::Relaxed);
        self.inner.notify.notify_one();
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("stats", &self.stats())
            .finish()
    }
}

fn json_error_payload(reason: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("error".to_string(), json!(reason));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKind;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        async fn handle(&self, message: Message) -> TaskerResult<Payload> {
            Ok(message.payload)
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _message: Message) -> TaskerResult<Payload> {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Payload::new())
        }
    }

    #[tokio::test]
    async fn priority_ordering_strictly_higher_first() {
        let bus = MessageBus::new(100);
        let _loop_handle = bus.start();

        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        struct RecordingHandler(Arc<tokio::sync::Mutex<Vec<f64>>>);
        #[async_trait]
        impl MessageHandler for RecordingHandler {
            async fn handle(&self, message: Message) -> TaskerResult<Payload> {
                self.0.lock().await.push(message.priority);
                Ok(Payload::new())
            }
        }

        bus.subscribe("agent-1", Arc::new(RecordingHandler(order.clone())));

        let m1 = Message::new("caller", "agent-1", MessageKind::Update).with_priority(0.2);
        let m2 = Message::new("caller", "agent-1", MessageKind::Update).with_priority(0.9);
        let m3 = Message::new("caller", "agent-1", MessageKind::Update).with_priority(0.5);
        bus.publish(m1).await.unwrap();
        bus.publish(m2).await.unwrap();
        bus.publish(m3).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let recorded = order.lock().await.clone();
        assert_eq!(recorded, vec![0.9, 0.5, 0.2]);
    }

    #[tokio::test]
    async fn send_request_receives_matching_response() {
        let bus = MessageBus::new(100);
        let _loop_handle = bus.start();
        bus.subscribe("echo", Arc::new(EchoHandler));

        let mut payload = Payload::new();
        payload.insert("x".into(), json!(42));
        let message = Message::new("caller", "echo", MessageKind::Request)
            .with_payload(payload)
            .expecting_response(Duration::from_secs(1));

        let response = bus.send_request(message).await.unwrap();
        assert_eq!(response.get("x").unwrap(), &json!(42));
    }

    #[tokio::test]
    async fn send_request_times_out_with_no_subscriber() {
        let bus = MessageBus::new(100);
        let _loop_handle = bus.start();

        let message = Message::new("caller", "nobody", MessageKind::Request)
            .expecting_response(Duration::from_millis(200));
        let result = bus.send_request(message).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn publish_drops_when_queue_full() {
        let bus = MessageBus::new(1);
        // Don't start the dispatch loop, so the queue stays full.
        let m1 = Message::new("caller", "agent-1", MessageKind::Update);
        let m2 = Message::new("caller", "agent-1", MessageKind::Update);
        assert!(bus.publish(m1).await.is_ok());
        assert!(matches!(
            bus.publish(m2).await,
            Err(TaskerError::QueueFull { capacity: 1 })
        ));
        assert_eq!(bus.stats().dropped, 1);
    }

    #[tokio::test]
    async fn fan_out_delivers_to_every_subscriber() {
        let bus = MessageBus::new(100);
        let _loop_handle = bus.start();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe("topic", Arc::new(CountingHandler(counter.clone())));
        bus.subscribe("topic", Arc::new(CountingHandler(counter.clone())));

        bus.publish(Message::new("caller", "topic", MessageKind::Update))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 2);
    }
}
