//! Publish/subscribe transport between windows.
//!
//! [`EventChannel`] is what the bridge needs from the host: fire-and-forget
//! `emit` and topic `listen`. [`LocalChannel`] implements it in-process on a
//! `tokio::sync::broadcast` channel; the `tauri` feature adds an adapter
//! over the Tauri event system.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::NotationError;

/// Callback invoked with each payload received on a topic.
pub type Handler = Arc<dyn Fn(Value) + Send + Sync>;

pub trait EventChannel: Send + Sync {
    /// Deliver `payload` to every listener of `topic`. Delivery is best
    /// effort: having no listener is not an error.
    fn emit(&self, topic: &str, payload: Value) -> Result<(), NotationError>;

    /// Register `handler` for `topic` until the returned handle is dropped.
    fn listen(&self, topic: &str, handler: Handler) -> Result<Subscription, NotationError>;
}

/// Listener registration. Dropping it unsubscribes; callbacks already in
/// flight see the cleared liveness flag and return without running.
pub struct Subscription {
    topic: String,
    alive: Arc<AtomicBool>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(topic: &str, alive: Arc<AtomicBool>, cancel: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            topic: topic.to_string(),
            alive,
            cancel: Some(cancel),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        debug!("Unsubscribed from {}", self.topic);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Wrap `handler` so it only runs while `alive` is set.
pub fn guarded(alive: &Arc<AtomicBool>, handler: Handler) -> impl Fn(Value) + Send + Sync + 'static {
    let alive = alive.clone();
    move |payload| {
        if alive.load(Ordering::Acquire) {
            handler(payload);
        }
    }
}

// =============================================================================
// IN-PROCESS CHANNEL
// =============================================================================

#[derive(Debug, Clone)]
struct ChannelMessage {
    topic: String,
    payload: Value,
}

const DEFAULT_CAPACITY: usize = 256;

/// In-process channel shared by every window of one process.
///
/// Each listener runs on its own Tokio task, so handlers are called
/// asynchronously and in emit order per listener. A listener that falls
/// more than the channel capacity behind skips the oldest messages.
#[derive(Clone)]
pub struct LocalChannel {
    sender: broadcast::Sender<ChannelMessage>,
}

impl LocalChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventChannel for LocalChannel {
    fn emit(&self, topic: &str, payload: Value) -> Result<(), NotationError> {
        // A send error only means nobody is listening.
        let _ = self.sender.send(ChannelMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    /// Must be called from within a Tokio runtime.
    fn listen(&self, topic: &str, handler: Handler) -> Result<Subscription, NotationError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NotationError::Channel(format!("No async runtime for listener: {}", e)))?;

        let alive = Arc::new(AtomicBool::new(true));
        let callback = guarded(&alive, handler);
        let mut receiver = self.sender.subscribe();
        let wanted = topic.to_string();

        let task = runtime.spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if message.topic == wanted => callback(message.payload),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Listener on {} skipped {} messages", wanted, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(topic, alive, Box::new(move || task.abort())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, Handler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Arc::new(move |payload| sink.lock().unwrap().push(payload)))
    }

    #[tokio::test]
    async fn test_listener_receives_only_its_topic() {
        let channel = LocalChannel::default();
        let (seen, handler) = recorder();
        let _sub = channel.listen("main:clip-data", handler).unwrap();

        channel.emit("main:clip-data", json!({ "n": 1 })).unwrap();
        channel.emit("main:other", json!({ "n": 2 })).unwrap();
        channel.emit("main:clip-data", json!({ "n": 3 })).unwrap();
        settle().await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![json!({ "n": 1 }), json!({ "n": 3 })]);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let channel = LocalChannel::default();
        let (seen, handler) = recorder();
        let sub = channel.listen("t", handler).unwrap();
        assert!(sub.is_active());
        drop(sub);
        settle().await;

        channel.emit("t", json!(1)).unwrap();
        settle().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_emit_without_listeners_is_ok() {
        let channel = LocalChannel::default();
        assert!(channel.emit("nobody", json!(null)).is_ok());
    }

    #[test]
    fn test_listen_outside_runtime_errors() {
        let channel = LocalChannel::default();
        let (_, handler) = recorder();
        assert!(matches!(channel.listen("t", handler), Err(NotationError::Channel(_))));
    }

    #[test]
    fn test_guard_blocks_after_teardown() {
        let alive = Arc::new(AtomicBool::new(true));
        let (seen, handler) = recorder();
        let callback = guarded(&alive, handler);
        callback(json!(1));
        alive.store(false, Ordering::Release);
        callback(json!(2));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
