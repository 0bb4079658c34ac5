//! [`EventChannel`] over the Tauri 2 event system.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde_json::Value;
use ::tauri::{AppHandle, Emitter, Listener, Runtime};
use tracing::debug;

use crate::error::NotationError;

use super::channel::{guarded, EventChannel, Handler, Subscription};

/// Emits to every window of the app and listens to events from any of them.
pub struct TauriChannel<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriChannel<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> EventChannel for TauriChannel<R> {
    fn emit(&self, topic: &str, payload: Value) -> Result<(), NotationError> {
        self.app
            .emit(topic, payload)
            .map_err(|e| NotationError::Channel(format!("Failed to emit {}: {}", topic, e)))
    }

    fn listen(&self, topic: &str, handler: Handler) -> Result<Subscription, NotationError> {
        let alive = Arc::new(AtomicBool::new(true));
        let callback = guarded(&alive, handler);
        let wanted = topic.to_string();
        let id = self.app.listen_any(topic, move |event| {
            match serde_json::from_str::<Value>(event.payload()) {
                Ok(payload) => callback(payload),
                Err(e) => debug!("Dropping unreadable payload on {}: {}", wanted, e),
            }
        });

        let app = self.app.clone();
        Ok(Subscription::new(topic, alive, Box::new(move || app.unlisten(id))))
    }
}
