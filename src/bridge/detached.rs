//! Detached side of the bridge: the notes window and the video overlay.
//!
//! A detached window keeps no scoring state of its own. It renders the last
//! snapshot the owner broadcast and sends intents back. On attach it asks
//! for a snapshot right away; until one arrives it shows the empty default.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::NotationError;

use super::channel::{EventChannel, Subscription};
use super::events::{topics, Broadcast, ClipData, ClipInfo, FocusNoteMarker, Intent, OverlayMarkers, WindowRole};

/// Everything a detached window renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetachedState {
    pub clip_info: Option<ClipInfo>,
    pub markers: OverlayMarkers,
    pub clip_data: Option<ClipData>,
    /// Last marker the owner asked to highlight.
    pub focus: Option<FocusNoteMarker>,
}

impl DetachedState {
    fn apply(&mut self, broadcast: Broadcast) {
        match broadcast {
            Broadcast::ClipChanged(info) => self.clip_info = Some(info),
            Broadcast::OverlayMarkers(markers) => self.markers = markers,
            Broadcast::ClipData(data) => self.clip_data = Some(data),
            Broadcast::NoteUpdated(update) => match self.clip_data.as_mut() {
                Some(data) if note_belongs(data, update.note.as_ref().map(|n| n.clip_id.as_str())) => {
                    data.note = update.note;
                }
                _ => debug!("Dropping note update for another clip"),
            },
            Broadcast::FocusNoteMarker(focus) => self.focus = Some(focus),
        }
    }
}

fn note_belongs(data: &ClipData, note_clip: Option<&str>) -> bool {
    let current = data.clip.as_ref().map(|c| c.id.as_str());
    match note_clip {
        Some(id) => current == Some(id),
        // A cleared note (after undo) applies to whatever clip is shown.
        None => true,
    }
}

fn subscribed_topics(role: WindowRole) -> [&'static str; 3] {
    match role {
        WindowRole::Notes => [topics::CLIP_DATA, topics::NOTE_UPDATED, topics::FOCUS_NOTE_MARKER],
        WindowRole::Overlay => [topics::CLIP_CHANGED, topics::OVERLAY_MARKERS, topics::FOCUS_NOTE_MARKER],
    }
}

pub struct DetachedView {
    role: WindowRole,
    channel: Arc<dyn EventChannel>,
    state: Arc<Mutex<DetachedState>>,
    _subscriptions: Vec<Subscription>,
}

impl DetachedView {
    /// Subscribe to the broadcasts `role` renders and request a snapshot.
    pub fn attach(channel: Arc<dyn EventChannel>, role: WindowRole) -> Result<Self, NotationError> {
        let state = Arc::new(Mutex::new(DetachedState::default()));
        let mut subscriptions = Vec::new();
        for topic in subscribed_topics(role) {
            let state = state.clone();
            subscriptions.push(channel.listen(
                topic,
                Arc::new(move |payload| {
                    if let Some(broadcast) = Broadcast::decode(topic, payload) {
                        state.lock().unwrap().apply(broadcast);
                    }
                }),
            )?);
        }

        let view = Self {
            role,
            channel,
            state,
            _subscriptions: subscriptions,
        };
        view.request_resync()?;
        info!("Detached {:?} window attached", role);
        Ok(view)
    }

    pub fn role(&self) -> WindowRole {
        self.role
    }

    pub fn snapshot(&self) -> DetachedState {
        self.state.lock().unwrap().clone()
    }

    /// True while no snapshot for this window's main view has arrived.
    pub fn needs_resync(&self) -> bool {
        let state = self.state.lock().unwrap();
        match self.role {
            WindowRole::Notes => state.clip_data.is_none(),
            WindowRole::Overlay => state.clip_info.is_none(),
        }
    }

    pub fn request_resync(&self) -> Result<(), NotationError> {
        match self.role {
            WindowRole::Notes => self.send(&Intent::RequestNotesData),
            WindowRole::Overlay => {
                self.send(&Intent::RequestClipInfo)?;
                self.send(&Intent::RequestNoteMarkers)
            }
        }
    }

    /// Re-request a snapshot every `interval` until one arrives, at most
    /// `attempts` times. Returns whether the view is populated.
    pub async fn resync_until_ready(&self, interval: Duration, attempts: usize) -> bool {
        for _ in 0..attempts {
            if !self.needs_resync() {
                return true;
            }
            tokio::time::sleep(interval).await;
            if !self.needs_resync() {
                return true;
            }
            if let Err(e) = self.request_resync() {
                debug!("Resync request failed: {}", e);
            }
        }
        !self.needs_resync()
    }

    pub fn send(&self, intent: &Intent) -> Result<(), NotationError> {
        self.channel.emit(intent.topic(), intent.payload()?)
    }
}
