//! Owner side of the bridge: the window holding the authoritative session.
//!
//! The owner listens to every intent topic and rebroadcasts snapshots after
//! each change. [`OwnerBridge::sync`] compares what each detached window
//! would see with what was last sent and only emits the groups that differ.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::NotationError;
use crate::session::ScoringSession;

use super::channel::{EventChannel, Subscription};
use super::events::{
    topics, Broadcast, ClipData, ClipInfo, FocusNoteMarker, Intent, NoteUpdated, OverlayMarkers, WindowRole,
};

/// Which detached surfaces are showing, as known by the owner window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowFlags {
    pub fullscreen: bool,
    pub player_detached: bool,
    pub notes_detached: bool,
    /// The owner's own "hide final score" toggle.
    pub hide_final_score: bool,
}

impl WindowFlags {
    fn overlay_visible(&self) -> bool {
        self.fullscreen || self.player_detached
    }
}

/// Host hooks for intents the session cannot fulfil by itself.
pub trait IntentHandler: Send + Sync {
    fn set_miniature_frame(&self, _role: WindowRole) {}
    fn open_player(&self) {}
    fn close_player(&self) {}
    fn close_notes(&self) {}
    /// Move playback of `clip_id` to `seconds`.
    fn seek(&self, _clip_id: &str, _seconds: f64) {}
}

/// Handler for hosts without a player.
#[derive(Debug, Default)]
pub struct NoopIntentHandler;

impl IntentHandler for NoopIntentHandler {}

/// Last snapshot sent per broadcast group. `None` means the group is not
/// visible and nothing is owed.
#[derive(Debug, Clone, Default, PartialEq)]
struct ObservedInputs {
    clip_info: Option<ClipInfo>,
    markers: Option<OverlayMarkers>,
    clip_data: Option<ClipData>,
}

impl ObservedInputs {
    fn capture(session: &ScoringSession, flags: WindowFlags) -> Self {
        let overlay = flags.overlay_visible();
        Self {
            clip_info: if overlay { session.clip_info() } else { None },
            markers: overlay.then(|| session.overlay_markers()),
            clip_data: flags.notes_detached.then(|| session.clip_data(flags.hide_final_score)),
        }
    }

    fn diff(&self, previous: &Self) -> Vec<Broadcast> {
        let mut out = Vec::new();
        if self.clip_info != previous.clip_info {
            if let Some(info) = &self.clip_info {
                out.push(Broadcast::ClipChanged(info.clone()));
            }
        }
        if self.markers != previous.markers {
            if let Some(markers) = &self.markers {
                out.push(Broadcast::OverlayMarkers(markers.clone()));
            }
        }
        if self.clip_data != previous.clip_data {
            if let Some(data) = &self.clip_data {
                out.push(clip_data_broadcast(data, previous.clip_data.as_ref()));
            }
        }
        out
    }
}

/// A note-only change on the same clip travels as `NoteUpdated`.
fn clip_data_broadcast(next: &ClipData, previous: Option<&ClipData>) -> Broadcast {
    let only_note = previous.is_some_and(|prev| {
        prev.clip == next.clip
            && prev.bareme == next.bareme
            && prev.clip_index == next.clip_index
            && prev.total_clips == next.total_clips
            && prev.hide_totals == next.hide_totals
    });
    if only_note {
        Broadcast::NoteUpdated(NoteUpdated {
            note: next.note.clone(),
        })
    } else {
        Broadcast::ClipData(next.clone())
    }
}

struct Shared {
    channel: Arc<dyn EventChannel>,
    session: Arc<Mutex<ScoringSession>>,
    handler: Arc<dyn IntentHandler>,
    flags: Mutex<WindowFlags>,
    last: Mutex<ObservedInputs>,
}

impl Shared {
    fn emit(&self, broadcast: &Broadcast) {
        let result = broadcast
            .payload()
            .and_then(|payload| self.channel.emit(broadcast.topic(), payload));
        if let Err(e) = result {
            warn!("Failed to emit {}: {}", broadcast.topic(), e);
        }
    }

    fn on_message(&self, topic: &str, payload: Value) {
        if let Some(intent) = Intent::decode(topic, payload) {
            self.dispatch(intent);
        }
    }

    fn dispatch(&self, intent: Intent) {
        debug!("Handling intent {}", intent.topic());
        match intent {
            Intent::RequestNotesData => self.answer_notes_data(),
            Intent::RequestClipInfo => self.answer_clip_info(),
            Intent::RequestNoteMarkers => self.answer_markers(),
            Intent::Undo(_) => {
                self.session.lock().unwrap().undo();
            }
            Intent::ToggleMiniatures(_) => {
                self.session.lock().unwrap().toggle_miniatures();
            }
            Intent::SetMiniatureFrame(role) => self.handler.set_miniature_frame(role),
            Intent::CriterionUpdated(update) => {
                let mut session = self.session.lock().unwrap();
                let scope = session.current_scope();
                session.apply_criterion_value(&update.clip_id, &update.criterion_id, &scope, update.value);
            }
            Intent::TextNotesUpdated(update) => {
                self.session.lock().unwrap().set_text_notes(&update.clip_id, &update.text);
            }
            Intent::CategoryNoteUpdated(update) => {
                self.session
                    .lock()
                    .unwrap()
                    .set_category_note(&update.clip_id, &update.category, &update.text);
            }
            Intent::CriterionNoteUpdated(update) => {
                self.session
                    .lock()
                    .unwrap()
                    .set_criterion_note(&update.clip_id, &update.criterion_id, &update.text);
            }
            Intent::NavigateClip { direction, .. } => {
                self.session.lock().unwrap().navigate(direction);
            }
            Intent::FocusNoteMarker(focus) => {
                let found = self.session.lock().unwrap().select_clip(&focus.clip_id);
                if found {
                    self.emit(&Broadcast::FocusNoteMarker(focus));
                } else {
                    debug!("Focus requested for unknown clip {}", focus.clip_id);
                }
            }
            Intent::TimecodeJump(jump) => {
                let playable = {
                    let mut session = self.session.lock().unwrap();
                    let has_video = session
                        .project()
                        .clips()
                        .iter()
                        .any(|c| c.id == jump.clip_id && c.has_video());
                    has_video && session.select_clip(&jump.clip_id)
                };
                if !playable {
                    debug!("Ignoring timecode jump to clip {} without video", jump.clip_id);
                } else {
                    self.handler.seek(&jump.clip_id, jump.seconds);
                    self.emit(&Broadcast::FocusNoteMarker(FocusNoteMarker {
                        clip_id: jump.clip_id,
                        seconds: jump.seconds,
                        category: jump.category,
                        criterion_id: jump.criterion_id,
                        source: None,
                        raw: None,
                    }));
                }
            }
            Intent::OpenPlayer => self.handler.open_player(),
            Intent::CloseNotes => self.handler.close_notes(),
            Intent::ClosePlayer => self.handler.close_player(),
        }
        self.sync();
    }

    // `last` is held from capture through emit, so snapshots leave in the
    // order they were taken. Lock order: last, flags, session.

    fn sync(&self) {
        let mut last = self.last.lock().unwrap();
        let flags = *self.flags.lock().unwrap();
        let next = ObservedInputs::capture(&self.session.lock().unwrap(), flags);
        for broadcast in &next.diff(&last) {
            self.emit(broadcast);
        }
        *last = next;
    }

    // Requests are answered even when nothing changed, and even when the
    // owner believes the requesting window is hidden.

    fn answer_notes_data(&self) {
        let mut last = self.last.lock().unwrap();
        let flags = *self.flags.lock().unwrap();
        let data = self.session.lock().unwrap().clip_data(flags.hide_final_score);
        if flags.notes_detached {
            last.clip_data = Some(data.clone());
        }
        self.emit(&Broadcast::ClipData(data));
    }

    fn answer_clip_info(&self) {
        let mut last = self.last.lock().unwrap();
        let visible = self.flags.lock().unwrap().overlay_visible();
        let info = self.session.lock().unwrap().clip_info();
        let Some(info) = info else {
            debug!("No current clip to describe");
            return;
        };
        if visible {
            last.clip_info = Some(info.clone());
        }
        self.emit(&Broadcast::ClipChanged(info));
    }

    fn answer_markers(&self) {
        let mut last = self.last.lock().unwrap();
        let visible = self.flags.lock().unwrap().overlay_visible();
        let markers = self.session.lock().unwrap().overlay_markers();
        if visible {
            last.markers = Some(markers.clone());
        }
        self.emit(&Broadcast::OverlayMarkers(markers));
    }
}

/// Listens for intents and keeps detached windows up to date.
///
/// Dropping the bridge unsubscribes every listener.
pub struct OwnerBridge {
    shared: Arc<Shared>,
    _subscriptions: Vec<Subscription>,
}

impl OwnerBridge {
    pub fn attach(
        channel: Arc<dyn EventChannel>,
        session: Arc<Mutex<ScoringSession>>,
        handler: Arc<dyn IntentHandler>,
    ) -> Result<Self, NotationError> {
        let shared = Arc::new(Shared {
            channel: channel.clone(),
            session,
            handler,
            flags: Mutex::new(WindowFlags::default()),
            last: Mutex::new(ObservedInputs::default()),
        });

        let mut subscriptions = Vec::with_capacity(topics::INTENTS.len());
        for topic in topics::INTENTS {
            let weak: Weak<Shared> = Arc::downgrade(&shared);
            let subscription = channel.listen(
                topic,
                Arc::new(move |payload| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_message(topic, payload);
                    }
                }),
            )?;
            subscriptions.push(subscription);
        }
        debug!("Owner bridge listening on {} topics", subscriptions.len());

        Ok(Self {
            shared,
            _subscriptions: subscriptions,
        })
    }

    pub fn flags(&self) -> WindowFlags {
        *self.shared.flags.lock().unwrap()
    }

    /// Record which surfaces are showing, then emit whatever they now owe.
    pub fn set_flags(&self, flags: WindowFlags) {
        *self.shared.flags.lock().unwrap() = flags;
        self.shared.sync();
    }

    pub fn update_flags<F>(&self, update: F)
    where
        F: FnOnce(&mut WindowFlags),
    {
        update(&mut self.shared.flags.lock().unwrap());
        self.shared.sync();
    }

    /// Emit the broadcast groups whose snapshot changed since the last
    /// emission. Call after any local edit of the session.
    pub fn sync(&self) {
        self.shared.sync();
    }

    /// Handle an intent as if it had arrived on the channel.
    pub fn dispatch(&self, intent: Intent) {
        self.shared.dispatch(intent);
    }
}
