//! Wire vocabulary between the owner window and detached windows.
//!
//! Broadcasts flow from the owner and always carry a full snapshot.
//! Intents flow to the owner and ask it to do one thing. Both travel as a
//! topic name plus a camelCase JSON payload; unknown topics and malformed
//! payloads decode to `None`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::bareme::Bareme;
use crate::error::NotationError;
use crate::notation::{CriterionValue, Note};
use crate::project::Clip;

use super::timecodes::TimecodeMarker;

// =============================================================================
// BROADCAST PAYLOADS
// =============================================================================

/// Current clip as shown by the overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipInfo {
    pub name: String,
    /// Position in label order.
    pub index: usize,
    pub total: usize,
    pub has_video: bool,
    pub miniatures_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayMarkers {
    pub clip_id: Option<String>,
    pub markers: Vec<TimecodeMarker>,
}

/// Everything the notes window renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipData {
    pub clip: Option<Clip>,
    pub bareme: Option<Bareme>,
    pub note: Option<Note>,
    pub clip_index: usize,
    pub total_clips: usize,
    pub hide_totals: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdated {
    pub note: Option<Note>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusNoteMarker {
    pub clip_id: String,
    #[serde(default)]
    pub seconds: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub criterion_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Broadcast {
    ClipChanged(ClipInfo),
    OverlayMarkers(OverlayMarkers),
    ClipData(ClipData),
    NoteUpdated(NoteUpdated),
    FocusNoteMarker(FocusNoteMarker),
}

pub mod topics {
    pub const CLIP_CHANGED: &str = "main:clip-changed";
    pub const OVERLAY_MARKERS: &str = "main:overlay-markers";
    pub const CLIP_DATA: &str = "main:clip-data";
    pub const NOTE_UPDATED: &str = "main:note-updated";
    pub const FOCUS_NOTE_MARKER: &str = "main:focus-note-marker";

    pub const NOTES_REQUEST_DATA: &str = "notes:request-data";
    pub const OVERLAY_REQUEST_CLIP_INFO: &str = "overlay:request-clip-info";
    pub const OVERLAY_REQUEST_NOTE_MARKERS: &str = "overlay:request-note-markers";
    pub const NOTES_UNDO: &str = "notes:undo";
    pub const OVERLAY_UNDO: &str = "overlay:undo";
    pub const NOTES_TOGGLE_MINIATURES: &str = "notes:toggle-miniatures";
    pub const OVERLAY_TOGGLE_MINIATURES: &str = "overlay:toggle-miniatures";
    pub const NOTES_SET_MINIATURE_FRAME: &str = "notes:set-miniature-frame";
    pub const OVERLAY_SET_MINIATURE_FRAME: &str = "overlay:set-miniature-frame";
    pub const NOTES_CRITERION_UPDATED: &str = "notes:criterion-updated";
    pub const NOTES_TEXT_NOTES_UPDATED: &str = "notes:text-notes-updated";
    pub const NOTES_CATEGORY_NOTE_UPDATED: &str = "notes:category-note-updated";
    pub const NOTES_CRITERION_NOTE_UPDATED: &str = "notes:criterion-note-updated";
    pub const NOTES_NAVIGATE_CLIP: &str = "notes:navigate-clip";
    pub const OVERLAY_NEXT_CLIP: &str = "overlay:next-clip";
    pub const OVERLAY_PREV_CLIP: &str = "overlay:prev-clip";
    pub const OVERLAY_FOCUS_NOTE_MARKER: &str = "overlay:focus-note-marker";
    pub const NOTES_TIMECODE_JUMP: &str = "notes:timecode-jump";
    pub const NOTES_OPEN_PLAYER: &str = "notes:open-player";
    pub const NOTES_CLOSE: &str = "notes:close";
    pub const OVERLAY_CLOSE_PLAYER: &str = "overlay:close-player";

    pub const INTENTS: [&str; 21] = [
        NOTES_REQUEST_DATA,
        OVERLAY_REQUEST_CLIP_INFO,
        OVERLAY_REQUEST_NOTE_MARKERS,
        NOTES_UNDO,
        OVERLAY_UNDO,
        NOTES_TOGGLE_MINIATURES,
        OVERLAY_TOGGLE_MINIATURES,
        NOTES_SET_MINIATURE_FRAME,
        OVERLAY_SET_MINIATURE_FRAME,
        NOTES_CRITERION_UPDATED,
        NOTES_TEXT_NOTES_UPDATED,
        NOTES_CATEGORY_NOTE_UPDATED,
        NOTES_CRITERION_NOTE_UPDATED,
        NOTES_NAVIGATE_CLIP,
        OVERLAY_NEXT_CLIP,
        OVERLAY_PREV_CLIP,
        OVERLAY_FOCUS_NOTE_MARKER,
        NOTES_TIMECODE_JUMP,
        NOTES_OPEN_PLAYER,
        NOTES_CLOSE,
        OVERLAY_CLOSE_PLAYER,
    ];
}

fn decode_payload<T: DeserializeOwned>(topic: &str, payload: Value) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Dropping malformed payload on {}: {}", topic, e);
            None
        }
    }
}

impl Broadcast {
    pub fn topic(&self) -> &'static str {
        match self {
            Broadcast::ClipChanged(_) => topics::CLIP_CHANGED,
            Broadcast::OverlayMarkers(_) => topics::OVERLAY_MARKERS,
            Broadcast::ClipData(_) => topics::CLIP_DATA,
            Broadcast::NoteUpdated(_) => topics::NOTE_UPDATED,
            Broadcast::FocusNoteMarker(_) => topics::FOCUS_NOTE_MARKER,
        }
    }

    pub fn payload(&self) -> Result<Value, NotationError> {
        let value = match self {
            Broadcast::ClipChanged(p) => serde_json::to_value(p)?,
            Broadcast::OverlayMarkers(p) => serde_json::to_value(p)?,
            Broadcast::ClipData(p) => serde_json::to_value(p)?,
            Broadcast::NoteUpdated(p) => serde_json::to_value(p)?,
            Broadcast::FocusNoteMarker(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    pub fn decode(topic: &str, payload: Value) -> Option<Self> {
        let decoded = match topic {
            topics::CLIP_CHANGED => Broadcast::ClipChanged(decode_payload(topic, payload)?),
            topics::OVERLAY_MARKERS => Broadcast::OverlayMarkers(decode_payload(topic, payload)?),
            topics::CLIP_DATA => Broadcast::ClipData(decode_payload(topic, payload)?),
            topics::NOTE_UPDATED => Broadcast::NoteUpdated(decode_payload(topic, payload)?),
            topics::FOCUS_NOTE_MARKER => Broadcast::FocusNoteMarker(decode_payload(topic, payload)?),
            _ => {
                debug!("Ignoring unknown broadcast topic {}", topic);
                return None;
            }
        };
        Some(decoded)
    }
}

// =============================================================================
// INTENTS
// =============================================================================

/// Which detached window sent an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    Notes,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionUpdate {
    pub clip_id: String,
    pub criterion_id: String,
    pub value: CriterionValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNotesUpdate {
    pub clip_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNoteUpdate {
    pub clip_id: String,
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionNoteUpdate {
    pub clip_id: String,
    pub criterion_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimecodeJump {
    pub clip_id: String,
    pub seconds: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub criterion_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NavigatePayload {
    #[serde(default)]
    direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    RequestNotesData,
    RequestClipInfo,
    RequestNoteMarkers,
    Undo(WindowRole),
    ToggleMiniatures(WindowRole),
    SetMiniatureFrame(WindowRole),
    CriterionUpdated(CriterionUpdate),
    TextNotesUpdated(TextNotesUpdate),
    CategoryNoteUpdated(CategoryNoteUpdate),
    CriterionNoteUpdated(CriterionNoteUpdate),
    NavigateClip { direction: Direction, origin: WindowRole },
    FocusNoteMarker(FocusNoteMarker),
    TimecodeJump(TimecodeJump),
    OpenPlayer,
    CloseNotes,
    ClosePlayer,
}

fn by_role(role: WindowRole, notes: &'static str, overlay: &'static str) -> &'static str {
    match role {
        WindowRole::Notes => notes,
        WindowRole::Overlay => overlay,
    }
}

impl Intent {
    pub fn topic(&self) -> &'static str {
        use topics::*;
        match self {
            Intent::RequestNotesData => NOTES_REQUEST_DATA,
            Intent::RequestClipInfo => OVERLAY_REQUEST_CLIP_INFO,
            Intent::RequestNoteMarkers => OVERLAY_REQUEST_NOTE_MARKERS,
            Intent::Undo(role) => by_role(*role, NOTES_UNDO, OVERLAY_UNDO),
            Intent::ToggleMiniatures(role) => by_role(*role, NOTES_TOGGLE_MINIATURES, OVERLAY_TOGGLE_MINIATURES),
            Intent::SetMiniatureFrame(role) => {
                by_role(*role, NOTES_SET_MINIATURE_FRAME, OVERLAY_SET_MINIATURE_FRAME)
            }
            Intent::CriterionUpdated(_) => NOTES_CRITERION_UPDATED,
            Intent::TextNotesUpdated(_) => NOTES_TEXT_NOTES_UPDATED,
            Intent::CategoryNoteUpdated(_) => NOTES_CATEGORY_NOTE_UPDATED,
            Intent::CriterionNoteUpdated(_) => NOTES_CRITERION_NOTE_UPDATED,
            Intent::NavigateClip { direction, origin } => match (origin, direction) {
                (WindowRole::Notes, _) => NOTES_NAVIGATE_CLIP,
                (WindowRole::Overlay, Direction::Next) => OVERLAY_NEXT_CLIP,
                (WindowRole::Overlay, Direction::Prev) => OVERLAY_PREV_CLIP,
            },
            Intent::FocusNoteMarker(_) => OVERLAY_FOCUS_NOTE_MARKER,
            Intent::TimecodeJump(_) => NOTES_TIMECODE_JUMP,
            Intent::OpenPlayer => NOTES_OPEN_PLAYER,
            Intent::CloseNotes => NOTES_CLOSE,
            Intent::ClosePlayer => OVERLAY_CLOSE_PLAYER,
        }
    }

    pub fn payload(&self) -> Result<Value, NotationError> {
        let value = match self {
            Intent::CriterionUpdated(p) => serde_json::to_value(p)?,
            Intent::TextNotesUpdated(p) => serde_json::to_value(p)?,
            Intent::CategoryNoteUpdated(p) => serde_json::to_value(p)?,
            Intent::CriterionNoteUpdated(p) => serde_json::to_value(p)?,
            Intent::FocusNoteMarker(p) => serde_json::to_value(p)?,
            Intent::TimecodeJump(p) => serde_json::to_value(p)?,
            Intent::NavigateClip {
                direction,
                origin: WindowRole::Notes,
            } => serde_json::json!({ "direction": direction }),
            _ => Value::Null,
        };
        Ok(value)
    }

    pub fn decode(topic: &str, payload: Value) -> Option<Self> {
        use topics::*;
        let intent = match topic {
            NOTES_REQUEST_DATA => Intent::RequestNotesData,
            OVERLAY_REQUEST_CLIP_INFO => Intent::RequestClipInfo,
            OVERLAY_REQUEST_NOTE_MARKERS => Intent::RequestNoteMarkers,
            NOTES_UNDO => Intent::Undo(WindowRole::Notes),
            OVERLAY_UNDO => Intent::Undo(WindowRole::Overlay),
            NOTES_TOGGLE_MINIATURES => Intent::ToggleMiniatures(WindowRole::Notes),
            OVERLAY_TOGGLE_MINIATURES => Intent::ToggleMiniatures(WindowRole::Overlay),
            NOTES_SET_MINIATURE_FRAME => Intent::SetMiniatureFrame(WindowRole::Notes),
            OVERLAY_SET_MINIATURE_FRAME => Intent::SetMiniatureFrame(WindowRole::Overlay),
            NOTES_CRITERION_UPDATED => Intent::CriterionUpdated(decode_payload(topic, payload)?),
            NOTES_TEXT_NOTES_UPDATED => Intent::TextNotesUpdated(decode_payload(topic, payload)?),
            NOTES_CATEGORY_NOTE_UPDATED => Intent::CategoryNoteUpdated(decode_payload(topic, payload)?),
            NOTES_CRITERION_NOTE_UPDATED => Intent::CriterionNoteUpdated(decode_payload(topic, payload)?),
            NOTES_NAVIGATE_CLIP => {
                let nav: NavigatePayload = if payload.is_null() {
                    NavigatePayload::default()
                } else {
                    decode_payload(topic, payload)?
                };
                let direction = match nav.direction.as_deref() {
                    Some("prev") => Direction::Prev,
                    _ => Direction::Next,
                };
                Intent::NavigateClip {
                    direction,
                    origin: WindowRole::Notes,
                }
            }
            OVERLAY_NEXT_CLIP => Intent::NavigateClip {
                direction: Direction::Next,
                origin: WindowRole::Overlay,
            },
            OVERLAY_PREV_CLIP => Intent::NavigateClip {
                direction: Direction::Prev,
                origin: WindowRole::Overlay,
            },
            OVERLAY_FOCUS_NOTE_MARKER => {
                let focus: FocusNoteMarker = decode_payload(topic, payload)?;
                if focus.clip_id.is_empty() {
                    return None;
                }
                Intent::FocusNoteMarker(focus)
            }
            NOTES_TIMECODE_JUMP => {
                let jump: TimecodeJump = decode_payload(topic, payload)?;
                if jump.clip_id.is_empty() || !jump.seconds.is_finite() || jump.seconds < 0.0 {
                    debug!("Dropping timecode jump with invalid target");
                    return None;
                }
                Intent::TimecodeJump(jump)
            }
            NOTES_OPEN_PLAYER => Intent::OpenPlayer,
            NOTES_CLOSE => Intent::CloseNotes,
            OVERLAY_CLOSE_PLAYER => Intent::ClosePlayer,
            _ => {
                debug!("Ignoring unknown intent topic {}", topic);
                return None;
            }
        };
        Some(intent)
    }
}
