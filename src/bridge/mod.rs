//! Cross-window event bridge.
//!
//! - **Channel**: the publish/subscribe transport and RAII subscriptions
//! - **Events**: tagged broadcasts (owner to detached) and intents (back)
//! - **Owner**: emits snapshots when what a window would see changes
//! - **Detached**: renders the last snapshot, resyncs on attach
//! - **Timecodes**: overlay markers parsed from free-text notes
//! - **Tauri** (feature `tauri`): the channel over Tauri events

mod channel;
mod detached;
mod events;
mod owner;
#[cfg(feature = "tauri")]
mod tauri;
mod timecodes;

pub use channel::{guarded, EventChannel, Handler, LocalChannel, Subscription};
pub use detached::{DetachedState, DetachedView};
pub use events::{
    topics, Broadcast, CategoryNoteUpdate, ClipData, ClipInfo, CriterionNoteUpdate, CriterionUpdate, Direction,
    FocusNoteMarker, Intent, NoteUpdated, OverlayMarkers, TextNotesUpdate, TimecodeJump, WindowRole,
};
pub use owner::{IntentHandler, NoopIntentHandler, OwnerBridge, WindowFlags};
#[cfg(feature = "tauri")]
pub use self::tauri::TauriChannel;
pub use timecodes::{
    build_note_markers, extract_timecodes, format_precise_timecode, parse_timecode, MarkerSource, ParsedTimecode,
    TimecodeMarker,
};
