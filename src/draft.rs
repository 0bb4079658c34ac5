//! Staging of raw text typed into grid cells.
//!
//! A draft lives from the first keystroke to commit or cancel. Until then the
//! grid shows the draft instead of the stored score, so keystrokes are never
//! overwritten by a broadcast or re-render.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::notation::parse_decimal;

/// Address of one editable cell: clip, field (category label or criterion
/// id) and judge scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub clip_id: String,
    pub field: String,
    pub scope: String,
}

impl CellKey {
    pub fn new(clip_id: &str, field: &str, scope: &str) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            field: field.to_string(),
            scope: scope.to_string(),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.clip_id, self.field, self.scope)
    }
}

/// Per-grid map of in-flight cell edits. Never persisted.
#[derive(Debug, Default, Clone)]
pub struct DraftCellLedger {
    cells: HashMap<CellKey, String>,
}

impl DraftCellLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `raw` for `key`; the last write wins.
    pub fn set(&mut self, key: CellKey, raw: &str) {
        self.cells.insert(key, raw.to_string());
    }

    pub fn get(&self, key: &CellKey) -> Option<&str> {
        self.cells.get(key).map(String::as_str)
    }

    /// Commit the draft for `key`.
    ///
    /// Nothing happens when no draft exists. Otherwise the text is parsed
    /// with `.` or `,` as decimal separator; a finite number is handed to
    /// `apply` and its result returned. The draft is removed either way.
    pub fn commit<F, R>(&mut self, key: &CellKey, apply: F) -> Option<R>
    where
        F: FnOnce(f64) -> R,
    {
        let raw = self.cells.remove(key)?;
        match parse_decimal(&raw) {
            Some(value) => Some(apply(value)),
            None => {
                debug!("Discarding non-numeric draft {:?} for {}", raw, key);
                None
            }
        }
    }

    /// Discard the draft for `key` without applying it.
    pub fn clear(&mut self, key: &CellKey) {
        self.cells.remove(key);
    }

    /// Drop every draft of `clip_id` (used when a clip is removed).
    pub fn clear_clip(&mut self, clip_id: &str) {
        self.cells.retain(|key, _| key.clip_id != clip_id);
    }

    /// What the cell should display: its draft if any, else `authoritative`.
    pub fn display_value(&self, key: &CellKey, authoritative: &str) -> String {
        self.get(key).unwrap_or(authoritative).to_string()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
