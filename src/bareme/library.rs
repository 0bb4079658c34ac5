use serde_json::Value;
use tracing::{debug, info};

use super::parse::{official_bareme, parse_bareme};
use super::types::Bareme;

/// The rubrics available to a session plus the active one.
///
/// The official rubric is always present and always first.
#[derive(Debug, Clone)]
pub struct BaremeLibrary {
    available: Vec<Bareme>,
    current_id: Option<String>,
}

impl BaremeLibrary {
    pub fn new() -> Self {
        let official = official_bareme();
        Self {
            current_id: Some(official.id.clone()),
            available: vec![official],
        }
    }

    /// The default library with `bareme` added and active.
    pub fn with_active(bareme: Bareme) -> Self {
        let mut library = Self::new();
        let id = bareme.id.clone();
        library.upsert(bareme);
        library.current_id = Some(id);
        library
    }

    pub fn current(&self) -> Option<&Bareme> {
        let id = self.current_id.as_deref()?;
        self.available.iter().find(|b| b.id == id)
    }

    pub fn available(&self) -> &[Bareme] {
        &self.available
    }

    pub fn get(&self, id: &str) -> Option<&Bareme> {
        self.available.iter().find(|b| b.id == id)
    }

    /// Make `bareme` the active rubric, adding it if it is not known yet.
    pub fn set_current(&mut self, bareme: Bareme) {
        let id = bareme.id.clone();
        self.upsert(bareme);
        self.current_id = Some(id);
    }

    /// Activate an already known rubric by id. Returns false if unknown.
    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.current_id = Some(id.to_string());
        true
    }

    /// Insert or replace by id, keeping list position on replace.
    pub fn upsert(&mut self, bareme: Bareme) {
        match self.available.iter_mut().find(|b| b.id == bareme.id) {
            Some(existing) => *existing = bareme,
            None => self.available.push(bareme),
        }
    }

    /// Remove a custom rubric. Official rubrics are never removed. When the
    /// active rubric is removed the official one becomes active.
    ///
    /// Returns true when a custom rubric was removed (its file should be
    /// deleted by the caller).
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.available.len();
        self.available.retain(|b| b.id != id || b.is_official);
        let removed = self.available.len() != before;
        if removed && self.current_id.as_deref() == Some(id) {
            self.current_id = self.official_id();
        }
        removed
    }

    /// Replace the custom rubrics with the parseable entries of `items`.
    /// Duplicate ids keep the last occurrence; the active rubric is kept when
    /// it survives the reload, otherwise the official one becomes active.
    pub fn load_custom(&mut self, items: &[Value]) {
        let official = official_bareme();
        let mut customs: Vec<Bareme> = Vec::new();
        for bareme in items.iter().filter_map(parse_bareme) {
            if bareme.id == official.id {
                continue;
            }
            match customs.iter_mut().find(|b| b.id == bareme.id) {
                Some(existing) => *existing = bareme,
                None => customs.push(bareme),
            }
        }
        let skipped = items.len() - customs.len();
        if skipped > 0 {
            debug!("Skipped {} unusable or duplicate rubric entries", skipped);
        }

        let official_id = official.id.clone();
        self.available = std::iter::once(official).chain(customs).collect();
        let keep_current = self
            .current_id
            .as_deref()
            .is_some_and(|id| self.available.iter().any(|b| b.id == id));
        if !keep_current {
            self.current_id = Some(official_id);
        }
        info!("Loaded {} rubrics", self.available.len());
    }

    fn official_id(&self) -> Option<String> {
        self.available.iter().find(|b| b.is_official).map(|b| b.id.clone())
    }
}

impl Default for BaremeLibrary {
    fn default() -> Self {
        Self::new()
    }
}
