use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::bareme::{Bareme, BaremeLibrary, Criterion};
use crate::config::SyncConfig;
use crate::error::NotationError;

use super::distribution::distribute_category_score;
use super::history::UndoHistory;
use super::types::{
    CriterionScore, CriterionValue, ImportedJudgeData, ImportedJudgeNote, ImportedJudgeScore, Note, NoteData,
    Notes, NotesData,
};
use super::validation::{
    calculate_score, category_score, clamp_to_bounds, criterion_numeric_score, is_note_complete, normalize_value,
    note_total, validate_criterion_value,
};

/// Scope token addressing the local judge unless configured otherwise.
pub const CURRENT_SCOPE: &str = "current";

/// Prefix of scope tokens addressing imported judges (`imported-<index>`).
pub const IMPORTED_SCOPE_PREFIX: &str = "imported-";

/// Which categories accept a typed total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryEditMode {
    /// Every category is editable; the total is spread over its criteria.
    #[default]
    Distribute,
    /// Only categories whose criteria share one maximum are editable.
    Strict,
}

/// Whose scores a cell edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeScope {
    Current,
    Imported(usize),
}

/// The scope token for imported judge `index`.
pub fn imported_scope(index: usize) -> String {
    format!("{}{}", IMPORTED_SCOPE_PREFIX, index)
}

/// Authoritative scoring state of one window: notes of the local judge
/// under the active rubric, imported judges, and the undo history.
///
/// Every derived total is computed here.
#[derive(Debug)]
pub struct NotationStore {
    notes: Notes,
    history: UndoHistory<Notes>,
    library: BaremeLibrary,
    imported_judges: Vec<ImportedJudgeData>,
    current_scope: String,
    category_mode: CategoryEditMode,
}

impl NotationStore {
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_library(BaremeLibrary::new(), config)
    }

    pub fn with_library(library: BaremeLibrary, config: &SyncConfig) -> Self {
        Self {
            notes: Notes::new(),
            history: UndoHistory::new(config.history.depth),
            library,
            imported_judges: Vec::new(),
            current_scope: CURRENT_SCOPE.to_string(),
            category_mode: config.scoring.category_edit_mode,
        }
    }

    /// Address the local judge with `scope` instead of `"current"`.
    pub fn set_current_scope(&mut self, scope: &str) {
        self.current_scope = scope.to_string();
    }

    pub fn current_scope(&self) -> &str {
        &self.current_scope
    }

    pub fn set_category_mode(&mut self, mode: CategoryEditMode) {
        self.category_mode = mode;
    }

    pub fn category_mode(&self) -> CategoryEditMode {
        self.category_mode
    }

    pub fn resolve_scope(&self, scope: &str) -> Option<JudgeScope> {
        if scope == self.current_scope {
            return Some(JudgeScope::Current);
        }
        let index = scope.strip_prefix(IMPORTED_SCOPE_PREFIX)?.parse::<usize>().ok()?;
        (index < self.imported_judges.len()).then_some(JudgeScope::Imported(index))
    }

    // =========================================================================
    // SCORE MUTATIONS
    // =========================================================================

    /// Store `raw` for one criterion of one clip.
    ///
    /// Returns true when something changed. Unknown criterion, unknown scope
    /// or no active rubric are no-ops. Invalid input is kept with
    /// `is_valid = false`.
    pub fn apply_criterion_value(&mut self, clip_id: &str, criterion_id: &str, scope: &str, raw: CriterionValue) -> bool {
        let Some(bareme) = self.library.current().cloned() else {
            debug!("No active rubric, ignoring value for {}", clip_id);
            return false;
        };
        let Some(criterion) = bareme.criterion(criterion_id) else {
            debug!("Unknown criterion {} for rubric {}", criterion_id, bareme.id);
            return false;
        };
        match self.resolve_scope(scope) {
            Some(JudgeScope::Current) => {
                let mut next = self.notes.clone();
                let note = next
                    .entry(clip_id.to_string())
                    .or_insert_with(|| Note::new(clip_id, &bareme.id));
                if !write_score(note, criterion, raw) {
                    return false;
                }
                note.final_score = Some(calculate_score(note, &bareme));
                self.commit(next);
                true
            }
            Some(JudgeScope::Imported(index)) => {
                let Some(n) = raw.as_number() else {
                    debug!("Ignoring non-numeric value for imported judge {}", index);
                    return false;
                };
                let value = imported_clamp(criterion, n);
                self.update_imported(index, clip_id, &bareme, |note| {
                    write_imported_score(note, &criterion.id, value)
                })
            }
            None => {
                debug!("Unknown scope {}, ignoring value", scope);
                false
            }
        }
    }

    /// Spread `target` over the criteria of `category` as one undoable action.
    pub fn apply_category_value(
        &mut self,
        clip_id: &str,
        category: &str,
        scope: &str,
        target: f64,
    ) -> Result<bool, NotationError> {
        let Some(bareme) = self.library.current().cloned() else {
            return Ok(false);
        };
        let group = bareme
            .category(category)
            .ok_or_else(|| NotationError::UnknownCategory(category.to_string()))?;
        if self.category_mode == CategoryEditMode::Strict && !group.has_uniform_max() {
            return Err(NotationError::CategoryNotEditable(category.to_string()));
        }

        match self.resolve_scope(scope) {
            Some(JudgeScope::Current) => {
                let current: Vec<f64> = group
                    .criteria
                    .iter()
                    .map(|c| criterion_numeric_score(self.notes.get(clip_id), c))
                    .collect();
                let parts = distribute_category_score(&group.criteria, &current, target);

                let mut next = self.notes.clone();
                let note = next
                    .entry(clip_id.to_string())
                    .or_insert_with(|| Note::new(clip_id, &bareme.id));
                let mut changed = false;
                for (criterion, part) in group.criteria.iter().zip(parts) {
                    changed |= write_score(note, criterion, CriterionValue::Number(part));
                }
                if !changed {
                    return Ok(false);
                }
                note.final_score = Some(calculate_score(note, &bareme));
                self.commit(next);
                Ok(true)
            }
            Some(JudgeScope::Imported(index)) => {
                let previous = self.imported_judges[index].notes.get(clip_id);
                let current: Vec<f64> = group
                    .criteria
                    .iter()
                    .map(|c| criterion_numeric_score(previous, c))
                    .collect();
                let parts = distribute_category_score(&group.criteria, &current, target);
                Ok(self.update_imported(index, clip_id, &bareme, |note| {
                    let mut changed = false;
                    for (criterion, part) in group.criteria.iter().zip(&parts) {
                        changed |= write_imported_score(note, &criterion.id, *part);
                    }
                    changed
                }))
            }
            None => {
                debug!("Unknown scope {}, ignoring category value", scope);
                Ok(false)
            }
        }
    }

    fn update_imported<F>(&mut self, index: usize, clip_id: &str, bareme: &Bareme, apply: F) -> bool
    where
        F: FnOnce(&mut ImportedJudgeNote) -> bool,
    {
        let Some(judge) = self.imported_judges.get_mut(index) else {
            return false;
        };
        let note = judge.notes.entry(clip_id.to_string()).or_default();
        if !apply(note) {
            return false;
        }
        note.final_score = Some(note_total(Some(&*note), &bareme.criteria));
        true
    }

    // =========================================================================
    // FREE-TEXT NOTES
    // =========================================================================

    pub fn set_text_notes(&mut self, clip_id: &str, text: &str) -> bool {
        self.edit_note(clip_id, |note| {
            if note.text_notes == text {
                return false;
            }
            note.text_notes = text.to_string();
            true
        })
    }

    pub fn set_criterion_note(&mut self, clip_id: &str, criterion_id: &str, text: &str) -> bool {
        self.edit_note(clip_id, |note| {
            if note.criterion_notes.get(criterion_id).map_or("", String::as_str) == text {
                return false;
            }
            note.criterion_notes.insert(criterion_id.to_string(), text.to_string());
            true
        })
    }

    pub fn set_category_note(&mut self, clip_id: &str, category: &str, text: &str) -> bool {
        self.edit_note(clip_id, |note| {
            if note.category_notes.get(category).map_or("", String::as_str) == text {
                return false;
            }
            note.category_notes.insert(category.to_string(), text.to_string());
            true
        })
    }

    fn edit_note<F>(&mut self, clip_id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut Note) -> bool,
    {
        let Some(bareme_id) = self.library.current().map(|b| b.id.clone()) else {
            return false;
        };
        let mut next = self.notes.clone();
        let note = next
            .entry(clip_id.to_string())
            .or_insert_with(|| Note::new(clip_id, &bareme_id));
        if !edit(note) {
            return false;
        }
        self.commit(next);
        true
    }

    fn commit(&mut self, next: Notes) {
        let previous = std::mem::replace(&mut self.notes, next);
        self.history.push(previous);
    }

    /// Restore the state before the last mutation. Returns false when there
    /// is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.notes = previous;
                true
            }
            None => false,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop the note of a removed clip. Older snapshots still hold it, so
    /// the undo history is cleared like any bulk change.
    pub fn remove_note(&mut self, clip_id: &str) -> bool {
        self.history.clear();
        self.notes.remove(clip_id).is_some()
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Replace every note with `data`. Clears the undo history.
    pub fn load_notes(&mut self, data: NotesData) {
        self.notes = data.into_iter().map(|(clip_id, note)| (clip_id, Note::from(note))).collect();
        self.history.clear();
        info!("Loaded notes for {} clips", self.notes.len());
    }

    pub fn get_notes_data(&self) -> NotesData {
        self.notes
            .iter()
            .map(|(clip_id, note)| (clip_id.clone(), NoteData::from(note)))
            .collect()
    }

    pub fn notes(&self) -> &Notes {
        &self.notes
    }

    // =========================================================================
    // READERS
    // =========================================================================

    pub fn note_for_clip(&self, clip_id: &str) -> Option<&Note> {
        self.notes.get(clip_id)
    }

    /// A copy of the clip's note with its final score filled in.
    pub fn note_snapshot(&self, clip_id: &str) -> Option<Note> {
        let mut note = self.notes.get(clip_id)?.clone();
        if let Some(bareme) = self.library.current().filter(|b| b.id == note.bareme_id) {
            note.final_score = Some(calculate_score(&note, bareme));
        }
        Some(note)
    }

    /// Final score of the clip under the active rubric. Computed on demand so
    /// loaded notes without a stored score still report one.
    pub fn score_for_clip(&self, clip_id: &str) -> Option<f64> {
        let note = self.notes.get(clip_id)?;
        match self.library.current() {
            Some(bareme) if bareme.id == note.bareme_id => Some(calculate_score(note, bareme)),
            _ => note.final_score,
        }
    }

    /// Sum of a category for the judge addressed by `scope`. Unknown
    /// category or scope reads as 0.
    pub fn category_score(&self, clip_id: &str, category: &str, scope: &str) -> f64 {
        let Some(group) = self.library.current().and_then(|b| b.category(category)) else {
            return 0.0;
        };
        match self.resolve_scope(scope) {
            Some(JudgeScope::Current) => category_score(self.notes.get(clip_id), &group.criteria),
            Some(JudgeScope::Imported(index)) => {
                category_score(self.imported_judges[index].notes.get(clip_id), &group.criteria)
            }
            None => 0.0,
        }
    }

    /// Clamped total of an imported judge for one clip.
    pub fn imported_total(&self, index: usize, clip_id: &str) -> Option<f64> {
        let bareme = self.library.current()?;
        let note = self.imported_judges.get(index)?.notes.get(clip_id)?;
        Some(note_total(Some(note), &bareme.criteria))
    }

    pub fn is_clip_complete(&self, clip_id: &str) -> bool {
        match (self.notes.get(clip_id), self.library.current()) {
            (Some(note), Some(bareme)) => is_note_complete(note, bareme),
            _ => false,
        }
    }

    // =========================================================================
    // RUBRICS
    // =========================================================================

    pub fn current_bareme(&self) -> Option<&Bareme> {
        self.library.current()
    }

    pub fn library(&self) -> &BaremeLibrary {
        &self.library
    }

    pub fn set_bareme(&mut self, bareme: Bareme) {
        info!("Active rubric set to {}", bareme.id);
        self.library.set_current(bareme);
    }

    pub fn select_bareme(&mut self, id: &str) -> bool {
        self.library.select(id)
    }

    pub fn add_bareme(&mut self, bareme: Bareme) {
        self.library.upsert(bareme);
    }

    pub fn remove_bareme(&mut self, id: &str) -> bool {
        self.library.remove(id)
    }

    pub fn load_custom_baremes(&mut self, items: &[Value]) {
        self.library.load_custom(items);
    }

    // =========================================================================
    // IMPORTED JUDGES
    // =========================================================================

    pub fn imported_judges(&self) -> &[ImportedJudgeData] {
        &self.imported_judges
    }

    pub fn set_imported_judges(&mut self, judges: Vec<ImportedJudgeData>) {
        self.imported_judges = judges;
    }

    /// Add a judge, replacing any judge with the same name (case-insensitive).
    /// Clears the undo history like any bulk import.
    pub fn add_imported_judge(&mut self, judge: ImportedJudgeData) {
        let name = judge.judge_name.to_lowercase();
        self.imported_judges.retain(|j| j.judge_name.to_lowercase() != name);
        info!("Imported judge {} ({} notes)", judge.judge_name, judge.notes.len());
        self.imported_judges.push(judge);
        self.history.clear();
    }

    pub fn remove_imported_judge(&mut self, index: usize) -> bool {
        if index >= self.imported_judges.len() {
            return false;
        }
        self.imported_judges.remove(index);
        true
    }

    pub fn rename_imported_judge(&mut self, index: usize, name: &str) -> bool {
        let trimmed = name.trim();
        match self.imported_judges.get_mut(index) {
            Some(judge) if !trimmed.is_empty() => {
                judge.judge_name = trimmed.to_string();
                true
            }
            _ => false,
        }
    }
}

/// Normalize, validate and store one value. Returns false when the stored
/// score is already identical.
fn write_score(note: &mut Note, criterion: &Criterion, raw: CriterionValue) -> bool {
    let value = normalize_value(criterion, raw);
    let validation = validate_criterion_value(Some(&value), criterion);
    let score = CriterionScore {
        criterion_id: criterion.id.clone(),
        value,
        is_valid: validation.is_valid,
        validation_errors: validation.errors,
    };
    if note.scores.get(&criterion.id) == Some(&score) {
        return false;
    }
    note.scores.insert(criterion.id.clone(), score);
    true
}

fn write_imported_score(note: &mut ImportedJudgeNote, criterion_id: &str, value: f64) -> bool {
    let score = ImportedJudgeScore {
        value: CriterionValue::Number(value),
        is_valid: true,
    };
    if note.scores.get(criterion_id) == Some(&score) {
        return false;
    }
    note.scores.insert(criterion_id.to_string(), score);
    true
}

/// Imported values are clamped with an unset minimum read as 0.
fn imported_clamp(criterion: &Criterion, n: f64) -> f64 {
    let floored = n.max(criterion.min.unwrap_or(0.0));
    if criterion.max.is_some() {
        clamp_to_bounds(criterion, floored)
    } else {
        floored
    }
}
