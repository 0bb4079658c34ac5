//! Per-window scoring session.
//!
//! One [`ScoringSession`] owns everything a window edits: the notation
//! store, the project store and the two draft ledgers of the grids. Hosts
//! share it as `Arc<Mutex<ScoringSession>>` between the UI, the bridge and
//! the autosave task.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::autosave::DirtySignal;
use crate::bareme::{Bareme, BaremeLibrary};
use crate::bridge::{build_note_markers, ClipData, ClipInfo, Direction, OverlayMarkers};
use crate::config::SyncConfig;
use crate::draft::{CellKey, DraftCellLedger};
use crate::error::NotationError;
use crate::notation::{CriterionValue, JudgeScope, NotationStore, Note, ScoreSource};
use crate::project::{
    load_project_file, normalize_imported_judge, sorted_clip_position, Clip, ProjectData, ProjectSettings,
    ProjectStore, DEFAULT_PROJECT_NAME,
};

/// Text shown in a grid cell for a number: no trailing zeros.
pub fn format_score(value: f64) -> String {
    format!("{}", (value * 1000.0).round() / 1000.0)
}

fn format_value(value: &CriterionValue) -> String {
    match value {
        CriterionValue::Number(n) => format_score(*n),
        CriterionValue::Text(s) => s.clone(),
        CriterionValue::Bool(b) => b.to_string(),
    }
}

#[derive(Debug)]
pub struct ScoringSession {
    config: SyncConfig,
    notation: NotationStore,
    project: ProjectStore,
    category_drafts: DraftCellLedger,
    criterion_drafts: DraftCellLedger,
    dirty_signal: Option<DirtySignal>,
    fps_hint: Option<f64>,
}

impl ScoringSession {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_library(BaremeLibrary::new(), config)
    }

    pub fn with_library(library: BaremeLibrary, config: SyncConfig) -> Self {
        Self {
            notation: NotationStore::with_library(library, &config),
            project: ProjectStore::new(),
            category_drafts: DraftCellLedger::new(),
            criterion_drafts: DraftCellLedger::new(),
            dirty_signal: None,
            fps_hint: None,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn notation(&self) -> &NotationStore {
        &self.notation
    }

    pub fn project(&self) -> &ProjectStore {
        &self.project
    }

    pub fn set_dirty_signal(&mut self, signal: DirtySignal) {
        self.dirty_signal = Some(signal);
    }

    fn notify_dirty(&self) {
        if let Some(signal) = &self.dirty_signal {
            signal.notify();
        }
    }

    fn touch(&mut self) {
        self.project.mark_dirty();
        self.notify_dirty();
    }

    /// Dirty bookkeeping after a score change on `clip_id`.
    fn after_score_change(&mut self, clip_id: &str) {
        let complete = self.notation.is_clip_complete(clip_id);
        self.project.mark_clip_scored(clip_id, complete);
        self.touch();
    }

    pub fn current_scope(&self) -> String {
        self.notation.current_scope().to_string()
    }

    /// Address the local judge with `scope` (grids use the judge's name).
    pub fn set_current_scope(&mut self, scope: &str) {
        self.notation.set_current_scope(scope);
    }

    // =========================================================================
    // GRID CELLS
    // =========================================================================

    /// Stage text typed into a category total cell.
    pub fn stage_category_cell(&mut self, clip_id: &str, category: &str, scope: &str, raw: &str) {
        self.category_drafts.set(CellKey::new(clip_id, category, scope), raw);
    }

    pub fn stage_criterion_cell(&mut self, clip_id: &str, criterion_id: &str, scope: &str, raw: &str) {
        self.criterion_drafts.set(CellKey::new(clip_id, criterion_id, scope), raw);
    }

    /// Commit a category cell: the staged number is spread over the
    /// category's criteria. Non-numeric drafts are dropped. Returns whether
    /// any score changed.
    pub fn commit_category_cell(&mut self, clip_id: &str, category: &str, scope: &str) -> Result<bool, NotationError> {
        let key = CellKey::new(clip_id, category, scope);
        let Some(target) = self.category_drafts.commit(&key, |value| value) else {
            return Ok(false);
        };
        self.apply_category_value(clip_id, category, scope, target)
    }

    pub fn commit_criterion_cell(&mut self, clip_id: &str, criterion_id: &str, scope: &str) -> bool {
        let key = CellKey::new(clip_id, criterion_id, scope);
        let Some(value) = self.criterion_drafts.commit(&key, |value| value) else {
            return false;
        };
        self.apply_criterion_value(clip_id, criterion_id, scope, CriterionValue::Number(value))
    }

    pub fn cancel_category_cell(&mut self, clip_id: &str, category: &str, scope: &str) {
        self.category_drafts.clear(&CellKey::new(clip_id, category, scope));
    }

    pub fn cancel_criterion_cell(&mut self, clip_id: &str, criterion_id: &str, scope: &str) {
        self.criterion_drafts.clear(&CellKey::new(clip_id, criterion_id, scope));
    }

    /// What a category cell shows: the draft, else the stored sum.
    pub fn category_cell_display(&self, clip_id: &str, category: &str, scope: &str) -> String {
        let stored = format_score(self.notation.category_score(clip_id, category, scope));
        self.category_drafts
            .display_value(&CellKey::new(clip_id, category, scope), &stored)
    }

    /// What a criterion cell shows: the draft, else the stored value, else
    /// nothing.
    pub fn criterion_cell_display(&self, clip_id: &str, criterion_id: &str, scope: &str) -> String {
        let stored = match self.notation.resolve_scope(scope) {
            Some(JudgeScope::Current) => self
                .notation
                .note_for_clip(clip_id)
                .and_then(|note| note.scores.get(criterion_id))
                .map(|score| format_value(&score.value)),
            Some(JudgeScope::Imported(index)) => self
                .notation
                .imported_judges()
                .get(index)
                .and_then(|judge| judge.notes.get(clip_id))
                .and_then(|note| note.score_entry(criterion_id))
                .map(|(value, _)| format_value(value)),
            None => None,
        };
        self.criterion_drafts.display_value(
            &CellKey::new(clip_id, criterion_id, scope),
            stored.as_deref().unwrap_or(""),
        )
    }

    // =========================================================================
    // DIRECT EDITS
    // =========================================================================

    pub fn apply_criterion_value(&mut self, clip_id: &str, criterion_id: &str, scope: &str, value: CriterionValue) -> bool {
        let changed = self.notation.apply_criterion_value(clip_id, criterion_id, scope, value);
        if changed {
            self.after_score_change(clip_id);
        }
        changed
    }

    pub fn apply_category_value(
        &mut self,
        clip_id: &str,
        category: &str,
        scope: &str,
        target: f64,
    ) -> Result<bool, NotationError> {
        let changed = self.notation.apply_category_value(clip_id, category, scope, target)?;
        if changed {
            self.after_score_change(clip_id);
        }
        Ok(changed)
    }

    pub fn set_text_notes(&mut self, clip_id: &str, text: &str) -> bool {
        let changed = self.notation.set_text_notes(clip_id, text);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn set_criterion_note(&mut self, clip_id: &str, criterion_id: &str, text: &str) -> bool {
        let changed = self.notation.set_criterion_note(clip_id, criterion_id, text);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn set_category_note(&mut self, clip_id: &str, category: &str, text: &str) -> bool {
        let changed = self.notation.set_category_note(clip_id, category, text);
        if changed {
            self.touch();
        }
        changed
    }

    /// Undo the last note mutation. Only an actual undo dirties the project.
    pub fn undo(&mut self) -> bool {
        if !self.notation.undo() {
            debug!("Nothing to undo");
            return false;
        }
        let scored: Vec<(String, bool)> = self
            .project
            .clips()
            .iter()
            .map(|clip| (clip.id.clone(), self.notation.is_clip_complete(&clip.id)))
            .collect();
        for (clip_id, complete) in scored {
            self.project.mark_clip_scored(&clip_id, complete);
        }
        self.touch();
        true
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    pub fn navigate(&mut self, direction: Direction) -> bool {
        match direction {
            Direction::Next => self.project.next_clip(),
            Direction::Prev => self.project.previous_clip(),
        }
    }

    /// Select the clip with `clip_id`. Returns false when it does not exist.
    pub fn select_clip(&mut self, clip_id: &str) -> bool {
        match self.project.clip_index(clip_id) {
            Some(index) => {
                self.project.set_current_clip(index);
                true
            }
            None => false,
        }
    }

    pub fn set_fps_hint(&mut self, fps: Option<f64>) {
        self.fps_hint = fps;
    }

    /// Frame rate used to read `hh:mm:ss:ff` timecodes.
    pub fn fps(&self) -> f64 {
        self.fps_hint.unwrap_or(self.config.bridge.default_fps)
    }

    // =========================================================================
    // PROJECT
    // =========================================================================

    /// Start a new project under the active rubric. Notes and imported
    /// judges are reset.
    pub fn create_project(&mut self, name: &str, judge_name: &str) {
        let name = match name.trim() {
            "" => DEFAULT_PROJECT_NAME,
            trimmed => trimmed,
        };
        let bareme_id = self.notation.current_bareme().map(|b| b.id.clone()).unwrap_or_default();
        self.project.create_project(name, judge_name, &bareme_id);
        self.notation.load_notes(Default::default());
        self.notation.set_imported_judges(Vec::new());
        self.clear_drafts();
        self.notify_dirty();
    }

    /// Install a loaded project. Its rubric becomes active when known.
    pub fn load_project(&mut self, data: ProjectData) {
        let bareme_id = if data.project.bareme_id.is_empty() {
            data.bareme_id.clone()
        } else {
            data.project.bareme_id.clone()
        };
        if !bareme_id.is_empty() && !self.notation.select_bareme(&bareme_id) {
            debug!("Project rubric {} is not available, keeping the active one", bareme_id);
        }
        let (notes, judges) = self.project.load(data);
        self.notation.load_notes(notes);
        self.notation.set_imported_judges(judges);
        self.clear_drafts();
        self.fps_hint = None;
    }

    /// Load the project file at `path` and remember it as the destination.
    pub fn open_project_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let data = load_project_file(path)?;
        self.load_project(data);
        self.project.set_file_path(&path.to_string_lossy());
        Ok(())
    }

    pub fn project_data(&self) -> Option<ProjectData> {
        self.project
            .project_data(self.notation.get_notes_data(), self.notation.imported_judges().to_vec())
    }

    pub fn set_file_path(&mut self, path: &Path) {
        self.project.set_file_path(&path.to_string_lossy());
    }

    pub fn mark_clean_if(&mut self, generation: u64) -> bool {
        self.project.mark_clean_if(generation)
    }

    pub fn set_clips(&mut self, clips: Vec<Clip>) {
        self.project.set_clips(clips);
        self.notify_dirty();
    }

    /// Remove a clip with its note and drafts.
    pub fn remove_clip(&mut self, clip_id: &str) -> bool {
        if !self.project.remove_clip(clip_id) {
            return false;
        }
        self.notation.remove_note(clip_id);
        self.category_drafts.clear_clip(clip_id);
        self.criterion_drafts.clear_clip(clip_id);
        self.notify_dirty();
        true
    }

    pub fn update_settings<F>(&mut self, update: F) -> bool
    where
        F: FnOnce(&mut ProjectSettings),
    {
        let changed = self.project.update_settings(update);
        if changed {
            self.notify_dirty();
        }
        changed
    }

    pub fn toggle_miniatures(&mut self) -> bool {
        self.update_settings(|s| s.show_miniatures = !s.show_miniatures)
    }

    /// Activate a rubric by id and record it on the project.
    pub fn select_bareme(&mut self, id: &str) -> bool {
        if !self.notation.select_bareme(id) {
            return false;
        }
        let generation = self.project.generation();
        self.project.set_bareme_id(id);
        if self.project.generation() != generation {
            self.notify_dirty();
        }
        true
    }

    pub fn add_bareme(&mut self, bareme: Bareme) {
        self.notation.add_bareme(bareme);
    }

    /// Remove a custom rubric. When it was active the official rubric takes
    /// over and the project records the switch.
    pub fn remove_bareme(&mut self, id: &str) -> bool {
        if !self.notation.remove_bareme(id) {
            return false;
        }
        if let Some(active) = self.notation.current_bareme().map(|b| b.id.clone()) {
            let generation = self.project.generation();
            self.project.set_bareme_id(&active);
            if self.project.generation() != generation {
                self.notify_dirty();
            }
        }
        true
    }

    pub fn load_custom_baremes(&mut self, items: &[Value]) {
        self.notation.load_custom_baremes(items);
    }

    /// Import another judge's project JSON. Returns false when none of its
    /// notes match a clip of this project.
    pub fn import_judge(&mut self, raw: &Value) -> bool {
        let Some(judge) = normalize_imported_judge(raw, self.project.clips()) else {
            info!("Imported file has no notes for this project's clips");
            return false;
        };
        self.notation.add_imported_judge(judge);
        self.touch();
        true
    }

    pub fn remove_imported_judge(&mut self, index: usize) -> bool {
        let removed = self.notation.remove_imported_judge(index);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn rename_imported_judge(&mut self, index: usize, name: &str) -> bool {
        let renamed = self.notation.rename_imported_judge(index, name);
        if renamed {
            self.touch();
        }
        renamed
    }

    fn clear_drafts(&mut self) {
        self.category_drafts = DraftCellLedger::new();
        self.criterion_drafts = DraftCellLedger::new();
    }

    // =========================================================================
    // DERIVED VIEWS
    // =========================================================================

    fn all_clips_complete(&self) -> bool {
        let clips = self.project.clips();
        !clips.is_empty() && clips.iter().all(|c| self.notation.is_clip_complete(&c.id))
    }

    /// Whether totals are hidden: by the window, by the project, or until
    /// every clip is complete.
    pub fn hide_totals(&self, ui_hide_final_score: bool) -> bool {
        let settings = self.project.settings();
        let any_video = self.project.clips().iter().any(Clip::has_video);
        ui_hide_final_score
            || settings.hide_totals
            || (settings.hide_final_score_until_end && any_video && !self.all_clips_complete())
    }

    fn current_note(&self) -> Option<Note> {
        let clip = self.project.current_clip()?;
        self.notation.note_snapshot(&clip.id)
    }

    /// Overlay header for the current clip.
    pub fn clip_info(&self) -> Option<ClipInfo> {
        let clip = self.project.current_clip()?;
        Some(ClipInfo {
            name: clip.primary_label().to_string(),
            index: self.project.current_sorted_position(),
            total: self.project.clips().len(),
            has_video: clip.has_video(),
            miniatures_enabled: self.project.settings().show_miniatures,
        })
    }

    /// Timecode markers of the current clip's note.
    pub fn overlay_markers(&self) -> OverlayMarkers {
        let Some(clip) = self.project.current_clip() else {
            return OverlayMarkers::default();
        };
        let note = self.notation.note_for_clip(&clip.id);
        OverlayMarkers {
            clip_id: Some(clip.id.clone()),
            markers: build_note_markers(
                note,
                self.notation.current_bareme(),
                self.fps(),
                self.config.bridge.max_markers,
            ),
        }
    }

    /// Everything the notes window shows for the current clip.
    pub fn clip_data(&self, ui_hide_final_score: bool) -> ClipData {
        let clip = self.project.current_clip().cloned();
        let clip_index = sorted_clip_position(self.project.clips(), self.project.current_clip_index()).unwrap_or(0);
        ClipData {
            note: self.current_note(),
            clip,
            bareme: self.notation.current_bareme().cloned(),
            clip_index,
            total_clips: self.project.clips().len(),
            hide_totals: self.hide_totals(ui_hide_final_score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bareme::{official_bareme, Criterion};
    use crate::notation::CURRENT_SCOPE;
    use std::collections::BTreeMap;

    fn bareme() -> Bareme {
        Bareme {
            id: "test".to_string(),
            name: "Test".to_string(),
            description: None,
            is_official: false,
            hide_totals_until_all_scored: false,
            criteria: vec![
                Criterion::numeric("t1", "Montage", 10.0, Some("Technique")),
                Criterion::numeric("t2", "Encodage", 5.0, Some("Technique")),
            ],
            category_colors: BTreeMap::new(),
            total_points: 15.0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn session() -> ScoringSession {
        let mut session = ScoringSession::with_library(BaremeLibrary::with_active(bareme()), SyncConfig::default());
        session.create_project("P", "J1");
        session.set_clips(vec![
            Clip::from_path("c1", "/v/Zed-Intro.mp4", 0),
            Clip::from_path("c2", "/v/Amy-Outro.mp4", 1),
        ]);
        session.mark_clean_if(session.project().generation());
        session
    }

    #[test]
    fn test_category_cell_commit_marks_dirty() {
        let mut session = session();
        session.stage_category_cell("c1", "Technique", CURRENT_SCOPE, "8");
        assert_eq!(session.category_cell_display("c1", "Technique", CURRENT_SCOPE), "8");
        assert!(session.commit_category_cell("c1", "Technique", CURRENT_SCOPE).unwrap());

        assert!(session.project().is_dirty());
        assert_eq!(session.criterion_cell_display("c1", "t1", CURRENT_SCOPE), "5.5");
        assert_eq!(session.criterion_cell_display("c1", "t2", CURRENT_SCOPE), "2.5");
        assert_eq!(session.category_cell_display("c1", "Technique", CURRENT_SCOPE), "8");
    }

    #[test]
    fn test_non_numeric_draft_leaves_state_clean() {
        let mut session = session();
        session.stage_criterion_cell("c1", "t1", CURRENT_SCOPE, "abc");
        assert_eq!(session.criterion_cell_display("c1", "t1", CURRENT_SCOPE), "abc");
        assert!(!session.commit_criterion_cell("c1", "t1", CURRENT_SCOPE));
        assert_eq!(session.criterion_cell_display("c1", "t1", CURRENT_SCOPE), "");
        assert!(!session.project().is_dirty());
        assert!(session.notation().note_for_clip("c1").is_none());
    }

    #[test]
    fn test_complete_note_marks_clip_scored() {
        let mut session = session();
        session.apply_criterion_value("c1", "t1", CURRENT_SCOPE, 4.0.into());
        assert!(!session.project().clips()[0].scored);
        session.apply_criterion_value("c1", "t2", CURRENT_SCOPE, 3.0.into());
        assert!(session.project().clips()[0].scored);

        assert!(session.undo());
        assert!(!session.project().clips()[0].scored);
    }

    #[test]
    fn test_empty_undo_does_not_dirty() {
        let mut session = session();
        assert!(!session.undo());
        assert!(!session.project().is_dirty());
    }

    #[test]
    fn test_clip_info_uses_label_order() {
        let mut session = session();
        session.toggle_miniatures();
        let info = session.clip_info().unwrap();
        assert_eq!(info.name, "Zed");
        assert_eq!(info.index, 1);
        assert_eq!(info.total, 2);
        assert!(info.has_video);
        assert!(info.miniatures_enabled);
    }

    #[test]
    fn test_hide_totals_until_all_complete() {
        let mut session = session();
        assert!(!session.hide_totals(false));
        assert!(session.hide_totals(true));
        session.update_settings(|s| s.hide_final_score_until_end = true);
        assert!(session.hide_totals(false));
        for clip in ["c1", "c2"] {
            session.apply_criterion_value(clip, "t1", CURRENT_SCOPE, 1.0.into());
            session.apply_criterion_value(clip, "t2", CURRENT_SCOPE, 1.0.into());
        }
        assert!(!session.hide_totals(false));
    }

    #[test]
    fn test_load_project_selects_known_rubric() {
        let mut library = BaremeLibrary::with_active(bareme());
        library.upsert(official_bareme());
        let mut session = ScoringSession::with_library(library, SyncConfig::default());
        session.create_project("P", "J1");
        let mut data = session.project_data().unwrap();
        data.project.bareme_id = official_bareme().id;

        session.load_project(data);
        assert_eq!(session.notation().current_bareme().unwrap().id, official_bareme().id);
        assert!(!session.project().is_dirty());
    }

    #[test]
    fn test_remove_clip_drops_note_and_drafts() {
        let mut session = session();
        session.set_text_notes("c2", "bien");
        session.stage_criterion_cell("c2", "t1", CURRENT_SCOPE, "3");
        assert!(session.remove_clip("c2"));
        assert!(session.notation().note_for_clip("c2").is_none());
        assert_eq!(session.criterion_cell_display("c2", "t1", CURRENT_SCOPE), "");
    }

    #[test]
    fn test_undo_after_remove_clip_keeps_removed_note_out() {
        let mut session = session();
        session.apply_criterion_value("c2", "t1", CURRENT_SCOPE, 4.0.into());
        session.set_text_notes("c1", "0:10 intro");
        assert!(session.remove_clip("c2"));

        assert!(!session.undo());
        assert!(session.notation().note_for_clip("c2").is_none());
        let data = session.project_data().unwrap();
        assert!(!data.notes.contains_key("c2"));
        assert_eq!(data.notes["c1"].text_notes, "0:10 intro");
    }

    #[test]
    fn test_remove_active_bareme_falls_back_to_official() {
        let mut session = session();
        assert!(!session.remove_bareme(&official_bareme().id));
        assert!(session.remove_bareme("test"));
        assert_eq!(session.notation().current_bareme().unwrap().id, official_bareme().id);
        assert_eq!(session.project().project().unwrap().bareme_id, official_bareme().id);
        assert!(session.project().is_dirty());
        assert!(!session.remove_bareme("test"));
    }
}
