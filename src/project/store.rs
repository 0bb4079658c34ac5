use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::notation::{ImportedJudgeData, NotesData};

use super::types::{Clip, Project, ProjectData, ProjectSettings, PROJECT_FORMAT_VERSION};

/// Clip indices ordered by primary label (case-insensitive), ties kept in
/// insertion order.
pub fn sorted_clip_indices(clips: &[Clip]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..clips.len()).collect();
    indices.sort_by_cached_key(|&i| (clips[i].primary_label().to_lowercase(), i));
    indices
}

/// Position of `clips[index]` in label order, or `None` when out of range.
pub fn sorted_clip_position(clips: &[Clip], index: usize) -> Option<usize> {
    if index >= clips.len() {
        return None;
    }
    sorted_clip_indices(clips).iter().position(|&i| i == index)
}

/// Project metadata, clips, selection and the dirty flag.
///
/// Every change bumps an edit generation. The autosave path remembers the
/// generation it saved and only marks the project clean if nothing changed
/// meanwhile.
#[derive(Debug, Default)]
pub struct ProjectStore {
    project: Option<Project>,
    clips: Vec<Clip>,
    current_clip_index: usize,
    dirty: bool,
    generation: u64,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_project(&mut self, name: &str, judge_name: &str, bareme_id: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        self.project = Some(Project {
            id: format!("project-{}", chrono::Utc::now().timestamp_millis()),
            name: name.to_string(),
            judge_name: judge_name.to_string(),
            created_at: now.clone(),
            updated_at: now,
            bareme_id: bareme_id.to_string(),
            clips_folder_path: String::new(),
            settings: ProjectSettings::default(),
            file_path: None,
        });
        self.clips.clear();
        self.current_clip_index = 0;
        self.mark_dirty();
        info!("Created project {}", name);
    }

    /// Install a loaded project. Returns the notes and imported judges for
    /// the notation store. The project starts clean.
    pub fn load(&mut self, data: ProjectData) -> (NotesData, Vec<ImportedJudgeData>) {
        let mut project = data.project;
        if project.bareme_id.is_empty() {
            project.bareme_id = data.bareme_id;
        }
        let judges: Vec<ImportedJudgeData> = data
            .imported_judges
            .into_iter()
            .filter(|j| !j.judge_name.trim().is_empty())
            .map(|mut j| {
                j.judge_name = j.judge_name.trim().to_string();
                j
            })
            .collect();
        info!("Loaded project {} with {} clips", project.name, data.clips.len());
        self.project = Some(project);
        self.clips = data.clips;
        self.current_clip_index = 0;
        self.dirty = false;
        self.generation += 1;
        (data.notes, judges)
    }

    /// Snapshot for saving. `None` when no project is open.
    pub fn project_data(&self, notes: NotesData, imported_judges: Vec<ImportedJudgeData>) -> Option<ProjectData> {
        let project = self.project.clone()?;
        Some(ProjectData {
            version: PROJECT_FORMAT_VERSION.to_string(),
            bareme_id: project.bareme_id.clone(),
            project,
            clips: self.clips.clone(),
            notes,
            imported_judges,
        })
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn settings(&self) -> ProjectSettings {
        self.project.as_ref().map(|p| p.settings.clone()).unwrap_or_default()
    }

    pub fn update_settings<F>(&mut self, update: F) -> bool
    where
        F: FnOnce(&mut ProjectSettings),
    {
        let Some(project) = self.project.as_mut() else {
            return false;
        };
        update(&mut project.settings);
        project.updated_at = chrono::Utc::now().to_rfc3339();
        self.mark_dirty();
        true
    }

    pub fn set_bareme_id(&mut self, bareme_id: &str) {
        if let Some(project) = self.project.as_mut() {
            if project.bareme_id != bareme_id {
                project.bareme_id = bareme_id.to_string();
                self.mark_dirty();
            }
        }
    }

    // =========================================================================
    // CLIPS & NAVIGATION
    // =========================================================================

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn set_clips(&mut self, clips: Vec<Clip>) {
        self.clips = clips;
        if self.current_clip_index >= self.clips.len() {
            self.current_clip_index = self.clips.len().saturating_sub(1);
        }
        self.mark_dirty();
    }

    /// Remove a clip, keeping the selection on a neighbouring clip.
    pub fn remove_clip(&mut self, clip_id: &str) -> bool {
        let Some(removed) = self.clips.iter().position(|c| c.id == clip_id) else {
            return false;
        };
        self.clips.remove(removed);
        if removed <= self.current_clip_index && self.current_clip_index > 0 {
            self.current_clip_index -= 1;
        }
        if self.current_clip_index >= self.clips.len() {
            self.current_clip_index = self.clips.len().saturating_sub(1);
        }
        self.mark_dirty();
        true
    }

    pub fn current_clip_index(&self) -> usize {
        self.current_clip_index
    }

    pub fn current_clip(&self) -> Option<&Clip> {
        self.clips.get(self.current_clip_index)
    }

    pub fn clip_index(&self, clip_id: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.id == clip_id)
    }

    pub fn set_current_clip(&mut self, index: usize) -> bool {
        if index >= self.clips.len() || index == self.current_clip_index {
            return false;
        }
        self.current_clip_index = index;
        true
    }

    pub fn next_clip(&mut self) -> bool {
        self.set_current_clip(self.current_clip_index + 1)
    }

    pub fn previous_clip(&mut self) -> bool {
        match self.current_clip_index.checked_sub(1) {
            Some(index) => self.set_current_clip(index),
            None => false,
        }
    }

    /// Position of the current clip in label order.
    pub fn current_sorted_position(&self) -> usize {
        sorted_clip_position(&self.clips, self.current_clip_index).unwrap_or(self.current_clip_index)
    }

    pub fn mark_clip_scored(&mut self, clip_id: &str, scored: bool) -> bool {
        match self.clips.iter_mut().find(|c| c.id == clip_id) {
            Some(clip) if clip.scored != scored => {
                clip.scored = scored;
                self.mark_dirty();
                true
            }
            _ => false,
        }
    }

    pub fn all_clips_scored(&self) -> bool {
        !self.clips.is_empty() && self.clips.iter().all(|c| c.scored)
    }

    // =========================================================================
    // DIRTY TRACKING & DESTINATION
    // =========================================================================

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.generation += 1;
    }

    /// Mark clean only when no edit happened since `generation` was read.
    pub fn mark_clean_if(&mut self, generation: u64) -> bool {
        if self.generation != generation {
            debug!("Project edited during save, staying dirty");
            return false;
        }
        self.dirty = false;
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .and_then(|p| p.file_path.as_deref())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Record where the project lives. Does not dirty the project.
    pub fn set_file_path(&mut self, path: &str) {
        if let Some(project) = self.project.as_mut() {
            project.file_path = Some(path.to_string());
        }
    }

    /// Debounce before an autosave: the project interval, capped by `ceiling`.
    /// `None` when autosave is off or no project is open.
    pub fn autosave_delay(&self, ceiling: Duration) -> Option<Duration> {
        let settings = &self.project.as_ref()?.settings;
        if !settings.auto_save {
            return None;
        }
        Some(Duration::from_secs(settings.auto_save_interval).min(ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, name: &str) -> Clip {
        let mut clip = Clip::from_path(id, &format!("/v/{}.mp4", name), 0);
        clip.author = None;
        clip
    }

    fn store_with(names: &[&str]) -> ProjectStore {
        let mut store = ProjectStore::new();
        store.create_project("P", "J1", "official-amv-2026");
        store.set_clips(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| clip(&format!("c{}", i), n))
                .collect(),
        );
        store
    }

    #[test]
    fn test_sorted_position_is_case_insensitive_and_stable() {
        let store = store_with(&["beta", "Alpha", "alpha", "Gamma"]);
        assert_eq!(sorted_clip_indices(store.clips()), vec![1, 2, 0, 3]);
        assert_eq!(sorted_clip_position(store.clips(), 0), Some(2));
        assert_eq!(sorted_clip_position(store.clips(), 9), None);
    }

    #[test]
    fn test_navigation_bounds() {
        let mut store = store_with(&["a", "b"]);
        assert!(!store.previous_clip());
        assert!(store.next_clip());
        assert!(!store.next_clip());
        assert_eq!(store.current_clip().unwrap().id, "c1");
    }

    #[test]
    fn test_remove_clip_adjusts_selection() {
        let mut store = store_with(&["a", "b", "c"]);
        store.set_current_clip(2);
        assert!(store.remove_clip("c0"));
        assert_eq!(store.current_clip().unwrap().id, "c2");
        assert!(store.remove_clip("c2"));
        assert_eq!(store.current_clip().unwrap().id, "c1");
        assert!(!store.remove_clip("missing"));
    }

    #[test]
    fn test_clean_only_if_generation_unchanged() {
        let mut store = store_with(&["a"]);
        let seen = store.generation();
        store.mark_dirty();
        assert!(!store.mark_clean_if(seen));
        assert!(store.is_dirty());
        assert!(store.mark_clean_if(store.generation()));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_autosave_delay_capped() {
        let mut store = store_with(&["a"]);
        let ceiling = Duration::from_millis(2500);
        assert_eq!(store.autosave_delay(ceiling), Some(ceiling));
        store.update_settings(|s| s.auto_save_interval = 1);
        assert_eq!(store.autosave_delay(ceiling), Some(Duration::from_secs(1)));
        store.update_settings(|s| s.auto_save = false);
        assert_eq!(store.autosave_delay(ceiling), None);
    }

    #[test]
    fn test_round_trip_through_project_data() {
        let mut store = store_with(&["a"]);
        store.mark_clip_scored("c0", true);
        store.set_file_path("/tmp/p.json");
        let data = store.project_data(NotesData::new(), Vec::new()).unwrap();
        assert_eq!(data.version, "1.0");

        let mut reloaded = ProjectStore::new();
        reloaded.load(data);
        assert!(!reloaded.is_dirty());
        assert!(reloaded.all_clips_scored());
        assert_eq!(reloaded.file_path(), Some(PathBuf::from("/tmp/p.json")));
    }
}
