//! Project file shapes.
//!
//! Fields serialize in camelCase; snake_case aliases are accepted on read
//! for files written by older builds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::notation::{ImportedJudgeData, NotesData};

/// Written into every saved project.
pub const PROJECT_FORMAT_VERSION: &str = "1.0";

pub const DEFAULT_PROJECT_NAME: &str = "Projet AMV";

// =============================================================================
// CLIPS
// =============================================================================

/// One video under judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,
    #[serde(default, alias = "file_name")]
    pub file_name: String,
    #[serde(default, alias = "file_path")]
    pub file_path: String,
    #[serde(default, alias = "display_name")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Seconds; 0 when unknown.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub scored: bool,
    #[serde(default)]
    pub order: u32,
}

impl Clip {
    /// A clip for `file_path`, with display name and author derived from
    /// the file name (`Author-Title_words.mp4`).
    pub fn from_path(id: &str, file_path: &str, order: u32) -> Self {
        let file_name = file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_path)
            .to_string();
        let (display_name, author) = parse_clip_name(&file_name);
        Self {
            id: id.to_string(),
            file_name,
            file_path: file_path.to_string(),
            display_name,
            author,
            duration: 0.0,
            scored: false,
            order,
        }
    }

    /// Label shown first in lists: author, then display name, then file name.
    pub fn primary_label(&self) -> &str {
        fn non_empty(s: &str) -> Option<&str> {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        }
        self.author
            .as_deref()
            .and_then(non_empty)
            .or_else(|| non_empty(&self.display_name))
            .unwrap_or(&self.file_name)
    }

    pub fn has_video(&self) -> bool {
        !self.file_path.is_empty()
    }
}

/// Split `Author-Title_words.ext` into ("Title words", Some("Author")).
pub fn parse_clip_name(file_name: &str) -> (String, Option<String>) {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };
    let (author, title) = match stem.find('-') {
        Some(dash) if dash > 0 => (Some(&stem[..dash]), &stem[dash + 1..]),
        _ => (None, stem),
    };
    let author = author
        .map(|a| a.replace('_', " ").trim().to_string())
        .filter(|a| !a.is_empty());
    (title.replace('_', " ").trim().to_string(), author)
}

// =============================================================================
// PROJECT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    #[serde(alias = "auto_save")]
    pub auto_save: bool,
    /// Seconds between autosaves (capped by the debounce ceiling).
    #[serde(alias = "auto_save_interval")]
    pub auto_save_interval: u64,
    #[serde(alias = "default_playback_speed")]
    pub default_playback_speed: f64,
    #[serde(alias = "default_volume")]
    pub default_volume: f64,
    #[serde(alias = "judge_colors")]
    pub judge_colors: BTreeMap<String, String>,
    #[serde(alias = "hide_final_score_until_end")]
    pub hide_final_score_until_end: bool,
    #[serde(alias = "hide_totals")]
    pub hide_totals: bool,
    #[serde(alias = "show_miniatures")]
    pub show_miniatures: bool,
    #[serde(alias = "show_add_row_button")]
    pub show_add_row_button: bool,
    #[serde(alias = "thumbnail_default_time_sec")]
    pub thumbnail_default_time_sec: f64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_save_interval: 30,
            default_playback_speed: 1.0,
            default_volume: 80.0,
            judge_colors: BTreeMap::new(),
            hide_final_score_until_end: false,
            hide_totals: false,
            show_miniatures: false,
            show_add_row_button: false,
            thumbnail_default_time_sec: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default, alias = "judge_name")]
    pub judge_name: String,
    #[serde(default, alias = "created_at")]
    pub created_at: String,
    #[serde(default, alias = "updated_at")]
    pub updated_at: String,
    #[serde(default, alias = "bareme_id")]
    pub bareme_id: String,
    #[serde(default, alias = "clips_folder_path")]
    pub clips_folder_path: String,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default, alias = "file_path", skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

/// The whole project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub version: String,
    pub project: Project,
    #[serde(default, alias = "bareme_id")]
    pub bareme_id: String,
    #[serde(default)]
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub notes: NotesData,
    #[serde(default, alias = "imported_judges")]
    pub imported_judges: Vec<ImportedJudgeData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_clip_name() {
        assert_eq!(
            parse_clip_name("Some_Author-My_Great_AMV.mkv"),
            ("My Great AMV".to_string(), Some("Some Author".to_string()))
        );
        assert_eq!(parse_clip_name("solo.mp4"), ("solo".to_string(), None));
        assert_eq!(parse_clip_name("-weird.mp4"), ("-weird".to_string(), None));
    }

    #[test]
    fn test_primary_label_fallbacks() {
        let mut clip = Clip::from_path("1", "/videos/Author-Title.mp4", 0);
        assert_eq!(clip.file_name, "Author-Title.mp4");
        assert_eq!(clip.primary_label(), "Author");
        clip.author = None;
        assert_eq!(clip.primary_label(), "Title");
        clip.display_name = "  ".to_string();
        assert_eq!(clip.primary_label(), "Author-Title.mp4");
    }

    #[test]
    fn test_settings_accept_partial_and_snake_case() {
        let settings: ProjectSettings = serde_json::from_value(json!({
            "auto_save": false,
            "autoSaveInterval": 5
        }))
        .unwrap();
        assert!(!settings.auto_save);
        assert_eq!(settings.auto_save_interval, 5);
        assert_eq!(settings.default_volume, 80.0);
    }
}
