//! Importing another judge's project file for comparison.
//!
//! Notes are matched to the current clips by id, then by file name, then by
//! author and display name (case-insensitive). Unmatched notes are dropped.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::notation::{CriterionValue, ImportedJudgeData, ImportedJudgeNote, ImportedJudgeScore};

use super::types::Clip;

pub const DEFAULT_IMPORTED_JUDGE_NAME: &str = "Juge importé";

fn str_field<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| row.get(*key).and_then(Value::as_str))
}

fn object_field<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter().find_map(|key| row.get(*key).and_then(Value::as_object))
}

fn text_map(row: &Map<String, Value>, keys: &[&str]) -> Option<BTreeMap<String, String>> {
    let raw = object_field(row, keys)?;
    Some(
        raw.iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .filter_map(|(key, value)| value.as_str().map(|s| (key.clone(), s.to_string())))
            .collect(),
    )
}

fn display_author_key(author: Option<&str>, display_name: &str) -> String {
    format!("{}|{}", author.unwrap_or("").to_lowercase(), display_name.to_lowercase())
}

fn parse_value(raw: Option<&Value>) -> CriterionValue {
    match raw {
        Some(Value::Number(n)) => CriterionValue::Number(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) => CriterionValue::Text(s.clone()),
        Some(Value::Bool(b)) => CriterionValue::Bool(*b),
        _ => CriterionValue::Number(0.0),
    }
}

fn parse_note(raw: &Value) -> Option<ImportedJudgeNote> {
    let row = raw.as_object()?;
    let scores_raw = row.get("scores")?.as_object()?;
    let scores = scores_raw
        .iter()
        .filter_map(|(criterion_id, score)| {
            let score = score.as_object()?;
            Some((
                criterion_id.clone(),
                ImportedJudgeScore {
                    value: parse_value(score.get("value")),
                    is_valid: score.get("isValid").and_then(Value::as_bool) != Some(false),
                },
            ))
        })
        .collect();

    Some(ImportedJudgeNote {
        scores,
        final_score: row.get("finalScore").and_then(Value::as_f64).filter(|n| n.is_finite()),
        text_notes: str_field(row, &["textNotes", "text_notes"]).map(str::to_string),
        criterion_notes: text_map(row, &["criterionNotes", "criterion_notes"]),
        category_notes: text_map(row, &["categoryNotes", "category_notes"]),
    })
}

/// Build an imported judge from a project file's JSON. Returns `None` when
/// no note matches a current clip.
pub fn normalize_imported_judge(raw: &Value, current_clips: &[Clip]) -> Option<ImportedJudgeData> {
    let root = raw.as_object()?;
    let notes_raw = root.get("notes")?.as_object()?;

    let clip_ids: HashSet<&str> = current_clips.iter().map(|c| c.id.as_str()).collect();
    let by_file_name: HashMap<String, &str> = current_clips
        .iter()
        .map(|c| (c.file_name.to_lowercase(), c.id.as_str()))
        .collect();
    let by_display_author: HashMap<String, &str> = current_clips
        .iter()
        .map(|c| (display_author_key(c.author.as_deref(), &c.display_name), c.id.as_str()))
        .collect();

    // Clips of the imported file, by their id there.
    let imported_clips: HashMap<&str, (String, String)> = root
        .get("clips")
        .and_then(Value::as_array)
        .map(|clips| {
            clips
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|clip| {
                    let id = clip.get("id")?.as_str()?;
                    let file_name = str_field(clip, &["fileName", "file_name"]).unwrap_or("").to_lowercase();
                    let key = display_author_key(
                        clip.get("author").and_then(Value::as_str),
                        str_field(clip, &["displayName", "display_name"]).unwrap_or(""),
                    );
                    Some((id, (file_name, key)))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut notes = BTreeMap::new();
    for (source_id, note_raw) in notes_raw {
        let target = if clip_ids.contains(source_id.as_str()) {
            Some(source_id.as_str())
        } else {
            imported_clips.get(source_id.as_str()).and_then(|(file_name, key)| {
                by_file_name
                    .get(file_name)
                    .or_else(|| by_display_author.get(key))
                    .copied()
            })
        };
        let Some(target) = target else {
            debug!("No local clip for imported note {}", source_id);
            continue;
        };
        if let Some(note) = parse_note(note_raw) {
            notes.insert(target.to_string(), note);
        }
    }
    if notes.is_empty() {
        return None;
    }

    let project = root.get("project").and_then(Value::as_object);
    let judge_name = project
        .and_then(|p| str_field(p, &["judgeName", "judge_name"]))
        .or_else(|| str_field(root, &["judgeName"]))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_IMPORTED_JUDGE_NAME);

    Some(ImportedJudgeData {
        judge_name: judge_name.to_string(),
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local_clips() -> Vec<Clip> {
        vec![
            Clip::from_path("a", "/v/Alice-Opening.mp4", 0),
            Clip::from_path("b", "/v/Bob-Ending.mp4", 1),
        ]
    }

    #[test]
    fn test_matches_by_id_then_file_name() {
        let raw = json!({
            "project": { "judgeName": "  Chloé " },
            "clips": [{ "id": "x9", "fileName": "BOB-ENDING.mp4", "displayName": "Ending" }],
            "notes": {
                "a": { "scores": { "k": { "value": 4, "isValid": true } }, "finalScore": 4 },
                "x9": { "scores": { "k": { "value": "3,5" } }, "text_notes": "01:02 bien" },
                "zz": { "scores": {} }
            }
        });
        let judge = normalize_imported_judge(&raw, &local_clips()).unwrap();
        assert_eq!(judge.judge_name, "Chloé");
        assert_eq!(judge.notes.len(), 2);
        assert_eq!(judge.notes["a"].final_score, Some(4.0));
        let b = &judge.notes["b"];
        assert!(b.scores["k"].is_valid);
        assert_eq!(b.scores["k"].value, CriterionValue::Text("3,5".to_string()));
        assert_eq!(b.text_notes.as_deref(), Some("01:02 bien"));
    }

    #[test]
    fn test_matches_by_author_and_display_name() {
        let raw = json!({
            "clips": [{ "id": "q", "fileName": "renamed.mp4", "displayName": "opening", "author": "ALICE" }],
            "notes": { "q": { "scores": { "k": { "value": true, "isValid": false } } } }
        });
        let judge = normalize_imported_judge(&raw, &local_clips()).unwrap();
        assert_eq!(judge.judge_name, DEFAULT_IMPORTED_JUDGE_NAME);
        assert!(!judge.notes["a"].scores["k"].is_valid);
    }

    #[test]
    fn test_nothing_matched_is_none() {
        let raw = json!({ "notes": { "nope": { "scores": {} } } });
        assert!(normalize_imported_judge(&raw, &local_clips()).is_none());
        assert!(normalize_imported_judge(&json!([]), &local_clips()).is_none());
    }
}
