//! Scores and notes, in memory and as persisted in project files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw or normalized value of one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CriterionValue {
    /// True for the "no answer" value (empty text).
    pub fn is_empty(&self) -> bool {
        matches!(self, CriterionValue::Text(s) if s.is_empty())
    }

    /// Numeric reading of the value. Text is parsed with `,` accepted as the
    /// decimal separator; booleans read as 1 or 0.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            CriterionValue::Number(n) => *n,
            CriterionValue::Bool(b) => f64::from(u8::from(*b)),
            CriterionValue::Text(s) => parse_decimal(s)?,
        };
        n.is_finite().then_some(n)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            CriterionValue::Bool(b) => *b,
            CriterionValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CriterionValue::Text(s) => !s.is_empty(),
        }
    }
}

impl From<f64> for CriterionValue {
    fn from(value: f64) -> Self {
        CriterionValue::Number(value)
    }
}

impl From<bool> for CriterionValue {
    fn from(value: bool) -> Self {
        CriterionValue::Bool(value)
    }
}

impl From<&str> for CriterionValue {
    fn from(value: &str) -> Self {
        CriterionValue::Text(value.to_string())
    }
}

/// Parse a decimal typed by a user: surrounding whitespace is ignored and
/// the first `,` counts as the decimal point. Non-finite results are rejected.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replacen(',', ".", 1);
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScore {
    pub criterion_id: String,
    pub value: CriterionValue,
    pub is_valid: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
}

/// Every score and comment one judge gave one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub clip_id: String,
    pub bareme_id: String,
    pub scores: BTreeMap<String, CriterionScore>,
    pub text_notes: String,
    #[serde(default)]
    pub criterion_notes: BTreeMap<String, String>,
    #[serde(default)]
    pub category_notes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scored_at: Option<String>,
}

impl Note {
    pub fn new(clip_id: &str, bareme_id: &str) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            bareme_id: bareme_id.to_string(),
            scores: BTreeMap::new(),
            text_notes: String::new(),
            criterion_notes: BTreeMap::new(),
            category_notes: BTreeMap::new(),
            final_score: None,
            scored_at: None,
        }
    }
}

/// The whole note mapping, keyed by clip id.
pub type Notes = BTreeMap<String, Note>;

// =============================================================================
// PERSISTED SHAPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScoreData {
    pub criterion_id: String,
    pub value: CriterionValue,
    pub is_valid: bool,
}

/// A note as written to the project file (validation messages are dropped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteData {
    pub clip_id: String,
    pub bareme_id: String,
    pub scores: BTreeMap<String, CriterionScoreData>,
    #[serde(default)]
    pub text_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion_notes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_notes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scored_at: Option<String>,
}

pub type NotesData = BTreeMap<String, NoteData>;

impl From<NoteData> for Note {
    fn from(data: NoteData) -> Self {
        let scores = data
            .scores
            .into_iter()
            .map(|(key, score)| {
                (
                    key,
                    CriterionScore {
                        criterion_id: score.criterion_id,
                        value: score.value,
                        is_valid: score.is_valid,
                        validation_errors: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            clip_id: data.clip_id,
            bareme_id: data.bareme_id,
            scores,
            text_notes: data.text_notes,
            criterion_notes: data.criterion_notes.unwrap_or_default(),
            category_notes: data.category_notes.unwrap_or_default(),
            final_score: data.final_score,
            scored_at: data.scored_at,
        }
    }
}

impl From<&Note> for NoteData {
    fn from(note: &Note) -> Self {
        let scores = note
            .scores
            .iter()
            .map(|(key, score)| {
                (
                    key.clone(),
                    CriterionScoreData {
                        criterion_id: score.criterion_id.clone(),
                        value: score.value.clone(),
                        is_valid: score.is_valid,
                    },
                )
            })
            .collect();
        Self {
            clip_id: note.clip_id.clone(),
            bareme_id: note.bareme_id.clone(),
            scores,
            text_notes: note.text_notes.clone(),
            criterion_notes: Some(note.criterion_notes.clone()),
            category_notes: Some(note.category_notes.clone()),
            final_score: note.final_score,
            scored_at: note.scored_at.clone(),
        }
    }
}

// =============================================================================
// IMPORTED JUDGES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedJudgeScore {
    pub value: CriterionValue,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedJudgeNote {
    #[serde(default)]
    pub scores: BTreeMap<String, ImportedJudgeScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criterion_notes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_notes: Option<BTreeMap<String, String>>,
}

/// Another judge's notes, merged into the project for comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedJudgeData {
    pub judge_name: String,
    #[serde(default)]
    pub notes: BTreeMap<String, ImportedJudgeNote>,
}

/// Read access to per-criterion scores, shared by the current judge's notes
/// and imported ones.
pub trait ScoreSource {
    /// The stored value and validity flag for `criterion_id`.
    fn score_entry(&self, criterion_id: &str) -> Option<(&CriterionValue, bool)>;
}

impl ScoreSource for Note {
    fn score_entry(&self, criterion_id: &str) -> Option<(&CriterionValue, bool)> {
        self.scores.get(criterion_id).map(|s| (&s.value, s.is_valid))
    }
}

impl ScoreSource for ImportedJudgeNote {
    fn score_entry(&self, criterion_id: &str) -> Option<(&CriterionValue, bool)> {
        self.scores.get(criterion_id).map(|s| (&s.value, s.is_valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_decimal_accepts_both_separators() {
        assert_eq!(parse_decimal("3,5"), Some(3.5));
        assert_eq!(parse_decimal(" 3.5 "), Some(3.5));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("inf"), None);
    }

    #[test]
    fn test_criterion_value_untagged_serde() {
        let values: Vec<CriterionValue> = serde_json::from_value(json!([1.5, true, "x"])).unwrap();
        assert_eq!(
            values,
            vec![
                CriterionValue::Number(1.5),
                CriterionValue::Bool(true),
                CriterionValue::Text("x".to_string())
            ]
        );
    }

    #[test]
    fn test_note_data_reads_camel_case_without_optional_maps() {
        let data: NoteData = serde_json::from_value(json!({
            "clipId": "c1",
            "baremeId": "b",
            "scores": { "k": { "criterionId": "k", "value": 4, "isValid": true } },
            "textNotes": "ok"
        }))
        .unwrap();

        let note = Note::from(data);
        assert_eq!(note.scores["k"].value, CriterionValue::Number(4.0));
        assert!(note.scores["k"].validation_errors.is_empty());
        assert!(note.criterion_notes.is_empty());
    }
}
