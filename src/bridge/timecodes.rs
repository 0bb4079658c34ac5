//! Timecode markers extracted from free-text notes.
//!
//! Judges type timecodes such as `1:23`, `01:02:03.5` or `00:01:02:12`
//! in their notes. Each becomes a marker on the overlay timeline.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bareme::{sanitize_color, Bareme, CATEGORY_COLOR_PRESETS};
use crate::notation::Note;

pub const GLOBAL_MARKER_COLOR: &str = "#60a5fa";
pub const CATEGORY_MARKER_FALLBACK: &str = "#818cf8";
pub const CRITERION_MARKER_FALLBACK: &str = "#22d3ee";

const PREVIEW_WORDS: usize = 10;

fn timecode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,2}:){1,3}\d{1,2}(?:[.,]\d{1,3})?\b").expect("timecode pattern must compile")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSource {
    Global,
    Category,
    Criterion,
}

impl MarkerSource {
    fn as_str(self) -> &'static str {
        match self {
            MarkerSource::Global => "global",
            MarkerSource::Category => "category",
            MarkerSource::Criterion => "criterion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimecodeMarker {
    /// Stable identity: source, category, criterion, milliseconds, offset.
    pub key: String,
    pub raw: String,
    pub label: String,
    pub seconds: f64,
    pub color: String,
    pub preview_text: String,
    pub source: MarkerSource,
    pub category: Option<String>,
    pub criterion_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTimecode {
    pub raw: String,
    pub seconds: f64,
    /// Byte offset of the token in the text.
    pub offset: usize,
}

fn parse_segment(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Seconds for `mm:ss`, `hh:mm:ss` or `hh:mm:ss:ff` (frames at `fps`).
/// Out-of-range fields yield `None`.
pub fn parse_timecode(raw: &str, fps: f64) -> Option<f64> {
    let normalized = raw.replacen(',', ".", 1);
    let segments: Vec<&str> = normalized.split(':').collect();
    match segments.as_slice() {
        [minutes, seconds] => {
            let (m, s) = (parse_segment(minutes)?, parse_segment(seconds)?);
            (s < 60.0).then_some(m * 60.0 + s)
        }
        [hours, minutes, seconds] => {
            let (h, m, s) = (parse_segment(hours)?, parse_segment(minutes)?, parse_segment(seconds)?);
            (m <= 59.0 && s < 60.0).then_some(h * 3600.0 + m * 60.0 + s)
        }
        [hours, minutes, seconds, frames] => {
            let (h, m, s, f) = (
                parse_segment(hours)?,
                parse_segment(minutes)?,
                parse_segment(seconds)?,
                parse_segment(frames)?,
            );
            let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
            (m <= 59.0 && s <= 59.0).then_some(h * 3600.0 + m * 60.0 + s + f / fps)
        }
        _ => None,
    }
}

/// Every valid timecode in `text`, in order of appearance. Timecodes past
/// `max_seconds` (when given and positive) are dropped.
pub fn extract_timecodes(text: &str, max_seconds: Option<f64>, fps: f64) -> Vec<ParsedTimecode> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    timecode_regex()
        .find_iter(text)
        .filter_map(|m| {
            let seconds = parse_timecode(m.as_str(), fps)?;
            if max_seconds.is_some_and(|max| max > 0.0 && seconds > max) {
                return None;
            }
            Some(ParsedTimecode {
                raw: m.as_str().to_string(),
                seconds,
                offset: m.start(),
            })
        })
        .collect()
}

/// `m:ss.mmm`, or `h:mm:ss.mmm` past one hour.
pub fn format_precise_timecode(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00.000".to_string();
    }
    let total_ms = (seconds * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    if hours > 0 {
        format!("{}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
    } else {
        format!("{}:{:02}.{:03}", minutes, secs, millis)
    }
}

fn preview_after(text: &str, start: usize, end: usize) -> String {
    text.get(start..end)
        .unwrap_or("")
        .split_whitespace()
        .take(PREVIEW_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

struct MarkerContext<'a> {
    source: MarkerSource,
    color: String,
    category: Option<&'a str>,
    criterion_id: Option<&'a str>,
}

fn push_markers(out: &mut Vec<TimecodeMarker>, text: &str, ctx: MarkerContext<'_>, fps: f64) {
    let parsed = extract_timecodes(text, None, fps);
    for (i, item) in parsed.iter().enumerate() {
        let next_start = parsed.get(i + 1).map_or(text.len(), |n| n.offset);
        out.push(TimecodeMarker {
            key: format!(
                "{}:{}:{}:{}:{}",
                ctx.source.as_str(),
                ctx.category.unwrap_or(""),
                ctx.criterion_id.unwrap_or(""),
                (item.seconds * 1000.0).round() as i64,
                item.offset
            ),
            raw: item.raw.clone(),
            label: format_precise_timecode(item.seconds),
            seconds: item.seconds,
            color: ctx.color.clone(),
            preview_text: preview_after(text, item.offset + item.raw.len(), next_start),
            source: ctx.source,
            category: ctx.category.map(str::to_string),
            criterion_id: ctx.criterion_id.map(str::to_string),
        });
    }
}

/// Markers from a note's global, category and criterion comments, sorted by
/// time and truncated to `max_markers`.
pub fn build_note_markers(note: Option<&Note>, bareme: Option<&Bareme>, fps: f64, max_markers: usize) -> Vec<TimecodeMarker> {
    let Some(note) = note else {
        return Vec::new();
    };
    let categories = bareme.map(Bareme::categories).unwrap_or_default();
    let category_color = |label: &str| {
        categories
            .iter()
            .position(|c| c.label == label)
            .map(|i| {
                let fallback = CATEGORY_COLOR_PRESETS[i % CATEGORY_COLOR_PRESETS.len()];
                sanitize_color(bareme.and_then(|b| b.category_colors.get(label)), fallback)
            })
    };

    let mut markers = Vec::new();
    push_markers(
        &mut markers,
        &note.text_notes,
        MarkerContext {
            source: MarkerSource::Global,
            color: GLOBAL_MARKER_COLOR.to_string(),
            category: None,
            criterion_id: None,
        },
        fps,
    );
    for (category, text) in &note.category_notes {
        push_markers(
            &mut markers,
            text,
            MarkerContext {
                source: MarkerSource::Category,
                color: category_color(category.as_str()).unwrap_or_else(|| CATEGORY_MARKER_FALLBACK.to_string()),
                category: Some(category),
                criterion_id: None,
            },
            fps,
        );
    }
    for (criterion_id, text) in &note.criterion_notes {
        let category = bareme.and_then(|b| b.criterion(criterion_id)).map(|c| c.category_label());
        push_markers(
            &mut markers,
            text,
            MarkerContext {
                source: MarkerSource::Criterion,
                color: category
                    .and_then(category_color)
                    .unwrap_or_else(|| CRITERION_MARKER_FALLBACK.to_string()),
                category,
                criterion_id: Some(criterion_id),
            },
            fps,
        );
    }

    markers.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));
    markers.truncate(max_markers);
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bareme::official_bareme;

    #[test]
    fn test_parse_timecode_forms() {
        assert_eq!(parse_timecode("1:23", 30.0), Some(83.0));
        assert_eq!(parse_timecode("01:02:03,5", 30.0), Some(3723.5));
        assert_eq!(parse_timecode("00:00:01:15", 30.0), Some(1.5));
        assert_eq!(parse_timecode("00:00:01:12", 24.0), Some(1.5));
        assert_eq!(parse_timecode("1:75", 30.0), None);
        assert_eq!(parse_timecode("1:60:00", 30.0), None);
    }

    #[test]
    fn test_extract_skips_invalid_and_late_tokens() {
        let found = extract_timecodes("à 0:10 puis 9:99 et 12:00", Some(600.0), 30.0);
        let raws: Vec<&str> = found.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, vec!["0:10"]);
    }

    #[test]
    fn test_format_precise() {
        assert_eq!(format_precise_timecode(83.25), "1:23.250");
        assert_eq!(format_precise_timecode(3723.5), "1:02:03.500");
        assert_eq!(format_precise_timecode(-1.0), "0:00.000");
    }

    #[test]
    fn test_build_markers_sorted_with_colors_and_previews() {
        let bareme = official_bareme();
        let criterion_id = bareme.criteria[0].id.clone();
        let category = bareme.criteria[0].category_label().to_string();

        let mut note = Note::new("c1", &bareme.id);
        note.text_notes = "2:00 fin un peu molle".to_string();
        note.criterion_notes.insert(criterion_id.clone(), "0:30 raccord propre 0:45 sync".to_string());
        note.category_notes.insert("Inconnue".to_string(), "1:00 ok".to_string());

        let markers = build_note_markers(Some(&note), Some(&bareme), 30.0, 120);
        let seconds: Vec<f64> = markers.iter().map(|m| m.seconds).collect();
        assert_eq!(seconds, vec![30.0, 45.0, 60.0, 120.0]);

        assert_eq!(markers[0].preview_text, "raccord propre");
        assert_eq!(markers[0].category.as_deref(), Some(category.as_str()));
        assert_eq!(markers[0].key, format!("criterion:{}:{}:30000:0", category, criterion_id));
        assert_eq!(markers[2].color, CATEGORY_MARKER_FALLBACK);
        assert_eq!(markers[3].color, GLOBAL_MARKER_COLOR);
        assert_eq!(markers[3].preview_text, "fin un peu molle");

        assert_eq!(build_note_markers(Some(&note), Some(&bareme), 30.0, 2).len(), 2);
        assert!(build_note_markers(None, Some(&bareme), 30.0, 120).is_empty());
    }
}
