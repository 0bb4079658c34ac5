//! Lenient parsing of rubric JSON imported from disk or another judge.
//!
//! Unlike the strict serde shape in [`super::types`], this accepts partially
//! valid input: unknown criterion kinds become numeric, unnamed criteria are
//! dropped, and a missing total falls back to the sum of maxima.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::types::{Bareme, Criterion, CriterionKind};

const OFFICIAL_BAREME: &str = include_str!("../../config/official_bareme.json");

/// The built-in official rubric.
///
/// # Panics
/// Panics if the embedded JSON is invalid (a build-time bug).
pub fn official_bareme() -> Bareme {
    serde_json::from_str(OFFICIAL_BAREME).expect("embedded official_bareme.json must be valid")
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn as_trimmed_str<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_kind(raw: Option<&str>) -> CriterionKind {
    match raw {
        Some("slider") => CriterionKind::Slider,
        Some("boolean") => CriterionKind::Boolean,
        Some("select") => CriterionKind::Select,
        Some("text") => CriterionKind::Text,
        _ => CriterionKind::Numeric,
    }
}

fn parse_criterion(raw: &Value, index: usize) -> Option<Criterion> {
    let row = raw.as_object()?;
    let name = as_trimmed_str(row, "name")?.to_string();

    let step = as_number(row.get("step")).filter(|s| *s > 0.0).unwrap_or(0.5);
    let options: Vec<String> = row
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let validation_rules = row
        .get("validationRules")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    Some(Criterion {
        id: as_trimmed_str(row, "id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("criterion-{}", index + 1)),
        name,
        description: row.get("description").and_then(Value::as_str).map(str::to_string),
        kind: parse_kind(row.get("type").and_then(Value::as_str)),
        min: as_number(row.get("min")),
        max: as_number(row.get("max")),
        step: Some(step),
        options: (!options.is_empty()).then_some(options),
        required: row.get("required").and_then(Value::as_bool).unwrap_or(true),
        category: as_trimmed_str(row, "category").map(str::to_string),
        validation_rules,
    })
}

/// Parse an imported rubric. Returns `None` when it has no id, no name or
/// no usable criterion. Imported rubrics are never official.
pub fn parse_bareme(raw: &Value) -> Option<Bareme> {
    let row = raw.as_object()?;
    let id = as_trimmed_str(row, "id")?.to_string();
    let name = as_trimmed_str(row, "name")?.to_string();

    let criteria: Vec<Criterion> = row
        .get("criteria")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(idx, c)| parse_criterion(c, idx))
                .collect()
        })
        .unwrap_or_default();
    if criteria.is_empty() {
        return None;
    }

    let category_colors: BTreeMap<String, String> = row
        .get("categoryColors")
        .and_then(Value::as_object)
        .map(|colors| {
            colors
                .iter()
                .filter(|(key, _)| !key.trim().is_empty())
                .filter_map(|(key, value)| {
                    value
                        .as_str()
                        .filter(|s| !s.trim().is_empty())
                        .map(|s| (key.clone(), s.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let fallback_total: f64 = criteria.iter().filter_map(|c| c.max).sum();
    let total_points = as_number(row.get("totalPoints"))
        .filter(|t| *t > 0.0)
        .unwrap_or(fallback_total);
    let now = chrono::Utc::now().to_rfc3339();

    Some(Bareme {
        id,
        name,
        description: as_trimmed_str(row, "description").map(str::to_string),
        is_official: false,
        hide_totals_until_all_scored: row
            .get("hideTotalsUntilAllScored")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        criteria,
        category_colors,
        total_points,
        created_at: row
            .get("createdAt")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| now.clone()),
        updated_at: row
            .get("updatedAt")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(now),
    })
}
