//! Type definitions for rubrics ("barèmes") and their criteria.
//!
//! Field names serialize in camelCase so rubric files and project files
//! written by the desktop app round-trip unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Category label used when a criterion has none.
pub const DEFAULT_CATEGORY: &str = "Général";

/// Maximum assumed for a criterion whose `max` is unset.
pub const DEFAULT_CRITERION_MAX: f64 = 10.0;

/// Fallback palette for categories without an explicit color, by position.
pub const CATEGORY_COLOR_PRESETS: [&str; 8] = [
    "#fb923c", "#a78bfa", "#34d399", "#f59e0b", "#38bdf8", "#fb7185", "#2dd4bf", "#818cf8",
];

// =============================================================================
// CRITERIA
// =============================================================================

/// How a criterion's value is entered and scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionKind {
    Numeric,
    Slider,
    Boolean,
    Select,
    Text,
}

impl CriterionKind {
    /// True for kinds whose value is a number clamped into the bounds.
    pub fn is_numeric(self) -> bool {
        matches!(self, CriterionKind::Numeric | CriterionKind::Slider)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationRuleKind {
    Min,
    Max,
    Required,
    Step,
}

/// Threshold carried by a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Flag(bool),
}

/// An explicit validation rule with its user-facing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: ValidationRuleKind,
    pub value: RuleValue,
    pub message: String,
}

/// One scoreable dimension of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: CriterionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<ValidationRule>,
}

impl Criterion {
    /// A required numeric criterion with `0..=max` bounds and a 0.5 step.
    pub fn numeric(id: &str, name: &str, max: f64, category: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            kind: CriterionKind::Numeric,
            min: Some(0.0),
            max: Some(max),
            step: Some(0.5),
            options: None,
            required: true,
            category: category.map(str::to_string),
            validation_rules: Vec::new(),
        }
    }

    /// The category this criterion is grouped under.
    pub fn category_label(&self) -> &str {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }

    /// `max`, or [`DEFAULT_CRITERION_MAX`] when unset.
    pub fn max_or_default(&self) -> f64 {
        self.max.unwrap_or(DEFAULT_CRITERION_MAX)
    }
}

// =============================================================================
// RUBRIC
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bareme {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub hide_totals_until_all_scored: bool,
    pub criteria: Vec<Criterion>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_colors: BTreeMap<String, String>,
    pub total_points: f64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A derived group of criteria sharing a category label.
#[derive(Debug, Clone, PartialEq)]
pub struct Category<'a> {
    pub label: String,
    pub criteria: Vec<&'a Criterion>,
    /// Sum of member maxima (unset maxima count as 10).
    pub total_max: f64,
    pub color: String,
}

impl Category<'_> {
    /// True when every member shares the same maximum.
    pub fn has_uniform_max(&self) -> bool {
        let mut maxima = self.criteria.iter().map(|c| c.max_or_default());
        match maxima.next() {
            Some(first) => maxima.all(|m| m == first),
            None => true,
        }
    }
}

impl Bareme {
    pub fn criterion(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    /// Criteria grouped by category label, in first-seen order.
    pub fn categories(&self) -> Vec<Category<'_>> {
        let mut groups: Vec<Category<'_>> = Vec::new();
        for criterion in &self.criteria {
            let label = criterion.category_label();
            match groups.iter_mut().find(|g| g.label == label) {
                Some(group) => {
                    group.criteria.push(criterion);
                    group.total_max += criterion.max_or_default();
                }
                None => {
                    let fallback = CATEGORY_COLOR_PRESETS[groups.len() % CATEGORY_COLOR_PRESETS.len()];
                    groups.push(Category {
                        label: label.to_string(),
                        criteria: vec![criterion],
                        total_max: criterion.max_or_default(),
                        color: sanitize_color(self.category_colors.get(label), fallback),
                    });
                }
            }
        }
        groups
    }

    pub fn category(&self, label: &str) -> Option<Category<'_>> {
        self.categories().into_iter().find(|g| g.label == label)
    }

    /// Check the structural invariants. Returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.criteria.is_empty() {
            errors.push("Au moins un critère requis".to_string());
        }
        if !(self.total_points > 0.0) {
            errors.push("Le total des points doit être positif".to_string());
        }
        for criterion in &self.criteria {
            if criterion.kind == CriterionKind::Select
                && criterion.options.as_ref().map_or(true, |o| o.is_empty())
            {
                errors.push(format!(
                    "{}: les critères de type 'select' doivent avoir au moins une option",
                    criterion.id
                ));
            }
            if let (Some(min), Some(max)) = (criterion.min, criterion.max) {
                if min > max {
                    errors.push(format!(
                        "{}: le minimum ne peut pas être supérieur au maximum",
                        criterion.id
                    ));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Accept `#rrggbb` colors only; anything else yields `fallback`.
pub fn sanitize_color(color: Option<&String>, fallback: &str) -> String {
    match color.map(|c| c.trim()) {
        Some(c) if c.len() == 7 && c.starts_with('#') && c[1..].chars().all(|ch| ch.is_ascii_hexdigit()) => {
            c.to_string()
        }
        _ => fallback.to_string(),
    }
}
