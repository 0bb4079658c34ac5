//! Criterion validation and score arithmetic.
//!
//! Validation never fails: it reports messages that the grid shows next to
//! the cell while keeping the user's entry.

use crate::bareme::{Bareme, Criterion, CriterionKind, RuleValue, ValidationRuleKind};

use super::types::{CriterionValue, Note, ScoreSource};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Clamp numeric input into the criterion's bounds. Text typed into a
/// numeric cell is parsed first; anything unparsable is left as is so that
/// validation can flag it.
pub fn normalize_value(criterion: &Criterion, value: CriterionValue) -> CriterionValue {
    if !criterion.kind.is_numeric() || value.is_empty() {
        return value;
    }
    match value.as_number() {
        Some(n) => CriterionValue::Number(clamp_to_bounds(criterion, n)),
        None => value,
    }
}

/// Clamp `n` into `[min, max]`, treating an unset bound as open.
pub fn clamp_to_bounds(criterion: &Criterion, n: f64) -> f64 {
    let lower = criterion.min.unwrap_or(f64::NEG_INFINITY);
    let upper = criterion.max.unwrap_or(f64::INFINITY);
    n.min(upper).max(lower)
}

fn off_step(n: f64, base: f64, step: f64) -> bool {
    let scaled_step = (step * 1000.0).round() as i64;
    if scaled_step <= 0 {
        return false;
    }
    let scaled = ((n - base) * 1000.0).round() as i64;
    scaled % scaled_step != 0
}

fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Validate `value` against the criterion's bounds, step and explicit rules.
pub fn validate_criterion_value(value: Option<&CriterionValue>, criterion: &Criterion) -> ValidationResult {
    let mut errors: Vec<String> = Vec::new();
    let missing = value.map_or(true, CriterionValue::is_empty);

    let required_rule = criterion
        .validation_rules
        .iter()
        .find(|r| r.kind == ValidationRuleKind::Required && r.value != RuleValue::Flag(false));
    if missing {
        if let Some(rule) = required_rule {
            errors.push(rule.message.clone());
        } else if criterion.required {
            errors.push("Ce champ est requis".to_string());
        }
        return ValidationResult {
            is_valid: errors.is_empty(),
            errors,
        };
    }

    if criterion.kind.is_numeric() {
        match value.and_then(CriterionValue::as_number) {
            None => errors.push("La valeur doit être un nombre".to_string()),
            Some(n) => {
                if let Some(min) = criterion.min.filter(|min| n < *min) {
                    errors.push(format!("Minimum : {}", fmt_number(min)));
                }
                if let Some(max) = criterion.max.filter(|max| n > *max) {
                    errors.push(format!("Maximum : {}", fmt_number(max)));
                }
                if let Some(step) = criterion.step.filter(|s| off_step(n, criterion.min.unwrap_or(0.0), *s)) {
                    errors.push(format!("Pas de {}", fmt_number(step)));
                }
                for rule in &criterion.validation_rules {
                    let RuleValue::Number(limit) = rule.value else {
                        continue;
                    };
                    let broken = match rule.kind {
                        ValidationRuleKind::Min => n < limit,
                        ValidationRuleKind::Max => n > limit,
                        ValidationRuleKind::Step => off_step(n, criterion.min.unwrap_or(0.0), limit),
                        ValidationRuleKind::Required => false,
                    };
                    if broken && !errors.contains(&rule.message) {
                        errors.push(rule.message.clone());
                    }
                }
            }
        }
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Numeric contribution of one criterion, as shown in category columns.
/// Invalid or missing scores count as 0; numbers are clamped into bounds.
pub fn criterion_numeric_score<S: ScoreSource + ?Sized>(note: Option<&S>, criterion: &Criterion) -> f64 {
    let Some((value, is_valid)) = note.and_then(|n| n.score_entry(&criterion.id)) else {
        return 0.0;
    };
    if !is_valid {
        return 0.0;
    }
    if let CriterionValue::Bool(b) = value {
        return if *b { criterion.max.unwrap_or(1.0) } else { 0.0 };
    }
    match value.as_number() {
        Some(n) => {
            let min = criterion.min.unwrap_or(0.0);
            let max = criterion.max.unwrap_or(n);
            n.max(min).min(max)
        }
        None => 0.0,
    }
}

pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// Sum of a category's criteria for one note, rounded to 2 decimals.
pub fn category_score<S: ScoreSource + ?Sized>(note: Option<&S>, criteria: &[&Criterion]) -> f64 {
    round2(criteria.iter().map(|c| criterion_numeric_score(note, c)).sum())
}

/// Clamped total over every criterion of `criteria` (used for imported judges).
pub fn note_total<S: ScoreSource + ?Sized>(note: Option<&S>, criteria: &[Criterion]) -> f64 {
    round2(criteria.iter().map(|c| criterion_numeric_score(note, c)).sum())
}

/// Final score of a note: numeric values as entered, booleans worth the
/// criterion maximum, select options spread linearly from 0 to the maximum,
/// free text worth nothing. Invalid scores are skipped.
pub fn calculate_score(note: &Note, bareme: &Bareme) -> f64 {
    let mut total = 0.0;
    for criterion in &bareme.criteria {
        let Some(score) = note.scores.get(&criterion.id) else {
            continue;
        };
        if !score.is_valid {
            continue;
        }
        total += match criterion.kind {
            CriterionKind::Numeric | CriterionKind::Slider => score.value.as_number().unwrap_or(0.0),
            CriterionKind::Boolean => {
                if score.value.is_truthy() {
                    criterion.max.unwrap_or(1.0)
                } else {
                    0.0
                }
            }
            CriterionKind::Select => select_score(criterion, &score.value),
            CriterionKind::Text => 0.0,
        };
    }
    round2(total)
}

fn select_score(criterion: &Criterion, value: &CriterionValue) -> f64 {
    let (Some(options), Some(max)) = (criterion.options.as_ref(), criterion.max) else {
        return 0.0;
    };
    let selected = match value {
        CriterionValue::Text(s) => s.clone(),
        CriterionValue::Number(n) => fmt_number(*n),
        CriterionValue::Bool(b) => b.to_string(),
    };
    match options.iter().position(|o| *o == selected) {
        Some(_) if options.len() == 1 => max,
        Some(index) => index as f64 / (options.len() - 1) as f64 * max,
        None => 0.0,
    }
}

/// True when every required criterion holds a valid, non-empty score.
pub fn is_note_complete(note: &Note, bareme: &Bareme) -> bool {
    bareme.criteria.iter().filter(|c| c.required).all(|criterion| {
        note.scores
            .get(&criterion.id)
            .is_some_and(|score| score.is_valid && !score.value.is_empty())
    })
}
