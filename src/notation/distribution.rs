//! Spreading a category total over its criteria.

use crate::bareme::Criterion;

const DEFAULT_STEP: f64 = 0.5;
const MAX_ADJUSTMENTS: usize = 1200;

fn round3(n: f64) -> f64 {
    (n * 1000.0).round() / 1000.0
}

/// Smallest positive step among `criteria`, or 0.5.
pub fn group_step(criteria: &[&Criterion]) -> f64 {
    criteria
        .iter()
        .filter_map(|c| c.step)
        .filter(|s| *s > 0.0 && s.is_finite())
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))))
        .unwrap_or(DEFAULT_STEP)
}

/// Split `target` over `criteria` so the parts sum to the (clamped) target.
///
/// `current` holds the criteria's present values in the same order. When
/// they sum to more than zero the split follows them, otherwise it follows
/// the maxima. Each part is capped at its maximum and snapped to the group
/// step; the rounding residual is then walked back one step at a time.
pub fn distribute_category_score(criteria: &[&Criterion], current: &[f64], target: f64) -> Vec<f64> {
    if criteria.is_empty() {
        return Vec::new();
    }
    let maxima: Vec<f64> = criteria.iter().map(|c| c.max_or_default()).collect();
    let minima: Vec<f64> = criteria.iter().map(|c| c.min.unwrap_or(0.0).max(0.0)).collect();
    let total_max: f64 = maxima.iter().sum();
    if total_max <= 0.0 {
        return vec![0.0; criteria.len()];
    }
    let target = if target.is_finite() { target.clamp(0.0, total_max) } else { 0.0 };
    let step = group_step(criteria);

    let current_total: f64 = current.iter().sum();
    let weights: Vec<f64> = if current_total > 0.0 && current.len() == criteria.len() {
        current.to_vec()
    } else {
        maxima.clone()
    };
    let weights_total: f64 = weights.iter().sum();

    let mut parts: Vec<f64> = weights
        .iter()
        .zip(&maxima)
        .zip(&minima)
        .map(|((weight, max), min)| {
            let share = if weights_total > 0.0 {
                target * weight / weights_total
            } else {
                0.0
            };
            let capped = share.min(*max);
            ((capped / step).round() * step).clamp(min.min(*max), *max)
        })
        .collect();

    let epsilon = step / 1000.0;
    let mut delta = target - parts.iter().sum::<f64>();
    let mut adjustments = 0;
    while delta.abs() >= step / 2.0 && adjustments < MAX_ADJUSTMENTS {
        let mut moved = false;
        for (i, part) in parts.iter_mut().enumerate() {
            if delta.abs() < step / 2.0 || adjustments >= MAX_ADJUSTMENTS {
                break;
            }
            if delta > 0.0 && *part + step <= maxima[i] + epsilon {
                *part += step;
                delta -= step;
                moved = true;
                adjustments += 1;
            } else if delta < 0.0 && *part - step >= minima[i] - epsilon {
                *part -= step;
                delta += step;
                moved = true;
                adjustments += 1;
            }
        }
        if !moved {
            break;
        }
    }

    parts.into_iter().map(round3).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn technique() -> Vec<Criterion> {
        vec![
            Criterion::numeric("t1", "Montage", 10.0, Some("Technique")),
            Criterion::numeric("t2", "Encodage", 5.0, Some("Technique")),
        ]
    }

    #[test]
    fn test_distribute_by_maxima_when_empty() {
        let criteria = technique();
        let refs: Vec<&Criterion> = criteria.iter().collect();
        let parts = distribute_category_score(&refs, &[0.0, 0.0], 8.0);
        assert_eq!(parts, vec![5.5, 2.5]);
        assert_eq!(parts.iter().sum::<f64>(), 8.0);
    }

    #[test]
    fn test_distribute_follows_current_values() {
        let criteria = technique();
        let refs: Vec<&Criterion> = criteria.iter().collect();
        let parts = distribute_category_score(&refs, &[2.0, 2.0], 6.0);
        assert_eq!(parts, vec![3.0, 3.0]);
    }

    #[test]
    fn test_distribute_clamps_target() {
        let criteria = technique();
        let refs: Vec<&Criterion> = criteria.iter().collect();
        assert_eq!(distribute_category_score(&refs, &[0.0, 0.0], 40.0), vec![10.0, 5.0]);
        assert_eq!(distribute_category_score(&refs, &[3.0, 1.0], -2.0), vec![0.0, 0.0]);
    }

    #[test]
    fn test_distribute_respects_caps_with_skewed_weights() {
        let criteria = technique();
        let refs: Vec<&Criterion> = criteria.iter().collect();
        // All weight on the small criterion: overflow goes to the other one.
        let parts = distribute_category_score(&refs, &[0.0, 4.0], 12.0);
        assert_eq!(parts, vec![7.0, 5.0]);
    }

    #[test]
    fn test_distribute_penalty_category_yields_zeros() {
        let mut penalty = Criterion::numeric("p1", "Retard", -1.0, Some("Pénalités"));
        penalty.min = Some(-5.0);
        let refs = vec![&penalty];
        assert_eq!(distribute_category_score(&refs, &[0.0], 2.0), vec![0.0]);
        assert_eq!(distribute_category_score(&refs, &[-3.0], -4.0), vec![0.0]);
    }

    #[test]
    fn test_group_step_picks_smallest_positive() {
        let mut criteria = technique();
        criteria[0].step = Some(0.25);
        criteria[1].step = Some(0.0);
        let refs: Vec<&Criterion> = criteria.iter().collect();
        assert_eq!(group_step(&refs), 0.25);
    }
}
