//! Eligibility gates and the weighted event-type pick.
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::EligibilityConfig;
use crate::state::EventKind;

/// Inputs the eligibility gates read. Rebuilt on every check.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    pub confidence: f32,
    pub elapsed: f32,
    pub raining: bool,
    pub has_cop_scenarios: bool,
    pub triggered: &'a [EventKind],
}

/// Whether `kind` may start right now.
#[must_use]
pub fn is_eligible(kind: EventKind, ctx: &EligibilityContext<'_>, config: &EligibilityConfig) -> bool {
    match kind {
        EventKind::CopCheck => {
            ctx.has_cop_scenarios && ctx.confidence >= config.cop_check_min_confidence
        }
        EventKind::Weather => !ctx.raining && !ctx.triggered.contains(&EventKind::Weather),
        EventKind::Karma => {
            ctx.elapsed >= config.karma_min_elapsed && !ctx.triggered.contains(&EventKind::Karma)
        }
    }
}

/// Per-tick trigger probability, clamped to `[0, 1]`.
#[must_use]
pub fn trigger_chance(base_per_second: f32, multiplier: f32, dt: f32) -> f32 {
    let chance = base_per_second * multiplier * dt;
    if chance.is_finite() {
        chance.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Candidate weight captured during a pick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedCandidate {
    pub kind: EventKind,
    pub weight: f64,
}

/// Explainability record for one probabilistic scheduling decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingDecision {
    /// Session seconds elapsed when the pick was made.
    pub elapsed: f32,
    pub chance: f32,
    pub chance_roll: f32,
    /// Running-sum roll in `[0, total_weight)`.
    pub roll: f64,
    pub total_weight: f64,
    pub candidates: SmallVec<[WeightedCandidate; 3]>,
    pub chosen: EventKind,
}

/// Running-sum weighted pick. Weights are relative and need not sum to one.
///
/// Non-positive weights are never chosen. Returns the chosen kind and the
/// roll, or `None` when no candidate has positive weight.
pub fn choose_weighted<R>(candidates: &[WeightedCandidate], rng: &mut R) -> Option<(EventKind, f64)>
where
    R: Rng + ?Sized,
{
    let total: f64 = candidates
        .iter()
        .filter(|candidate| candidate.weight > 0.0)
        .map(|candidate| candidate.weight)
        .sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let roll = rng.r#gen::<f64>() * total;
    let mut remaining = roll;
    let mut last_positive = None;
    for candidate in candidates {
        if candidate.weight <= 0.0 {
            continue;
        }
        last_positive = Some(candidate.kind);
        if remaining < candidate.weight {
            return Some((candidate.kind, roll));
        }
        remaining -= candidate.weight;
    }
    last_positive.map(|kind| (kind, roll))
}

/// Pick among eligible candidates and keep the trace.
pub fn pick_event<R>(
    elapsed: f32,
    chance: f32,
    chance_roll: f32,
    candidates: SmallVec<[WeightedCandidate; 3]>,
    rng: &mut R,
) -> Option<SchedulingDecision>
where
    R: Rng + ?Sized,
{
    let (chosen, roll) = choose_weighted(&candidates, rng)?;
    let total_weight = candidates
        .iter()
        .filter(|candidate| candidate.weight > 0.0)
        .map(|candidate| candidate.weight)
        .sum();
    Some(SchedulingDecision {
        elapsed,
        chance,
        chance_roll,
        roll,
        total_weight,
        candidates,
        chosen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::rngs::mock::StepRng;
    use smallvec::smallvec;

    fn candidates() -> SmallVec<[WeightedCandidate; 3]> {
        smallvec![
            WeightedCandidate {
                kind: EventKind::CopCheck,
                weight: 0.5,
            },
            WeightedCandidate {
                kind: EventKind::Weather,
                weight: 0.3,
            },
            WeightedCandidate {
                kind: EventKind::Karma,
                weight: 0.2,
            },
        ]
    }

    #[test]
    fn low_roll_picks_first_candidate() {
        let mut rng = StepRng::new(0, 0);
        let picked = choose_weighted(&candidates(), &mut rng);
        assert_eq!(picked.map(|(kind, _)| kind), Some(EventKind::CopCheck));
    }

    #[test]
    fn high_roll_picks_last_candidate() {
        let mut rng = StepRng::new(u64::MAX, 0);
        let picked = choose_weighted(&candidates(), &mut rng);
        assert_eq!(picked.map(|(kind, _)| kind), Some(EventKind::Karma));
    }

    #[test]
    fn zero_weights_are_skipped() {
        let mut rng = StepRng::new(u64::MAX, 0);
        let mut pool = candidates();
        pool[2].weight = 0.0;
        let picked = choose_weighted(&pool, &mut rng);
        assert_eq!(picked.map(|(kind, _)| kind), Some(EventKind::Weather));

        for candidate in &mut pool {
            candidate.weight = 0.0;
        }
        assert!(choose_weighted(&pool, &mut rng).is_none());
    }

    #[test]
    fn unnormalized_weights_select_proportionally() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut pool = candidates();
        for candidate in &mut pool {
            candidate.weight *= 10.0;
        }
        let mut weather = 0_u32;
        for _ in 0..5_000 {
            if let Some((EventKind::Weather, _)) = choose_weighted(&pool, &mut rng) {
                weather += 1;
            }
        }
        let share = f64::from(weather) / 5_000.0;
        assert!((share - 0.3).abs() < 0.03, "weather share {share}");
    }

    #[test]
    fn eligibility_gates() {
        let config = EligibilityConfig::default();
        let triggered = [EventKind::Weather];
        let ctx = EligibilityContext {
            confidence: 20.0,
            elapsed: 30.0,
            raining: false,
            has_cop_scenarios: true,
            triggered: &triggered,
        };
        assert!(!is_eligible(EventKind::CopCheck, &ctx, &config));
        assert!(!is_eligible(EventKind::Weather, &ctx, &config));
        assert!(!is_eligible(EventKind::Karma, &ctx, &config));

        let ctx = EligibilityContext {
            confidence: 60.0,
            elapsed: 90.0,
            triggered: &[],
            ..ctx
        };
        assert!(is_eligible(EventKind::CopCheck, &ctx, &config));
        assert!(is_eligible(EventKind::Weather, &ctx, &config));
        assert!(is_eligible(EventKind::Karma, &ctx, &config));

        let raining = EligibilityContext {
            raining: true,
            has_cop_scenarios: false,
            ..ctx
        };
        assert!(!is_eligible(EventKind::Weather, &raining, &config));
        assert!(!is_eligible(EventKind::CopCheck, &raining, &config));
    }

    #[test]
    fn chance_is_clamped() {
        assert!((trigger_chance(0.05, 1.0, 0.1) - 0.005).abs() < 1e-6);
        assert!((trigger_chance(5.0, 2.0, 1.0) - 1.0).abs() < f32::EPSILON);
        assert!(trigger_chance(f32::NAN, 1.0, 1.0).abs() < f32::EPSILON);
    }
}
