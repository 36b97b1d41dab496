//! Threat score: combines behavior, proximity and approach evidence into a
//! single operator-facing number in `[0, 100]`.
//!
//! Sub-scores, each saturating in `[0, 1)`:
//! - behavior  = P(Attacking)
//! - proximity = 1 − exp(−area / proximity_threshold)
//! - approach  = 1 − exp(−max(0, vw) / approach_threshold)
//!
//! `score = min(100, 100 · Σ weightᵢ · subᵢ)`. Weights need not sum to 1.

use crate::{
    classifier::{BehaviorDistribution, BehaviorKind},
    error::{require_non_negative, require_positive, ConfigResult},
    types::KinematicState,
};
use serde::{Deserialize, Serialize};

pub const MAX_THREAT_SCORE: f64 = 100.0;

/// Threat scoring parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThreatConfig {
    pub attacking_weight: f64,
    pub proximity_weight: f64,
    pub approach_velocity_weight: f64,
    /// Box area (px²) at which proximity threat reaches 1 − 1/e
    pub proximity_threshold: f64,
    /// Width rate (px/s) at which approach threat reaches 1 − 1/e
    pub approach_threshold: f64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            attacking_weight: 0.5,
            proximity_weight: 0.3,
            approach_velocity_weight: 0.2,
            proximity_threshold: 10_000.0,
            approach_threshold: 50.0,
        }
    }
}

impl ThreatConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        require_non_negative("threat_score", "attacking_weight", self.attacking_weight)?;
        require_non_negative("threat_score", "proximity_weight", self.proximity_weight)?;
        require_non_negative(
            "threat_score",
            "approach_velocity_weight",
            self.approach_velocity_weight,
        )?;
        require_positive("threat_score", "proximity_threshold", self.proximity_threshold)?;
        require_positive("threat_score", "approach_threshold", self.approach_threshold)?;
        Ok(())
    }
}

/// Breakdown of a threat score, for display and debugging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatBreakdown {
    pub behavior: f64,
    pub proximity: f64,
    pub approach: f64,
    pub score: f64,
}

/// Validated threat scorer.
#[derive(Clone, Debug)]
pub struct ThreatScorer {
    config: ThreatConfig,
}

impl ThreatScorer {
    pub fn new(config: ThreatConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ThreatConfig {
        &self.config
    }

    /// Threat score in `[0, 100]`.
    pub fn score(&self, state: &KinematicState, probs: &BehaviorDistribution) -> f64 {
        self.breakdown(state, probs).score
    }

    pub fn breakdown(
        &self,
        state: &KinematicState,
        probs: &BehaviorDistribution,
    ) -> ThreatBreakdown {
        let c = &self.config;
        let behavior = probs.get(BehaviorKind::Attacking).clamp(0.0, 1.0);
        // Estimated box size can dip below zero transiently.
        let proximity = 1.0 - (-state.area.max(0.0) / c.proximity_threshold).exp();
        // Retreating never lowers the score
        let approach = 1.0 - (-state.vw.max(0.0) / c.approach_threshold).exp();

        let raw = behavior * c.attacking_weight
            + proximity * c.proximity_weight
            + approach * c.approach_velocity_weight;
        let score = if raw.is_nan() {
            0.0
        } else {
            (raw * 100.0).clamp(0.0, MAX_THREAT_SCORE)
        };

        ThreatBreakdown {
            behavior,
            proximity,
            approach,
            score,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn state(area: f64, vw: f64) -> KinematicState {
        KinematicState {
            area,
            vw,
            ..Default::default()
        }
    }

    fn attacking(p: f64) -> BehaviorDistribution {
        [(BehaviorKind::Attacking, p), (BehaviorKind::Hovering, 1.0 - p)]
            .into_iter()
            .collect()
    }

    #[test]
    fn zero_evidence_is_zero_threat() {
        let scorer = ThreatScorer::new(ThreatConfig::default()).unwrap();
        assert_eq!(scorer.score(&state(0.0, 0.0), &attacking(0.0)), 0.0);
    }

    #[test]
    fn sub_scores_match_formula() {
        let scorer = ThreatScorer::new(ThreatConfig::default()).unwrap();
        let b = scorer.breakdown(&state(10_000.0, 50.0), &attacking(0.4));
        let e = 1.0 - (-1.0f64).exp();
        assert_abs_diff_eq!(b.behavior, 0.4);
        assert_abs_diff_eq!(b.proximity, e, epsilon = 1e-12);
        assert_abs_diff_eq!(b.approach, e, epsilon = 1e-12);
        let expected = (0.4 * 0.5 + e * 0.3 + e * 0.2) * 100.0;
        assert_abs_diff_eq!(b.score, expected, epsilon = 1e-9);
    }

    #[test]
    fn retreat_does_not_reduce_score() {
        let scorer = ThreatScorer::new(ThreatConfig::default()).unwrap();
        let still = scorer.score(&state(500.0, 0.0), &attacking(0.1));
        let away = scorer.score(&state(500.0, -80.0), &attacking(0.1));
        assert_abs_diff_eq!(still, away);
    }

    #[test]
    fn missing_attacking_entry_counts_as_zero() {
        let scorer = ThreatScorer::new(ThreatConfig::default()).unwrap();
        let probs: BehaviorDistribution = [(BehaviorKind::Hovering, 1.0)].into_iter().collect();
        let b = scorer.breakdown(&state(0.0, 0.0), &probs);
        assert_eq!(b.behavior, 0.0);
    }

    #[test]
    fn pathological_weights_saturate_at_100() {
        let scorer = ThreatScorer::new(ThreatConfig {
            attacking_weight: 50.0,
            proximity_weight: 50.0,
            approach_velocity_weight: 50.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(scorer.score(&state(1e6, 1e3), &attacking(1.0)), 100.0);
    }

    #[test]
    fn score_bounded_over_parameter_space() {
        for weight in [0.0, 0.1, 1.0, 3.0, 1e3] {
            for threshold in [1e-3, 1.0, 50.0, 1e6] {
                let scorer = ThreatScorer::new(ThreatConfig {
                    attacking_weight: weight,
                    proximity_weight: weight,
                    approach_velocity_weight: weight,
                    proximity_threshold: threshold,
                    approach_threshold: threshold,
                })
                .unwrap();
                for area in [0.0, 1.0, 1e4, 1e9] {
                    for vw in [-1e6, -3.0, 0.0, 3.0, 1e6] {
                        for p in [0.0, 0.5, 1.0] {
                            let s = scorer.score(&state(area, vw), &attacking(p));
                            assert!((0.0..=100.0).contains(&s), "score {s} out of range");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn invalid_config_rejected() {
        let bad = ThreatConfig {
            proximity_threshold: 0.0,
            ..Default::default()
        };
        assert!(ThreatScorer::new(bad).is_err());
        let bad = ThreatConfig {
            attacking_weight: -1.0,
            ..Default::default()
        };
        assert!(ThreatScorer::new(bad).is_err());
    }
}
