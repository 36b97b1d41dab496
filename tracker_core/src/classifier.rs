//! Behavior classification: a registry of scoring functions over a
//! [`FeatureVector`], normalized into a probability distribution.
//!
//! # Behaviors
//! | Behavior     | Score                                                        |
//! |--------------|--------------------------------------------------------------|
//! | Hovering     | gauss(avg_speed; σ) · gauss(abs(avg_vz); σ)                  |
//! | Attacking    | logistic(avg_vz; threshold, steepness)                       |
//! | Retreating   | logistic(−avg_vz; threshold, steepness)                      |
//! | Travelling   | logistic(avg_speed; …) · gauss(direction_std; dir_σ)         |
//! | Evading      | logistic(avg_speed; …) · (1 − gauss(direction_std; dir_σ))   |
//!
//! The registry is built once from configuration. Unknown behavior names and
//! missing or stray parameters are rejected at construction.

use crate::{
    error::{require_finite, require_positive, ConfigError, ConfigResult},
    features::FeatureVector,
    types::KinematicState,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::debug;

/// Below this total raw score no behavior is considered expressed.
pub const MIN_TOTAL_SCORE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Scoring primitives
// ---------------------------------------------------------------------------

/// Zero-centred Gaussian preference in `(0, 1]`.
pub fn gaussian_score(x: f64, sigma: f64) -> f64 {
    (-0.5 * (x / sigma).powi(2)).exp()
}

/// Logistic "above threshold" preference in `(0, 1)`.
pub fn sigmoid_score(x: f64, threshold: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-(x - threshold) * steepness).exp())
}

// ---------------------------------------------------------------------------
// Behavior names
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BehaviorKind {
    Hovering,
    Attacking,
    Retreating,
    Travelling,
    Evading,
}

impl BehaviorKind {
    pub const ALL: [BehaviorKind; 5] = [
        BehaviorKind::Hovering,
        BehaviorKind::Attacking,
        BehaviorKind::Retreating,
        BehaviorKind::Travelling,
        BehaviorKind::Evading,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorKind::Hovering => "Hovering",
            BehaviorKind::Attacking => "Attacking",
            BehaviorKind::Retreating => "Retreating",
            BehaviorKind::Travelling => "Travelling",
            BehaviorKind::Evading => "Evading",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BehaviorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownBehavior(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// One behavior as written in configuration: a name plus the parameters
/// that behavior needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steepness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_sigma: Option<f64>,
}

impl BehaviorEntry {
    fn named(kind: BehaviorKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            sigma: None,
            threshold: None,
            steepness: None,
            direction_sigma: None,
        }
    }

    pub fn hovering(sigma: f64) -> Self {
        Self {
            sigma: Some(sigma),
            ..Self::named(BehaviorKind::Hovering)
        }
    }

    pub fn attacking(threshold: f64, steepness: f64) -> Self {
        Self {
            threshold: Some(threshold),
            steepness: Some(steepness),
            ..Self::named(BehaviorKind::Attacking)
        }
    }

    pub fn retreating(threshold: f64, steepness: f64) -> Self {
        Self {
            threshold: Some(threshold),
            steepness: Some(steepness),
            ..Self::named(BehaviorKind::Retreating)
        }
    }

    pub fn travelling(threshold: f64, steepness: f64, direction_sigma: f64) -> Self {
        Self {
            threshold: Some(threshold),
            steepness: Some(steepness),
            direction_sigma: Some(direction_sigma),
            ..Self::named(BehaviorKind::Travelling)
        }
    }

    pub fn evading(threshold: f64, steepness: f64, direction_sigma: f64) -> Self {
        Self {
            threshold: Some(threshold),
            steepness: Some(steepness),
            direction_sigma: Some(direction_sigma),
            ..Self::named(BehaviorKind::Evading)
        }
    }
}

/// Classifier configuration: the active behaviors and their parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub behaviors: Vec<BehaviorEntry>,
}

impl Default for ClassifierConfig {
    /// Tuned for velocities in pixels per second (dt = 1/30). The heading
    /// spread is measured on filtered velocities: a straight track stays
    /// under 1°, a hard weave shows a few degrees.
    fn default() -> Self {
        Self {
            behaviors: vec![
                BehaviorEntry::hovering(5.0),
                BehaviorEntry::attacking(20.0, 0.2),
                BehaviorEntry::retreating(20.0, 0.2),
                BehaviorEntry::travelling(50.0, 0.1, 3.0),
                BehaviorEntry::evading(50.0, 0.1, 3.0),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Bound scoring functions
// ---------------------------------------------------------------------------

/// A behavior with its validated parameters bound in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BehaviorModel {
    Hovering {
        sigma: f64,
    },
    Attacking {
        threshold: f64,
        steepness: f64,
    },
    Retreating {
        threshold: f64,
        steepness: f64,
    },
    Travelling {
        threshold: f64,
        steepness: f64,
        direction_sigma: f64,
    },
    Evading {
        threshold: f64,
        steepness: f64,
        direction_sigma: f64,
    },
}

impl BehaviorModel {
    pub fn kind(&self) -> BehaviorKind {
        match self {
            BehaviorModel::Hovering { .. } => BehaviorKind::Hovering,
            BehaviorModel::Attacking { .. } => BehaviorKind::Attacking,
            BehaviorModel::Retreating { .. } => BehaviorKind::Retreating,
            BehaviorModel::Travelling { .. } => BehaviorKind::Travelling,
            BehaviorModel::Evading { .. } => BehaviorKind::Evading,
        }
    }

    /// Raw score in `[0, 1]`.
    pub fn score(&self, f: &FeatureVector) -> f64 {
        match *self {
            // Low speed and low vertical rate
            BehaviorModel::Hovering { sigma } => {
                gaussian_score(f.avg_speed, sigma) * gaussian_score(f.avg_vz.abs(), sigma)
            }
            BehaviorModel::Attacking {
                threshold,
                steepness,
            } => sigmoid_score(f.avg_vz, threshold, steepness),
            BehaviorModel::Retreating {
                threshold,
                steepness,
            } => sigmoid_score(-f.avg_vz, threshold, steepness),
            BehaviorModel::Travelling {
                threshold,
                steepness,
                direction_sigma,
            } => {
                sigmoid_score(f.avg_speed, threshold, steepness)
                    * gaussian_score(f.direction_std, direction_sigma)
            }
            BehaviorModel::Evading {
                threshold,
                steepness,
                direction_sigma,
            } => {
                sigmoid_score(f.avg_speed, threshold, steepness)
                    * (1.0 - gaussian_score(f.direction_std, direction_sigma))
            }
        }
    }

    /// Validate a configuration entry and bind its parameters.
    pub fn from_entry(entry: &BehaviorEntry) -> ConfigResult<Self> {
        let kind: BehaviorKind = entry.name.parse()?;
        let section = format!("classifier.{}", kind);

        let required = |value: Option<f64>, parameter: &'static str| -> ConfigResult<f64> {
            value.ok_or_else(|| ConfigError::MissingParameter {
                behavior: entry.name.clone(),
                parameter,
            })
        };
        let unexpected = |value: Option<f64>, parameter: &'static str| -> ConfigResult<()> {
            match value {
                Some(_) => Err(ConfigError::UnexpectedParameter {
                    behavior: entry.name.clone(),
                    parameter,
                }),
                None => Ok(()),
            }
        };

        let model = match kind {
            BehaviorKind::Hovering => {
                unexpected(entry.threshold, "threshold")?;
                unexpected(entry.steepness, "steepness")?;
                unexpected(entry.direction_sigma, "direction_sigma")?;
                let sigma = required(entry.sigma, "sigma")?;
                require_positive(&section, "sigma", sigma)?;
                BehaviorModel::Hovering { sigma }
            }
            BehaviorKind::Attacking | BehaviorKind::Retreating => {
                unexpected(entry.sigma, "sigma")?;
                unexpected(entry.direction_sigma, "direction_sigma")?;
                let threshold = required(entry.threshold, "threshold")?;
                let steepness = required(entry.steepness, "steepness")?;
                require_finite(&section, "threshold", threshold)?;
                require_finite(&section, "steepness", steepness)?;
                if kind == BehaviorKind::Attacking {
                    BehaviorModel::Attacking {
                        threshold,
                        steepness,
                    }
                } else {
                    BehaviorModel::Retreating {
                        threshold,
                        steepness,
                    }
                }
            }
            BehaviorKind::Travelling | BehaviorKind::Evading => {
                unexpected(entry.sigma, "sigma")?;
                let threshold = required(entry.threshold, "threshold")?;
                let steepness = required(entry.steepness, "steepness")?;
                let direction_sigma = required(entry.direction_sigma, "direction_sigma")?;
                require_finite(&section, "threshold", threshold)?;
                require_finite(&section, "steepness", steepness)?;
                require_positive(&section, "direction_sigma", direction_sigma)?;
                if kind == BehaviorKind::Travelling {
                    BehaviorModel::Travelling {
                        threshold,
                        steepness,
                        direction_sigma,
                    }
                } else {
                    BehaviorModel::Evading {
                        threshold,
                        steepness,
                        direction_sigma,
                    }
                }
            }
        };
        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Behavior → probability. Values sum to 1, or are all zero when no behavior
/// is expressed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorDistribution(BTreeMap<BehaviorKind, f64>);

impl BehaviorDistribution {
    /// Probability of `kind`; 0 when the behavior is not configured.
    pub fn get(&self, kind: BehaviorKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BehaviorKind, f64)> + '_ {
        self.0.iter().map(|(k, p)| (*k, *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Most probable behavior; `None` when every probability is zero.
    pub fn dominant(&self) -> Option<(BehaviorKind, f64)> {
        self.iter()
            .filter(|(_, p)| *p > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl FromIterator<(BehaviorKind, f64)> for BehaviorDistribution {
    fn from_iter<T: IntoIterator<Item = (BehaviorKind, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Registry of configured behaviors.
#[derive(Clone, Debug)]
pub struct BehaviorClassifier {
    models: Vec<BehaviorModel>,
}

impl BehaviorClassifier {
    pub fn new(config: &ClassifierConfig) -> ConfigResult<Self> {
        if config.behaviors.is_empty() {
            return Err(ConfigError::NoBehaviors);
        }
        let mut models: Vec<BehaviorModel> = Vec::with_capacity(config.behaviors.len());
        for entry in &config.behaviors {
            let model = BehaviorModel::from_entry(entry)?;
            if models.iter().any(|m| m.kind() == model.kind()) {
                return Err(ConfigError::DuplicateBehavior(entry.name.clone()));
            }
            models.push(model);
        }
        debug!(
            behaviors = ?models.iter().map(|m| m.kind()).collect::<Vec<_>>(),
            "behavior classifier configured"
        );
        Ok(Self { models })
    }

    /// Configured behaviors, in configuration order.
    pub fn behaviors(&self) -> impl Iterator<Item = BehaviorKind> + '_ {
        self.models.iter().map(|m| m.kind())
    }

    /// Raw (un-normalized) score of every configured behavior.
    pub fn scores(&self, features: &FeatureVector) -> Vec<(BehaviorKind, f64)> {
        self.models
            .iter()
            .map(|m| (m.kind(), m.score(features)))
            .collect()
    }

    /// Linear normalization of the raw scores.
    pub fn classify_features(&self, features: &FeatureVector) -> BehaviorDistribution {
        let scores = self.scores(features);
        let total: f64 = scores.iter().map(|(_, s)| s).sum();
        if total.is_nan() || total < MIN_TOTAL_SCORE {
            return scores.into_iter().map(|(k, _)| (k, 0.0)).collect();
        }
        scores.into_iter().map(|(k, s)| (k, s / total)).collect()
    }

    /// Features + classification over a state history window.
    /// The window must be non-empty (see [`FeatureVector::from_states`]).
    pub fn classify<'a, I>(&self, states: I) -> BehaviorDistribution
    where
        I: IntoIterator<Item = &'a KinematicState>,
    {
        self.classify_features(&FeatureVector::from_states(states))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
