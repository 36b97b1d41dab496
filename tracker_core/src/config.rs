//! Top-level configuration surface, loaded from JSON.
//!
//! ```json
//! {
//!   "tracker": { "max_age": 5, "estimator": { "dt": 0.0333 } },
//!   "classifier": { "behaviors": [ { "name": "Hovering", "sigma": 5.0 } ] },
//!   "threat_score": { "attacking_weight": 0.5 },
//!   "associator": { "min_iou": 0.1 }
//! }
//! ```
//!
//! Every section and field is optional and falls back to its default, except
//! that a `behaviors` list, when present, replaces the default list whole.
//! Unknown fields are rejected.

use crate::{
    association::AssociatorConfig,
    classifier::{BehaviorClassifier, ClassifierConfig},
    error::ConfigResult,
    threat::ThreatConfig,
    track_manager::TrackManagerConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    pub tracker: TrackManagerConfig,
    pub classifier: ClassifierConfig,
    pub threat_score: ThreatConfig,
    pub associator: AssociatorConfig,
}

impl SystemConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every section, including building the behavior registry.
    pub fn validate(&self) -> ConfigResult<()> {
        self.tracker.validate()?;
        BehaviorClassifier::new(&self.classifier)?;
        self.threat_score.validate()?;
        self.associator.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classifier::BehaviorKind, error::ConfigError};

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = SystemConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, SystemConfig::default());
        assert_eq!(cfg.tracker.max_age, 5);
        assert_eq!(cfg.tracker.state_history_max_length, 15);
        assert_eq!(cfg.tracker.min_track_length, 5);
    }

    #[test]
    fn default_round_trips_through_json() {
        let json = SystemConfig::default().to_json_pretty().unwrap();
        let back = SystemConfig::from_json_str(&json).unwrap();
        assert_eq!(back, SystemConfig::default());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg = SystemConfig::from_json_str(
            r#"{ "tracker": { "max_age": 9, "estimator": { "dt": 1.0 } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.tracker.max_age, 9);
        assert_eq!(cfg.tracker.estimator.dt, 1.0);
        assert_eq!(cfg.tracker.estimator.process_noise, 10.0);
        assert_eq!(cfg.threat_score, ThreatConfig::default());
    }

    #[test]
    fn custom_behavior_list_replaces_defaults() {
        let cfg = SystemConfig::from_json_str(
            r#"{ "classifier": { "behaviors": [
                { "name": "Hovering", "sigma": 2.0 },
                { "name": "Attacking", "threshold": 10.0, "steepness": 0.5 }
            ] } }"#,
        )
        .unwrap();
        let clf = BehaviorClassifier::new(&cfg.classifier).unwrap();
        let kinds: Vec<_> = clf.behaviors().collect();
        assert_eq!(kinds, vec![BehaviorKind::Hovering, BehaviorKind::Attacking]);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = SystemConfig::from_json_str(r#"{ "tracker": { "max_agee": 3 } }"#);
        assert!(matches!(err, Err(ConfigError::Parse(_))));
        let err = SystemConfig::from_json_str(r#"{ "tracking": {} }"#);
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn unknown_behavior_rejected() {
        let err = SystemConfig::from_json_str(
            r#"{ "classifier": { "behaviors": [ { "name": "loitering", "sigma": 1.0 } ] } }"#,
        );
        assert!(matches!(err, Err(ConfigError::UnknownBehavior(name)) if name == "loitering"));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(SystemConfig::from_json_str(
            r#"{ "threat_score": { "approach_threshold": -1.0 } }"#
        )
        .is_err());
        assert!(SystemConfig::from_json_str(r#"{ "tracker": { "estimator": { "dt": 0.0 } } }"#)
            .is_err());
        assert!(SystemConfig::from_json_str(r#"{ "associator": { "min_iou": -0.5 } }"#).is_err());
    }
}
