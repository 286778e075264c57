//! Observer configuration.
//!
//! Every struct derives `Deserialize` with `#[serde(default)]`, so a host
//! can supply a partial JSON document and inherit the defaults for the rest.

use serde::{Deserialize, Serialize};

use nomai_capture::options::CaptureOptions;

use crate::ObserveError;

// ---------------------------------------------------------------------------
// SpatialConfig
// ---------------------------------------------------------------------------

/// Thresholds and toggles for the spatial analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Any local scale axis strictly below this is an anomaly.
    pub min_scale: f32,
    /// Any local scale axis strictly above this is an anomaly.
    pub max_scale: f32,
    /// Whether trigger colliders take part in overlap detection.
    pub include_triggers: bool,
    pub check_visibility: bool,
    pub check_scale: bool,
    pub check_overlaps: bool,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.01,
            max_scale: 100.0,
            include_triggers: false,
            check_visibility: true,
            check_scale: true,
            check_overlaps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationConfig
// ---------------------------------------------------------------------------

/// Parameters of the built-in validation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Layers whose nodes take part in interaction and need a collider.
    pub interaction_layers: Vec<i32>,
    /// Component type name of the input-routing component.
    pub input_router_type: String,
    /// Component type names that count as collision geometry.
    pub collider_types: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            interaction_layers: vec![8],
            input_router_type: "InputRouter".to_owned(),
            collider_types: vec![
                "BoxCollider".to_owned(),
                "SphereCollider".to_owned(),
                "CapsuleCollider".to_owned(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// ObserverConfig
// ---------------------------------------------------------------------------

/// What to do with a trigger that arrives while a capture is still being
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Keep the trigger and run it once the observer is free.
    #[default]
    Queue,
    /// Discard the trigger.
    Drop,
}

/// Top-level configuration of a [`WorldObserver`](crate::observer::WorldObserver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub capture: CaptureOptions,
    pub spatial: SpatialConfig,
    pub validation: ValidationConfig,
    pub busy_policy: BusyPolicy,
    /// Queued triggers beyond this are dropped, oldest kept.
    pub max_pending_triggers: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            capture: CaptureOptions::default(),
            spatial: SpatialConfig::default(),
            validation: ValidationConfig::default(),
            busy_policy: BusyPolicy::Queue,
            max_pending_triggers: 8,
        }
    }
}

impl ObserverConfig {
    /// Parse a (possibly partial) JSON configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ObserveError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ObserveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no analyzer can run with.
    pub fn validate(&self) -> Result<(), ObserveError> {
        let s = &self.spatial;
        if !(s.min_scale.is_finite() && s.max_scale.is_finite()) {
            return Err(ObserveError::Config(
                "scale thresholds must be finite".to_owned(),
            ));
        }
        if s.min_scale > s.max_scale {
            return Err(ObserveError::Config(format!(
                "min_scale ({}) exceeds max_scale ({})",
                s.min_scale, s.max_scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ObserverConfig::default();
        assert_eq!(config.spatial.min_scale, 0.01);
        assert_eq!(config.spatial.max_scale, 100.0);
        assert!(!config.spatial.include_triggers);
        assert_eq!(config.validation.interaction_layers, vec![8]);
        assert_eq!(config.busy_policy, BusyPolicy::Queue);
        assert_eq!(config.max_pending_triggers, 8);
    }

    #[test]
    fn partial_json_inherits_defaults() {
        let config = ObserverConfig::from_json_str(
            r#"{"spatial": {"max_scale": 50.0}, "busy_policy": "drop", "capture": {"max_depth": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.spatial.max_scale, 50.0);
        assert_eq!(config.spatial.min_scale, 0.01);
        assert_eq!(config.busy_policy, BusyPolicy::Drop);
        assert_eq!(config.capture.max_depth, Some(3));
    }

    #[test]
    fn malformed_or_inconsistent_json_is_a_config_error() {
        assert!(matches!(
            ObserverConfig::from_json_str("{not json"),
            Err(ObserveError::Config(_))
        ));
        assert!(matches!(
            ObserverConfig::from_json_str(r#"{"spatial": {"min_scale": 5.0, "max_scale": 1.0}}"#),
            Err(ObserveError::Config(_))
        ));
    }
}
