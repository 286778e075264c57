//! Nomai Observer - Observation and validation of a live scene.
//!
//! The observer inspects a [`SceneWorld`](nomai_scene::world::SceneWorld)
//! without modifying it, runs independent analyses over what it sees and
//! aggregates everything into one versioned, hashable
//! [`WorldSnapshot`](observer::WorldSnapshot).
//!
//! # Modules
//!
//! - [`spatial`]: Off-screen objects, scale anomalies and collider overlaps.
//! - [`validation`]: Ordered rule registry with built-in rules and
//!   per-rule failure isolation.
//! - [`rule_file`]: Declarative JSON rules registered through the same
//!   extension point as code-defined rules.
//! - [`ui`]: Interactive-element graph with occlusion (`blockedBy`).
//! - [`observer`]: The aggregator: stage isolation, triggers, busy policy,
//!   snapshot sinks and the content hash.
//! - [`config`]: Configuration structs, loadable from JSON.
//!
//! # Quick Start
//!
//! ```
//! use nomai_observer::prelude::*;
//! use nomai_scene::prelude::*;
//!
//! let mut world = SceneWorld::with_builtins("Level01");
//! let cam = world.spawn(NodeSpec::new("Main Camera").with_tag(MAIN_CAMERA_TAG));
//! world.add_component(cam, Camera::default()).unwrap();
//! world.spawn(NodeSpec::new("Tiny").with_scale(Vec3::splat(0.001)));
//!
//! let mut observer = WorldObserver::new(ObserverConfig::default());
//! let snapshot = observer.capture_world_state(&world, "manual");
//!
//! let spatial = snapshot.spatial_report.as_ref().unwrap();
//! assert_eq!(spatial.scale_anomaly_count, 1);
//! assert_eq!(snapshot.content_hash.len(), 64); // BLAKE3 hex digest
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod observer;
pub mod rule_file;
pub mod spatial;
pub mod ui;
pub mod validation;

use nomai_capture::CaptureError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by the observer's public API.
///
/// Failures inside a capture are never returned; they are recorded as
/// diagnostics on the snapshot instead.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// A rule with the same id is already registered.
    #[error("rule '{id}' is already registered")]
    DuplicateRule { id: String },

    /// No rule with this id is registered.
    #[error("no rule named '{id}'")]
    UnknownRule { id: String },

    /// A rule file could not be read.
    #[error("cannot read rule file '{path}': {details}")]
    RuleFile { path: String, details: String },

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Capturing the requested object failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{BusyPolicy, ObserverConfig, SpatialConfig, ValidationConfig};
    pub use crate::observer::{
        AnalyzerFailure, CaptureContext, CaptureToken, ObjectSnapshot, SnapshotSink,
        TriggerOutcome, WorldObserver, WorldSnapshot, SCHEMA_VERSION,
    };
    pub use crate::rule_file::{load_rule_file, load_rules_from_str, NodeMatcher, RuleCheck, RuleSpec};
    pub use crate::spatial::{
        find_collider_overlaps, find_off_screen_objects, find_scale_anomalies, SpatialAnalyzer,
        SpatialIssue, SpatialReport, Viewpoint,
    };
    pub use crate::ui::{
        capture_ui_state, CanvasSubsystem, DocumentSubsystem, InteractiveSubsystem, UiElementNode,
        UiGraph, UiGraphBuilder,
    };
    pub use crate::validation::{
        Rule, RuleContext, Severity, ValidationEngine, ValidationFinding, ValidationReport,
    };
    pub use crate::ObserveError;
}
