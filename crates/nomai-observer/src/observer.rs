//! World-state aggregator.
//!
//! [`WorldObserver`] runs the four observation stages in a fixed order
//! (walker, spatial, validation, UI) and assembles their output into one
//! versioned [`WorldSnapshot`]. Every stage runs inside its own failure
//! boundary: an error or a panic leaves that stage's section `None`, records
//! an [`AnalyzerFailure`] and lets the remaining stages run. A snapshot is
//! always produced.
//!
//! # Triggers and persistence
//!
//! [`WorldObserver::on_trigger`] is the entry point for lifecycle events
//! (scene loaded, play mode entered, ...). Each triggered snapshot is handed
//! to every registered [`SnapshotSink`] together with a [`CaptureToken`].
//! While any token is alive the observer is busy; triggers that arrive in
//! the meantime are queued or dropped according to [`BusyPolicy`].
//!
//! # Content hash
//!
//! `contentHash` is a BLAKE3 hex digest of the observed content (scene tree
//! and the three reports). Timestamp, trigger name, screenshots and
//! diagnostics are excluded, so an unchanged world hashes identically across
//! captures.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use nomai_capture::record::{count_nodes, SceneNode};
use nomai_capture::walker::{panic_message, CaptureStats, SceneWalker};
use nomai_capture::CaptureError;
use nomai_scene::node::NodeId;
use nomai_scene::world::SceneWorld;
use nomai_scene::SceneError;
use serde::{Deserialize, Serialize};

use crate::config::{BusyPolicy, ObserverConfig};
use crate::rule_file;
use crate::spatial::{SpatialAnalyzer, SpatialReport, Viewpoint};
use crate::ui::{UiGraph, UiGraphBuilder};
use crate::validation::{Rule, ValidationEngine, ValidationReport};
use crate::ObserveError;

/// Version of the snapshot JSON layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Stage names used in diagnostics.
pub const STAGE_WALKER: &str = "walker";
pub const STAGE_SPATIAL: &str = "spatial";
pub const STAGE_VALIDATION: &str = "validation";
pub const STAGE_UI: &str = "ui";

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// A stage that failed during a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerFailure {
    pub analyzer: String,
    pub message: String,
}

/// Everything observed about the world at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub schema_version: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub world_name: String,
    /// Name of the lifecycle event that caused the capture.
    pub trigger: String,
    /// The world's root nodes in sibling order; `None` when the walker failed.
    pub root: Option<Vec<SceneNode>>,
    pub capture_stats: Option<CaptureStats>,
    pub ui_graph: Option<UiGraph>,
    pub spatial_report: Option<SpatialReport>,
    pub validation_report: Option<ValidationReport>,
    /// Opaque references to externally captured images.
    pub screenshot_paths: Vec<String>,
    pub diagnostics: Vec<AnalyzerFailure>,
    pub content_hash: String,
}

impl WorldSnapshot {
    /// The captured world roots; empty when the walker failed.
    pub fn roots(&self) -> &[SceneNode] {
        self.root.as_deref().unwrap_or(&[])
    }

    pub fn failed(&self, stage: &str) -> bool {
        self.diagnostics.iter().any(|d| d.analyzer == stage)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Observation of a single subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSnapshot {
    pub schema_version: u32,
    pub timestamp: u64,
    pub world_name: String,
    pub object_path: String,
    pub node: SceneNode,
    pub spatial_report: Option<SpatialReport>,
    pub validation_report: Option<ValidationReport>,
    pub diagnostics: Vec<AnalyzerFailure>,
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn content_hash<T: Serialize>(content: &T) -> String {
    match serde_json::to_vec(content) {
        Ok(bytes) => blake3::hash(&bytes).to_hex().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "snapshot content not serializable -- hash left empty");
            String::new()
        }
    }
}

#[derive(Serialize)]
struct HashableWorld<'a> {
    root: &'a Option<Vec<SceneNode>>,
    ui_graph: &'a Option<UiGraph>,
    spatial_report: &'a Option<SpatialReport>,
    validation_report: &'a Option<ValidationReport>,
}

#[derive(Serialize)]
struct HashableObject<'a> {
    object_path: &'a str,
    node: &'a SceneNode,
    spatial_report: &'a Option<SpatialReport>,
    validation_report: &'a Option<ValidationReport>,
}

// ---------------------------------------------------------------------------
// Tokens, sinks, triggers
// ---------------------------------------------------------------------------

/// Held by whoever is persisting a snapshot. The observer is busy until
/// every outstanding token is dropped.
#[derive(Debug)]
pub struct CaptureToken {
    live: Arc<AtomicUsize>,
}

impl CaptureToken {
    fn issue(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::AcqRel);
        Self {
            live: Arc::clone(live),
        }
    }

    /// Signal that persistence is finished.
    pub fn release(self) {}
}

impl Drop for CaptureToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Receives every triggered snapshot.
///
/// A sink may persist synchronously and drop the token before returning, or
/// move the token (it is `Send`) to a writer thread and drop it when the
/// write completes. Errors are logged by the observer and never propagate.
pub trait SnapshotSink: Send {
    fn persist(&mut self, snapshot: &WorldSnapshot, token: CaptureToken) -> anyhow::Result<()>;
}

/// What [`WorldObserver::on_trigger`] did with a trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    Captured(Box<WorldSnapshot>),
    /// The observer was busy; the trigger will run later.
    Queued,
    /// The observer was busy and the trigger was discarded.
    Dropped,
}

/// Per-capture state handed to every stage.
pub struct CaptureContext<'a> {
    pub world: &'a SceneWorld,
    pub config: &'a ObserverConfig,
    pub timestamp: u64,
    pub trigger: &'a str,
}

/// Source of snapshot timestamps, in milliseconds since the Unix epoch.
pub type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Run one stage, turning errors and panics into a diagnostic.
fn run_stage<T, F>(stage: &str, diagnostics: &mut Vec<AnalyzerFailure>, f: F) -> Option<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let start = Instant::now();
    let message = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => {
            tracing::debug!(stage, elapsed_us = start.elapsed().as_micros() as u64, "stage complete");
            return Some(value);
        }
        Ok(Err(err)) => format!("{err:#}"),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };
    tracing::warn!(stage, error = %message, "observation stage failed -- section omitted");
    diagnostics.push(AnalyzerFailure {
        analyzer: stage.to_owned(),
        message,
    });
    None
}

// ---------------------------------------------------------------------------
// WorldObserver
// ---------------------------------------------------------------------------

/// Aggregates the walker and the three analyzers into world snapshots.
pub struct WorldObserver {
    config: ObserverConfig,
    spatial: SpatialAnalyzer,
    validation: ValidationEngine,
    ui: UiGraphBuilder,
    sinks: Vec<Box<dyn SnapshotSink>>,
    pending: VecDeque<String>,
    live_tokens: Arc<AtomicUsize>,
    screenshots: Vec<String>,
    clock: Clock,
}

impl Default for WorldObserver {
    fn default() -> Self {
        Self::new(ObserverConfig::default())
    }
}

impl WorldObserver {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            spatial: SpatialAnalyzer::new(config.spatial.clone()),
            validation: ValidationEngine::with_builtin_rules(&config.validation),
            ui: UiGraphBuilder::new(),
            sinks: Vec::new(),
            pending: VecDeque::new(),
            live_tokens: Arc::new(AtomicUsize::new(0)),
            screenshots: Vec::new(),
            clock: Box::new(system_clock),
            config,
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Use a fixed viewpoint instead of the world's main camera.
    pub fn with_viewpoint(mut self, viewpoint: Viewpoint) -> Self {
        self.spatial = SpatialAnalyzer::new(self.config.spatial.clone()).with_viewpoint(viewpoint);
        self
    }

    /// Replace the UI graph builder, e.g. to add custom subsystems.
    pub fn with_ui_builder(mut self, builder: UiGraphBuilder) -> Self {
        self.ui = builder;
        self
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    // -- rules --------------------------------------------------------------

    pub fn register_rule(&mut self, rule: Rule) -> Result<(), ObserveError> {
        self.validation.register_rule(rule)
    }

    pub fn set_rule_enabled(&mut self, id: &str, enabled: bool) -> Result<(), ObserveError> {
        self.validation.set_rule_enabled(id, enabled)
    }

    /// Register the rules of a JSON rule file; returns how many were added.
    pub fn load_rule_file(&mut self, path: impl AsRef<Path>) -> usize {
        rule_file::load_rule_file(&mut self.validation, path)
    }

    pub fn validation(&self) -> &ValidationEngine {
        &self.validation
    }

    // -- sinks and screenshots ----------------------------------------------

    pub fn add_sink(&mut self, sink: impl SnapshotSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Attach an externally captured image to the next snapshot.
    pub fn attach_screenshot(&mut self, path: impl Into<String>) {
        self.screenshots.push(path.into());
    }

    // -- capture ------------------------------------------------------------

    /// Capture the whole world. Never fails; failed stages are reported in
    /// `diagnostics`.
    pub fn capture_world_state(&mut self, world: &SceneWorld, trigger: &str) -> WorldSnapshot {
        let start = Instant::now();
        let ctx = CaptureContext {
            world,
            config: &self.config,
            timestamp: (self.clock)(),
            trigger,
        };
        let mut diagnostics = Vec::new();

        let walked = run_stage(STAGE_WALKER, &mut diagnostics, || {
            let walker = SceneWalker::new(ctx.world, &ctx.config.capture);
            let roots = walker.capture_scene();
            Ok((roots, walker.stats()))
        });
        let (root, capture_stats) = match walked {
            Some((roots, stats)) => (Some(roots), Some(stats)),
            None => (None, None),
        };

        let spatial_report = run_stage(STAGE_SPATIAL, &mut diagnostics, || {
            self.spatial.analyze_world(ctx.world)
        });

        let validation_report = run_stage(STAGE_VALIDATION, &mut diagnostics, || {
            Ok(match &root {
                Some(roots) => self.validation.validate_scene(roots),
                None => {
                    let fresh = SceneWalker::new(ctx.world, &ctx.config.capture).capture_scene();
                    self.validation.validate_scene(&fresh)
                }
            })
        });

        let ui_graph = run_stage(STAGE_UI, &mut diagnostics, || {
            self.ui.capture_ui_state(ctx.world)
        });

        let content_hash = content_hash(&HashableWorld {
            root: &root,
            ui_graph: &ui_graph,
            spatial_report: &spatial_report,
            validation_report: &validation_report,
        });

        let snapshot = WorldSnapshot {
            schema_version: SCHEMA_VERSION,
            timestamp: ctx.timestamp,
            world_name: world.name().to_owned(),
            trigger: trigger.to_owned(),
            root,
            capture_stats,
            ui_graph,
            spatial_report,
            validation_report,
            screenshot_paths: std::mem::take(&mut self.screenshots),
            diagnostics,
            content_hash,
        };

        tracing::info!(
            world = %snapshot.world_name,
            trigger,
            nodes = count_nodes(snapshot.roots()),
            failures = snapshot.diagnostics.len(),
            hash = %snapshot.content_hash,
            elapsed_us = start.elapsed().as_micros() as u64,
            "world state captured"
        );
        snapshot
    }

    /// Capture and analyze a single subtree.
    ///
    /// # Errors
    ///
    /// Returns an error only when `id` is stale.
    pub fn capture_object(&self, world: &SceneWorld, id: NodeId) -> Result<ObjectSnapshot, ObserveError> {
        let walker = SceneWalker::new(world, &self.config.capture);
        let node = walker.capture_subtree(id)?;
        let path = world
            .path(id)
            .ok_or(CaptureError::Scene(SceneError::StaleNode { node: id }))?;
        let parent_path = world.parent(id).and_then(|p| world.path(p));
        let mut diagnostics = Vec::new();

        let spatial_report = run_stage(STAGE_SPATIAL, &mut diagnostics, || {
            Ok(self.spatial.analyze_object(world, id)?)
        });
        let validation_report = run_stage(STAGE_VALIDATION, &mut diagnostics, || {
            Ok(self.validation.validate_object(&node, parent_path.as_deref()))
        });

        let content_hash = content_hash(&HashableObject {
            object_path: &path,
            node: &node,
            spatial_report: &spatial_report,
            validation_report: &validation_report,
        });
        Ok(ObjectSnapshot {
            schema_version: SCHEMA_VERSION,
            timestamp: (self.clock)(),
            world_name: world.name().to_owned(),
            object_path: path,
            node,
            spatial_report,
            validation_report,
            diagnostics,
            content_hash,
        })
    }

    // -- triggers -----------------------------------------------------------

    /// True while any issued [`CaptureToken`] is alive.
    pub fn is_busy(&self) -> bool {
        self.live_tokens.load(Ordering::Acquire) > 0
    }

    /// Triggers waiting for the observer to become free.
    pub fn pending_triggers(&self) -> impl Iterator<Item = &str> + '_ {
        self.pending.iter().map(String::as_str)
    }

    /// Handle a lifecycle event.
    pub fn on_trigger(&mut self, world: &SceneWorld, trigger: &str) -> TriggerOutcome {
        self.drain_pending(world);
        if self.is_busy() {
            return self.defer(trigger);
        }
        let snapshot = self.capture_and_persist(world, trigger);
        TriggerOutcome::Captured(Box::new(snapshot))
    }

    /// Run queued triggers while the observer is free. Returns how many ran.
    pub fn drain_pending(&mut self, world: &SceneWorld) -> usize {
        let mut ran = 0;
        while !self.is_busy() {
            let Some(trigger) = self.pending.pop_front() else {
                break;
            };
            self.capture_and_persist(world, &trigger);
            ran += 1;
        }
        ran
    }

    fn defer(&mut self, trigger: &str) -> TriggerOutcome {
        match self.config.busy_policy {
            BusyPolicy::Drop => {
                tracing::debug!(trigger, "observer busy -- trigger dropped");
                TriggerOutcome::Dropped
            }
            BusyPolicy::Queue if self.pending.len() >= self.config.max_pending_triggers => {
                tracing::warn!(
                    trigger,
                    pending = self.pending.len(),
                    "trigger queue full -- trigger dropped"
                );
                TriggerOutcome::Dropped
            }
            BusyPolicy::Queue => {
                self.pending.push_back(trigger.to_owned());
                tracing::debug!(trigger, pending = self.pending.len(), "observer busy -- trigger queued");
                TriggerOutcome::Queued
            }
        }
    }

    fn capture_and_persist(&mut self, world: &SceneWorld, trigger: &str) -> WorldSnapshot {
        let snapshot = self.capture_world_state(world, trigger);
        for sink in &mut self.sinks {
            let token = CaptureToken::issue(&self.live_tokens);
            if let Err(err) = sink.persist(&snapshot, token) {
                tracing::warn!(trigger, error = %format!("{err:#}"), "snapshot sink failed");
            }
        }
        snapshot
    }
}

impl std::fmt::Debug for WorldObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldObserver")
            .field("config", &self.config)
            .field("rules", &self.validation.len())
            .field("ui", &self.ui)
            .field("sinks", &self.sinks.len())
            .field("pending", &self.pending)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
