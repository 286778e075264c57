//! Spatial analyzer -- geometric sanity checks over the live world.
//!
//! Three independent checks, each runnable over the whole world or scoped to
//! one subtree:
//!
//! - **visibility**: nodes whose world position falls outside a viewpoint's
//!   view volume;
//! - **scale**: nodes whose local scale leaves the configured range;
//! - **overlaps**: pairs of colliders whose world-space bounds interpenetrate.
//!
//! Only nodes that are active in the hierarchy are considered. The analyzer
//! reads the world and never modifies it.

use std::collections::{HashMap, HashSet};

use nomai_capture::CaptureError;
use nomai_scene::builtin::{Camera, Collider, MAIN_CAMERA_TAG};
use nomai_scene::component::downcast;
use nomai_scene::math::{Aabb, Mat4, Vec2, Vec3};
use nomai_scene::node::NodeId;
use nomai_scene::world::SceneWorld;
use nomai_scene::SceneError;
use serde::{Deserialize, Serialize};

use crate::config::SpatialConfig;
use crate::ObserveError;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One spatial problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SpatialIssue {
    #[serde(rename_all = "camelCase")]
    OffScreenObject {
        object_path: String,
        world_position: [f32; 3],
        /// Straight-line distance from the viewpoint, for triage ordering.
        distance_from_view: f32,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    ScaleAnomaly {
        object_path: String,
        scale: [f32; 3],
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    ColliderOverlap {
        object1_path: String,
        object2_path: String,
        collider_type1: String,
        collider_type2: String,
        penetration_depth: f32,
    },
}

impl SpatialIssue {
    /// Every object path the issue refers to.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            SpatialIssue::OffScreenObject { object_path, .. }
            | SpatialIssue::ScaleAnomaly { object_path, .. } => vec![object_path],
            SpatialIssue::ColliderOverlap {
                object1_path,
                object2_path,
                ..
            } => vec![object1_path, object2_path],
        }
    }
}

/// Aggregated output of one spatial analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReport {
    /// Viewpoint used for the visibility check; `None` when no camera was
    /// available and visibility was skipped.
    pub viewpoint: Option<Viewpoint>,
    pub issues: Vec<SpatialIssue>,
    pub off_screen_count: usize,
    pub scale_anomaly_count: usize,
    pub overlap_count: usize,
}

impl SpatialReport {
    fn from_issues(viewpoint: Option<Viewpoint>, issues: Vec<SpatialIssue>) -> Self {
        let mut report = SpatialReport {
            viewpoint,
            ..Default::default()
        };
        for issue in &issues {
            match issue {
                SpatialIssue::OffScreenObject { .. } => report.off_screen_count += 1,
                SpatialIssue::ScaleAnomaly { .. } => report.scale_anomaly_count += 1,
                SpatialIssue::ColliderOverlap { .. } => report.overlap_count += 1,
            }
        }
        report.issues = issues;
        report
    }
}

// ---------------------------------------------------------------------------
// Viewpoint
// ---------------------------------------------------------------------------

/// A reference camera for the visibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewpoint {
    pub position: [f32; 3],
    /// Unit viewing direction.
    pub forward: [f32; 3],
    /// Unit up direction, orthogonal to `forward`.
    pub up: [f32; 3],
    pub near: f32,
    pub far: f32,
    pub horizontal_fov_deg: f32,
    pub vertical_fov_deg: f32,
    /// Path of the camera node this viewpoint was derived from.
    pub camera_path: Option<String>,
    /// The camera node itself, excluded from its own visibility check.
    #[serde(skip)]
    pub node: Option<NodeId>,
}

impl Viewpoint {
    /// A free viewpoint not attached to any node.
    pub fn new(position: Vec3, forward: Vec3, up: Vec3, camera: &Camera) -> Self {
        Self {
            position: position.to_array(),
            forward: forward.try_normalize().unwrap_or(Vec3::Z).to_array(),
            up: up.try_normalize().unwrap_or(Vec3::Y).to_array(),
            near: camera.near,
            far: camera.far,
            horizontal_fov_deg: camera.horizontal_fov_deg(),
            vertical_fov_deg: camera.vertical_fov_deg,
            camera_path: None,
            node: None,
        }
    }

    /// Derive the viewpoint from a camera node: its world position, its
    /// local +Z as forward and local +Y as up.
    pub fn from_camera_node(world: &SceneWorld, id: NodeId) -> Option<Self> {
        let camera = world.get_component::<Camera>(id)?;
        let xf = world.world_transform(id)?;
        let mut vp = Self::new(
            xf.position,
            xf.rotation * Vec3::Z,
            xf.rotation * Vec3::Y,
            camera,
        );
        vp.camera_path = world.path(id);
        vp.node = Some(id);
        Some(vp)
    }

    /// The first active, enabled camera tagged as the main camera, falling
    /// back to the first active, enabled camera of any tag.
    pub fn from_main_camera(world: &SceneWorld) -> Option<Self> {
        let cameras: Vec<NodeId> = world
            .preorder()
            .into_iter()
            .filter(|&id| {
                world.active_in_hierarchy(id)
                    && world
                        .get_component::<Camera>(id)
                        .is_some_and(|c| c.enabled)
            })
            .collect();
        let main = cameras
            .iter()
            .copied()
            .find(|&id| world.node(id).is_some_and(|n| n.tag == MAIN_CAMERA_TAG))
            .or_else(|| cameras.first().copied())?;
        Self::from_camera_node(world, main)
    }

    /// World-to-view matrix, left-handed: +X right, +Y up, +Z into the screen.
    fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_lh(
            Vec3::from_array(self.position),
            Vec3::from_array(self.forward),
            Vec3::from_array(self.up),
        )
    }

    /// Why `point` is off-screen from this viewpoint, or `None` when it is
    /// within the view volume.
    pub fn off_screen_reason(&self, point: Vec3) -> Option<String> {
        let view = self.view_matrix().transform_point3(point);
        let depth = view.z;

        if depth < 0.0 {
            return Some("behind the viewpoint".to_owned());
        }
        if depth > self.far {
            return Some(format!(
                "beyond far clip plane (depth {depth:.2} > {:.2})",
                self.far
            ));
        }
        if depth < self.near || depth <= f32::EPSILON {
            return Some(format!(
                "closer than near clip plane (depth {depth:.2} < {:.2})",
                self.near
            ));
        }

        let half_extent = Vec2::new(
            (self.horizontal_fov_deg.to_radians() * 0.5).tan(),
            (self.vertical_fov_deg.to_radians() * 0.5).tan(),
        ) * depth;
        let viewport = Vec2::splat(0.5) + view.truncate() / (2.0 * half_extent);
        if !(0.0..=1.0).contains(&viewport.x) || !(0.0..=1.0).contains(&viewport.y) {
            return Some(format!(
                "outside the viewport (x {:.2}, y {:.2})",
                viewport.x, viewport.y
            ));
        }
        None
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        point.distance(Vec3::from_array(self.position))
    }
}

// ---------------------------------------------------------------------------
// SpatialAnalyzer
// ---------------------------------------------------------------------------

/// Runs the spatial checks with a fixed [`SpatialConfig`].
#[derive(Debug, Clone, Default)]
pub struct SpatialAnalyzer {
    config: SpatialConfig,
    viewpoint: Option<Viewpoint>,
}

impl SpatialAnalyzer {
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            viewpoint: None,
        }
    }

    /// Use `viewpoint` instead of the world's main camera.
    pub fn with_viewpoint(mut self, viewpoint: Viewpoint) -> Self {
        self.viewpoint = Some(viewpoint);
        self
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// Run every enabled check over the whole world.
    pub fn analyze_world(&self, world: &SceneWorld) -> anyhow::Result<SpatialReport> {
        self.check_config()?;
        let scope = world.preorder();
        Ok(self.analyze_scope(world, &scope))
    }

    /// Run every enabled check over the subtree rooted at `id`. Overlaps are
    /// reported when at least one participant lies inside the subtree.
    pub fn analyze_object(&self, world: &SceneWorld, id: NodeId) -> Result<SpatialReport, ObserveError> {
        if !world.is_alive(id) {
            return Err(CaptureError::from(SceneError::StaleNode { node: id }).into());
        }
        self.check_config()
            .map_err(|e| ObserveError::Config(e.to_string()))?;
        let scope = world.descendants(id);
        Ok(self.analyze_scope(world, &scope))
    }

    fn check_config(&self) -> anyhow::Result<()> {
        let c = &self.config;
        if c.min_scale.is_nan() || c.max_scale.is_nan() || c.min_scale > c.max_scale {
            anyhow::bail!(
                "invalid scale range: min {} > max {}",
                c.min_scale,
                c.max_scale
            );
        }
        Ok(())
    }

    fn analyze_scope(&self, world: &SceneWorld, scope: &[NodeId]) -> SpatialReport {
        let mut issues = Vec::new();

        let viewpoint = self
            .viewpoint
            .clone()
            .or_else(|| Viewpoint::from_main_camera(world));
        if self.config.check_visibility {
            match &viewpoint {
                Some(vp) => issues.extend(off_screen_in(world, vp, scope)),
                None => tracing::debug!("no active camera -- skipping visibility check"),
            }
        }
        if self.config.check_scale {
            issues.extend(scale_anomalies_in(
                world,
                self.config.min_scale,
                self.config.max_scale,
                scope,
            ));
        }
        if self.config.check_overlaps {
            let in_scope: HashSet<NodeId> = scope.iter().copied().collect();
            issues.extend(overlaps_where(world, self.config.include_triggers, |a, b| {
                in_scope.contains(&a) || in_scope.contains(&b)
            }));
        }

        SpatialReport::from_issues(viewpoint, issues)
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Every active node outside the view volume of `viewpoint`.
pub fn find_off_screen_objects(world: &SceneWorld, viewpoint: &Viewpoint) -> Vec<SpatialIssue> {
    off_screen_in(world, viewpoint, &world.preorder())
}

fn off_screen_in(world: &SceneWorld, viewpoint: &Viewpoint, scope: &[NodeId]) -> Vec<SpatialIssue> {
    let mut issues = Vec::new();
    for &id in scope {
        if Some(id) == viewpoint.node || !world.active_in_hierarchy(id) {
            continue;
        }
        let (Some(xf), Some(path)) = (world.world_transform(id), world.path(id)) else {
            continue;
        };
        if let Some(reason) = viewpoint.off_screen_reason(xf.position) {
            issues.push(SpatialIssue::OffScreenObject {
                object_path: path,
                world_position: xf.position.to_array(),
                distance_from_view: viewpoint.distance_to(xf.position),
                reason,
            });
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Scale
// ---------------------------------------------------------------------------

/// Active nodes with a local scale axis strictly outside `[min, max]`.
///
/// Magnitudes are compared, so a mirrored axis of `-1` is not an anomaly.
/// Only the first violating axis is reported.
pub fn find_scale_anomalies(world: &SceneWorld, min: f32, max: f32) -> Vec<SpatialIssue> {
    scale_anomalies_in(world, min, max, &world.preorder())
}

fn scale_anomalies_in(world: &SceneWorld, min: f32, max: f32, scope: &[NodeId]) -> Vec<SpatialIssue> {
    const AXES: [&str; 3] = ["X", "Y", "Z"];
    let mut issues = Vec::new();
    for &id in scope {
        if !world.active_in_hierarchy(id) {
            continue;
        }
        let (Some(node), Some(path)) = (world.node(id), world.path(id)) else {
            continue;
        };
        let scale = node.transform.scale;
        let reason = (0..3).find_map(|axis| {
            let v = scale[axis].abs();
            if v < min {
                Some(format!(
                    "scale {} is {} (below minimum {min})",
                    AXES[axis],
                    scale[axis]
                ))
            } else if v > max {
                Some(format!(
                    "scale {} is {} (above maximum {max})",
                    AXES[axis],
                    scale[axis]
                ))
            } else {
                None
            }
        });
        if let Some(reason) = reason {
            issues.push(SpatialIssue::ScaleAnomaly {
                object_path: path,
                scale: scale.to_array(),
                reason,
            });
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Overlaps
// ---------------------------------------------------------------------------

struct ColliderEntry {
    node: NodeId,
    type_name: String,
    bounds: Aabb,
}

/// Every pair of interpenetrating colliders, one entry per pair of nodes.
pub fn find_collider_overlaps(world: &SceneWorld, include_triggers: bool) -> Vec<SpatialIssue> {
    overlaps_where(world, include_triggers, |_, _| true)
}

fn collect_colliders(world: &SceneWorld, include_triggers: bool) -> Vec<ColliderEntry> {
    let mut entries = Vec::new();
    for id in world.preorder() {
        if !world.active_in_hierarchy(id) {
            continue;
        }
        let Some(xf) = world.world_transform(id) else {
            continue;
        };
        for component in world.components(id) {
            let Some(collider) = downcast::<Collider>(component) else {
                continue;
            };
            if !collider.enabled || (collider.is_trigger && !include_triggers) {
                continue;
            }
            entries.push(ColliderEntry {
                node: id,
                type_name: component.type_name().to_owned(),
                bounds: collider.world_bounds(&xf),
            });
        }
    }
    entries
}

/// Naive pairwise test. Pairs are keyed by unordered node pair and keep the
/// deepest penetration across all of the two nodes' colliders.
fn overlaps_where<F>(world: &SceneWorld, include_triggers: bool, keep: F) -> Vec<SpatialIssue>
where
    F: Fn(NodeId, NodeId) -> bool,
{
    let entries = collect_colliders(world, include_triggers);

    // (first, second, depth) in discovery order; `index` dedups pairs.
    let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
    let mut index: HashMap<(NodeId, NodeId), usize> = HashMap::new();

    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (a, b) = (&entries[i], &entries[j]);
            if a.node == b.node || !keep(a.node, b.node) {
                continue;
            }
            let Some(depth) = a.bounds.penetration(&b.bounds) else {
                continue;
            };
            let key = if a.node < b.node {
                (a.node, b.node)
            } else {
                (b.node, a.node)
            };
            match index.get(&key) {
                Some(&slot) => {
                    if depth > pairs[slot].2 {
                        pairs[slot] = (i, j, depth);
                    }
                }
                None => {
                    index.insert(key, pairs.len());
                    pairs.push((i, j, depth));
                }
            }
        }
    }

    pairs
        .into_iter()
        .filter_map(|(i, j, depth)| {
            let (a, b) = (&entries[i], &entries[j]);
            Some(SpatialIssue::ColliderOverlap {
                object1_path: world.path(a.node)?,
                object2_path: world.path(b.node)?,
                collider_type1: a.type_name.clone(),
                collider_type2: b.type_name.clone(),
                penetration_depth: depth,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
