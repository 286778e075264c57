//! Geometry types for the scene.
//!
//! Vectors, quaternions and affine transforms come from `glam`; this module
//! adds the scene-level types built on them: colors, screen rectangles, layer
//! masks, local and world transforms and axis-aligned boxes.
//! Rotations follow the editor convention of Euler angles in degrees applied
//! in Z, X, Y order (`EulerRot::YXZ`).

use serde::{Deserialize, Serialize};

pub use glam::{Affine3A, EulerRot, Mat3, Mat4, Quat, Vec2, Vec3};

/// Rotation from editor Euler angles in degrees (`x` pitch, `y` yaw,
/// `z` roll), applied Z first, then X, then Y.
pub fn quat_from_euler_degrees(euler: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    )
}

// ---------------------------------------------------------------------------
// Color / Rect / LayerMask
// ---------------------------------------------------------------------------

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// A screen-space rectangle, origin at its bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_position_size(position: Vec2, size: Vec2) -> Self {
        Self::new(position.x, position.y, size.x, size.y)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    /// True when the two rectangles share a region of positive area.
    /// Rectangles that only touch along an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let extent = self.max().min(other.max()) - self.min().max(other.min());
        extent.min_element() > 0.0
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// Bit set of layers, one bit per layer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub fn contains(self, layer: i32) -> bool {
        (0..32).contains(&layer) && self.0 & (1 << layer) != 0
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A node's transform relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn rotation_quat(&self) -> Quat {
        quat_from_euler_degrees(self.rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// A transform resolved against all of its ancestors.
///
/// `scale` is the lossy product of the ancestor scales; skew introduced by
/// rotated, non-uniformly scaled parents is not represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl WorldTransform {
    pub const IDENTITY: WorldTransform = WorldTransform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Compose a child's local transform onto this (parent) transform.
    pub fn then(&self, local: &Transform) -> WorldTransform {
        WorldTransform {
            position: self.transform_point(local.position),
            rotation: self.rotation * local.rotation_quat(),
            scale: self.scale * local.scale,
        }
    }

    /// Transform a point from local space into world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.to_affine().transform_point3(local)
    }
}

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// World-space axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        let half = half.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Bounds of a box with local half extents `half`, rotated by `rotation`
    /// and centred on `center`.
    pub fn from_oriented_box(center: Vec3, half: Vec3, rotation: Quat) -> Self {
        let basis = Mat3::from_quat(rotation).abs();
        Self::from_center_half_extents(center, basis * half.abs())
    }

    /// Penetration depth along the axis of minimum overlap, or `None` when
    /// the boxes are separated or merely touching.
    pub fn penetration(&self, other: &Aabb) -> Option<f32> {
        let overlap = self.max.min(other.max) - self.min.max(other.min);
        let depth = overlap.min_element();
        (depth > 0.0).then_some(depth)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
