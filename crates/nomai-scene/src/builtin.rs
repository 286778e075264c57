//! Built-in component types and their field tables.
//!
//! These cover what the analyzers look for: cameras for the visibility
//! viewpoint, colliders for overlap checks, the two interactive-UI
//! subsystems (hierarchy-based canvases and document-based panels) and the
//! input router the validation rules require.

use crate::component::{AssetHandle, Component, ComponentRegistry, FieldSource, FieldType};
use crate::math::{Aabb, Color, Rect, Vec2, Vec3, WorldTransform};
use crate::node::NodeId;

/// Tag identifying the camera used as the default viewpoint.
pub const MAIN_CAMERA_TAG: &str = "MainCamera";

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// A perspective camera looking down its node's local +Z axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub enabled: bool,
    pub vertical_fov_deg: f32,
    /// Width / height of the viewport.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Horizontal field of view derived from the vertical one and the aspect
    /// ratio.
    pub fn horizontal_fov_deg(&self) -> f32 {
        let half_v = self.vertical_fov_deg.to_radians() * 0.5;
        (2.0 * (half_v.tan() * self.aspect).atan()).to_degrees()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            enabled: true,
            vertical_fov_deg: 60.0,
            aspect: 16.0 / 9.0,
            near: 0.3,
            far: 1000.0,
        }
    }
}

impl Component for Camera {
    fn type_name(&self) -> &str {
        "Camera"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    /// Box with full edge lengths `size`.
    Box { size: Vec3 },
    Sphere { radius: f32 },
    /// Capsule aligned with the local Y axis; `height` includes the caps.
    Capsule { radius: f32, height: f32 },
}

/// Collision volume attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Offset of the volume from the node origin, in local space.
    pub center: Vec3,
    pub is_trigger: bool,
    pub enabled: bool,
}

impl Collider {
    pub fn cuboid(size: Vec3) -> Self {
        Self::with_shape(ColliderShape::Box { size })
    }

    pub fn sphere(radius: f32) -> Self {
        Self::with_shape(ColliderShape::Sphere { radius })
    }

    pub fn capsule(radius: f32, height: f32) -> Self {
        Self::with_shape(ColliderShape::Capsule { radius, height })
    }

    fn with_shape(shape: ColliderShape) -> Self {
        Self {
            shape,
            center: Vec3::ZERO,
            is_trigger: false,
            enabled: true,
        }
    }

    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// World-space bounds of the volume under the node's world transform.
    pub fn world_bounds(&self, xf: &WorldTransform) -> Aabb {
        let center = xf.transform_point(self.center);
        let scale = xf.scale.abs();
        match self.shape {
            ColliderShape::Box { size } => {
                Aabb::from_oriented_box(center, size * 0.5 * scale, xf.rotation)
            }
            ColliderShape::Sphere { radius } => {
                Aabb::from_center_half_extents(center, Vec3::splat(radius.abs() * scale.max_element()))
            }
            ColliderShape::Capsule { radius, height } => {
                let r = radius.abs() * scale.x.max(scale.z);
                let half_height = (height.abs() * 0.5 * scale.y).max(r);
                Aabb::from_oriented_box(center, Vec3::new(r, half_height, r), xf.rotation)
            }
        }
    }
}

impl Component for Collider {
    fn type_name(&self) -> &str {
        match self.shape {
            ColliderShape::Box { .. } => "BoxCollider",
            ColliderShape::Sphere { .. } => "SphereCollider",
            ColliderShape::Capsule { .. } => "CapsuleCollider",
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ---------------------------------------------------------------------------
// Renderer / Light
// ---------------------------------------------------------------------------

/// Draws a mesh with a material.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderer {
    pub enabled: bool,
    pub mesh: Option<AssetHandle>,
    pub material: Option<AssetHandle>,
    pub color: Color,
    pub cast_shadows: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            enabled: true,
            mesh: None,
            material: None,
            color: Color::WHITE,
            cast_shadows: true,
        }
    }
}

impl Component for Renderer {
    fn type_name(&self) -> &str {
        "MeshRenderer"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LightKind::Directional => "Directional",
            LightKind::Point => "Point",
            LightKind::Spot => "Spot",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub enabled: bool,
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub range: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: LightKind::Point,
            color: Color::WHITE,
            intensity: 1.0,
            range: 10.0,
        }
    }
}

impl Component for Light {
    fn type_name(&self) -> &str {
        "Light"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ---------------------------------------------------------------------------
// Canvas-based UI
// ---------------------------------------------------------------------------

/// Root of a hierarchy-based screen-space UI. Descendant nodes carrying a
/// [`UiRect`] are its elements, drawn in pre-order (later draws on top).
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub enabled: bool,
    /// Canvases with a higher sort order draw on top.
    pub sort_order: i32,
    /// Multiplier from canvas units to screen pixels.
    pub scale_factor: f32,
    pub render_camera: Option<NodeId>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            enabled: true,
            sort_order: 0,
            scale_factor: 1.0,
            render_camera: None,
        }
    }
}

impl Component for Canvas {
    fn type_name(&self) -> &str {
        "Canvas"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiKind {
    Panel,
    Image,
    Text,
    Button,
    Toggle,
    Slider,
    InputField,
    ScrollView,
}

impl UiKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UiKind::Panel => "Panel",
            UiKind::Image => "Image",
            UiKind::Text => "Text",
            UiKind::Button => "Button",
            UiKind::Toggle => "Toggle",
            UiKind::Slider => "Slider",
            UiKind::InputField => "InputField",
            UiKind::ScrollView => "ScrollView",
        }
    }

    /// Kinds that accept user interaction by default.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            UiKind::Button | UiKind::Toggle | UiKind::Slider | UiKind::InputField | UiKind::ScrollView
        )
    }
}

/// A rectangular canvas element.
#[derive(Debug, Clone, PartialEq)]
pub struct UiRect {
    pub kind: UiKind,
    pub enabled: bool,
    /// Bottom-left corner relative to the nearest ancestor element (or the
    /// canvas origin), in canvas units.
    pub offset: Vec2,
    pub size: Vec2,
    /// Whether the element accepts user interaction.
    pub interactable: bool,
    /// Whether the element intercepts pointer input.
    pub raycast_target: bool,
}

impl UiRect {
    pub fn new(kind: UiKind, offset: Vec2, size: Vec2) -> Self {
        Self {
            kind,
            enabled: true,
            offset,
            size,
            interactable: kind.is_interactive(),
            raycast_target: true,
        }
    }
}

impl Component for UiRect {
    fn type_name(&self) -> &str {
        self.kind.as_str()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ---------------------------------------------------------------------------
// Document-based UI
// ---------------------------------------------------------------------------

/// One element of a [`UiDocument`] tree, laid out in absolute screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualElement {
    pub name: String,
    pub kind: UiKind,
    pub rect: Rect,
    /// `false` hides the element and its subtree.
    pub visible: bool,
    /// `false` disables interaction for the element and its subtree.
    pub enabled: bool,
    /// Whether the element intercepts pointer input.
    pub picking: bool,
    pub children: Vec<VisualElement>,
}

impl VisualElement {
    pub fn new(name: impl Into<String>, kind: UiKind, rect: Rect) -> Self {
        Self {
            name: name.into(),
            kind,
            rect,
            visible: true,
            enabled: true,
            picking: true,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: VisualElement) -> Self {
        self.children.push(child);
        self
    }

    /// Number of elements in this subtree, including itself.
    pub fn element_count(&self) -> usize {
        1 + self.children.iter().map(VisualElement::element_count).sum::<usize>()
    }
}

/// A document-based UI panel attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct UiDocument {
    pub enabled: bool,
    /// Panels with a higher sort order draw on top.
    pub sort_order: i32,
    pub root: VisualElement,
}

impl UiDocument {
    pub fn new(root: VisualElement) -> Self {
        Self {
            enabled: true,
            sort_order: 0,
            root,
        }
    }
}

impl Component for UiDocument {
    fn type_name(&self) -> &str {
        "UiDocument"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ---------------------------------------------------------------------------
// InputRouter
// ---------------------------------------------------------------------------

/// Routes pointer and keyboard input to interactive elements.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRouter {
    pub enabled: bool,
    pub module: String,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self {
            enabled: true,
            module: "StandaloneInput".to_owned(),
        }
    }
}

impl Component for InputRouter {
    fn type_name(&self) -> &str {
        "InputRouter"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register the field tables of every built-in component.
pub fn register_builtin_components(registry: &mut ComponentRegistry) {
    registry.register::<Camera, _>(|d| {
        d.field("vertical_fov", FieldType::Float, |c| {
            FieldSource::Float(c.vertical_fov_deg as f64)
        })
        .field("aspect", FieldType::Float, |c| FieldSource::Float(c.aspect as f64))
        .field("near_clip", FieldType::Float, |c| FieldSource::Float(c.near as f64))
        .field("far_clip", FieldType::Float, |c| FieldSource::Float(c.far as f64))
    });

    registry.register::<Collider, _>(|d| {
        d.field("center", FieldType::Vector3, |c| FieldSource::Vector3(c.center))
            .field("is_trigger", FieldType::Bool, |c| FieldSource::Bool(c.is_trigger))
            .field("size", FieldType::Vector3, |c| match c.shape {
                ColliderShape::Box { size } => FieldSource::Vector3(size),
                _ => FieldSource::Opaque,
            })
            .field("radius", FieldType::Float, |c| match c.shape {
                ColliderShape::Sphere { radius } | ColliderShape::Capsule { radius, .. } => {
                    FieldSource::Float(radius as f64)
                }
                ColliderShape::Box { .. } => FieldSource::Opaque,
            })
            .field("height", FieldType::Float, |c| match c.shape {
                ColliderShape::Capsule { height, .. } => FieldSource::Float(height as f64),
                _ => FieldSource::Opaque,
            })
    });

    registry.register::<Renderer, _>(|d| {
        d.field("mesh", FieldType::Asset("Mesh"), |r| FieldSource::Asset(r.mesh.clone()))
            .field("material", FieldType::Asset("Material"), |r| {
                FieldSource::Asset(r.material.clone())
            })
            .field("color", FieldType::Color, |r| FieldSource::Color(r.color))
            .field("cast_shadows", FieldType::Bool, |r| FieldSource::Bool(r.cast_shadows))
    });

    registry.register::<Light, _>(|d| {
        d.field("kind", FieldType::Enum("LightKind"), |l| FieldSource::Enum(l.kind.as_str()))
            .field("color", FieldType::Color, |l| FieldSource::Color(l.color))
            .field("intensity", FieldType::Float, |l| FieldSource::Float(l.intensity as f64))
            .field("range", FieldType::Float, |l| FieldSource::Float(l.range as f64))
    });

    registry.register::<Canvas, _>(|d| {
        d.field("sort_order", FieldType::Int, |c| FieldSource::Int(c.sort_order as i64))
            .field("scale_factor", FieldType::Float, |c| {
                FieldSource::Float(c.scale_factor as f64)
            })
            .field("render_camera", FieldType::NodeRef("Camera"), |c| {
                FieldSource::Node(c.render_camera)
            })
    });

    registry.register::<UiRect, _>(|d| {
        d.field("offset", FieldType::Vector2, |r| FieldSource::Vector2(r.offset))
            .field("size", FieldType::Vector2, |r| FieldSource::Vector2(r.size))
            .field("interactable", FieldType::Bool, |r| FieldSource::Bool(r.interactable))
            .field("raycast_target", FieldType::Bool, |r| {
                FieldSource::Bool(r.raycast_target)
            })
    });

    registry.register::<UiDocument, _>(|d| {
        d.field("sort_order", FieldType::Int, |u| FieldSource::Int(u.sort_order as i64))
            .field("root", FieldType::Other("VisualElement"), |_| FieldSource::Opaque)
            .field("element_count", FieldType::Int, |u| {
                FieldSource::Int(u.root.element_count() as i64)
            })
    });

    registry.register::<InputRouter, _>(|d| {
        d.field("module", FieldType::String, |r| FieldSource::String(r.module.clone()))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
