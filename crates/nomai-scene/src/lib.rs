//! Nomai Scene -- the live, hierarchical world observed by the Nomai observer.
//!
//! A [`SceneWorld`](world::SceneWorld) is a tree of named nodes. Each node
//! carries a local transform, an active flag, a tag, a layer and an ordered
//! list of [`Component`](component::Component)s. Nodes live in a generational
//! arena, so a handle to a removed node deterministically resolves to "dead"
//! instead of aliasing whatever reuses its slot.
//!
//! Component types describe their fields through an explicit descriptor table
//! registered in the [`ComponentRegistry`](component::ComponentRegistry);
//! that table is what the capture crate walks when it turns live components
//! into snapshot records.
//!
//! # Quick Start
//!
//! ```
//! use nomai_scene::prelude::*;
//!
//! let mut world = SceneWorld::with_builtins("Level01");
//! let player = world.spawn(NodeSpec::new("Player").with_tag("Player"));
//! let hitbox = world.spawn_child(player, NodeSpec::new("Hitbox")).unwrap();
//! world.add_component(hitbox, Collider::cuboid(Vec3::ONE)).unwrap();
//!
//! assert_eq!(world.path(hitbox).as_deref(), Some("Player/Hitbox"));
//! assert!(world.get_component::<Collider>(hitbox).is_some());
//! ```

#![deny(unsafe_code)]

pub mod builtin;
pub mod component;
pub mod math;
pub mod node;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by structural world operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The node does not exist (stale generation or never allocated).
    #[error("node {node:?} does not exist (stale or never allocated)")]
    StaleNode { node: node::NodeId },

    /// Re-parenting would make a node its own ancestor.
    #[error("moving node {node:?} under {new_parent:?} would create a cycle")]
    WouldCreateCycle {
        node: node::NodeId,
        new_parent: node::NodeId,
    },

    /// A node cannot be its own parent.
    #[error("node {node:?} cannot be parented to itself")]
    SelfParent { node: node::NodeId },
}

/// Failure while reading one field out of a live component.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct FieldError(pub String);

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::builtin::{
        register_builtin_components, Camera, Canvas, Collider, ColliderShape, InputRouter, Light,
        LightKind, Renderer, UiDocument, UiKind, UiRect, VisualElement, MAIN_CAMERA_TAG,
    };
    pub use crate::component::{
        downcast, AssetHandle, Component, ComponentDescriptor, ComponentRegistry,
        DescriptorBuilder, FieldDescriptor, FieldSource, FieldType,
    };
    pub use crate::math::{
        quat_from_euler_degrees, Aabb, Color, LayerMask, Quat, Rect, Transform, Vec2, Vec3,
        WorldTransform,
    };
    pub use crate::node::{NodeArena, NodeId};
    pub use crate::world::{NodeData, NodeSpec, SceneWorld, UNTAGGED};
    pub use crate::{FieldError, SceneError};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
