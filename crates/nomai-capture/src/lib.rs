//! Nomai Capture - Serialized, disconnected copies of a live scene.
//!
//! This crate turns a [`SceneWorld`](nomai_scene::world::SceneWorld) into
//! plain data that can be serialized, hashed and analyzed after the live
//! world has moved on.
//!
//! # Modules
//!
//! - [`value`]: The field serializer. Converts one live field into a
//!   snapshot-safe [`FieldValue`](value::FieldValue), or omits it.
//! - [`record`]: The captured tree ([`SceneNode`](record::SceneNode),
//!   [`ComponentRecord`](record::ComponentRecord)).
//! - [`options`]: Depth limits and type exclusions for a capture.
//! - [`walker`]: The depth-first walker that builds the captured tree,
//!   isolating failures per field and per component.

#![deny(unsafe_code)]

pub mod options;
pub mod record;
pub mod value;
pub mod walker;

use nomai_scene::SceneError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while capturing a scene.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The capture was asked to start from a node that is gone.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// A component's field extractor failed.
    #[error("failed to extract field '{field}' of component '{component}': {details}")]
    FieldExtraction {
        component: String,
        field: String,
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::options::CaptureOptions;
    pub use crate::record::{count_nodes, ComponentRecord, SceneNode};
    pub use crate::value::{serialize_field, FieldValue, ObjectRef};
    pub use crate::walker::{capture_scene, capture_subtree, CaptureStats, SceneWalker};
    pub use crate::CaptureError;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
