//! Snapshot field values and the field serializer.
//!
//! [`serialize_field`] is the single place that decides how a live field
//! value becomes snapshot data. Scalars and strings pass through, enums
//! become their variant name, geometric value types become fixed-length
//! float arrays, and node references are resolved shallowly to a
//! `{typeName, name}` pair. Everything else -- opaque assets, unknown
//! types, a declared type that does not match the live value, non-finite
//! floats -- yields `None`, meaning "omit this field".

use nomai_scene::component::{FieldSource, FieldType};
use nomai_scene::world::SceneWorld;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A snapshot-safe field value.
///
/// Serialized as `{"type": "<variant>", "value": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Enum variant name.
    Enum(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    /// `[x, y, z, w]`
    Quaternion([f32; 4]),
    /// `[r, g, b, a]`
    Color([f32; 4]),
    /// `[x, y, width, height]`
    Rect([f32; 4]),
    LayerMask(u32),
    ObjectReference(ObjectRef),
}

/// A reference to another object, by type and name only.
///
/// Never carries a live handle, so a snapshot can outlive the objects it
/// describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub type_name: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

fn finite<const N: usize>(values: [f32; N]) -> Option<[f32; N]> {
    values.iter().all(|v| v.is_finite()).then_some(values)
}

/// Convert one live field value into its snapshot form.
///
/// `None` means the field is omitted from the snapshot; this function never
/// fails.
pub fn serialize_field(
    world: &SceneWorld,
    source: &FieldSource,
    declared: FieldType,
) -> Option<FieldValue> {
    let value = match (declared, source) {
        // Primitives and strings.
        (FieldType::Bool, FieldSource::Bool(b)) => FieldValue::Bool(*b),
        (FieldType::Int, FieldSource::Int(i)) => FieldValue::Int(*i),
        (FieldType::Float, FieldSource::Float(f)) if f.is_finite() => FieldValue::Float(*f),
        (FieldType::Float, FieldSource::Int(i)) => FieldValue::Float(*i as f64),
        (FieldType::String, FieldSource::String(s)) => FieldValue::String(s.clone()),

        // Enums.
        (FieldType::Enum(_), FieldSource::Enum(variant)) => FieldValue::Enum((*variant).to_owned()),
        (FieldType::Enum(_), FieldSource::String(variant)) => FieldValue::Enum(variant.clone()),

        // Geometric value types.
        (FieldType::Vector2, FieldSource::Vector2(v)) => FieldValue::Vector2(finite(v.to_array())?),
        (FieldType::Vector3, FieldSource::Vector3(v)) => FieldValue::Vector3(finite(v.to_array())?),
        (FieldType::Vector4, FieldSource::Vector4(v)) => FieldValue::Vector4(finite(*v)?),
        (FieldType::Quaternion, FieldSource::Quaternion(q)) => {
            FieldValue::Quaternion(finite(q.to_array())?)
        }
        (FieldType::Color, FieldSource::Color(c)) => FieldValue::Color(finite(c.to_array())?),
        (FieldType::Rect, FieldSource::Rect(r)) => FieldValue::Rect(finite(r.to_array())?),
        (FieldType::LayerMask, FieldSource::LayerMask(mask)) => FieldValue::LayerMask(mask.0),

        // Live references, resolved shallowly.
        (FieldType::NodeRef(type_name), FieldSource::Node(Some(id))) => {
            let Some(target) = world.node(*id) else {
                tracing::debug!(node = %id, "stale node reference -- omitting field");
                return None;
            };
            FieldValue::ObjectReference(ObjectRef {
                type_name: type_name.to_owned(),
                name: target.name.clone(),
            })
        }

        // Opaque resources, unset references, unknown types, mismatches.
        _ => return None,
    };
    Some(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
