//! Components and their field-descriptor tables.
//!
//! A [`Component`] is a typed behaviour/data module attached to a node. The
//! observer cannot inspect arbitrary Rust structs at runtime, so every
//! component type that wants its fields captured registers a
//! [`ComponentDescriptor`] in the [`ComponentRegistry`]: an ordered list of
//! `(field name, declared type, extractor)` entries. The extractors read the
//! live value and hand back a [`FieldSource`]; turning that into a snapshot
//! value is the capture crate's job.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::math::{Color, LayerMask, Quat, Rect, Vec2, Vec3};
use crate::node::NodeId;
use crate::FieldError;

// ---------------------------------------------------------------------------
// Component trait
// ---------------------------------------------------------------------------

/// Upcast helper, implemented for every `'static` type.
///
/// Call it on a `&dyn Component`, never on a `&Box<dyn Component>`: the
/// latter resolves to the box itself.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A behaviour/data module attached to a node.
pub trait Component: AsAny + fmt::Debug + Send + Sync {
    /// Type name reported in snapshots (e.g. `"BoxCollider"`).
    fn type_name(&self) -> &str;

    /// Whether the component is enabled. Components without an enable flag
    /// are always enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Downcast a component trait object to its concrete type.
pub fn downcast<T: Component + 'static>(component: &dyn Component) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}

// ---------------------------------------------------------------------------
// FieldType / FieldSource
// ---------------------------------------------------------------------------

/// The declared type of a component field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    /// An enum, carrying the enum's type name.
    Enum(&'static str),
    Vector2,
    Vector3,
    Vector4,
    Quaternion,
    Color,
    Rect,
    LayerMask,
    /// Reference to another live node, carrying the referenced type name.
    NodeRef(&'static str),
    /// Opaque binary resource (mesh, texture, audio clip ...).
    Asset(&'static str),
    /// Anything the serializer has no representation for.
    Other(&'static str),
}

impl FieldType {
    /// The name matched against capture-time field-type exclusions.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Vector2 => "Vector2",
            FieldType::Vector3 => "Vector3",
            FieldType::Vector4 => "Vector4",
            FieldType::Quaternion => "Quaternion",
            FieldType::Color => "Color",
            FieldType::Rect => "Rect",
            FieldType::LayerMask => "LayerMask",
            FieldType::Enum(name)
            | FieldType::NodeRef(name)
            | FieldType::Asset(name)
            | FieldType::Other(name) => *name,
        }
    }
}

/// Handle to an opaque asset owned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    pub kind: &'static str,
    pub id: u64,
    pub name: String,
}

/// A live field value as read by an extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Enum variant name.
    Enum(&'static str),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4([f32; 4]),
    Quaternion(Quat),
    Color(Color),
    Rect(Rect),
    LayerMask(LayerMask),
    /// A live node handle; `None` when the reference is unset.
    Node(Option<NodeId>),
    Asset(Option<AssetHandle>),
    /// A value with no snapshot representation.
    Opaque,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

type ExtractFn = Box<dyn Fn(&dyn Component) -> Result<FieldSource, FieldError> + Send + Sync>;

/// One entry of a component's field table.
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    extract: ExtractFn,
}

impl FieldDescriptor {
    /// Read the field from a live component.
    pub fn extract(&self, component: &dyn Component) -> Result<FieldSource, FieldError> {
        (self.extract)(component)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish()
    }
}

/// The ordered field table of one component type.
#[derive(Debug)]
pub struct ComponentDescriptor {
    /// Rust type name, for diagnostics.
    pub rust_type: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

/// Typed builder used while registering a descriptor.
pub struct DescriptorBuilder<T> {
    fields: Vec<FieldDescriptor>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Component + 'static> DescriptorBuilder<T> {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Add an infallible field.
    pub fn field<F>(self, name: &'static str, field_type: FieldType, read: F) -> Self
    where
        F: Fn(&T) -> FieldSource + Send + Sync + 'static,
    {
        self.try_field(name, field_type, move |c| Ok(read(c)))
    }

    /// Add a field whose extraction can fail.
    pub fn try_field<F>(mut self, name: &'static str, field_type: FieldType, read: F) -> Self
    where
        F: Fn(&T) -> Result<FieldSource, FieldError> + Send + Sync + 'static,
    {
        let extract: ExtractFn = Box::new(move |component: &dyn Component| {
            let typed = downcast::<T>(component).ok_or_else(|| {
                FieldError(format!(
                    "component '{}' is not a {}",
                    component.type_name(),
                    std::any::type_name::<T>()
                ))
            })?;
            read(typed)
        });
        self.fields.push(FieldDescriptor {
            name,
            field_type,
            extract,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Maps Rust component types to their field tables.
///
/// A type can only be registered once; later registrations of the same type
/// are ignored.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, usize>,
    descriptors: Vec<ComponentDescriptor>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the field table of `T`.
    ///
    /// Returns `false` if `T` was already registered (the existing table is
    /// kept).
    pub fn register<T, F>(&mut self, build: F) -> bool
    where
        T: Component + 'static,
        F: FnOnce(DescriptorBuilder<T>) -> DescriptorBuilder<T>,
    {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            tracing::debug!(
                rust_type = std::any::type_name::<T>(),
                "component type already registered -- keeping existing field table"
            );
            return false;
        }
        let builder = build(DescriptorBuilder::new());
        self.by_type.insert(type_id, self.descriptors.len());
        self.descriptors.push(ComponentDescriptor {
            rust_type: std::any::type_name::<T>(),
            fields: builder.fields,
        });
        true
    }

    /// The field table for a live component, if its type was registered.
    pub fn descriptor_for(&self, component: &dyn Component) -> Option<&ComponentDescriptor> {
        let type_id = component.as_any().type_id();
        self.by_type
            .get(&type_id)
            .and_then(|&idx| self.descriptors.get(idx))
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
