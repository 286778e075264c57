//! Scene graph walker -- captures the live node tree into [`SceneNode`]s.
//!
//! The walk is a depth-first pre-order traversal starting at every root, in
//! live sibling order, so an unchanged world always captures to the same
//! tree. Failures are contained as locally as possible:
//!
//! - a field whose extractor fails, or whose value the serializer cannot
//!   represent, is omitted;
//! - a component whose extraction panics is dropped from `componentData`
//!   (its type name stays in `componentTypeNames`);
//! - a stale child handle is skipped.
//!
//! One broken component never prevents the rest of the world from being
//! observed.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use nomai_scene::component::{Component, FieldDescriptor};
use nomai_scene::node::NodeId;
use nomai_scene::world::SceneWorld;
use serde::{Deserialize, Serialize};

use crate::options::CaptureOptions;
use crate::record::{ComponentRecord, SceneNode};
use crate::value::{serialize_field, FieldValue};
use crate::CaptureError;

/// Counters describing one capture pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    pub nodes: usize,
    pub components_captured: usize,
    pub components_failed: usize,
    pub fields_omitted: usize,
    pub stale_children: usize,
}

/// Walks a [`SceneWorld`] with a fixed set of [`CaptureOptions`].
pub struct SceneWalker<'a> {
    world: &'a SceneWorld,
    options: &'a CaptureOptions,
    nodes: Cell<usize>,
    components_captured: Cell<usize>,
    components_failed: Cell<usize>,
    fields_omitted: Cell<usize>,
    stale_children: Cell<usize>,
}

impl<'a> SceneWalker<'a> {
    pub fn new(world: &'a SceneWorld, options: &'a CaptureOptions) -> Self {
        Self {
            world,
            options,
            nodes: Cell::new(0),
            components_captured: Cell::new(0),
            components_failed: Cell::new(0),
            fields_omitted: Cell::new(0),
            stale_children: Cell::new(0),
        }
    }

    /// Counters accumulated by every capture made with this walker.
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            nodes: self.nodes.get(),
            components_captured: self.components_captured.get(),
            components_failed: self.components_failed.get(),
            fields_omitted: self.fields_omitted.get(),
            stale_children: self.stale_children.get(),
        }
    }

    /// Capture every root and its descendants.
    pub fn capture_scene(&self) -> Vec<SceneNode> {
        self.world
            .roots()
            .iter()
            .filter_map(|&root| self.capture_node(root, 0))
            .collect()
    }

    /// Capture the subtree rooted at `root`. Depth limits are measured from
    /// `root`.
    ///
    /// # Errors
    ///
    /// A stale `root` is a caller error and returns
    /// [`SceneError::StaleNode`](nomai_scene::SceneError::StaleNode).
    pub fn capture_subtree(&self, root: NodeId) -> Result<SceneNode, CaptureError> {
        if !self.world.is_alive(root) {
            return Err(nomai_scene::SceneError::StaleNode { node: root }.into());
        }
        self.capture_node(root, 0)
            .ok_or(CaptureError::Scene(nomai_scene::SceneError::StaleNode { node: root }))
    }

    fn capture_node(&self, id: NodeId, depth: usize) -> Option<SceneNode> {
        let Some(data) = self.world.node(id) else {
            self.stale_children.set(self.stale_children.get() + 1);
            tracing::warn!(node = %id, depth, "stale node handle during capture -- skipping");
            return None;
        };
        self.nodes.set(self.nodes.get() + 1);

        let mut component_type_names = Vec::with_capacity(data.component_count());
        let mut component_data = Vec::new();
        for component in data.components() {
            let type_name = component.type_name().to_owned();
            if self.options.include_component_data
                && !self.options.excluded_component_types.contains(&type_name)
            {
                if let Some(record) = self.capture_component_isolated(id, component) {
                    component_data.push(record);
                }
            }
            component_type_names.push(type_name);
        }

        let children = if self.options.descends_below(depth) {
            data.children()
                .iter()
                .filter_map(|&child| self.capture_node(child, depth + 1))
                .collect()
        } else {
            Vec::new()
        };

        let transform = &data.transform;
        Some(SceneNode {
            name: data.name.clone(),
            active: data.active,
            tag: data.tag.clone(),
            layer: data.layer,
            position: transform.position.to_array(),
            rotation: transform.rotation.to_array(),
            scale: transform.scale.to_array(),
            component_type_names,
            component_data,
            children,
        })
    }

    /// Capture one component, treating a panic as "no record".
    fn capture_component_isolated(
        &self,
        node: NodeId,
        component: &dyn Component,
    ) -> Option<ComponentRecord> {
        match catch_unwind(AssertUnwindSafe(|| self.capture_component(node, component))) {
            Ok(Some(record)) => {
                self.components_captured
                    .set(self.components_captured.get() + 1);
                Some(record)
            }
            Ok(None) => None,
            Err(panic) => {
                self.components_failed.set(self.components_failed.get() + 1);
                tracing::warn!(
                    node = %node,
                    component = component.type_name(),
                    panic = panic_message(panic.as_ref()),
                    "component capture panicked -- omitting component"
                );
                None
            }
        }
    }

    /// `None` when the component retains no fields.
    fn capture_component(&self, node: NodeId, component: &dyn Component) -> Option<ComponentRecord> {
        let Some(descriptor) = self.world.registry().descriptor_for(component) else {
            tracing::debug!(
                node = %node,
                component = component.type_name(),
                "no field table registered -- component has no capturable fields"
            );
            return None;
        };

        let mut fields = BTreeMap::new();
        for field in &descriptor.fields {
            if self
                .options
                .excluded_field_types
                .contains(field.field_type.type_name())
            {
                continue;
            }
            match self.capture_field(component, field) {
                Ok(Some(value)) => {
                    fields.insert(field.name.to_owned(), value);
                }
                Ok(None) => {
                    self.fields_omitted.set(self.fields_omitted.get() + 1);
                }
                Err(err) => {
                    self.fields_omitted.set(self.fields_omitted.get() + 1);
                    tracing::debug!(node = %node, error = %err, "field extraction failed -- omitting field");
                }
            }
        }

        if fields.is_empty() {
            return None;
        }
        Some(ComponentRecord {
            type_name: component.type_name().to_owned(),
            enabled: component.is_enabled(),
            fields,
        })
    }

    fn capture_field(
        &self,
        component: &dyn Component,
        field: &FieldDescriptor,
    ) -> Result<Option<FieldValue>, CaptureError> {
        let source = field
            .extract(component)
            .map_err(|e| CaptureError::FieldExtraction {
                component: component.type_name().to_owned(),
                field: field.name.to_owned(),
                details: e.to_string(),
            })?;
        Ok(serialize_field(self.world, &source, field.field_type))
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Capture every root of `world`.
pub fn capture_scene(world: &SceneWorld, options: &CaptureOptions) -> Vec<SceneNode> {
    SceneWalker::new(world, options).capture_scene()
}

/// Capture the subtree rooted at `root`.
pub fn capture_subtree(
    world: &SceneWorld,
    root: NodeId,
    options: &CaptureOptions,
) -> Result<SceneNode, CaptureError> {
    SceneWalker::new(world, options).capture_subtree(root)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nomai_scene::prelude::*;

    #[derive(Debug)]
    struct Flaky {
        good: i64,
    }

    impl Component for Flaky {
        fn type_name(&self) -> &str {
            "Flaky"
        }
    }

    #[derive(Debug)]
    struct Exploding;

    impl Component for Exploding {
        fn type_name(&self) -> &str {
            "Exploding"
        }
    }

    fn world() -> SceneWorld {
        let mut world = SceneWorld::with_builtins("Walker");
        world.register_component::<Flaky, _>(|d| {
            d.field("good", FieldType::Int, |f| FieldSource::Int(f.good))
                .try_field("bad", FieldType::Int, |_| Err(FieldError("boom".into())))
        });
        world.register_component::<Exploding, _>(|d| {
            d.field("value", FieldType::Int, |_| panic!("extractor exploded"))
        });
        world
    }

    #[test]
    fn failing_field_is_omitted_not_fatal() {
        let mut w = world();
        let n = w.spawn(NodeSpec::new("N"));
        w.add_component(n, Flaky { good: 3 }).unwrap();

        let walker_options = CaptureOptions::default();
        let walker = SceneWalker::new(&w, &walker_options);
        let roots = walker.capture_scene();
        let record = roots[0].component("Flaky").unwrap();
        assert_eq!(record.fields.get("good"), Some(&FieldValue::Int(3)));
        assert!(!record.fields.contains_key("bad"));
        assert_eq!(walker.stats().fields_omitted, 1);
    }

    #[test]
    fn panicking_component_is_dropped_but_listed() {
        let mut w = world();
        let n = w.spawn(NodeSpec::new("N"));
        w.add_component(n, Exploding).unwrap();
        w.add_component(n, Light::default()).unwrap();
        let sibling = w.spawn(NodeSpec::new("Sibling"));
        w.add_component(sibling, Light::default()).unwrap();

        let options = CaptureOptions::default();
        let walker = SceneWalker::new(&w, &options);
        let roots = walker.capture_scene();

        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].component_type_names, vec!["Exploding", "Light"]);
        assert!(roots[0].component("Exploding").is_none());
        assert!(roots[0].component("Light").is_some());
        assert!(roots[1].component("Light").is_some());
        assert_eq!(walker.stats().components_failed, 1);
    }

    #[test]
    fn component_without_retained_fields_is_omitted() {
        let mut w = world();
        let n = w.spawn(NodeSpec::new("N"));
        // Every Renderer field except color/cast_shadows is an asset.
        w.add_component(n, Renderer::default()).unwrap();
        let options = CaptureOptions::default().exclude_field_type("Color").exclude_field_type("bool");
        let roots = capture_scene(&w, &options);
        assert!(roots[0].component_data.is_empty());
        assert_eq!(roots[0].component_type_names, vec!["MeshRenderer"]);
    }

    #[test]
    fn stale_subtree_root_is_an_error() {
        let mut w = world();
        let n = w.spawn(NodeSpec::new("N"));
        w.despawn(n).unwrap();
        assert!(capture_subtree(&w, n, &CaptureOptions::default()).is_err());
    }

    #[test]
    fn subtree_depth_is_relative_to_its_root() {
        let mut w = world();
        let a = w.spawn(NodeSpec::new("A"));
        let b = w.spawn_child(a, NodeSpec::new("B")).unwrap();
        let c = w.spawn_child(b, NodeSpec::new("C")).unwrap();
        w.spawn_child(c, NodeSpec::new("D")).unwrap();

        let node = capture_subtree(&w, b, &CaptureOptions::default().with_max_depth(1)).unwrap();
        assert_eq!(node.name, "B");
        assert_eq!(node.children[0].name, "C");
        assert!(node.children[0].children.is_empty());
    }
}
