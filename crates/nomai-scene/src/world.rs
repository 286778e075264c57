//! The [`SceneWorld`] is the live, hierarchical world the observer inspects.
//! It owns the node arena, the ordered list of root nodes, and the component
//! registry describing how each component type exposes its fields.

use crate::component::{downcast, Component, ComponentRegistry, DescriptorBuilder};
use crate::math::{Transform, Vec3, WorldTransform};
use crate::node::{NodeArena, NodeId};
use crate::SceneError;

/// Tag given to nodes that were not explicitly tagged.
pub const UNTAGGED: &str = "Untagged";

// ---------------------------------------------------------------------------
// NodeSpec
// ---------------------------------------------------------------------------

/// Description of a node to spawn.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub active: bool,
    pub tag: String,
    pub layer: i32,
    pub transform: Transform,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            tag: UNTAGGED.to_owned(),
            layer: 0,
            transform: Transform::default(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    /// Euler angles in degrees.
    pub fn with_rotation(mut self, euler: Vec3) -> Self {
        self.transform.rotation = euler;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transform.scale = scale;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

// ---------------------------------------------------------------------------
// NodeData
// ---------------------------------------------------------------------------

/// A live node. Hierarchy links are managed by the world and read-only here.
#[derive(Debug)]
pub struct NodeData {
    pub name: String,
    /// The node's own active flag (see [`SceneWorld::active_in_hierarchy`]).
    pub active: bool,
    pub tag: String,
    pub layer: i32,
    pub transform: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    components: Vec<Box<dyn Component>>,
}

impl NodeData {
    fn from_spec(spec: NodeSpec, parent: Option<NodeId>) -> Self {
        Self {
            name: spec.name,
            active: spec.active,
            tag: spec.tag,
            layer: spec.layer,
            transform: spec.transform,
            parent,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in sibling order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Components in declaration order.
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> + '_ {
        self.components.iter().map(|c| &**c)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

// ---------------------------------------------------------------------------
// SceneWorld
// ---------------------------------------------------------------------------

/// Container for the live node tree.
#[derive(Debug)]
pub struct SceneWorld {
    name: String,
    nodes: NodeArena<NodeData>,
    roots: Vec<NodeId>,
    registry: ComponentRegistry,
}

impl SceneWorld {
    /// Create an empty world with no registered component descriptors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: NodeArena::new(),
            roots: Vec::new(),
            registry: ComponentRegistry::new(),
        }
    }

    /// Create an empty world with the built-in component descriptors
    /// registered.
    pub fn with_builtins(name: impl Into<String>) -> Self {
        let mut world = Self::new(name);
        crate::builtin::register_builtin_components(&mut world.registry);
        world
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Register the field table of a component type.
    pub fn register_component<T, F>(&mut self, build: F) -> bool
    where
        T: Component + 'static,
        F: FnOnce(DescriptorBuilder<T>) -> DescriptorBuilder<T>,
    {
        self.registry.register::<T, F>(build)
    }

    // -- structure ----------------------------------------------------------

    /// Spawn a new root node, appended after the existing roots.
    pub fn spawn(&mut self, spec: NodeSpec) -> NodeId {
        let id = self.nodes.insert(NodeData::from_spec(spec, None));
        self.roots.push(id);
        id
    }

    /// Spawn a node as the last child of `parent`.
    pub fn spawn_child(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId, SceneError> {
        if !self.nodes.contains(parent) {
            return Err(SceneError::StaleNode { node: parent });
        }
        let id = self.nodes.insert(NodeData::from_spec(spec, Some(parent)));
        self.node_data_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Attach a component to a node, after its existing components.
    pub fn add_component<C: Component + 'static>(
        &mut self,
        node: NodeId,
        component: C,
    ) -> Result<(), SceneError> {
        self.node_data_mut(node)?.components.push(Box::new(component));
        Ok(())
    }

    /// Remove a node and its whole subtree.
    pub fn despawn(&mut self, node: NodeId) -> Result<(), SceneError> {
        let parent = self.node_data(node)?.parent;
        self.detach(node, parent);

        let mut removed = 0usize;
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.remove(id) {
                removed += 1;
                stack.extend(data.children);
            }
        }
        tracing::debug!(node = %node, removed, "despawned subtree");
        Ok(())
    }

    /// Move `node` under `new_parent` (or to the root list for `None`),
    /// appended as the last child.
    ///
    /// Fails if the move would make the node its own ancestor.
    pub fn set_parent(&mut self, node: NodeId, new_parent: Option<NodeId>) -> Result<(), SceneError> {
        let old_parent = self.node_data(node)?.parent;
        if let Some(target) = new_parent {
            if target == node {
                return Err(SceneError::SelfParent { node });
            }
            self.node_data(target)?;
            let mut cursor = Some(target);
            while let Some(id) = cursor {
                if id == node {
                    return Err(SceneError::WouldCreateCycle {
                        node,
                        new_parent: target,
                    });
                }
                cursor = self.parent(id);
            }
        }

        self.detach(node, old_parent);
        match new_parent {
            Some(target) => self.node_data_mut(target)?.children.push(node),
            None => self.roots.push(node),
        }
        self.node_data_mut(node)?.parent = new_parent;
        Ok(())
    }

    pub fn set_active(&mut self, node: NodeId, active: bool) -> Result<(), SceneError> {
        self.node_data_mut(node)?.active = active;
        Ok(())
    }

    fn detach(&mut self, node: NodeId, parent: Option<NodeId>) {
        let siblings = match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(p) => &mut p.children,
            None => &mut self.roots,
        };
        siblings.retain(|&c| c != node);
    }

    // -- lookup -------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    fn node_data(&self, id: NodeId) -> Result<&NodeData, SceneError> {
        self.nodes.get(id).ok_or(SceneError::StaleNode { node: id })
    }

    fn node_data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, SceneError> {
        self.nodes
            .get_mut(id)
            .ok_or(SceneError::StaleNode { node: id })
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Root nodes in order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of `id` in sibling order; empty for a stale handle.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Slash-delimited ancestry, e.g. `"Level/Props/Crate"`.
    pub fn path(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let data = self.nodes.get(current)?;
            names.push(data.name.as_str());
            cursor = data.parent;
        }
        names.reverse();
        Some(names.join("/"))
    }

    /// Number of ancestors (roots have depth 0).
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        let mut depth = 0;
        let mut cursor = self.nodes.get(id)?.parent;
        while let Some(current) = cursor {
            depth += 1;
            cursor = self.nodes.get(current)?.parent;
        }
        Some(depth)
    }

    /// True when the node and every ancestor are active.
    pub fn active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.nodes.get(current) {
                Some(data) if data.active => cursor = data.parent,
                _ => return false,
            }
        }
        true
    }

    /// Transform of the node resolved against all of its ancestors.
    pub fn world_transform(&self, id: NodeId) -> Option<WorldTransform> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let data = self.nodes.get(current)?;
            chain.push(&data.transform);
            cursor = data.parent;
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(WorldTransform::IDENTITY, |acc, local| acc.then(local)),
        )
    }

    /// First node named `name`, in pre-order.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|&id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    /// Resolve a slash-delimited path produced by [`path`](Self::path).
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut current = *self
            .roots
            .iter()
            .find(|&&id| self.nodes.get(id).is_some_and(|n| n.name == first))?;
        for segment in segments {
            current = *self
                .children(current)
                .iter()
                .find(|&&id| self.nodes.get(id).is_some_and(|n| n.name == segment))?;
        }
        Some(current)
    }

    // -- components ---------------------------------------------------------

    /// Components of `id` in declaration order; empty for a stale handle.
    pub fn components(&self, id: NodeId) -> impl Iterator<Item = &dyn Component> + '_ {
        self.nodes.get(id).into_iter().flat_map(|n| n.components())
    }

    /// First component of type `T` on the node.
    pub fn get_component<T: Component + 'static>(&self, id: NodeId) -> Option<&T> {
        self.components(id).find_map(downcast::<T>)
    }

    /// All components of type `T` on the node.
    pub fn get_components<T: Component + 'static>(&self, id: NodeId) -> Vec<&T> {
        self.components(id).filter_map(downcast::<T>).collect()
    }

    pub fn has_component_named(&self, id: NodeId, type_name: &str) -> bool {
        self.components(id).any(|c| c.type_name() == type_name)
    }

    // -- traversal ----------------------------------------------------------

    /// Every live node, depth-first pre-order from the roots.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            self.collect_preorder(root, &mut out);
        }
        out
    }

    /// `id` followed by all of its descendants in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_preorder(id, &mut out);
        out
    }

    fn collect_preorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(data) = self.nodes.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(data.children.iter().rev());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
