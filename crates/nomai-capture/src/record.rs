//! The captured scene tree.
//!
//! A [`SceneNode`] is an owned, immutable copy of one live node: no handles
//! into the live world survive capture, so a tree can be serialized, hashed
//! and analyzed after the world has moved on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// One captured component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub type_name: String,
    pub enabled: bool,
    /// Retained fields, ordered by name for deterministic output.
    pub fields: BTreeMap<String, FieldValue>,
}

/// One captured node and its captured children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub name: String,
    /// The node's own active flag.
    pub active: bool,
    pub tag: String,
    pub layer: i32,
    /// Local position.
    pub position: [f32; 3],
    /// Local rotation, Euler angles in degrees.
    pub rotation: [f32; 3],
    /// Local scale.
    pub scale: [f32; 3],
    /// Every component's type name in declaration order, including
    /// components excluded from or dropped out of `component_data`.
    pub component_type_names: Vec<String>,
    pub component_data: Vec<ComponentRecord>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn has_component(&self, type_name: &str) -> bool {
        self.component_type_names.iter().any(|n| n == type_name)
    }

    /// The first captured record of the given type.
    pub fn component(&self, type_name: &str) -> Option<&ComponentRecord> {
        self.component_data.iter().find(|c| c.type_name == type_name)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(SceneNode::subtree_len).sum::<usize>()
    }

    /// Depth of the deepest descendant relative to this node.
    pub fn subtree_depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.subtree_depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Visit this subtree in pre-order with each node's slash-delimited path
    /// and its depth relative to this node. `parent_path` is prefixed to
    /// every path when given.
    pub fn visit<'a, F>(&'a self, parent_path: Option<&str>, f: &mut F)
    where
        F: FnMut(&str, usize, &'a SceneNode),
    {
        let path = match parent_path {
            Some(parent) if !parent.is_empty() => format!("{parent}/{}", self.name),
            _ => self.name.clone(),
        };
        self.visit_inner(&path, 0, f);
    }

    fn visit_inner<'a, F>(&'a self, path: &str, depth: usize, f: &mut F)
    where
        F: FnMut(&str, usize, &'a SceneNode),
    {
        f(path, depth, self);
        for child in &self.children {
            let child_path = format!("{path}/{}", child.name);
            child.visit_inner(&child_path, depth + 1, f);
        }
    }
}

/// Total number of nodes across a list of captured roots.
pub fn count_nodes(roots: &[SceneNode]) -> usize {
    roots.iter().map(SceneNode::subtree_len).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> SceneNode {
        SceneNode {
            name: name.to_owned(),
            active: true,
            tag: "Untagged".to_owned(),
            layer: 0,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            component_type_names: Vec::new(),
            component_data: Vec::new(),
            children: Vec::new(),
        }
    }

    #[test]
    fn visit_reports_paths_and_depths() {
        let mut root = leaf("Root");
        let mut mid = leaf("Mid");
        mid.children.push(leaf("Leaf"));
        root.children.push(mid);
        root.children.push(leaf("Other"));

        let mut seen = Vec::new();
        root.visit(None, &mut |path, depth, _| seen.push((path.to_owned(), depth)));
        assert_eq!(
            seen,
            vec![
                ("Root".to_owned(), 0),
                ("Root/Mid".to_owned(), 1),
                ("Root/Mid/Leaf".to_owned(), 2),
                ("Root/Other".to_owned(), 1),
            ]
        );
        assert_eq!(root.subtree_len(), 4);
        assert_eq!(root.subtree_depth(), 2);
    }

    #[test]
    fn visit_prefixes_parent_path() {
        let node = leaf("Button");
        let mut paths = Vec::new();
        node.visit(Some("Canvas/Panel"), &mut |path, _, _| paths.push(path.to_owned()));
        assert_eq!(paths, vec!["Canvas/Panel/Button".to_owned()]);
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(leaf("N")).unwrap();
        assert!(json.get("componentTypeNames").is_some());
        assert!(json.get("componentData").is_some());
    }
}
