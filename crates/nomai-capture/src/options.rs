//! Capture options -- the externally tunable knobs of the scene walker.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Options controlling what [`capture_scene`](crate::walker::capture_scene)
/// records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Deepest level whose nodes are recorded; nodes at this depth are
    /// captured with empty `children`. `None` is unbounded and `Some(0)`
    /// captures the roots only.
    pub max_depth: Option<usize>,
    /// Whether to fill `componentData`. Type names are always recorded.
    pub include_component_data: bool,
    /// Component type names never captured into `componentData`.
    pub excluded_component_types: BTreeSet<String>,
    /// Field type names (see `FieldType::type_name`) never captured.
    pub excluded_field_types: BTreeSet<String>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_component_data: true,
            excluded_component_types: BTreeSet::new(),
            excluded_field_types: BTreeSet::new(),
        }
    }
}

impl CaptureOptions {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn without_component_data(mut self) -> Self {
        self.include_component_data = false;
        self
    }

    pub fn exclude_component_type(mut self, type_name: impl Into<String>) -> Self {
        self.excluded_component_types.insert(type_name.into());
        self
    }

    pub fn exclude_field_type(mut self, type_name: impl Into<String>) -> Self {
        self.excluded_field_types.insert(type_name.into());
        self
    }

    /// Whether children of a node at `depth` should be descended into.
    pub fn descends_below(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_capture_everything() {
        let options = CaptureOptions::default();
        assert!(options.include_component_data);
        assert!(options.descends_below(10_000));
    }

    #[test]
    fn depth_zero_never_descends() {
        let options = CaptureOptions::default().with_max_depth(0);
        assert!(!options.descends_below(0));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let options: CaptureOptions =
            serde_json::from_str(r#"{"max_depth": 2, "excluded_component_types": ["Light"]}"#)
                .unwrap();
        assert_eq!(options.max_depth, Some(2));
        assert!(options.include_component_data);
        assert!(options.excluded_component_types.contains("Light"));
    }
}
