//! Depth-first traversal over JSON trees.
//!
//! Unlike the standard visitor pattern, the traversal logic lives here:
//! JSON offers exactly two containers, so the walk is fixed and visitors
//! only implement the hooks they care about. `enter_*` hooks may return
//! false to skip a container's contents.

use super::{PathComponent, TreePath};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Position of the current node during a traversal.
#[derive(Debug, Clone)]
pub struct VisitPosition {
    /// Nesting depth; the root container sits at level 0.
    pub level: usize,
    /// Key or index of the current node within its container; `None` at
    /// the root.
    pub key: Option<PathComponent>,
    /// Full path from the root to the current node.
    pub path: TreePath,
}

impl VisitPosition {
    fn root() -> Self {
        Self {
            level: 0,
            key: None,
            path: TreePath::root(),
        }
    }

    fn child(&self, key: PathComponent) -> Self {
        Self {
            level: self.level + 1,
            key: Some(key.clone()),
            path: self.path.child(key),
        }
    }
}

#[allow(unused_variables)]
pub trait JsonVisitor {
    /// Called for every non-container node.
    fn visit_value(&mut self, value: &JsonValue, position: &VisitPosition) {}

    /// Called before a mapping's entries; returning false skips them.
    fn enter_object(&mut self, object: &JsonMap<String, JsonValue>, position: &VisitPosition) -> bool {
        true
    }

    fn leave_object(&mut self, object: &JsonMap<String, JsonValue>, position: &VisitPosition) {}

    /// Called before a sequence's entries; returning false skips them.
    fn enter_array(&mut self, array: &[JsonValue], position: &VisitPosition) -> bool {
        true
    }

    fn leave_array(&mut self, array: &[JsonValue], position: &VisitPosition) {}
}

/// Walk `value` depth-first, handing every node to `visitor`.
pub fn visit_json(value: &JsonValue, visitor: &mut dyn JsonVisitor) {
    visit_node(value, visitor, &VisitPosition::root());
}

fn visit_node(value: &JsonValue, visitor: &mut dyn JsonVisitor, position: &VisitPosition) {
    match value {
        JsonValue::Object(map) => {
            if !visitor.enter_object(map, position) {
                return;
            }
            for (key, entry) in map {
                visit_node(entry, visitor, &position.child(PathComponent::key(key.as_str())));
            }
            visitor.leave_object(map, position);
        }
        JsonValue::Array(list) => {
            if !visitor.enter_array(list, position) {
                return;
            }
            for (index, entry) in list.iter().enumerate() {
                visit_node(entry, visitor, &position.child(PathComponent::Index(index)));
            }
            visitor.leave_array(list, position);
        }
        other => visitor.visit_value(other, position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Collector {
        leaves: Vec<(String, JsonValue)>,
        max_level: usize,
    }

    impl JsonVisitor for Collector {
        fn visit_value(&mut self, value: &JsonValue, position: &VisitPosition) {
            self.leaves.push((position.path.to_string(), value.clone()));
            self.max_level = self.max_level.max(position.level);
        }
    }

    #[test]
    fn test_visits_every_leaf_with_its_path() {
        let data = json!({
            "a": 1,
            "b": {"c": [10, 20]},
        });
        let mut collector = Collector::default();
        visit_json(&data, &mut collector);

        assert_eq!(
            collector.leaves,
            vec![
                ("a".to_string(), json!(1)),
                ("b.c[0]".to_string(), json!(10)),
                ("b.c[1]".to_string(), json!(20)),
            ]
        );
        assert_eq!(collector.max_level, 3);
    }

    struct Pruner {
        seen: Vec<String>,
    }

    impl JsonVisitor for Pruner {
        fn visit_value(&mut self, _value: &JsonValue, position: &VisitPosition) {
            self.seen.push(position.path.to_string());
        }

        fn enter_object(
            &mut self,
            object: &JsonMap<String, JsonValue>,
            _position: &VisitPosition,
        ) -> bool {
            // skip containers carrying a skip marker
            !object.contains_key("skip")
        }
    }

    #[test]
    fn test_enter_hook_prunes_subtrees() {
        let data = json!({
            "keep": {"x": 1},
            "drop": {"skip": true, "y": 2},
        });
        let mut pruner = Pruner { seen: Vec::new() };
        visit_json(&data, &mut pruner);
        assert_eq!(pruner.seen, vec!["keep.x".to_string()]);
    }

    #[test]
    fn test_scalar_root_is_a_single_visit() {
        let mut collector = Collector::default();
        visit_json(&json!(42), &mut collector);
        assert_eq!(collector.leaves, vec![(String::new(), json!(42))]);
    }
}
