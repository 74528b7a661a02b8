//! Navigation over `serde_json::Value` trees along a [`TreePath`].

use super::{PathComponent, TreePath};
use crate::core::{Result, StoreError};
use serde_json::Value as JsonValue;

fn step<'a>(current: &'a JsonValue, component: &PathComponent) -> Option<&'a JsonValue> {
    match component {
        PathComponent::Key(key) => current.as_object().and_then(|map| map.get(key)),
        PathComponent::Index(index) => current.as_array().and_then(|list| list.get(*index)),
    }
}

/// Retrieve the value at `path`, or `None` on any miss or type mismatch.
pub fn path_get<'a>(root: &'a JsonValue, path: &TreePath) -> Option<&'a JsonValue> {
    let mut current = root;
    for component in path.components() {
        current = step(current, component)?;
    }
    Some(current)
}

/// The raising flavor of [`path_get`].
pub fn path_get_required<'a>(root: &'a JsonValue, path: &TreePath) -> Result<&'a JsonValue> {
    path_get(root, path)
        .ok_or_else(|| StoreError::NotFound(format!("path not found: \"{}\"", path)))
}

/// Descend like [`path_get`], handing every visited node (the root included)
/// to `visit`. `abort` may short-circuit the descent; the node it fired on is
/// returned as the result.
pub fn path_get_with<'a>(
    root: &'a JsonValue,
    path: &TreePath,
    mut visit: Option<&mut dyn FnMut(&'a JsonValue)>,
    abort: Option<&dyn Fn(&JsonValue) -> bool>,
) -> Option<&'a JsonValue> {
    let mut current = root;
    if let Some(sink) = visit.as_deref_mut() {
        sink(current);
    }

    for component in path.components() {
        if let Some(stop) = abort {
            if stop(current) {
                return Some(current);
            }
        }
        current = step(current, component)?;
        if let Some(sink) = visit.as_deref_mut() {
            sink(current);
        }
    }
    Some(current)
}

/// Container kind a component demands from the node holding it.
fn fresh_container(next: &PathComponent) -> JsonValue {
    match next {
        PathComponent::Key(_) => JsonValue::Object(serde_json::Map::new()),
        PathComponent::Index(_) => JsonValue::Array(Vec::new()),
    }
}

fn container_matches(node: &JsonValue, next: &PathComponent) -> bool {
    match next {
        PathComponent::Key(_) => node.is_object(),
        PathComponent::Index(_) => node.is_array(),
    }
}

/// Set `value` at `path`, materializing intermediate containers as needed.
///
/// The container type of each created intermediate is driven by the *next*
/// component (key ⇒ mapping, index ⇒ sequence); out-of-range indices extend
/// the sequence with null placeholders. Setting the root is an error.
pub fn path_set(root: &mut JsonValue, path: &TreePath, value: JsonValue) -> Result<()> {
    path_set_with(root, path, value, None)
}

/// [`path_set`] with a creation hook, called with the prefix path of every
/// materialized intermediate node.
pub fn path_set_with(
    root: &mut JsonValue,
    path: &TreePath,
    value: JsonValue,
    mut node_created_hook: Option<&mut dyn FnMut(&TreePath)>,
) -> Result<()> {
    if path.is_empty() {
        return Err(StoreError::InvalidArgument(
            "can not set values for an empty path".to_string(),
        ));
    }

    let mut current = root;
    let components = path.components();
    for (i, component) in components.iter().enumerate() {
        let is_last = i == components.len() - 1;

        match component {
            PathComponent::Key(key) => {
                let map = current.as_object_mut().ok_or_else(|| {
                    StoreError::TypeMismatch(format!(
                        "expected a mapping for key \"{}\" in \"{}\"",
                        key, path
                    ))
                })?;

                if is_last {
                    map.insert(key.clone(), value);
                    return Ok(());
                }

                let next = &components[i + 1];
                let needs_new = match map.get(key) {
                    Some(existing) => !container_matches(existing, next),
                    None => true,
                };
                if needs_new {
                    map.insert(key.clone(), fresh_container(next));
                    if let Some(hook) = node_created_hook.as_deref_mut() {
                        hook(&path.slice(0..i + 1));
                    }
                }
                current = map.get_mut(key).expect("key inserted above");
            }
            PathComponent::Index(index) => {
                let list = current.as_array_mut().ok_or_else(|| {
                    StoreError::TypeMismatch(format!(
                        "expected a sequence for index {} in \"{}\"",
                        index, path
                    ))
                })?;

                if *index >= list.len() {
                    list.resize(index + 1, JsonValue::Null);
                }

                if is_last {
                    list[*index] = value;
                    return Ok(());
                }

                let next = &components[i + 1];
                if list[*index].is_null() || !container_matches(&list[*index], next) {
                    list[*index] = fresh_container(next);
                    if let Some(hook) = node_created_hook.as_deref_mut() {
                        hook(&path.slice(0..i + 1));
                    }
                }
                current = &mut list[*index];
            }
        }
    }
    unreachable!("assignment happens on the last component")
}

/// Delete the value at `path` and return it; `None` on any miss.
pub fn path_del(root: &mut JsonValue, path: &TreePath) -> Option<JsonValue> {
    let parent_path = path.parent()?;
    let target = path.last()?;

    let mut current = root;
    for component in parent_path.components() {
        current = match component {
            PathComponent::Key(key) => current.as_object_mut()?.get_mut(key)?,
            PathComponent::Index(index) => current.as_array_mut()?.get_mut(*index)?,
        };
    }

    match target {
        PathComponent::Key(key) => current.as_object_mut()?.remove(key),
        PathComponent::Index(index) => {
            let list = current.as_array_mut()?;
            if *index < list.len() {
                Some(list.remove(*index))
            } else {
                None
            }
        }
    }
}

/// Lazy descent: yields each node encountered below the root, failing on the
/// first miss.
pub struct PathIter<'a> {
    current: Option<&'a JsonValue>,
    components: std::slice::Iter<'a, PathComponent>,
}

impl<'a> Iterator for PathIter<'a> {
    type Item = Result<&'a JsonValue>;

    fn next(&mut self) -> Option<Self::Item> {
        let component = self.components.next()?;
        let current = self.current?;
        match step(current, component) {
            Some(next) => {
                self.current = Some(next);
                Some(Ok(next))
            }
            None => {
                self.current = None;
                Some(Err(StoreError::NotFound(format!(
                    "\"{}\" not found during descent",
                    component
                ))))
            }
        }
    }
}

pub fn path_iter<'a>(root: &'a JsonValue, path: &'a TreePath) -> PathIter<'a> {
    PathIter {
        current: Some(root),
        components: path.components().iter(),
    }
}

/// Descend mutably; on a missing component, `on_miss` may produce a
/// replacement node to splice in, otherwise the descent fails.
pub fn descend_mut<'a>(
    root: &'a mut JsonValue,
    path: &TreePath,
    mut on_miss: impl FnMut(&JsonValue, &PathComponent) -> Option<JsonValue>,
) -> Result<&'a mut JsonValue> {
    let mut current = root;
    for component in path.components() {
        let missing = step(current, component).is_none();
        if missing {
            let Some(replacement) = on_miss(current, component) else {
                return Err(StoreError::NotFound(format!(
                    "\"{}\" not found during descent",
                    component
                )));
            };
            match component {
                PathComponent::Key(key) => {
                    let map = current.as_object_mut().ok_or_else(|| {
                        StoreError::TypeMismatch(format!("\"{}\" is not a mapping key", key))
                    })?;
                    map.insert(key.clone(), replacement);
                }
                PathComponent::Index(index) => {
                    let list = current.as_array_mut().ok_or_else(|| {
                        StoreError::TypeMismatch(format!("{} is not a sequence index", index))
                    })?;
                    if *index >= list.len() {
                        list.resize(index + 1, JsonValue::Null);
                    }
                    list[*index] = replacement;
                }
            }
        }
        current = match component {
            PathComponent::Key(key) => current
                .as_object_mut()
                .and_then(|map| map.get_mut(key))
                .expect("present or spliced above"),
            PathComponent::Index(index) => current
                .as_array_mut()
                .and_then(|list| list.get_mut(*index))
                .expect("present or spliced above"),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let mut root = json!({});
        let path = TreePath::parse("company.members[1].name").unwrap();
        path_set(&mut root, &path, json!("ada")).unwrap();

        assert_eq!(path_get(&root, &path), Some(&json!("ada")));
        // index 0 was padded with a placeholder
        assert_eq!(
            path_get(&root, &TreePath::parse("company.members[0]").unwrap()),
            Some(&JsonValue::Null)
        );
    }

    #[test]
    fn test_get_miss_returns_none() {
        let root = json!({"a": {"b": 1}});
        assert!(path_get(&root, &TreePath::parse("a.c").unwrap()).is_none());
        assert!(path_get(&root, &TreePath::parse("a.b.c").unwrap()).is_none());
        assert!(path_get_required(&root, &TreePath::parse("a.c").unwrap()).is_err());
    }

    #[test]
    fn test_get_with_records_visited_nodes() {
        let root = json!({"a": {"b": [10, 20]}});
        let mut seen = Vec::new();
        let result = path_get_with(
            &root,
            &TreePath::parse("a.b[1]").unwrap(),
            Some(&mut |node| seen.push(node.clone())),
            None,
        );
        assert_eq!(result, Some(&json!(20)));
        assert_eq!(seen.len(), 4); // root, a, b, 20
    }

    #[test]
    fn test_get_with_abort_short_circuits() {
        let root = json!({"a": {"stop": true, "b": 1}});
        let aborted = path_get_with(
            &root,
            &TreePath::parse("a.b").unwrap(),
            None,
            Some(&|node| node.get("stop").is_some()),
        );
        assert_eq!(aborted, Some(&json!({"stop": true, "b": 1})));
    }

    #[test]
    fn test_set_replaces_mismatched_container() {
        let mut root = json!({"a": 5});
        path_set(&mut root, &TreePath::parse("a.b").unwrap(), json!(1)).unwrap();
        assert_eq!(root, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_set_empty_path_fails() {
        let mut root = json!({});
        assert!(path_set(&mut root, &TreePath::root(), json!(1)).is_err());
    }

    #[test]
    fn test_del_returns_removed_value() {
        let mut root = json!({"a": {"b": [1, 2, 3]}});
        let removed = path_del(&mut root, &TreePath::parse("a.b[1]").unwrap());
        assert_eq!(removed, Some(json!(2)));
        assert_eq!(root, json!({"a": {"b": [1, 3]}}));

        assert!(path_del(&mut root, &TreePath::parse("a.x").unwrap()).is_none());
    }

    #[test]
    fn test_iter_yields_each_node() {
        let root = json!({"a": {"b": 7}});
        let path = TreePath::parse("a.b").unwrap();
        let nodes: Vec<_> = path_iter(&root, &path).collect::<Result<_>>().unwrap();
        assert_eq!(nodes, vec![&json!({"b": 7}), &json!(7)]);
    }

    #[test]
    fn test_descend_mut_repairs_misses() {
        let mut root = json!({});
        let path = TreePath::parse("a.b").unwrap();
        let node = descend_mut(&mut root, &path, |_, _| Some(json!({}))).unwrap();
        *node = json!(42);
        assert_eq!(root, json!({"a": {"b": 42}}));

        let failed = descend_mut(&mut root, &TreePath::parse("x.y").unwrap(), |_, _| None);
        assert!(failed.is_err());
    }
}
