//! The path resolver (C3, §4.1): a pure, total function reading a dotted
//! path against a rooted mapping.

use veil_workflow::Value;

/// Walk `path`'s segments left-to-right against `root`. At each step the
/// current value must be an object with the segment as a key; otherwise the
/// walk fails and `None` ("undefined") is returned. An empty path returns
/// the root. Never panics and never allocates beyond the segment split.
pub fn resolve(root: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(root.clone());
    }

    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => current = v,
                None => return None,
            },
            _ => return None,
        }
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_workflow::data_object;

    #[test]
    fn empty_path_returns_root() {
        let root = Value::Object(data_object([("x", 1i64)]));
        assert_eq!(resolve(&root, ""), Some(root.clone()));
    }

    #[test]
    fn resolves_nested_segments() {
        let inner = Value::Object(data_object([("y", 5i64)]));
        let root = Value::Object(data_object([("x", inner)]));
        assert_eq!(resolve(&root, "x.y"), Some(Value::Int(5)));
    }

    #[test]
    fn missing_segment_is_undefined() {
        let root = Value::Object(data_object([("x", 1i64)]));
        assert_eq!(resolve(&root, "x.y"), None);
    }

    #[test]
    fn scalar_midpath_is_undefined() {
        let root = Value::Object(data_object([("x", 1i64)]));
        assert_eq!(resolve(&root, "x.y.z"), None);
    }

    #[test]
    fn array_indexing_is_not_supported() {
        let root = Value::Object(data_object([(
            "list".to_string(),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
        )]));
        assert_eq!(resolve(&root, "list.0"), None);
    }
}
