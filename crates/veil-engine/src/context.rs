//! The value context (C2, §4.2): a flat `nodeId.out → value` mapping with
//! alias/config-alias overlay writes and copy-on-write nested materialization.

use veil_workflow::{DataObject, Value};

/// The executor's value store. Reads can go through the flat form
/// (`ctx.get("n1.result")`) or the nested form (resolving a dotted path
/// against `ctx.as_object()`), and both observe the same writes.
#[derive(Debug, Clone, Default)]
pub struct ValueContext {
    flat: DataObject,
}

impl ValueContext {
    pub fn new() -> Self {
        Self { flat: DataObject::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.flat.get(key)
    }

    /// The whole context as a nested object, suitable as the `memory` root
    /// passed to the path resolver.
    pub fn as_object(&self) -> Value {
        Value::Object(self.flat.clone())
    }

    /// Write `key = value`. If `key` contains a dot, the parent segment is
    /// additionally materialized (or re-materialized, copy-on-write) as a
    /// nested object carrying the written sub-path, per §4.2/§3.
    pub fn set(&mut self, key: &str, value: Value) {
        self.flat.insert(key.to_string(), value.clone());

        if let Some(dot) = key.find('.') {
            let root = &key[..dot];
            let rest = &key[dot + 1..];
            let mut obj = match self.flat.get(root) {
                Some(Value::Object(o)) => o.clone(),
                _ => DataObject::new(),
            };
            set_nested(&mut obj, rest, value);
            self.flat.insert(root.to_string(), Value::Object(obj));
        }
    }

    /// Apply the node-completion overlay rules (§4.2, second paragraph):
    /// write `<name>.result` for every applicable name (node id, alias,
    /// config alias), and for object results also one entry per key under
    /// each name.
    pub fn write_node_output(
        &mut self,
        node_id: &str,
        alias: Option<&str>,
        config_alias: Option<&str>,
        result: &Value,
    ) {
        let mut names: Vec<&str> = vec![node_id];
        if let Some(a) = alias {
            names.push(a);
        }
        if let Some(c) = config_alias {
            names.push(c);
        }

        match result {
            Value::Object(obj) => {
                for name in &names {
                    for (k, v) in obj.iter() {
                        self.set(&format!("{name}.{k}"), v.clone());
                    }
                    self.set(&format!("{name}.result"), result.clone());
                }
            }
            other => {
                for name in &names {
                    self.set(&format!("{name}.result"), other.clone());
                }
            }
        }
    }
}

/// Recursively overwrite `path` inside `obj`, copy-on-write at each level
/// visited, preserving sibling keys.
fn set_nested(obj: &mut DataObject, path: &str, value: Value) {
    match path.find('.') {
        Some(dot) => {
            let head = &path[..dot];
            let rest = &path[dot + 1..];
            let mut inner = match obj.get(head) {
                Some(Value::Object(o)) => o.clone(),
                _ => DataObject::new(),
            };
            set_nested(&mut inner, rest, value);
            obj.insert(head.to_string(), Value::Object(inner));
        }
        None => {
            obj.insert(path.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    #[test]
    fn flat_write_materializes_nested_object() {
        let mut ctx = ValueContext::new();
        ctx.set("n1.result", Value::Int(5));
        assert_eq!(ctx.get("n1.result"), Some(&Value::Int(5)));

        let resolved = resolve(&ctx.as_object(), "n1.result");
        assert_eq!(resolved, Some(Value::Int(5)));
    }

    #[test]
    fn nested_merge_preserves_siblings() {
        let mut ctx = ValueContext::new();
        ctx.set("n1.a", Value::Int(1));
        ctx.set("n1.b", Value::Int(2));
        let obj = ctx.get("n1").cloned().unwrap();
        match obj {
            Value::Object(o) => {
                assert_eq!(o.get("a"), Some(&Value::Int(1)));
                assert_eq!(o.get("b"), Some(&Value::Int(2)));
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn overlay_idempotence() {
        let mut once = ValueContext::new();
        once.write_node_output("n1", Some("alias1"), None, &Value::Int(7));

        let mut twice = ValueContext::new();
        twice.write_node_output("n1", Some("alias1"), None, &Value::Int(7));
        twice.write_node_output("n1", Some("alias1"), None, &Value::Int(7));

        assert_eq!(once.get("n1.result"), twice.get("n1.result"));
        assert_eq!(once.get("alias1.result"), twice.get("alias1.result"));
    }

    #[test]
    fn object_result_writes_per_key_plus_result() {
        let mut ctx = ValueContext::new();
        let result = Value::Object(veil_workflow::data_object([("message", "hi")]));
        ctx.write_node_output("n1", None, None, &result);

        assert_eq!(ctx.get("n1.message"), Some(&Value::String("hi".to_string())));
        assert_eq!(ctx.get("n1.result"), Some(&result));
    }
}
