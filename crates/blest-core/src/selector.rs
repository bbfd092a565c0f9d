//! Result projection.
//!
//! A selector is a JSON array whose elements are either a string key (copy
//! that key verbatim) or a two-element array `[key, sub_selector]` (recurse
//! into the value under `key`). Projecting into an array of objects maps the
//! sub-selector over the elements and drops the ones that project to nothing.

use serde_json::{Map, Value};

/// A JSON object mapping, as used for bodies, contexts, and results.
pub type JsonMap = Map<String, Value>;

/// Projects `obj` through `selector`.
///
/// Unknown keys, malformed selector elements, and nested non-object values
/// yield no entry. Nested projections that come out empty are omitted from
/// the parent. Projection is idempotent.
pub fn project(obj: &JsonMap, selector: &[Value]) -> JsonMap {
    let mut filtered = JsonMap::new();

    for entry in selector {
        match entry {
            Value::String(key) => {
                if let Some(value) = obj.get(key) {
                    filtered.insert(key.clone(), value.clone());
                }
            }
            Value::Array(pair) => {
                let (key, sub) = match (pair.first(), pair.get(1)) {
                    (Some(Value::String(key)), Some(Value::Array(sub))) => (key, sub),
                    _ => continue,
                };
                match obj.get(key) {
                    Some(Value::Array(items)) => {
                        let projected: Vec<Value> = items
                            .iter()
                            .filter_map(|item| item.as_object())
                            .map(|item| project(item, sub))
                            .filter(|item| !item.is_empty())
                            .map(Value::Object)
                            .collect();
                        if !projected.is_empty() {
                            filtered.insert(key.clone(), Value::Array(projected));
                        }
                    }
                    Some(Value::Object(nested)) => {
                        let projected = project(nested, sub);
                        if !projected.is_empty() {
                            filtered.insert(key.clone(), Value::Object(projected));
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_picks_top_level_keys() {
        let input = obj(json!({"a": 1, "b": 2, "c": 3}));
        let selector = [json!("a"), json!("c")];
        let result = project(&input, &selector);
        assert_eq!(Value::Object(result), json!({"a": 1, "c": 3}));
    }

    #[test]
    fn test_missing_keys_are_omitted() {
        let input = obj(json!({"a": 1}));
        let result = project(&input, &[json!("a"), json!("zzz")]);
        assert_eq!(Value::Object(result), json!({"a": 1}));
    }

    #[test]
    fn test_projects_into_nested_object() {
        let input = obj(json!({"user": {"name": "ada", "secret": "x"}, "other": true}));
        let selector = [json!(["user", ["name"]])];
        let result = project(&input, &selector);
        assert_eq!(Value::Object(result), json!({"user": {"name": "ada"}}));
    }

    #[test]
    fn test_maps_over_arrays_and_drops_empty_elements() {
        let input = obj(json!({
            "items": [
                {"id": 1, "noise": true},
                {"noise": true},
                {"id": 3}
            ]
        }));
        let selector = [json!(["items", ["id"]])];
        let result = project(&input, &selector);
        assert_eq!(
            Value::Object(result),
            json!({"items": [{"id": 1}, {"id": 3}]})
        );
    }

    #[test]
    fn test_empty_nested_projection_omits_key() {
        let input = obj(json!({"user": {"secret": "x"}}));
        let result = project(&input, &[json!(["user", ["name"]])]);
        assert!(result.is_empty());

        let input = obj(json!({"items": [{"secret": "x"}]}));
        let result = project(&input, &[json!(["items", ["name"]])]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_non_object_nested_values_yield_no_entry() {
        let input = obj(json!({"n": 42, "items": [1, 2, 3]}));
        let result = project(&input, &[json!(["n", ["x"]]), json!(["items", ["x"]])]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_malformed_selector_elements_are_skipped() {
        let input = obj(json!({"a": 1}));
        let selector = [json!(42), json!([]), json!([1, ["a"]]), json!(["a"]), json!("a")];
        let result = project(&input, &selector);
        assert_eq!(Value::Object(result), json!({"a": 1}));
    }

    /// Test: project(project(x, s), s) == project(x, s)
    #[test]
    fn test_projection_is_idempotent() {
        let input = obj(json!({
            "a": 1,
            "user": {"name": "ada", "secret": "x"},
            "items": [{"id": 1, "noise": 2}, {"id": 3}]
        }));
        let selector = [json!("a"), json!(["user", ["name"]]), json!(["items", ["id"]])];
        let once = project(&input, &selector);
        let twice = project(&once, &selector);
        assert_eq!(once, twice);
    }
}
