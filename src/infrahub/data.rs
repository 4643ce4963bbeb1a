use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};

/// Flatten Infrahub GraphQL envelopes into plain values.
///
/// - `{"value": x}` becomes `x`
/// - `{"edges": []}` becomes `[]`
/// - `{"node": n}` and `{"edges": [...]}` are unwrapped recursively
/// - scalar keys containing `__` lose the underscores (`__typename` -> `typename`)
pub fn clean_data(data: &Value) -> Value {
    match data {
        Value::Object(map) => {
            let mut result = Map::new();
            for (key, value) in map {
                match value {
                    Value::Object(inner) => {
                        let cleaned = if inner.len() == 1 && inner.contains_key("value") {
                            inner["value"].clone()
                        } else if inner.len() == 1 && inner.get("edges").is_some_and(is_falsy) {
                            Value::Array(Vec::new())
                        } else if let Some(node) = inner.get("node") {
                            clean_data(node)
                        } else if let Some(edges) = inner.get("edges") {
                            clean_data(edges)
                        } else {
                            clean_data(value)
                        };
                        result.insert(key.clone(), cleaned);
                    }
                    _ if key.contains("__") => {
                        result.insert(key.replace("__", ""), value.clone());
                    }
                    _ => {
                        result.insert(key.clone(), clean_data(value));
                    }
                }
            }
            Value::Object(result)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| clean_data(item.get("node").unwrap_or(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Clean a query result and return the payload under its first key.
/// A non-empty list yields its first element and `null` yields `{}`.
pub fn get_data(data: &Value) -> Result<Value> {
    let cleaned = clean_data(data);
    let first = cleaned
        .as_object()
        .and_then(|map| map.values().next())
        .ok_or_else(|| anyhow!("clean_data() did not return a non-empty dictionary"))?;

    Ok(match first {
        Value::Array(items) if !items.is_empty() => items[0].clone(),
        Value::Null => json!({}),
        other => other.clone(),
    })
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// String field lookup on a cleaned object
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// List field lookup on a cleaned object; missing or null gives an empty slice
pub fn list_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_value_and_node() {
        let raw = json!({
            "DcimDevice": {
                "edges": [
                    {"node": {
                        "id": "d1",
                        "name": {"value": "dc1-leaf-01"},
                        "platform": {"node": {"name": {"value": "eos"}}},
                        "__typename": "DcimDevice",
                    }}
                ]
            }
        });
        let cleaned = clean_data(&raw);
        assert_eq!(
            cleaned,
            json!({"DcimDevice": [{
                "id": "d1",
                "name": "dc1-leaf-01",
                "platform": {"name": "eos"},
                "typename": "DcimDevice",
            }]})
        );
    }

    #[test]
    fn test_clean_empty_edges_and_null_value() {
        let raw = json!({"interfaces": {"edges": []}, "mtu": {"value": null}});
        assert_eq!(clean_data(&raw), json!({"interfaces": [], "mtu": null}));
    }

    #[test]
    fn test_clean_null_node() {
        let raw = json!({"parent": {"node": null}});
        assert_eq!(clean_data(&raw), json!({"parent": null}));
    }

    #[test]
    fn test_get_data_first_element() {
        let raw = json!({"TopologyDataCenter": {"edges": [
            {"node": {"name": {"value": "DC1"}}},
            {"node": {"name": {"value": "DC2"}}},
        ]}});
        assert_eq!(get_data(&raw).unwrap(), json!({"name": "DC1"}));
    }

    #[test]
    fn test_get_data_null_and_empty() {
        assert_eq!(get_data(&json!({"Thing": null})).unwrap(), json!({}));
        assert!(get_data(&json!({})).is_err());
        assert!(get_data(&json!([1, 2])).is_err());
    }
}
