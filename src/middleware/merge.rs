use serde_json::Value;

/// Deep-merge `delta` into `base`.
///
/// Objects merge key by key, recursively. Anything else in `delta` (scalars,
/// arrays, null) replaces the value in `base` wholesale; arrays are never
/// concatenated.
pub fn deep_merge(base: Value, delta: Value) -> Value {
    match (base, delta) {
        (Value::Object(mut target), Value::Object(source)) => {
            for (key, incoming) in source {
                let merged = match target.remove(&key) {
                    Some(existing) => deep_merge(existing, incoming),
                    None => incoming,
                };
                target.insert(key, merged);
            }
            Value::Object(target)
        }
        (_, delta) => delta,
    }
}
