use serde_json::{Map, Value};

/// Characters ECS does not accept inside a label key.
const FORBIDDEN: [char; 4] = ['.', ' ', '*', '\\'];

/// Rewrite a free-form label key into one ECS accepts.
///
/// Leading and trailing whitespace is trimmed, then every `.`, space, `*`
/// and backslash becomes `_`. Applying it twice yields the same key.
pub fn sanitize_label_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect()
}

/// Sanitize every key of a label mapping, descending into nested mappings.
///
/// Values are left untouched apart from the keys of nested objects. When two
/// keys collapse onto the same sanitized key the later one wins.
pub fn sanitize_labels(labels: Map<String, Value>) -> Map<String, Value> {
    labels
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(nested) => Value::Object(sanitize_labels(nested)),
                other => other,
            };
            (sanitize_label_key(&key), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rewrites_forbidden_characters() {
        let cases = [
            ("sim ple", "sim_ple"),
            (" lpad", "lpad"),
            ("rpad ", "rpad"),
            ("foo.bar", "foo_bar"),
            ("a.b.c", "a_b_c"),
            (".hello", "_hello"),
            ("lorem.", "lorem_"),
            ("st*ar", "st_ar"),
            ("sla\\sh", "sla_sh"),
            ("a.b*c\\d", "a_b_c_d"),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize_label_key(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let once = sanitize_label_key("  a.b*c\\d e ");
        assert_eq!(sanitize_label_key(&once), once);
    }

    #[test]
    fn nested_keys_are_sanitized_and_values_kept() {
        let labels = json!({
            "outer.key": { "in ner": "a.b" },
            "plain": "x y"
        });
        let Value::Object(map) = labels else { unreachable!() };

        let out = Value::Object(sanitize_labels(map));
        assert_eq!(out, json!({ "outer_key": { "in_ner": "a.b" }, "plain": "x y" }));
    }
}
