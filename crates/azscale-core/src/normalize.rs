//! Response normalization
//!
//! ARM responses reach us in more than one shape: raw wire JSON with
//! camelCase keys, typed Rust models that serialize with snake_case field
//! names, single records, bare arrays and `{ "value": [...] }` page
//! envelopes. Everything downstream of this module reads through
//! [`FieldSource`] and never looks at the raw shape.
//!
//! Lookups never fail. A field that is absent under every name variant, or
//! present as JSON `null`, is `None`; callers must treat that as unknown
//! rather than zero.

use serde::Serialize;
use serde_json::Value;

/// A provider value that exposes named fields
pub trait FieldSource {
    /// Value of the field with exactly this name, if present
    fn field_exact(&self, name: &str) -> Option<Value>;

    /// Every field name this value exposes
    fn field_names(&self) -> Vec<String>;

    /// Eager item form of this value
    ///
    /// Arrays yield their elements, page envelopes the contents of their
    /// `value` array, `null` nothing, and any other value itself.
    fn items(&self) -> Vec<Value>;

    /// Best-effort lookup across name variants
    ///
    /// Each name is tried with exact case first; only when no variant matches
    /// exactly are the field names scanned for a case-folded match.
    fn get_any(&self, names: &[&str]) -> Option<Value> {
        for name in names {
            if let Some(v) = self.field_exact(name).filter(|v| !v.is_null()) {
                return Some(v);
            }
        }

        let available = self.field_names();
        for name in names {
            let folded = name.to_lowercase();
            for candidate in &available {
                if candidate.to_lowercase() == folded
                    && let Some(v) = self.field_exact(candidate).filter(|v| !v.is_null())
                {
                    return Some(v);
                }
            }
        }

        None
    }

    /// Lookup that returns the nested value, normalized with the same rules
    fn nested(&self, names: &[&str]) -> Value {
        self.get_any(names).unwrap_or(Value::Null)
    }

    /// String field, case-insensitive, `None` when absent or not a scalar
    fn get_str(&self, names: &[&str]) -> Option<String> {
        self.get_any(names).and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Integer field via [`coerce_int`]
    fn get_int(&self, names: &[&str]) -> Option<i64> {
        coerce_int(self.get_any(names).as_ref(), None)
    }

    /// Float field via [`coerce_float`]
    fn get_float(&self, names: &[&str]) -> Option<f64> {
        coerce_float(self.get_any(names).as_ref(), None)
    }
}

impl FieldSource for Value {
    fn field_exact(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(name)).cloned()
    }

    fn field_names(&self) -> Vec<String> {
        self.as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn items(&self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            Value::Object(_) => match self.get_any(&["value"]) {
                Some(Value::Array(items)) => items,
                _ => vec![self.clone()],
            },
            other => vec![other.clone()],
        }
    }
}

/// A typed record exposed through its serialized field names
///
/// Any `Serialize` model can be normalized this way; the record is
/// serialized once and then read like a mapping.
#[derive(Debug, Clone)]
pub struct Typed {
    fields: Value,
}

impl Typed {
    /// Wrap a typed record
    pub fn new<T: Serialize>(record: &T) -> Self {
        // Serializing a plain data model cannot fail; a model that does
        // (non-string map keys) simply exposes no fields.
        let fields = serde_json::to_value(record).unwrap_or(Value::Null);
        Self { fields }
    }
}

impl FieldSource for Typed {
    fn field_exact(&self, name: &str) -> Option<Value> {
        self.fields.field_exact(name)
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.field_names()
    }

    fn items(&self) -> Vec<Value> {
        self.fields.items()
    }
}

/// Best-effort integer coercion
///
/// Integers pass through, floats are truncated, strings are parsed as an
/// integer and then as a float. Anything else yields `fallback`.
pub fn coerce_int(value: Option<&Value>, fallback: Option<i64>) -> Option<i64> {
    let Some(value) = value else {
        return fallback;
    };
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(truncate))
            .or(fallback),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
                .or(fallback)
        }
        _ => fallback,
    }
}

/// Best-effort float coercion, yielding `fallback` on failure
pub fn coerce_float(value: Option<&Value>, fallback: Option<f64>) -> Option<f64> {
    let Some(value) = value else {
        return fallback;
    };
    match value {
        Value::Number(n) => n.as_f64().or(fallback),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .or(fallback),
        _ => fallback,
    }
}

fn truncate(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

/// Canonical form used for case-insensitive identity comparisons
pub fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Case-insensitive equality over optional strings; both absent is equal
pub fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => fold(a) == fold(b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Serialize)]
    struct SkuDescription {
        name: Option<String>,
        tier: Option<String>,
        capacity: Option<i64>,
    }

    #[derive(Serialize)]
    struct PlanRecord {
        location: String,
        sku: SkuDescription,
        max_size_bytes: Option<i64>,
    }

    #[test]
    fn test_exact_then_case_folded_lookup() {
        let v = json!({"Name": "S1", "name_alias": "x"});
        assert_eq!(v.get_str(&["name"]), Some("S1".to_string()));

        let both = json!({"name": "exact", "NAME": "folded"});
        assert_eq!(both.get_str(&["name"]), Some("exact".to_string()));
    }

    #[test]
    fn test_variant_order_and_null_skipping() {
        let v = json!({"max_size_bytes": null, "maxSizeBytes": 1024});
        assert_eq!(v.get_int(&["max_size_bytes", "maxSizeBytes"]), Some(1024));
    }

    #[test]
    fn test_missing_field_is_none_not_zero() {
        let v = json!({"sku": {"name": "P1v3"}});
        assert_eq!(v.nested(&["sku"]).get_int(&["capacity"]), None);
        assert_eq!(Value::Null.get_str(&["name"]), None);
        assert_eq!(json!(42).get_str(&["name"]), None);
    }

    #[test]
    fn test_shape_independence() {
        let typed = Typed::new(&PlanRecord {
            location: "westeurope".into(),
            sku: SkuDescription {
                name: Some("S1".into()),
                tier: Some("Standard".into()),
                capacity: Some(3),
            },
            max_size_bytes: Some(5368709120),
        });
        let wire = json!({
            "location": "westeurope",
            "sku": {"Name": "S1", "Tier": "Standard", "Capacity": 3},
            "maxSizeBytes": 5368709120_i64
        });

        for source in [&typed as &dyn FieldSource, &wire as &dyn FieldSource] {
            let sku = source.nested(&["sku"]);
            assert_eq!(sku.get_str(&["name"]), Some("S1".to_string()));
            assert_eq!(sku.get_str(&["tier"]), Some("Standard".to_string()));
            assert_eq!(sku.get_int(&["capacity"]), Some(3));
            assert_eq!(
                source.get_int(&["max_size_bytes", "maxSizeBytes"]),
                Some(5368709120)
            );
            assert_eq!(source.get_str(&["location"]), Some("westeurope".into()));
        }
    }

    #[test]
    fn test_items_shapes() {
        assert!(Value::Null.items().is_empty());
        assert_eq!(json!([1, 2]).items().len(), 2);
        assert_eq!(json!({"value": [1, 2, 3], "nextLink": null}).items().len(), 3);
        assert_eq!(json!({"Value": [1]}).items(), vec![json!(1)]);
        assert_eq!(json!({"name": "Basic"}).items().len(), 1);
        assert_eq!(json!({"value": 5}).items(), vec![json!({"value": 5})]);
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int(Some(&json!(50)), None), Some(50));
        assert_eq!(coerce_int(Some(&json!(50.9)), None), Some(50));
        assert_eq!(coerce_int(Some(&json!("125")), None), Some(125));
        assert_eq!(coerce_int(Some(&json!("12.7")), None), Some(12));
        assert_eq!(coerce_int(Some(&json!("abc")), Some(7)), Some(7));
        assert_eq!(coerce_int(Some(&json!(true)), None), None);
        assert_eq!(coerce_int(None, Some(1)), Some(1));
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(coerce_float(Some(&json!(2.5)), None), Some(2.5));
        assert_eq!(coerce_float(Some(&json!(" 10 ")), None), Some(10.0));
        assert_eq!(coerce_float(Some(&json!("NaN")), Some(0.0)), Some(0.0));
        assert_eq!(coerce_float(Some(&json!([])), None), None);
    }

    #[test]
    fn test_same_text() {
        assert!(same_text(Some("P1V3"), Some(" p1v3")));
        assert!(same_text(None, None));
        assert!(!same_text(Some("S1"), None));
    }
}
