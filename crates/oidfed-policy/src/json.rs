//! Structural equality and set operations over JSON values.
//!
//! Every comparison the policy engine makes goes through [`canonical_form`],
//! which serializes a value with object keys sorted. Two values are equal
//! exactly when their canonical forms are equal, regardless of member order.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Coarse JSON value kind, used for type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// Serializes `value` with object keys in sorted order.
pub fn canonical_form(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Structural equality.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    canonical_form(a) == canonical_form(b)
}

/// Whether `set` contains an element structurally equal to `value`.
pub fn contains(set: &[Value], value: &Value) -> bool {
    let needle = canonical_form(value);
    set.iter().any(|v| canonical_form(v) == needle)
}

/// Removes structural duplicates, keeping the first occurrence.
pub fn dedup<I: IntoIterator<Item = Value>>(values: I) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(canonical_form(v)))
        .collect()
}

/// `a ∪ b`, `a`'s elements first.
pub fn union(a: &[Value], b: &[Value]) -> Vec<Value> {
    dedup(a.iter().chain(b.iter()).cloned())
}

/// Elements of `a` that also occur in `b`, in `a`'s order.
pub fn intersection(a: &[Value], b: &[Value]) -> Vec<Value> {
    let allowed: HashSet<String> = b.iter().map(canonical_form).collect();
    dedup(
        a.iter()
            .filter(|v| allowed.contains(&canonical_form(v)))
            .cloned(),
    )
}

/// Whether every element of `a` occurs in `b`.
pub fn is_subset(a: &[Value], b: &[Value]) -> bool {
    let superset: HashSet<String> = b.iter().map(canonical_form).collect();
    a.iter().all(|v| superset.contains(&canonical_form(v)))
}
