//! Merge primitives over [`Content`] and [`Value`].
//!
//! Every function takes a base and an overlay by reference and builds a new
//! node. Inputs are never modified.

use crate::ast::{Content, ObjectMap, Value};

/// Which side wins when two plain strings meet inside an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The overlay replaces the base. Used by inheritance and extend.
    #[default]
    Overlay,
    /// The base (the imported fragment) keeps its plain string values.
    /// Every other rule is the same as `Overlay`.
    Import,
}

/// Joins two pieces of prose, dropping one when the other already contains it.
///
/// ```rust
/// use prs_resolver::merge::text_merge;
///
/// assert_eq!(text_merge("base assistant", "child assistant"), "base assistant\n\nchild assistant");
/// assert_eq!(text_merge("be brief", "Always be brief."), "Always be brief.");
/// assert_eq!(text_merge("", "only"), "only");
/// ```
#[must_use]
pub fn text_merge(base: &str, overlay: &str) -> String {
    if base.is_empty() {
        return overlay.to_string();
    }
    if overlay.is_empty() {
        return base.to_string();
    }
    if base.contains(overlay) {
        return base.to_string();
    }
    if overlay.contains(base) {
        return overlay.to_string();
    }
    format!("{base}\n\n{overlay}")
}

fn text_merge_opt(base: Option<&str>, overlay: Option<&str>) -> Option<String> {
    match (base, overlay) {
        (Some(b), Some(o)) => Some(text_merge(b, o)),
        (Some(t), None) | (None, Some(t)) => Some(t.to_string()),
        (None, None) => None,
    }
}

/// `base` in order, then each overlay element not already present.
///
/// Equality is structural.
#[must_use]
pub fn unique_concat(base: &[Value], overlay: &[Value]) -> Vec<Value> {
    let mut out = base.to_vec();
    for item in overlay {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Recursive merge of two property maps.
///
/// Keys present on both sides are merged with [`merge_values`]; keys only in
/// the overlay are added; keys only in the base are kept.
#[must_use]
pub fn deep_merge(base: &ObjectMap, overlay: &ObjectMap, policy: MergePolicy) -> ObjectMap {
    let mut out = base.clone();
    for (key, value) in overlay {
        let merged = match base.get(key) {
            Some(existing) => merge_values(existing, value, policy),
            None => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Merges two property values.
///
/// Text + Text text-merges, Object + Object deep-merges and Array + Array
/// unique-concats. Under [`MergePolicy::Import`] two plain strings keep the
/// base. Any other pairing lets the overlay replace the base.
#[must_use]
pub fn merge_values(base: &Value, overlay: &Value, policy: MergePolicy) -> Value {
    match (base, overlay) {
        (Value::String(_), Value::String(_)) if policy == MergePolicy::Import => base.clone(),
        (Value::Text(b), Value::Text(o)) => Value::Text(text_merge(b, o)),
        (Value::Object(b), Value::Object(o)) => Value::Object(deep_merge(b, o, policy)),
        (Value::Array(b), Value::Array(o)) => Value::Array(unique_concat(b, o)),
        _ => overlay.clone(),
    }
}

/// Merges two block contents following the four-by-four variant table.
///
/// | base \ overlay | Text | Object | Array | Mixed |
/// |---|---|---|---|---|
/// | Text | text-merge | Mixed(base, overlay) | overlay | Mixed(text-merge, overlay props) |
/// | Object | Mixed(overlay, base) | deep-merge | overlay | Mixed(overlay text, deep-merge) |
/// | Array | overlay | overlay | unique-concat | overlay |
/// | Mixed | Mixed(text-merge, base props) | Mixed(base text, deep-merge) | overlay | Mixed(text-merge, deep-merge) |
#[must_use]
pub fn merge_content(base: &Content, overlay: &Content, policy: MergePolicy) -> Content {
    match (base, overlay) {
        (Content::Text(b), Content::Text(o)) => Content::Text(text_merge(b, o)),
        (Content::Text(b), Content::Object(o)) => Content::Mixed {
            text: Some(b.clone()),
            properties: o.clone(),
        },
        (
            Content::Text(b),
            Content::Mixed {
                text,
                properties,
            },
        ) => Content::Mixed {
            text: text_merge_opt(Some(b), text.as_deref()),
            properties: properties.clone(),
        },
        (Content::Object(b), Content::Text(o)) => Content::Mixed {
            text: Some(o.clone()),
            properties: b.clone(),
        },
        (Content::Object(b), Content::Object(o)) => Content::Object(deep_merge(b, o, policy)),
        (
            Content::Object(b),
            Content::Mixed {
                text,
                properties,
            },
        ) => Content::Mixed {
            text: text.clone(),
            properties: deep_merge(b, properties, policy),
        },
        (Content::Array(b), Content::Array(o)) => Content::Array(unique_concat(b, o)),
        (
            Content::Mixed {
                text,
                properties,
            },
            Content::Text(o),
        ) => Content::Mixed {
            text: text_merge_opt(text.as_deref(), Some(o)),
            properties: properties.clone(),
        },
        (
            Content::Mixed {
                text,
                properties,
            },
            Content::Object(o),
        ) => Content::Mixed {
            text: text.clone(),
            properties: deep_merge(properties, o, policy),
        },
        (
            Content::Mixed {
                text: bt,
                properties: bp,
            },
            Content::Mixed {
                text: ot,
                properties: op,
            },
        ) => Content::Mixed {
            text: text_merge_opt(bt.as_deref(), ot.as_deref()),
            properties: deep_merge(bp, op, policy),
        },
        (Content::Text(_) | Content::Object(_) | Content::Mixed { .. }, Content::Array(_))
        | (Content::Array(_), Content::Text(_) | Content::Object(_) | Content::Mixed { .. }) => overlay.clone(),
    }
}
