use super::content::{MergePolicy, merge_content, merge_values};
use super::import::AliasTable;
use crate::ast::{Content, Document, ExtendBlock, ObjectMap, Value};

/// Applies every extend of `document` in declaration order and clears them.
///
/// Later extends see the result of earlier ones.
#[must_use]
pub fn apply_extends(document: &Document, aliases: &mut AliasTable) -> Document {
    let mut current = Document {
        extends: Vec::new(),
        ..document.clone()
    };
    for extend in &document.extends {
        current = apply_extend(&current, extend, aliases);
    }
    current
}

/// Applies one extend.
///
/// `target_path` is `block[.property...]`. When the first segment is an
/// import alias and the second names one of its blocks, both the imported copy
/// and the document's block of that name are patched, with the extension
/// winning in each. A target block that does not exist makes the extend a no-op.
#[must_use]
pub fn apply_extend(document: &Document, extend: &ExtendBlock, aliases: &mut AliasTable) -> Document {
    let segments: Vec<&str> = extend.target_path.split('.').collect();
    let mut out = document.clone();

    if let [alias, block_name, rest @ ..] = segments.as_slice()
        && let Some(entry) = aliases.get_mut(alias)
        && let Some(original) = entry.blocks.get(*block_name)
    {
        let patched = extend_content(original, rest, &extend.content);
        entry.blocks.insert((*block_name).to_string(), patched);
        match out.block_mut(block_name) {
            Some(block) => block.content = extend_content(&block.content, rest, &extend.content),
            None => tracing::debug!(
                target: "resolver",
                "Extend '{}' patched alias '{}' but the document no longer has block '{}'",
                extend.target_path,
                alias,
                block_name
            ),
        }
        return out;
    }

    let Some((block_name, rest)) = segments.split_first() else {
        return out;
    };
    match out.block_mut(block_name) {
        Some(block) => block.content = extend_content(&block.content, rest, &extend.content),
        None => {
            tracing::debug!(target: "resolver", "Extend target '{}' has no block; skipped", extend.target_path);
        }
    }
    out
}

/// Merges `extension` into `content` at `path`.
fn extend_content(content: &Content, path: &[&str], extension: &Content) -> Content {
    let Some((first, rest)) = path.split_first() else {
        return merge_content(content, extension, MergePolicy::Overlay);
    };
    match content {
        Content::Object(map) => Content::Object(extend_map(map, first, rest, extension)),
        Content::Mixed {
            text,
            properties,
        } => Content::Mixed {
            text: text.clone(),
            properties: extend_map(properties, first, rest, extension),
        },
        Content::Text(_) | Content::Array(_) => Content::Object(materialize(first, rest, extension)),
    }
}

fn extend_map(map: &ObjectMap, key: &str, rest: &[&str], extension: &Content) -> ObjectMap {
    let mut out = map.clone();
    let value = extend_value(map.get(key), rest, extension);
    out.insert(key.to_string(), value);
    out
}

fn extend_value(current: Option<&Value>, path: &[&str], extension: &Content) -> Value {
    let Some((first, rest)) = path.split_first() else {
        let patch = extension.clone().into_value();
        return match current {
            Some(existing) => merge_values(existing, &patch, MergePolicy::Overlay),
            None => patch,
        };
    };
    match current {
        Some(Value::Object(map)) => Value::Object(extend_map(map, first, rest, extension)),
        _ => Value::Object(materialize(first, rest, extension)),
    }
}

/// A fresh nested object holding `extension` at `first.rest...`.
fn materialize(first: &str, rest: &[&str], extension: &Content) -> ObjectMap {
    let mut map = ObjectMap::new();
    map.insert(first.to_string(), extend_value(None, rest, extension));
    map
}
