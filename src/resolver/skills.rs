//! Native skill substitution.
//!
//! A `skills` block lists skills by name. When a native definition
//! (`skills/<name>/SKILL.md` with YAML frontmatter) exists next to the
//! document or under the registry root, its body becomes the skill's
//! `content` and its frontmatter fills in fields the document left out. The
//! description is only replaced by a strictly longer one.

use gray_matter::Matter;
use gray_matter::engine::YAML;
use std::path::{Path, PathBuf};

use crate::ast::{Content, Document, ObjectMap, Value};
use crate::constants::{SKILL_FILE, SKILLS_BLOCK, SKILLS_DIR};
use crate::loader::Loader;

/// A parsed `SKILL.md`.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSkill {
    pub path: PathBuf,
    pub description: Option<String>,
    pub body: String,
    pub fields: ObjectMap,
}

impl NativeSkill {
    /// Splits `SKILL.md` text into frontmatter and body.
    pub fn parse(text: &str, path: PathBuf) -> Self {
        let matter = Matter::<YAML>::new();
        let (data, body) = match matter.parse::<serde_yaml::Value>(text) {
            Ok(parsed) => (parsed.data, parsed.content),
            Err(e) => {
                tracing::warn!(target: "resolver", "Ignoring unreadable frontmatter in {}: {}", path.display(), e);
                (None, text.to_string())
            }
        };

        let mut description = None;
        let mut fields = ObjectMap::new();
        if let Some(serde_yaml::Value::Mapping(map)) = data {
            for (key, value) in map {
                let Some(key) = key.as_str().map(str::to_string) else {
                    continue;
                };
                match key.as_str() {
                    "name" => {}
                    "description" => description = value.as_str().map(str::to_string),
                    _ => {
                        fields.insert(key, yaml_to_value(value));
                    }
                }
            }
        }
        Self {
            path,
            description,
            body: body.trim().to_string(),
            fields,
        }
    }
}

/// Enriches the `skills` block of `document` from native skill files.
///
/// A no-op without a `skills` block, when the block is not an object, or when
/// no native file matches.
pub async fn apply_skills(loader: &Loader, document: Document, location: &Path) -> Document {
    let Some(Content::Object(skills)) = document.block(SKILLS_BLOCK).map(|b| &b.content) else {
        return document;
    };

    let mut updated = skills.clone();
    let mut changed = false;
    for (name, value) in skills {
        if !is_plain_name(name) {
            continue;
        }
        let Some(native) = find_native_skill(loader, name, location).await else {
            continue;
        };
        tracing::debug!(target: "resolver", "Using native skill {} from {}", name, native.path.display());
        if let Some(merged) = merge_native(value, &native) {
            updated.insert(name.clone(), merged);
            changed = true;
        }
    }

    if !changed {
        return document;
    }
    let mut out = document;
    if let Some(block) = out.block_mut(SKILLS_BLOCK) {
        block.content = Content::Object(updated);
    }
    out
}

async fn find_native_skill(loader: &Loader, name: &str, location: &Path) -> Option<NativeSkill> {
    let relative = Path::new(SKILLS_DIR).join(name).join(SKILL_FILE);
    let mut candidates = Vec::with_capacity(2);
    if let Some(dir) = location.parent() {
        candidates.push(dir.join(&relative));
    }
    if loader.registry().is_some() {
        let in_registry = loader.registry_path().join(&relative);
        if !candidates.contains(&in_registry) {
            candidates.push(in_registry);
        }
    }

    for candidate in candidates {
        match loader.load_optional(&candidate).await {
            Ok(Some(text)) => return Some(NativeSkill::parse(&text, candidate)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "resolver", "Could not read {}: {:#}", candidate.display(), e);
            }
        }
    }
    None
}

/// The skill entry with the native definition applied, or `None` when the
/// entry is neither an object nor a description string.
fn merge_native(value: &Value, native: &NativeSkill) -> Option<Value> {
    let mut entry = match value {
        Value::Object(map) => map.clone(),
        Value::String(description) | Value::Text(description) => {
            let mut map = ObjectMap::new();
            map.insert("description".to_string(), Value::String(description.clone()));
            map
        }
        _ => return None,
    };

    if let Some(description) = &native.description {
        let current = entry.get("description").and_then(Value::as_str).map_or(0, str::len);
        if description.len() > current {
            entry.insert("description".to_string(), Value::String(description.clone()));
        }
    }
    if !native.body.is_empty() {
        entry.insert("content".to_string(), Value::Text(native.body.clone()));
    }
    for (key, field) in &native.fields {
        entry.entry(key.clone()).or_insert_with(|| field.clone());
    }
    Some(Value::Object(entry))
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn yaml_to_value(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_value).collect()),
        serde_yaml::Value::Mapping(map) => Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), yaml_to_value(v))))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(tagged.value),
    }
}
