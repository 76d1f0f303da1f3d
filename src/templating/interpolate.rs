//! Placeholder substitution.
//!
//! Two forms are replaced: explicit [`TemplateExpression`] nodes and
//! `{{identifier}}` patterns inside strings. Substitution is single-pass:
//! inserted values are never scanned again.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::Bindings;
use crate::ast::{Content, Document, ObjectMap, ParamArgument, TemplateExpression, Value};
use crate::core::PrsError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("placeholder pattern is valid")
});

/// Substitutes every `{{name}}` in `text` with the bound value's text form.
///
/// ```rust
/// use prs_resolver::ast::Value;
/// use prs_resolver::templating::{Bindings, interpolate_text};
///
/// let mut bindings = Bindings::new();
/// bindings.insert("name".into(), Value::String("World".into()));
/// assert_eq!(interpolate_text("Hello, {{name}}!", &bindings, "t.prs").unwrap(), "Hello, World!");
/// ```
pub fn interpolate_text(text: &str, bindings: &Bindings, file: &str) -> Result<String, PrsError> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }
    let mut undefined: Option<String> = None;
    let replaced = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        match bindings.get(name) {
            Some(value) => value.to_text(),
            None => {
                undefined.get_or_insert_with(|| name.to_string());
                caps[0].to_string()
            }
        }
    });
    match undefined {
        Some(name) => Err(undefined_variable(name, file)),
        None => Ok(replaced.into_owned()),
    }
}

/// Substitutes placeholders inside a property value.
///
/// A template expression, or a string that is nothing but one placeholder,
/// becomes the bound value with its native type.
pub fn interpolate_value(value: &Value, bindings: &Bindings, file: &str) -> Result<Value, PrsError> {
    Ok(match value {
        Value::Template(TemplateExpression {
            name, ..
        }) => bindings.get(name).cloned().ok_or_else(|| undefined_variable(name.clone(), file))?,
        Value::String(s) => match whole_placeholder(s) {
            Some(name) => bindings.get(name).cloned().ok_or_else(|| undefined_variable(name.to_string(), file))?,
            None => Value::String(interpolate_text(s, bindings, file)?),
        },
        Value::Text(s) => Value::Text(interpolate_text(s, bindings, file)?),
        Value::Object(map) => Value::Object(interpolate_map(map, bindings, file)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, bindings, file))
                .collect::<Result<_, _>>()?,
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    })
}

/// Substitutes placeholders throughout a block's content.
pub fn interpolate_content(content: &Content, bindings: &Bindings, file: &str) -> Result<Content, PrsError> {
    Ok(match content {
        Content::Text(text) => Content::Text(interpolate_text(text, bindings, file)?),
        Content::Object(map) => Content::Object(interpolate_map(map, bindings, file)?),
        Content::Array(items) => Content::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, bindings, file))
                .collect::<Result<_, _>>()?,
        ),
        Content::Mixed {
            text,
            properties,
        } => Content::Mixed {
            text: text.as_deref().map(|t| interpolate_text(t, bindings, file)).transpose()?,
            properties: interpolate_map(properties, bindings, file)?,
        },
    })
}

/// Substitutes placeholders in a document's own content.
///
/// Covers meta fields, blocks, extend payloads and the arguments passed on
/// `inherit` and `use` edges. Content merged in from other documents is not
/// part of `document` yet when this runs, so it is never re-scanned.
pub fn interpolate_document(document: &Document, bindings: &Bindings, file: &str) -> Result<Document, PrsError> {
    let mut out = document.clone();
    if let Some(meta) = &document.meta {
        out.meta = Some(interpolate_map(meta, bindings, file)?);
    }
    for block in &mut out.blocks {
        block.content = interpolate_content(&block.content, bindings, file)?;
    }
    for extend in &mut out.extends {
        extend.content = interpolate_content(&extend.content, bindings, file)?;
    }
    if let Some(inherit) = &mut out.inherit {
        inherit.params = interpolate_arguments(&inherit.params, bindings, file)?;
    }
    for declaration in &mut out.uses {
        declaration.params = interpolate_arguments(&declaration.params, bindings, file)?;
    }
    Ok(out)
}

fn interpolate_arguments(arguments: &[ParamArgument], bindings: &Bindings, file: &str) -> Result<Vec<ParamArgument>, PrsError> {
    arguments
        .iter()
        .map(|argument| {
            Ok(ParamArgument {
                name: argument.name.clone(),
                value: interpolate_value(&argument.value, bindings, file)?,
            })
        })
        .collect()
}

fn interpolate_map(map: &ObjectMap, bindings: &Bindings, file: &str) -> Result<ObjectMap, PrsError> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), interpolate_value(value, bindings, file)?)))
        .collect()
}

/// The identifier when `s` is exactly one `{{identifier}}`.
fn whole_placeholder(s: &str) -> Option<&str> {
    let caps = PLACEHOLDER.captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == s.len() {
        caps.get(1).map(|m| m.as_str())
    } else {
        None
    }
}

fn undefined_variable(name: String, file: &str) -> PrsError {
    PrsError::UndefinedVariable {
        name,
        file: file.to_string(),
    }
}

/// True when `document` still holds a placeholder of either form.
#[must_use]
pub fn has_placeholders(document: &Document) -> bool {
    fn value_has(value: &Value) -> bool {
        match value {
            Value::Template(_) => true,
            Value::String(s) | Value::Text(s) => PLACEHOLDER.is_match(s),
            Value::Object(map) => map.values().any(value_has),
            Value::Array(items) => items.iter().any(value_has),
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
        }
    }
    document.blocks.iter().any(|block| match &block.content {
        Content::Text(text) => PLACEHOLDER.is_match(text),
        Content::Object(map) => map.values().any(value_has),
        Content::Array(items) => items.iter().any(value_has),
        Content::Mixed {
            text,
            properties,
        } => text.as_deref().is_some_and(|t| PLACEHOLDER.is_match(t)) || properties.values().any(value_has),
    }) || document.meta.as_ref().is_some_and(|meta| meta.values().any(value_has))
}

/// Name of the first explicit template expression left in `document`.
///
/// Only [`TemplateExpression`] nodes count; `{{name}}` text is ignored.
#[must_use]
pub fn first_template_expression(document: &Document) -> Option<&str> {
    fn in_value(value: &Value) -> Option<&str> {
        match value {
            Value::Template(expression) => Some(expression.name.as_str()),
            Value::Object(map) => map.values().find_map(in_value),
            Value::Array(items) => items.iter().find_map(in_value),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Text(_) => None,
        }
    }
    fn in_content(content: &Content) -> Option<&str> {
        match content {
            Content::Text(_) => None,
            Content::Object(map) => map.values().find_map(in_value),
            Content::Array(items) => items.iter().find_map(in_value),
            Content::Mixed {
                properties, ..
            } => properties.values().find_map(in_value),
        }
    }
    document
        .meta
        .as_ref()
        .and_then(|meta| meta.values().find_map(in_value))
        .or_else(|| document.blocks.iter().find_map(|block| in_content(&block.content)))
        .or_else(|| document.extends.iter().find_map(|extend| in_content(&extend.content)))
        .or_else(|| {
            document
                .inherit
                .iter()
                .flat_map(|inherit| inherit.params.iter())
                .chain(document.uses.iter().flat_map(|declaration| declaration.params.iter()))
                .find_map(|argument| in_value(&argument.value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Block;

    fn bindings() -> Bindings {
        let mut bindings = Bindings::new();
        bindings.insert("name".into(), Value::String("World".into()));
        bindings.insert("count".into(), Value::Number(3.0));
        bindings.insert("tricky".into(), Value::String("{{name}}".into()));
        bindings
    }

    #[test]
    fn test_text_substitution() {
        assert_eq!(interpolate_text("Hello, {{name}}!", &bindings(), "t.prs").unwrap(), "Hello, World!");
        assert_eq!(interpolate_text("{{count}} items", &bindings(), "t.prs").unwrap(), "3 items");
        assert_eq!(interpolate_text("no placeholders", &Bindings::new(), "t.prs").unwrap(), "no placeholders");
    }

    #[test]
    fn test_undefined_variable() {
        let error = interpolate_text("Hello, {{name}}!", &Bindings::new(), "t.prs").unwrap_err();
        assert!(matches!(&error, PrsError::UndefinedVariable { name, file } if name == "name" && file == "t.prs"));
    }

    #[test]
    fn test_whitespace_inside_braces_is_not_a_placeholder() {
        let text = "literal {{ name }} stays";
        assert_eq!(interpolate_text(text, &Bindings::new(), "t.prs").unwrap(), text);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        assert_eq!(interpolate_text("x={{tricky}}", &bindings(), "t.prs").unwrap(), "x={{name}}");
    }

    #[test]
    fn test_whole_value_keeps_native_type() {
        let value = interpolate_value(&Value::String("{{count}}".into()), &bindings(), "t.prs").unwrap();
        assert_eq!(value, Value::Number(3.0));

        let value = interpolate_value(&Value::Template(TemplateExpression::new("count")), &bindings(), "t.prs").unwrap();
        assert_eq!(value, Value::Number(3.0));

        let value = interpolate_value(&Value::String("n={{count}}".into()), &bindings(), "t.prs").unwrap();
        assert_eq!(value, Value::String("n=3".into()));
    }

    #[test]
    fn test_document_interpolation_covers_meta_and_blocks() {
        let mut meta = ObjectMap::new();
        meta.insert("title".into(), Value::String("{{name}} agent".into()));
        let mut props = ObjectMap::new();
        props.insert("retries".into(), Value::Template(TemplateExpression::new("count")));
        let document = Document {
            meta: Some(meta),
            blocks: vec![
                Block::new("identity", Content::Text("Hi {{name}}".into())),
                Block::new(
                    "config",
                    Content::Mixed {
                        text: Some("{{count}} retries".into()),
                        properties: props,
                    },
                ),
            ],
            ..Document::default()
        };
        assert!(has_placeholders(&document));

        let out = interpolate_document(&document, &bindings(), "t.prs").unwrap();
        assert!(!has_placeholders(&out));
        assert_eq!(out.blocks[0].content, Content::Text("Hi World".into()));
        assert_eq!(out.meta.unwrap().get("title"), Some(&Value::String("World agent".into())));
        let Content::Mixed { text, properties } = &out.blocks[1].content else {
            panic!("expected mixed content");
        };
        assert_eq!(text.as_deref(), Some("3 retries"));
        assert_eq!(properties.get("retries"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_first_template_expression_ignores_plain_placeholders() {
        let mut props = ObjectMap::new();
        props.insert("limits".into(), Value::Array(vec![Value::Template(TemplateExpression::new("max"))]));
        let document = Document {
            blocks: vec![
                Block::new("identity", Content::Text("Hi {{name}}".into())),
                Block::new("config", Content::Object(props)),
            ],
            ..Document::default()
        };
        assert_eq!(first_template_expression(&document), Some("max"));

        let prose = Document {
            blocks: vec![Block::new("identity", Content::Text("Hi {{name}}".into()))],
            ..Document::default()
        };
        assert_eq!(first_template_expression(&prose), None);
    }
}
