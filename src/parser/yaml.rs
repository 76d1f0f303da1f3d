use serde_yaml::{Mapping, Value as Yaml};
use std::path::Path;

use super::{DocumentParser, ParseDiagnostic};
use crate::ast::{
    Block, Content, Document, ExtendBlock, InheritDeclaration, ObjectMap, ParamArgument, ParamDefinition,
    ParamType, PathReference, SourceLocation, TemplateExpression, UseDeclaration, Value,
};

const TEXT_KEY: &str = "$text";
const PARAM_KEY: &str = "$param";
const TOP_LEVEL_KEYS: [&str; 6] = ["meta", "inherit", "use", "params", "blocks", "extend"];

/// Reads documents in serialized-tree form.
///
/// ```yaml
/// meta: { id: support-agent }
/// inherit: "@core/base"
/// use:
///   - ./fragments/tone
///   - { path: "@core/security", alias: sec, params: { level: strict } }
/// params:
///   - { name: team, type: string }
///   - { name: env, type: enum, options: [dev, prod], optional: true, default: dev }
/// blocks:
///   identity: "You help the {{team}} team."
///   standards:
///     code: { style: clean }
///   notes:
///     $text: "Prose plus properties"
///     priority: high
/// extend:
///   - { target: standards.code, content: { lint: true } }
/// ```
///
/// Block content: a string is text, a sequence is an array, a mapping is an
/// object unless it has a `$text` key (then it is mixed, or plain text when
/// `$text` is the only key). Inside values, `{ $param: name }` is a template
/// expression and `{ $text: "..." }` is a prose node.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDocumentParser;

impl YamlDocumentParser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for YamlDocumentParser {
    fn parse(&self, source: &str, file: &Path) -> Result<Document, Vec<ParseDiagnostic>> {
        let file_name = file.display().to_string();
        let root: Yaml = serde_yaml::from_str(source).map_err(|e| {
            let location = e.location().map(|l| SourceLocation::new(&file_name, l.line(), l.column()));
            vec![ParseDiagnostic::new(e.to_string(), location)]
        })?;

        let mut cx = Cx {
            source,
            file: &file_name,
            diagnostics: Vec::new(),
        };
        let document = cx.document(root);
        if cx.diagnostics.is_empty() {
            Ok(document)
        } else {
            Err(cx.diagnostics)
        }
    }
}

struct Cx<'a> {
    source: &'a str,
    file: &'a str,
    diagnostics: Vec<ParseDiagnostic>,
}

impl Cx<'_> {
    fn error(&mut self, message: impl Into<String>, near: Option<&str>) {
        let location = near.and_then(|needle| self.locate(needle));
        self.diagnostics.push(ParseDiagnostic::new(message, location));
    }

    /// Position of the first occurrence of `needle` in the source.
    fn locate(&self, needle: &str) -> Option<SourceLocation> {
        self.source.lines().enumerate().find_map(|(index, line)| {
            line.find(needle).map(|column| SourceLocation::new(self.file, index + 1, column + 1))
        })
    }

    fn document(&mut self, root: Yaml) -> Document {
        let mut document = Document {
            location: Some(SourceLocation::new(self.file, 1, 1)),
            ..Document::default()
        };
        let map = match root {
            Yaml::Null => return document,
            Yaml::Mapping(map) => map,
            other => {
                self.error(format!("document must be a mapping, found {}", yaml_kind(&other)), None);
                return document;
            }
        };

        for (key, value) in map {
            let Some(key) = key.as_str().map(str::to_string) else {
                self.error("top-level keys must be strings", None);
                continue;
            };
            match key.as_str() {
                "meta" => document.meta = self.meta(value),
                "inherit" => document.inherit = self.inherit(value),
                "use" => document.uses = self.uses(value),
                "params" => document.params = Some(self.params(value)),
                "blocks" => document.blocks = self.blocks(value),
                "extend" => document.extends = self.extends(value),
                _ => self.error(
                    format!("unknown key '{key}', expected one of: {}", TOP_LEVEL_KEYS.join(", ")),
                    Some(&format!("{key}:")),
                ),
            }
        }
        document
    }

    fn meta(&mut self, value: Yaml) -> Option<ObjectMap> {
        match value {
            Yaml::Null => None,
            Yaml::Mapping(map) => Some(self.object(map)),
            other => {
                self.error(format!("meta must be a mapping, found {}", yaml_kind(&other)), Some("meta:"));
                None
            }
        }
    }

    fn inherit(&mut self, value: Yaml) -> Option<InheritDeclaration> {
        let (path, params, _) = self.reference(value, "inherit")?;
        let location = self.locate(&path);
        Some(InheritDeclaration {
            path: PathReference::parse(&path),
            params,
            location,
        })
    }

    fn uses(&mut self, value: Yaml) -> Vec<UseDeclaration> {
        let items = match value {
            Yaml::Null => return Vec::new(),
            Yaml::Sequence(items) => items,
            single @ (Yaml::String(_) | Yaml::Mapping(_)) => vec![single],
            other => {
                self.error(format!("use must be a list, found {}", yaml_kind(&other)), Some("use:"));
                return Vec::new();
            }
        };
        items
            .into_iter()
            .filter_map(|item| {
                let (path, params, alias) = self.reference(item, "use")?;
                let location = self.locate(&path);
                Some(UseDeclaration {
                    path: PathReference::parse(&path),
                    alias,
                    params,
                    location,
                })
            })
            .collect()
    }

    /// `"path"` or `{ path, params, alias }`.
    fn reference(&mut self, value: Yaml, directive: &str) -> Option<(String, Vec<ParamArgument>, Option<String>)> {
        match value {
            Yaml::String(path) if !path.trim().is_empty() => Some((path, Vec::new(), None)),
            Yaml::Mapping(mut map) => {
                let Some(path) = map.remove("path").and_then(|p| p.as_str().map(str::to_string)) else {
                    self.error(format!("{directive} entry needs a string 'path'"), Some(&format!("{directive}:")));
                    return None;
                };
                let alias = match map.remove("alias") {
                    None | Some(Yaml::Null) => None,
                    Some(Yaml::String(alias)) if is_identifier(&alias) => Some(alias),
                    Some(other) => {
                        self.error(
                            format!("alias for '{path}' must be an identifier, found {}", describe(&other)),
                            Some(&path),
                        );
                        None
                    }
                };
                if alias.is_some() && directive == "inherit" {
                    self.error("inherit does not take an alias", Some(&path));
                }
                let params = match map.remove("params") {
                    None | Some(Yaml::Null) => Vec::new(),
                    Some(Yaml::Mapping(args)) => args
                        .into_iter()
                        .filter_map(|(name, value)| {
                            let name = name.as_str()?.to_string();
                            let value = self.value(value);
                            Some(ParamArgument {
                                name,
                                value,
                            })
                        })
                        .collect(),
                    Some(other) => {
                        self.error(format!("params for '{path}' must be a mapping, found {}", yaml_kind(&other)), Some(&path));
                        Vec::new()
                    }
                };
                for (key, _) in map {
                    let key = key.as_str().unwrap_or("?").to_string();
                    self.error(format!("unknown key '{key}' in {directive} entry"), Some(&path));
                }
                Some((path, params, alias))
            }
            other => {
                self.error(
                    format!("{directive} must be a path string or a mapping, found {}", yaml_kind(&other)),
                    Some(&format!("{directive}:")),
                );
                None
            }
        }
    }

    fn params(&mut self, value: Yaml) -> Vec<ParamDefinition> {
        let items = match value {
            Yaml::Null => return Vec::new(),
            Yaml::Sequence(items) => items,
            other => {
                self.error(format!("params must be a list, found {}", yaml_kind(&other)), Some("params:"));
                return Vec::new();
            }
        };
        items.into_iter().filter_map(|item| self.param(item)).collect()
    }

    fn param(&mut self, item: Yaml) -> Option<ParamDefinition> {
        let Yaml::Mapping(mut map) = item else {
            self.error("each param must be a mapping with 'name' and 'type'", Some("params:"));
            return None;
        };
        let Some(name) = map.remove("name").and_then(|n| n.as_str().map(str::to_string)) else {
            self.error("param is missing 'name'", Some("params:"));
            return None;
        };
        let type_name = map.remove("type").and_then(|t| t.as_str().map(str::to_string));
        let param_type = match type_name.as_deref() {
            Some("string") => ParamType::String,
            Some("number") => ParamType::Number,
            Some("boolean") => ParamType::Boolean,
            Some("enum") => {
                let options: Vec<String> = match map.remove("options") {
                    Some(Yaml::Sequence(options)) => options
                        .into_iter()
                        .filter_map(|o| o.as_str().map(str::to_string))
                        .collect(),
                    _ => Vec::new(),
                };
                if options.is_empty() {
                    self.error(format!("enum param '{name}' needs a non-empty 'options' list"), Some(&name));
                    return None;
                }
                ParamType::Enum(options)
            }
            other => {
                self.error(
                    format!(
                        "param '{name}' has unsupported type {}, expected string, number, boolean or enum",
                        other.map_or_else(|| "(none)".to_string(), |t| format!("'{t}'"))
                    ),
                    Some(&name),
                );
                return None;
            }
        };
        let optional = map.remove("optional").and_then(|o| o.as_bool()).unwrap_or(false);
        let default_value = match map.remove("default") {
            None => None,
            Some(value) => Some(self.value(value)),
        };
        Some(ParamDefinition {
            name,
            param_type,
            optional,
            default_value,
        })
    }

    fn blocks(&mut self, value: Yaml) -> Vec<Block> {
        let map = match value {
            Yaml::Null => return Vec::new(),
            Yaml::Mapping(map) => map,
            other => {
                self.error(format!("blocks must be a mapping, found {}", yaml_kind(&other)), Some("blocks:"));
                return Vec::new();
            }
        };
        let mut blocks: Vec<Block> = Vec::with_capacity(map.len());
        for (name, content) in map {
            let Some(name) = name.as_str().map(str::to_string) else {
                self.error("block names must be strings", Some("blocks:"));
                continue;
            };
            let Some(content) = self.content(content, &name) else {
                continue;
            };
            let location = self.locate(&format!("{name}:"));
            blocks.push(Block {
                name,
                content,
                location,
            });
        }
        blocks
    }

    fn extends(&mut self, value: Yaml) -> Vec<ExtendBlock> {
        let items = match value {
            Yaml::Null => return Vec::new(),
            Yaml::Sequence(items) => items,
            other => {
                self.error(format!("extend must be a list, found {}", yaml_kind(&other)), Some("extend:"));
                return Vec::new();
            }
        };
        let mut extends = Vec::with_capacity(items.len());
        for item in items {
            let Yaml::Mapping(mut map) = item else {
                self.error("each extend entry must be a mapping with 'target' and 'content'", Some("extend:"));
                continue;
            };
            let Some(target) = map.remove("target").and_then(|t| t.as_str().map(str::to_string)) else {
                self.error("extend entry is missing 'target'", Some("extend:"));
                continue;
            };
            if target.split('.').any(str::is_empty) {
                self.error(format!("invalid extend target '{target}'"), Some(&target));
                continue;
            }
            let Some(raw) = map.remove("content") else {
                self.error(format!("extend '{target}' is missing 'content'"), Some(&target));
                continue;
            };
            let Some(content) = self.content(raw, &target) else {
                continue;
            };
            let location = self.locate(&target);
            extends.push(ExtendBlock {
                target_path: target,
                content,
                location,
            });
        }
        extends
    }

    fn content(&mut self, value: Yaml, owner: &str) -> Option<Content> {
        match value {
            Yaml::String(text) => Some(Content::Text(text)),
            Yaml::Sequence(items) => Some(Content::Array(items.into_iter().map(|i| self.value(i)).collect())),
            Yaml::Mapping(mut map) => {
                if let Some(name) = single_key(&map, PARAM_KEY) {
                    return Some(Content::Text(format!("{{{{{name}}}}}")));
                }
                match map.remove(TEXT_KEY) {
                    Some(text) => {
                        let Some(text) = text.as_str().map(str::to_string) else {
                            self.error(format!("'{TEXT_KEY}' in '{owner}' must be a string"), Some(owner));
                            return None;
                        };
                        if map.is_empty() {
                            Some(Content::Text(text))
                        } else {
                            Some(Content::Mixed {
                                text: Some(text),
                                properties: self.object(map),
                            })
                        }
                    }
                    None => Some(Content::Object(self.object(map))),
                }
            }
            other => {
                self.error(
                    format!("content of '{owner}' must be text, a list or a mapping, found {}", yaml_kind(&other)),
                    Some(owner),
                );
                None
            }
        }
    }

    fn object(&mut self, map: Mapping) -> ObjectMap {
        let mut object = ObjectMap::new();
        for (key, value) in map {
            let key = match key {
                Yaml::String(key) => key,
                Yaml::Number(n) => n.to_string(),
                Yaml::Bool(b) => b.to_string(),
                other => {
                    self.error(format!("property keys must be scalars, found {}", yaml_kind(&other)), None);
                    continue;
                }
            };
            let value = self.value(value);
            object.insert(key, value);
        }
        object
    }

    fn value(&mut self, value: Yaml) -> Value {
        match value {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::Bool(b),
            Yaml::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            Yaml::String(s) => Value::String(s),
            Yaml::Sequence(items) => Value::Array(items.into_iter().map(|i| self.value(i)).collect()),
            Yaml::Mapping(map) => {
                if let Some(name) = single_key(&map, PARAM_KEY) {
                    let location = self.locate(&name);
                    return Value::Template(TemplateExpression {
                        name,
                        location,
                    });
                }
                if let Some(text) = single_key(&map, TEXT_KEY) {
                    return Value::Text(text);
                }
                Value::Object(self.object(map))
            }
            Yaml::Tagged(tagged) => {
                self.error(format!("YAML tags are not supported ({})", tagged.tag), None);
                Value::Null
            }
        }
    }
}

/// The string under `key` when it is the mapping's only entry.
fn single_key(map: &Mapping, key: &str) -> Option<String> {
    if map.len() != 1 {
        return None;
    }
    map.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn yaml_kind(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "a boolean",
        Yaml::Number(_) => "a number",
        Yaml::String(_) => "a string",
        Yaml::Sequence(_) => "a list",
        Yaml::Mapping(_) => "a mapping",
        Yaml::Tagged(_) => "a tagged value",
    }
}

fn describe(value: &Yaml) -> String {
    match value {
        Yaml::String(s) => format!("'{s}'"),
        other => yaml_kind(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PrsError;

    fn parse(source: &str) -> Result<Document, Vec<ParseDiagnostic>> {
        YamlDocumentParser::new().parse(source, Path::new("main.prs"))
    }

    #[test]
    fn test_full_document() {
        let document = parse(
            r#"
meta:
  id: support
inherit: "@core/base@v1.0.0"
use:
  - ./fragments/tone
  - path: "@core/security"
    alias: sec
    params:
      level: strict
params:
  - { name: team, type: string }
  - { name: env, type: enum, options: [dev, prod], optional: true, default: dev }
blocks:
  identity: "You help the {{team}} team."
  standards:
    code:
      style: clean
      indent: 2
  notes:
    $text: Prose
    priority: high
  tags: [a, b]
extend:
  - target: standards.code
    content:
      lint: true
"#,
        )
        .unwrap();

        let meta = document.meta.as_ref().unwrap();
        assert_eq!(meta.get("id"), Some(&Value::String("support".into())));

        let inherit = document.inherit.as_ref().unwrap();
        assert_eq!(inherit.path.namespace.as_deref(), Some("core"));
        assert_eq!(inherit.path.version.as_deref(), Some("v1.0.0"));
        assert_eq!(inherit.location.as_ref().unwrap().line, 4);

        assert_eq!(document.uses.len(), 2);
        assert!(document.uses[0].path.is_relative);
        assert_eq!(document.uses[1].alias.as_deref(), Some("sec"));
        assert_eq!(document.uses[1].params, vec![ParamArgument::new("level", "strict")]);

        let params = document.params.as_ref().unwrap();
        assert_eq!(params[1].param_type, ParamType::Enum(vec!["dev".into(), "prod".into()]));
        assert!(params[1].optional);
        assert_eq!(params[1].default_value, Some(Value::String("dev".into())));

        let names: Vec<&str> = document.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["identity", "standards", "notes", "tags"]);
        assert!(matches!(document.blocks[0].content, Content::Text(_)));
        assert!(matches!(document.blocks[1].content, Content::Object(_)));
        assert!(matches!(
            &document.blocks[2].content,
            Content::Mixed { text: Some(t), .. } if t == "Prose"
        ));
        assert!(matches!(document.blocks[3].content, Content::Array(_)));

        assert_eq!(document.extends[0].target_path, "standards.code");
    }

    #[test]
    fn test_param_and_text_markers() {
        let document = parse(
            r#"
blocks:
  config:
    count: { $param: count }
    summary: { $text: "long form" }
  only_text:
    $text: just prose
"#,
        )
        .unwrap();

        let props = document.blocks[0].content.properties().unwrap();
        assert!(matches!(props.get("count"), Some(Value::Template(t)) if t.name == "count"));
        assert_eq!(props.get("summary"), Some(&Value::Text("long form".into())));
        assert_eq!(document.blocks[1].content, Content::Text("just prose".into()));
    }

    #[test]
    fn test_empty_source_is_empty_document() {
        let document = parse("").unwrap();
        assert!(document.blocks.is_empty());
        assert!(document.is_resolved());
    }

    #[test]
    fn test_syntax_error_carries_location() {
        let diagnostics = parse("blocks:\n  identity: [unclosed\n").unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].location.is_some());

        let error = diagnostics[0].clone().into_resolve_error("main.prs");
        assert!(matches!(error.error, PrsError::ParseError { .. }));
    }

    #[test]
    fn test_structural_errors_are_collected() {
        let diagnostics = parse(
            r#"
blokcs: {}
params:
  - { name: env, type: enum }
blocks:
  count: 3
"#,
        )
        .unwrap_err();

        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics[0].message.contains("unknown key 'blokcs'"));
        assert_eq!(diagnostics[0].location.as_ref().unwrap().line, 2);
        assert!(diagnostics[1].message.contains("options"));
        assert!(diagnostics[2].message.contains("content of 'count'"));
    }
}
