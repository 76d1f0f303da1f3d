//! The PromptScript document tree.
//!
//! Parsers produce a [`Document`]; the resolver consumes parsed documents and
//! produces resolved ones of the same shape. A resolved document carries no
//! unapplied directives: `extends` and `uses` are empty and `inherit` is `None`.
//!
//! Block content is the closed sum type [`Content`]. Every merge function
//! matches it exhaustively, so adding a variant is a compile error wherever
//! merging happens.

mod path;

pub use path::PathReference;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// String-keyed property map. Key order carries no meaning.
pub type ObjectMap = BTreeMap<String, Value>;

/// A position in a source file, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A named placeholder that interpolation replaces with a bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateExpression {
    pub name: String,
    pub location: Option<SourceLocation>,
}

impl TemplateExpression {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }
}

/// A property value.
///
/// `String` is a plain scalar; `Text` is a prose node and merges with
/// text-merge semantics instead of being replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Text(String),
    Object(ObjectMap),
    Array(Vec<Value>),
    Template(TemplateExpression),
}

impl Value {
    /// Short type description used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Text(_) => "text",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Template(_) => "template expression",
        }
    }

    /// The string inside a `String` or `Text` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces the value to the form it takes inside running text.
    ///
    /// Whole numbers print without a fractional part; containers print as JSON.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) | Value::Text(s) => s.clone(),
            Value::Template(expr) => format!("{{{{{}}}}}", expr.name),
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string(self).unwrap_or_else(|_| String::new())
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) | Value::Text(s) => serializer.serialize_str(s),
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
            Value::Template(expr) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry("$param", &expr.name)?;
                out.end()
            }
        }
    }
}

/// The content of a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Content {
    Text(String),
    Object(ObjectMap),
    Array(Vec<Value>),
    /// The only variant combining prose with structured properties.
    Mixed {
        text: Option<String>,
        properties: ObjectMap,
    },
}

impl Content {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Object(_) => "object",
            Content::Array(_) => "array",
            Content::Mixed { .. } => "mixed",
        }
    }

    /// Property map of an `Object` or `Mixed` content.
    #[must_use]
    pub fn properties(&self) -> Option<&ObjectMap> {
        match self {
            Content::Object(map) | Content::Mixed { properties: map, .. } => Some(map),
            Content::Text(_) | Content::Array(_) => None,
        }
    }

    /// Mutable property map of an `Object` or `Mixed` content.
    pub fn properties_mut(&mut self) -> Option<&mut ObjectMap> {
        match self {
            Content::Object(map) | Content::Mixed { properties: map, .. } => Some(map),
            Content::Text(_) | Content::Array(_) => None,
        }
    }

    /// Converts a container value into content. Scalars have no content form.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Content> {
        match value {
            Value::Text(s) => Some(Content::Text(s.clone())),
            Value::Object(map) => Some(Content::Object(map.clone())),
            Value::Array(items) => Some(Content::Array(items.clone())),
            _ => None,
        }
    }

    /// Converts content into a property value.
    ///
    /// `Mixed` has no value form; its prose is kept under the `content`
    /// property unless that key is already taken.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Content::Text(s) => Value::Text(s),
            Content::Object(map) => Value::Object(map),
            Content::Array(items) => Value::Array(items),
            Content::Mixed { text, mut properties } => {
                if let Some(text) = text {
                    properties.entry("content".to_string()).or_insert(Value::Text(text));
                }
                Value::Object(properties)
            }
        }
    }
}

/// A named unit of content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub name: String,
    pub content: Content,
    #[serde(skip)]
    pub location: Option<SourceLocation>,
}

impl Block {
    pub fn new(name: impl Into<String>, content: Content) -> Self {
        Self {
            name: name.into(),
            content,
            location: None,
        }
    }
}

/// A deep-path patch: `target_path` is `block[.property...]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendBlock {
    pub target_path: String,
    pub content: Content,
    #[serde(skip)]
    pub location: Option<SourceLocation>,
}

/// A named argument supplied to a referenced template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamArgument {
    pub name: String,
    pub value: Value,
}

impl ParamArgument {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// `@use path [as alias] (args)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UseDeclaration {
    pub path: PathReference,
    pub alias: Option<String>,
    pub params: Vec<ParamArgument>,
    #[serde(skip)]
    pub location: Option<SourceLocation>,
}

/// `@inherit path (args)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InheritDeclaration {
    pub path: PathReference,
    pub params: Vec<ParamArgument>,
    #[serde(skip)]
    pub location: Option<SourceLocation>,
}

/// Declared type of a template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Enum(Vec<String>),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => write!(f, "string"),
            ParamType::Number => write!(f, "number"),
            ParamType::Boolean => write!(f, "boolean"),
            ParamType::Enum(options) => write!(f, "enum({})", options.join(" | ")),
        }
    }
}

/// A template parameter declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDefinition {
    pub name: String,
    pub param_type: ParamType,
    pub optional: bool,
    pub default_value: Option<Value>,
}

impl ParamDefinition {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
            default_value: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, param_type)
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// A parsed or resolved PromptScript document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub meta: Option<ObjectMap>,
    pub blocks: Vec<Block>,
    pub extends: Vec<ExtendBlock>,
    pub uses: Vec<UseDeclaration>,
    pub inherit: Option<InheritDeclaration>,
    pub params: Option<Vec<ParamDefinition>>,
    #[serde(skip)]
    pub location: Option<SourceLocation>,
}

impl Document {
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.name == name)
    }

    /// True once every directive has been applied.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.extends.is_empty() && self.uses.is_empty() && self.inherit.is_none()
    }
}
