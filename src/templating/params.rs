//! Parameter binding.

use std::collections::BTreeMap;
use strsim::levenshtein;

use crate::ast::{ParamArgument, ParamDefinition, ParamType, Value};
use crate::core::PrsError;

/// Maximum Levenshtein distance, as a percentage of the name length, for a suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Name to value table produced by [`bind_params`].
pub type Bindings = BTreeMap<String, Value>;

/// Binds supplied arguments to declared parameters.
///
/// - every argument must name a declared parameter ([`PrsError::UnknownParam`])
/// - every required parameter without a default needs an argument
///   ([`PrsError::MissingParam`])
/// - argument types must match, and enum values must be declared options
///   ([`PrsError::ParamTypeMismatch`])
///
/// Unsupplied optional parameters take their default when one exists and are
/// otherwise left out of the table.
///
/// ```rust
/// use prs_resolver::ast::{ParamArgument, ParamDefinition, ParamType, Value};
/// use prs_resolver::templating::bind_params;
///
/// let defs = vec![
///     ParamDefinition::required("team", ParamType::String),
///     ParamDefinition::optional("retries", ParamType::Number).with_default(3.0),
/// ];
/// let args = vec![ParamArgument::new("team", "platform")];
/// let bindings = bind_params(Some(&defs), Some(&args), "agent.prs").unwrap();
/// assert_eq!(bindings["team"], Value::String("platform".into()));
/// assert_eq!(bindings["retries"], Value::Number(3.0));
/// ```
pub fn bind_params(
    definitions: Option<&[ParamDefinition]>,
    arguments: Option<&[ParamArgument]>,
    file: &str,
) -> Result<Bindings, PrsError> {
    let definitions = definitions.unwrap_or_default();
    let arguments = arguments.unwrap_or_default();
    let mut bindings = Bindings::new();

    for argument in arguments {
        let Some(definition) = definitions.iter().find(|d| d.name == argument.name) else {
            return Err(PrsError::UnknownParam {
                name: argument.name.clone(),
                file: file.to_string(),
                valid: definitions.iter().map(|d| d.name.clone()).collect(),
            });
        };
        check_type(definition, &argument.value, file)?;
        bindings.insert(argument.name.clone(), argument.value.clone());
    }

    for definition in definitions {
        if bindings.contains_key(&definition.name) {
            continue;
        }
        match &definition.default_value {
            Some(default) => {
                bindings.insert(definition.name.clone(), default.clone());
            }
            None if definition.optional => {}
            None => {
                return Err(PrsError::MissingParam {
                    name: definition.name.clone(),
                    file: file.to_string(),
                });
            }
        }
    }

    Ok(bindings)
}

fn check_type(definition: &ParamDefinition, value: &Value, file: &str) -> Result<(), PrsError> {
    let matches = match (&definition.param_type, value) {
        (ParamType::String, Value::String(_) | Value::Text(_)) => true,
        (ParamType::Number, Value::Number(_)) => true,
        (ParamType::Boolean, Value::Bool(_)) => true,
        (ParamType::Enum(options), Value::String(s) | Value::Text(s)) => {
            if options.iter().any(|o| o == s) {
                true
            } else {
                return Err(PrsError::ParamTypeMismatch {
                    name: definition.name.clone(),
                    file: file.to_string(),
                    expected: definition.param_type.to_string(),
                    actual: format!("'{s}'"),
                });
            }
        }
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(PrsError::ParamTypeMismatch {
            name: definition.name.clone(),
            file: file.to_string(),
            expected: definition.param_type.to_string(),
            actual: value.type_name().to_string(),
        })
    }
}

/// Up to three names from `available` close to `target`, closest first.
#[must_use]
pub fn find_similar_names(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> = available.iter().map(|name| (name.clone(), levenshtein(target, name))).collect();
    scored.sort_by_key(|(_, distance)| *distance);
    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name)
        .collect()
}
