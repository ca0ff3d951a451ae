//! Declarative stage arguments.
//!
//! Every stage factory publishes a fixed table of argument descriptors:
//! name, type tag, human-readable description, default, and (for enumerated
//! arguments) the fixed choice set. The registry binds the JSON parameter
//! map of a stage configuration against that table before the factory runs,
//! so stages only ever see converted, validated values.

use std::collections::HashMap;

use crate::config::StageParams;
use crate::error::StageError;

/// Argument type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Boolean switch.
    Flag,
    Int,
    Float,
    /// A single whitespace-free token.
    Word,
    /// Free text.
    Sentence,
    Filename,
    /// One of a fixed set of choices.
    Selection,
}

/// Default value carried by a descriptor. An argument without a default is
/// required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgDefault {
    Flag(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

/// One declared argument of a stage.
#[derive(Debug, Clone, Copy)]
pub struct ArgDescriptor {
    pub name: &'static str,
    pub kind: ArgKind,
    pub description: &'static str,
    pub default: Option<ArgDefault>,
    /// Only consulted for `ArgKind::Selection`.
    pub choices: &'static [&'static str],
}

/// A converted argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Flag(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Index into the descriptor's choice set.
    Choice(usize),
}

/// The validated argument set handed to a stage factory.
#[derive(Debug, Clone, Default)]
pub struct StageArgs {
    values: HashMap<String, ArgValue>,
}

impl StageArgs {
    /// Converts and validates `params` against the descriptor table.
    ///
    /// Unknown parameter names, type mismatches, unmatched selections and
    /// missing required arguments are all configuration errors.
    pub fn bind(descriptors: &[ArgDescriptor], params: &StageParams) -> Result<Self, StageError> {
        for key in params.keys() {
            if !descriptors.iter().any(|d| d.name == key) {
                return Err(StageError::BadParam(format!("unknown argument '{key}'")));
            }
        }

        let mut values = HashMap::new();
        for descriptor in descriptors {
            match params.get(descriptor.name) {
                Some(value) => {
                    values.insert(
                        descriptor.name.to_string(),
                        convert(descriptor, value)?,
                    );
                }
                // An absent argument takes its default; without one it is
                // simply left unset and the factory decides whether that is
                // acceptable.
                None => {
                    if let Some(default) = descriptor.default {
                        let value = match (descriptor.kind, default) {
                            (ArgKind::Selection, ArgDefault::Str(text)) => {
                                let index = descriptor
                                    .choices
                                    .iter()
                                    .position(|c| *c == text)
                                    .expect("selection default must be a declared choice");
                                ArgValue::Choice(index)
                            }
                            _ => from_default(default),
                        };
                        values.insert(descriptor.name.to_string(), value);
                    }
                }
            }
        }
        Ok(Self { values })
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::Flag(true)))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Float(value)) => Some(*value),
            Some(ArgValue::Int(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Index of the selected choice for a `Selection` argument.
    pub fn choice(&self, name: &str) -> Option<usize> {
        match self.values.get(name) {
            Some(ArgValue::Choice(index)) => Some(*index),
            _ => None,
        }
    }
}

fn from_default(default: ArgDefault) -> ArgValue {
    match default {
        ArgDefault::Flag(value) => ArgValue::Flag(value),
        ArgDefault::Int(value) => ArgValue::Int(value),
        ArgDefault::Float(value) => ArgValue::Float(value),
        ArgDefault::Str(value) => ArgValue::Str(value.to_string()),
    }
}

fn convert(descriptor: &ArgDescriptor, value: &serde_json::Value) -> Result<ArgValue, StageError> {
    let name = descriptor.name;
    match descriptor.kind {
        ArgKind::Flag => value
            .as_bool()
            .map(ArgValue::Flag)
            .ok_or_else(|| StageError::BadParam(format!("'{name}' expects a boolean"))),
        ArgKind::Int => value
            .as_i64()
            .map(ArgValue::Int)
            .ok_or_else(|| StageError::BadParam(format!("'{name}' expects an integer"))),
        ArgKind::Float => value
            .as_f64()
            .map(ArgValue::Float)
            .ok_or_else(|| StageError::BadParam(format!("'{name}' expects a number"))),
        ArgKind::Word => {
            let text = value
                .as_str()
                .ok_or_else(|| StageError::BadParam(format!("'{name}' expects a string")))?;
            if text.is_empty() || text.contains(char::is_whitespace) {
                return Err(StageError::BadParam(format!(
                    "'{name}' expects a single word"
                )));
            }
            Ok(ArgValue::Str(text.to_string()))
        }
        ArgKind::Sentence => value
            .as_str()
            .map(|s| ArgValue::Str(s.to_string()))
            .ok_or_else(|| StageError::BadParam(format!("'{name}' expects a string"))),
        ArgKind::Filename => {
            let text = value
                .as_str()
                .ok_or_else(|| StageError::BadParam(format!("'{name}' expects a file name")))?;
            if text.is_empty() {
                return Err(StageError::BadParam(format!(
                    "'{name}' expects a non-empty file name"
                )));
            }
            Ok(ArgValue::Str(text.to_string()))
        }
        ArgKind::Selection => {
            let text = value
                .as_str()
                .ok_or_else(|| StageError::BadParam(format!("'{name}' expects a string")))?;
            descriptor
                .choices
                .iter()
                .position(|c| *c == text)
                .map(ArgValue::Choice)
                .ok_or_else(|| {
                    StageError::BadParam(format!(
                        "'{name}' must be one of {:?} (got '{text}')",
                        descriptor.choices
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DESCRIPTORS: &[ArgDescriptor] = &[
        ArgDescriptor {
            name: "factor",
            kind: ArgKind::Float,
            description: "Multiply every sample by this factor",
            default: None,
            choices: &[],
        },
        ArgDescriptor {
            name: "invert",
            kind: ArgKind::Flag,
            description: "Negate before scaling",
            default: Some(ArgDefault::Flag(false)),
            choices: &[],
        },
        ArgDescriptor {
            name: "mode",
            kind: ArgKind::Selection,
            description: "What to append",
            default: Some(ArgDefault::Str("channels")),
            choices: &["channels", "points", "items"],
        },
    ];

    fn params(pairs: &[(&str, serde_json::Value)]) -> StageParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn binds_values_and_defaults() {
        let args = StageArgs::bind(
            DESCRIPTORS,
            &params(&[("factor", json!(2.5)), ("mode", json!("points"))]),
        )
        .unwrap();
        assert_eq!(args.float("factor"), Some(2.5));
        assert!(!args.flag("invert"));
        assert_eq!(args.choice("mode"), Some(1));
    }

    #[test]
    fn integers_coerce_to_floats() {
        let args = StageArgs::bind(DESCRIPTORS, &params(&[("factor", json!(3))])).unwrap();
        assert_eq!(args.float("factor"), Some(3.0));
    }

    #[test]
    fn arguments_without_defaults_stay_unset() {
        let args = StageArgs::bind(DESCRIPTORS, &params(&[])).unwrap();
        assert!(!args.is_set("factor"));
        assert_eq!(args.float("factor"), None);
    }

    #[test]
    fn unknown_argument_is_an_error() {
        let err = StageArgs::bind(
            DESCRIPTORS,
            &params(&[("factor", json!(1.0)), ("facotr", json!(1.0))]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("facotr"));
    }

    #[test]
    fn selections_must_match_a_choice() {
        let err = StageArgs::bind(
            DESCRIPTORS,
            &params(&[("factor", json!(1.0)), ("mode", json!("rows"))]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("rows"));
    }

    #[test]
    fn selection_defaults_resolve_to_a_choice_index() {
        let args = StageArgs::bind(DESCRIPTORS, &params(&[("factor", json!(1.0))])).unwrap();
        assert_eq!(args.choice("mode"), Some(0));
    }
}
