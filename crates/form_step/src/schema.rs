//! Field configuration as written by users, and the resolved schema the
//! pipeline runs against.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{domain::FieldValue, error::ValidationError};

use crate::{
    error::ConfigError,
    registry::{BuiltinValidator, Formatter, Registry, Validator},
};

/// A single item or a list of them. Lists are tried first so that a JSON
/// array argument is spread rather than passed as one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => std::slice::from_ref(item),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidatorSpec {
    Named(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<OneOrMany<FieldValue>>,
    },
}

impl ValidatorSpec {
    pub fn kind(&self) -> &str {
        match self {
            ValidatorSpec::Named(kind) => kind,
            ValidatorSpec::Typed { kind, .. } => kind,
        }
    }

    pub fn arguments(&self) -> &[FieldValue] {
        match self {
            ValidatorSpec::Typed {
                arguments: Some(arguments),
                ..
            } => arguments.as_slice(),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionSpec {
    Labeled {
        value: FieldValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Bare(FieldValue),
}

impl OptionSpec {
    pub fn value(&self) -> &FieldValue {
        match self {
            OptionSpec::Labeled { value, .. } => value,
            OptionSpec::Bare(value) => value,
        }
    }
}

/// Per-field configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatter: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<OneOrMany<ValidatorSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone)]
pub struct FormatterRef {
    pub name: String,
    formatter: Arc<dyn Formatter>,
}

impl fmt::Debug for FormatterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FormatterRef").field(&self.name).finish()
    }
}

#[derive(Clone)]
pub struct ValidatorRef {
    pub kind: String,
    pub arguments: Vec<FieldValue>,
    validator: Arc<dyn Validator>,
}

impl ValidatorRef {
    pub fn check(&self, value: &FieldValue) -> bool {
        self.validator.validate(value, &self.arguments)
    }
}

impl fmt::Debug for ValidatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRef")
            .field("kind", &self.kind)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// A field with its formatters and validators resolved against a registry.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub formatters: Vec<FormatterRef>,
    pub validators: Vec<ValidatorRef>,
    pub options: Option<Vec<OptionSpec>>,
}

impl FieldSchema {
    /// Resolves `config`. Fields declaring no formatter get
    /// `default_formatters`. Fields with `options` get a trailing `equal`
    /// validator over the option values.
    pub fn build(
        name: &str,
        config: &FieldConfig,
        default_formatters: &[String],
        registry: &Registry,
    ) -> Result<Self, ConfigError> {
        let formatter_names = match &config.formatter {
            Some(declared) => declared.as_slice(),
            None => default_formatters,
        };
        let formatters = formatter_names
            .iter()
            .map(|formatter_name| {
                let formatter = registry.formatter(formatter_name).ok_or_else(|| {
                    ConfigError::UnknownFormatter {
                        field: name.to_string(),
                        name: formatter_name.clone(),
                    }
                })?;
                Ok(FormatterRef {
                    name: formatter_name.clone(),
                    formatter,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut validators = config
            .validate
            .as_ref()
            .map(OneOrMany::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|spec| resolve_validator(name, spec.kind(), spec.arguments().to_vec(), registry))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        if let Some(options) = &config.options {
            let values = options.iter().map(|option| option.value().clone()).collect();
            validators.push(resolve_validator(
                name,
                BuiltinValidator::Equal.name(),
                values,
                registry,
            )?);
        }

        Ok(Self {
            name: name.to_string(),
            formatters,
            validators,
            options: config.options.clone(),
        })
    }

    /// Runs the formatters in order, each consuming the previous output.
    pub fn format(&self, raw: &str) -> FieldValue {
        self.formatters
            .iter()
            .fold(FieldValue::String(raw.to_string()), |value, formatter| {
                formatter.formatter.format(value)
            })
    }

    /// Returns the first failing validator as an error; later validators are
    /// not evaluated.
    pub fn validate(&self, value: &FieldValue) -> Option<ValidationError> {
        self.validators
            .iter()
            .find(|validator| !validator.check(value))
            .map(|validator| ValidationError::new(&self.name, &validator.kind))
    }

    pub fn has_validators(&self) -> bool {
        !self.validators.is_empty()
    }
}

fn resolve_validator(
    field: &str,
    kind: &str,
    arguments: Vec<FieldValue>,
    registry: &Registry,
) -> Result<ValidatorRef, ConfigError> {
    let validator = registry
        .validator(kind)
        .ok_or_else(|| ConfigError::UnknownValidator {
            field: field.to_string(),
            name: kind.to_string(),
        })?;
    let prepared = validator
        .prepare(&arguments)
        .map_err(|reason| ConfigError::InvalidArguments {
            field: field.to_string(),
            validator: kind.to_string(),
            reason,
        })?;
    Ok(ValidatorRef {
        kind: kind.to_string(),
        arguments,
        validator: prepared.unwrap_or(validator),
    })
}

#[cfg(test)]
#[path = "tests/schema_tests.rs"]
mod tests;
