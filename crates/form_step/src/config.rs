use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::FieldConfig;

/// The configuration surface of one form step. Passed verbatim to the
/// template as `options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub fields: BTreeMap<String, FieldConfig>,
    #[serde(alias = "allowedErrors")]
    pub allowed_errors: Vec<String>,
    #[serde(alias = "defaultFormatters")]
    pub default_formatters: Vec<String>,
}

impl ControllerConfig {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Self::default()
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldConfig) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn with_allowed_errors<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_errors = keys.into_iter().map(Into::into).collect();
        self
    }
}
