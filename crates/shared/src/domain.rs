use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A formatted field value. Formatters may turn the raw string into any
/// JSON shape (`boolean` yields a bool), so values are kept as JSON.
pub type FieldValue = serde_json::Value;

/// Formatted values keyed by field name. Only declared fields present in
/// the submitted body appear here.
pub type ValuesMap = BTreeMap<String, FieldValue>;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(SessionId);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Joins a target onto an optional mount prefix. Plain concatenation, no
/// slash normalization.
pub fn with_base_url(base_url: Option<&str>, target: &str) -> String {
    match base_url {
        Some(base) => format!("{base}{target}"),
        None => target.to_string(),
    }
}
