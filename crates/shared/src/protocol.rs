use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ValuesMap;

/// Keys under which the controller exchanges state with flash storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKey {
    Errors,
    Values,
}

impl FlashKey {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashKey::Errors => "errors",
            FlashKey::Values => "values",
        }
    }
}

impl fmt::Display for FlashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a values provider hands back on GET: previously stored values and
/// an optional override for the form action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuesPayload {
    #[serde(default)]
    pub values: ValuesMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::with_base_url;

    #[test]
    fn base_url_is_plain_concatenation() {
        assert_eq!(with_base_url(Some("base/"), "success"), "base/success");
        assert_eq!(with_base_url(Some("/foo"), "/index"), "/foo/index");
        assert_eq!(with_base_url(None, "/next"), "/next");
    }

    #[test]
    fn flash_key_names_match_storage_keys() {
        assert_eq!(FlashKey::Errors.to_string(), "errors");
        assert_eq!(FlashKey::Values.as_str(), "values");
    }
}
