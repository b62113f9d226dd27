//! Named formatters and validators.
//!
//! Field configuration refers to formatters and validators by name. The
//! [`Registry`] resolves those names once, when a controller is built, so an
//! unknown name is a construction error and never a request-time lookup
//! failure.

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use chrono::{NaiveDate, Utc};
use shared::domain::FieldValue;

/// A pure transform applied to a submitted value before validation.
pub trait Formatter: Send + Sync {
    fn format(&self, value: FieldValue) -> FieldValue;
}

impl<F> Formatter for F
where
    F: Fn(FieldValue) -> FieldValue + Send + Sync,
{
    fn format(&self, value: FieldValue) -> FieldValue {
        self(value)
    }
}

/// A pure predicate over a (formatted) value and the validator's configured
/// arguments, in declaration order.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &FieldValue, args: &[FieldValue]) -> bool;

    /// Rejects arguments this validator cannot work with.
    fn check_arguments(&self, _args: &[FieldValue]) -> Result<(), String> {
        Ok(())
    }

    /// Called once per field at build time with the configured arguments.
    /// A returned validator is bound to those arguments and used in place of
    /// `self` for that field.
    fn prepare(&self, args: &[FieldValue]) -> Result<Option<Arc<dyn Validator>>, String> {
        self.check_arguments(args).map(|()| None)
    }
}

impl<F> Validator for F
where
    F: Fn(&FieldValue, &[FieldValue]) -> bool + Send + Sync,
{
    fn validate(&self, value: &FieldValue, args: &[FieldValue]) -> bool {
        self(value, args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFormatter {
    Trim,
    Boolean,
    Uppercase,
    Lowercase,
    RemoveSpaces,
    SingleSpaces,
    Hyphens,
}

impl BuiltinFormatter {
    pub const ALL: [BuiltinFormatter; 7] = [
        BuiltinFormatter::Trim,
        BuiltinFormatter::Boolean,
        BuiltinFormatter::Uppercase,
        BuiltinFormatter::Lowercase,
        BuiltinFormatter::RemoveSpaces,
        BuiltinFormatter::SingleSpaces,
        BuiltinFormatter::Hyphens,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFormatter::Trim => "trim",
            BuiltinFormatter::Boolean => "boolean",
            BuiltinFormatter::Uppercase => "uppercase",
            BuiltinFormatter::Lowercase => "lowercase",
            BuiltinFormatter::RemoveSpaces => "removespaces",
            BuiltinFormatter::SingleSpaces => "singlespaces",
            BuiltinFormatter::Hyphens => "hyphens",
        }
    }
}

impl Formatter for BuiltinFormatter {
    fn format(&self, value: FieldValue) -> FieldValue {
        // Only strings are transformed; anything else passes through.
        let FieldValue::String(text) = value else {
            return value;
        };
        let formatted = match self {
            BuiltinFormatter::Trim => text.trim().to_string(),
            BuiltinFormatter::Boolean => {
                return match text.as_str() {
                    "true" => FieldValue::Bool(true),
                    "false" => FieldValue::Bool(false),
                    _ => FieldValue::String(text),
                };
            }
            BuiltinFormatter::Uppercase => text.to_uppercase(),
            BuiltinFormatter::Lowercase => text.to_lowercase(),
            BuiltinFormatter::RemoveSpaces => text.chars().filter(|c| !c.is_whitespace()).collect(),
            BuiltinFormatter::SingleSpaces => collapse_whitespace(&text),
            BuiltinFormatter::Hyphens => text
                .chars()
                .map(|c| match c {
                    '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
                    other => other,
                })
                .collect(),
        };
        FieldValue::String(formatted)
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinValidator {
    Required,
    Email,
    MinLength,
    MaxLength,
    ExactLength,
    Alpha,
    AlphaNum,
    Numeric,
    Equal,
    Regex,
    PhoneNumber,
    Url,
    Date,
    Before,
    After,
}

impl BuiltinValidator {
    pub const ALL: [BuiltinValidator; 15] = [
        BuiltinValidator::Required,
        BuiltinValidator::Email,
        BuiltinValidator::MinLength,
        BuiltinValidator::MaxLength,
        BuiltinValidator::ExactLength,
        BuiltinValidator::Alpha,
        BuiltinValidator::AlphaNum,
        BuiltinValidator::Numeric,
        BuiltinValidator::Equal,
        BuiltinValidator::Regex,
        BuiltinValidator::PhoneNumber,
        BuiltinValidator::Url,
        BuiltinValidator::Date,
        BuiltinValidator::Before,
        BuiltinValidator::After,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinValidator::Required => "required",
            BuiltinValidator::Email => "email",
            BuiltinValidator::MinLength => "minlength",
            BuiltinValidator::MaxLength => "maxlength",
            BuiltinValidator::ExactLength => "exactlength",
            BuiltinValidator::Alpha => "alpha",
            BuiltinValidator::AlphaNum => "alphanum",
            BuiltinValidator::Numeric => "numeric",
            BuiltinValidator::Equal => "equal",
            BuiltinValidator::Regex => "regex",
            BuiltinValidator::PhoneNumber => "phonenumber",
            BuiltinValidator::Url => "url",
            BuiltinValidator::Date => "date",
            BuiltinValidator::Before => "before",
            BuiltinValidator::After => "after",
        }
    }

    fn validate_text(self, text: &str, args: &[FieldValue]) -> bool {
        match self {
            BuiltinValidator::Required => !text.is_empty(),
            BuiltinValidator::Equal => equals_any(&FieldValue::String(text.to_string()), args),
            BuiltinValidator::Email => email_pattern().is_match(text),
            BuiltinValidator::MinLength => {
                length_argument(args).is_some_and(|min| text.chars().count() >= min)
            }
            BuiltinValidator::MaxLength => {
                length_argument(args).is_some_and(|max| text.chars().count() <= max)
            }
            BuiltinValidator::ExactLength => {
                length_argument(args).is_some_and(|len| text.chars().count() == len)
            }
            BuiltinValidator::Alpha => text.chars().all(char::is_alphabetic),
            BuiltinValidator::AlphaNum => text.chars().all(char::is_alphanumeric),
            BuiltinValidator::Numeric => text.chars().all(|c| c.is_ascii_digit()),
            // Unprepared use only; fields hold a `PatternValidator`.
            BuiltinValidator::Regex => {
                compile_pattern(args).is_ok_and(|pattern| pattern.is_match(text))
            }
            BuiltinValidator::PhoneNumber => {
                phone_pattern().is_match(text) && text.chars().any(|c| c.is_ascii_digit())
            }
            BuiltinValidator::Url => url_pattern().is_match(text),
            BuiltinValidator::Date => parse_date(text).is_some(),
            BuiltinValidator::Before => compare_dates(text, args, |date, limit| date < limit),
            BuiltinValidator::After => compare_dates(text, args, |date, limit| date > limit),
        }
    }
}

impl Validator for BuiltinValidator {
    fn validate(&self, value: &FieldValue, args: &[FieldValue]) -> bool {
        match self {
            BuiltinValidator::Required => !is_empty(value),
            // Absence is `required`'s business; every other check accepts it.
            _ if is_empty(value) => true,
            BuiltinValidator::Equal => match value {
                FieldValue::Array(items) => items.iter().all(|item| equals_any(item, args)),
                other => equals_any(other, args),
            },
            _ => as_text(value).is_some_and(|text| self.validate_text(&text, args)),
        }
    }

    fn check_arguments(&self, args: &[FieldValue]) -> Result<(), String> {
        match self {
            BuiltinValidator::MinLength
            | BuiltinValidator::MaxLength
            | BuiltinValidator::ExactLength => length_argument(args)
                .map(|_| ())
                .ok_or_else(|| format!("{} expects a non-negative length", self.name())),
            BuiltinValidator::Regex => compile_pattern(args).map(|_| ()),
            BuiltinValidator::Before | BuiltinValidator::After => match args.first() {
                None => Ok(()),
                Some(arg) => as_text(arg)
                    .and_then(|text| parse_date(&text))
                    .map(|_| ())
                    .ok_or_else(|| format!("{} expects a YYYY-MM-DD date", self.name())),
            },
            _ => Ok(()),
        }
    }

    fn prepare(&self, args: &[FieldValue]) -> Result<Option<Arc<dyn Validator>>, String> {
        match self {
            BuiltinValidator::Regex => {
                let pattern = compile_pattern(args)?;
                Ok(Some(Arc::new(PatternValidator { pattern })))
            }
            _ => self.check_arguments(args).map(|()| None),
        }
    }
}

/// `regex` bound to a pattern compiled when the field was built.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    pattern: regex::Regex,
}

impl Validator for PatternValidator {
    fn validate(&self, value: &FieldValue, _args: &[FieldValue]) -> bool {
        is_empty(value) || as_text(value).is_some_and(|text| self.pattern.is_match(&text))
    }
}

fn compile_pattern(args: &[FieldValue]) -> Result<regex::Regex, String> {
    let pattern = args
        .first()
        .and_then(FieldValue::as_str)
        .ok_or_else(|| "regex expects a pattern string".to_string())?;
    regex::Regex::new(pattern).map_err(|err| err.to_string())
}

fn is_empty(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => true,
        FieldValue::String(text) => text.is_empty(),
        FieldValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_text(value: &FieldValue) -> Option<Cow<'_, str>> {
    match value {
        FieldValue::String(text) => Some(Cow::Borrowed(text.as_str())),
        FieldValue::Number(number) => Some(Cow::Owned(number.to_string())),
        FieldValue::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        _ => None,
    }
}

fn equals_any(value: &FieldValue, args: &[FieldValue]) -> bool {
    let Some(text) = as_text(value) else {
        return false;
    };
    args.iter()
        .filter_map(as_text)
        .any(|candidate| candidate == text)
}

fn length_argument(args: &[FieldValue]) -> Option<usize> {
    match args.first()? {
        FieldValue::Number(number) => number.as_u64().and_then(|n| usize::try_from(n).ok()),
        FieldValue::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn compare_dates(text: &str, args: &[FieldValue], cmp: fn(NaiveDate, NaiveDate) -> bool) -> bool {
    let Some(date) = parse_date(text) else {
        return false;
    };
    let limit = match args.first() {
        None => Utc::now().date_naive(),
        Some(arg) => match as_text(arg).and_then(|limit| parse_date(&limit)) {
            Some(limit) => limit,
            None => return false,
        },
    };
    cmp(date, limit)
}

fn email_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

fn phone_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^\+?[\d\s()\-]{6,20}$").expect("phone pattern compiles")
    })
}

fn url_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern compiles")
    })
}

/// Formatters and validators by name.
///
/// [`Registry::default`] holds every built-in. Callers may register extra
/// entries, or replace a built-in under its own name, before building
/// controllers from it.
#[derive(Clone)]
pub struct Registry {
    formatters: HashMap<String, Arc<dyn Formatter>>,
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
            validators: HashMap::new(),
        }
    }

    pub fn register_formatter(
        &mut self,
        name: impl Into<String>,
        formatter: impl Formatter + 'static,
    ) -> &mut Self {
        self.formatters.insert(name.into(), Arc::new(formatter));
        self
    }

    pub fn register_validator(
        &mut self,
        name: impl Into<String>,
        validator: impl Validator + 'static,
    ) -> &mut Self {
        self.validators.insert(name.into(), Arc::new(validator));
        self
    }

    pub fn formatter(&self, name: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters.get(name).cloned()
    }

    pub fn validator(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(name).cloned()
    }

    pub fn formatter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn validator_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for formatter in BuiltinFormatter::ALL {
            registry.register_formatter(formatter.name(), formatter);
        }
        for validator in BuiltinValidator::ALL {
            registry.register_validator(validator.name(), validator);
        }
        registry
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("formatters", &self.formatter_names())
            .field("validators", &self.validator_names())
            .finish()
    }
}

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The built-in registry, created on first use.
pub fn default_registry() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(Registry::default)
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
