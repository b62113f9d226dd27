use super::*;
use crate::registry::default_registry;
use serde_json::json;

fn field(config: serde_json::Value) -> FieldConfig {
    serde_json::from_value(config).expect("field config")
}

#[test]
fn parses_shorthand_validator_forms() {
    let config = field(json!({
        "validate": ["required", { "type": "minlength", "arguments": [10] }, { "type": "maxlength", "arguments": 20 }]
    }));
    let schema = FieldSchema::build("name", &config, &[], default_registry()).expect("schema");
    let kinds: Vec<&str> = schema.validators.iter().map(|v| v.kind.as_str()).collect();
    assert_eq!(kinds, ["required", "minlength", "maxlength"]);
    assert_eq!(schema.validators[1].arguments, vec![json!(10)]);
    assert_eq!(schema.validators[2].arguments, vec![json!(20)]);
}

#[test]
fn single_validator_and_formatter_names_are_accepted() {
    let config = field(json!({ "formatter": "uppercase", "validate": "required" }));
    let schema = FieldSchema::build("field", &config, &[], default_registry()).expect("schema");
    assert_eq!(schema.format("value"), json!("VALUE"));
    assert_eq!(schema.validators.len(), 1);
}

#[test]
fn formatters_chain_in_declared_order() {
    let config = field(json!({ "formatter": ["trim", "boolean"] }));
    let schema = FieldSchema::build("bool", &config, &[], default_registry()).expect("schema");
    assert_eq!(schema.format("  true "), json!(true));
}

#[test]
fn field_without_formatter_passes_raw_value_through() {
    let schema =
        FieldSchema::build("raw", &FieldConfig::default(), &[], default_registry()).expect("schema");
    assert_eq!(schema.format("  as is  "), json!("  as is  "));
}

#[test]
fn default_formatters_apply_only_when_field_declares_none() {
    let defaults = vec!["trim".to_string(), "singlespaces".to_string()];
    let bare =
        FieldSchema::build("a", &FieldConfig::default(), &defaults, default_registry()).expect("a");
    assert_eq!(bare.format("  John   Smith  "), json!("John Smith"));

    let declared = field(json!({ "formatter": "uppercase" }));
    let declared = FieldSchema::build("b", &declared, &defaults, default_registry()).expect("b");
    assert_eq!(declared.format(" x "), json!(" X "));
}

#[test]
fn options_append_an_equality_validator() {
    let config = field(json!({ "options": ["one", { "value": "two", "label": "Two" }, "three"] }));
    let schema = FieldSchema::build("options", &config, &[], default_registry()).expect("schema");
    let equal = schema.validators.last().expect("equal validator");
    assert_eq!(equal.kind, "equal");
    assert_eq!(equal.arguments, vec![json!("one"), json!("two"), json!("three")]);
    assert_eq!(
        schema.validate(&json!("number")),
        Some(ValidationError::new("options", "equal"))
    );
    assert_eq!(schema.validate(&json!("two")), None);
}

#[test]
fn first_failing_validator_wins() {
    let config = field(json!({ "validate": ["required", "email"] }));
    let schema = FieldSchema::build("email", &config, &[], default_registry()).expect("schema");
    assert_eq!(
        schema.validate(&FieldValue::Null),
        Some(ValidationError::new("email", "required"))
    );
    assert_eq!(
        schema.validate(&json!("foo")),
        Some(ValidationError::new("email", "email"))
    );
    assert_eq!(schema.validate(&json!("test@example.com")), None);
}

#[test]
fn unknown_names_fail_at_build_time() {
    let config = field(json!({ "formatter": "sparkle" }));
    let err = FieldSchema::build("f", &config, &[], default_registry()).expect_err("unknown");
    assert_eq!(
        err,
        ConfigError::UnknownFormatter {
            field: "f".into(),
            name: "sparkle".into()
        }
    );

    let config = field(json!({ "validate": "telepathy" }));
    let err = FieldSchema::build("f", &config, &[], default_registry()).expect_err("unknown");
    assert!(matches!(err, ConfigError::UnknownValidator { .. }));
}

#[test]
fn invalid_arguments_fail_at_build_time() {
    let config = field(json!({ "validate": { "type": "minlength", "arguments": "many" } }));
    let err = FieldSchema::build("f", &config, &[], default_registry()).expect_err("bad args");
    assert!(matches!(err, ConfigError::InvalidArguments { ref validator, .. } if validator == "minlength"));
}

#[test]
fn regex_fields_hold_a_validator_bound_to_the_compiled_pattern() {
    let config = field(json!({ "validate": { "type": "regex", "arguments": "^[A-Z]{2}\\d{2}$" } }));
    let schema = FieldSchema::build("code", &config, &[], default_registry()).expect("schema");
    let bound = &schema.validators[0];
    let shared = default_registry().validator("regex").expect("regex");
    assert!(!Arc::ptr_eq(&bound.validator, &shared));

    assert!(bound.check(&json!("AB12")));
    assert!(bound.check(&json!("")));
    assert!(!bound.check(&json!("ab12")));
    assert_eq!(
        schema.validate(&json!("nope")).map(|err| err.kind),
        Some("regex".to_string())
    );
}

#[test]
fn validators_are_prepared_once_per_field() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Prefix {
        prepared: Arc<AtomicUsize>,
    }

    impl Validator for Prefix {
        fn validate(&self, _value: &FieldValue, _args: &[FieldValue]) -> bool {
            false
        }

        fn prepare(&self, args: &[FieldValue]) -> Result<Option<Arc<dyn Validator>>, String> {
            self.prepared.fetch_add(1, Ordering::SeqCst);
            let prefix = args
                .first()
                .and_then(FieldValue::as_str)
                .ok_or("prefix expects a string")?
                .to_string();
            Ok(Some(Arc::new(move |value: &FieldValue, _: &[FieldValue]| {
                value.as_str().is_some_and(|text| text.starts_with(&prefix))
            })))
        }
    }

    let prepared = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::default();
    registry.register_validator(
        "prefix",
        Prefix {
            prepared: Arc::clone(&prepared),
        },
    );

    let config = field(json!({ "validate": { "type": "prefix", "arguments": "GB" } }));
    let schema = FieldSchema::build("vat", &config, &[], &registry).expect("schema");
    assert_eq!(prepared.load(Ordering::SeqCst), 1);
    assert!(schema.validate(&json!("GB123")).is_none());
    assert!(schema.validate(&json!("FR123")).is_some());
    assert_eq!(prepared.load(Ordering::SeqCst), 1);

    let bad = field(json!({ "validate": { "type": "prefix", "arguments": 7 } }));
    let err = FieldSchema::build("vat", &bad, &[], &registry).expect_err("bad args");
    assert!(matches!(err, ConfigError::InvalidArguments { ref validator, .. } if validator == "prefix"));
}
