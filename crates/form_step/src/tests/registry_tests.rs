use super::*;
use serde_json::json;

fn check(name: &str, value: FieldValue, args: &[FieldValue]) -> bool {
    default_registry()
        .validator(name)
        .expect("builtin validator")
        .validate(&value, args)
}

fn format(name: &str, value: &str) -> FieldValue {
    default_registry()
        .formatter(name)
        .expect("builtin formatter")
        .format(json!(value))
}

#[test]
fn default_registry_exposes_every_builtin() {
    let registry = default_registry();
    for formatter in BuiltinFormatter::ALL {
        assert!(registry.formatter(formatter.name()).is_some());
    }
    for validator in BuiltinValidator::ALL {
        assert!(registry.validator(validator.name()).is_some());
    }
    assert!(registry.validator("nope").is_none());
}

#[test]
fn string_formatters_transform_text() {
    assert_eq!(format("trim", "  John Smith  "), json!("John Smith"));
    assert_eq!(format("uppercase", "value"), json!("VALUE"));
    assert_eq!(format("lowercase", "MiXeD"), json!("mixed"));
    assert_eq!(format("removespaces", "AB 12 CD"), json!("AB12CD"));
    assert_eq!(format("singlespaces", "a   b\t\tc"), json!("a b c"));
    assert_eq!(format("hyphens", "2010\u{2013}2012"), json!("2010-2012"));
}

#[test]
fn boolean_formatter_only_converts_literal_flags() {
    assert_eq!(format("boolean", "true"), json!(true));
    assert_eq!(format("boolean", "false"), json!(false));
    assert_eq!(format("boolean", "yes"), json!("yes"));
}

#[test]
fn formatters_leave_non_strings_alone() {
    let formatter = default_registry().formatter("uppercase").expect("formatter");
    assert_eq!(formatter.format(json!(true)), json!(true));
}

#[test]
fn required_rejects_missing_and_empty_values() {
    assert!(!check("required", FieldValue::Null, &[]));
    assert!(!check("required", json!(""), &[]));
    assert!(!check("required", json!([]), &[]));
    assert!(check("required", json!("x"), &[]));
    assert!(check("required", json!(false), &[]));
}

#[test]
fn optional_validators_accept_empty_values() {
    assert!(check("email", json!(""), &[]));
    assert!(check("minlength", FieldValue::Null, &[json!(10)]));
    assert!(check("numeric", json!(""), &[]));
}

#[test]
fn email_and_length_validators() {
    assert!(check("email", json!("test@example.com"), &[]));
    assert!(!check("email", json!("foo"), &[]));
    assert!(check("minlength", json!("John Smith"), &[json!(10)]));
    assert!(!check("minlength", json!("Joe"), &[json!(10)]));
    assert!(!check("maxlength", json!("A name longer than twenty characters"), &[json!(20)]));
    assert!(check("exactlength", json!("abcd"), &[json!("4")]));
}

#[test]
fn character_class_validators() {
    assert!(check("alpha", json!("abc"), &[]));
    assert!(!check("alpha", json!("abc1"), &[]));
    assert!(check("alphanum", json!("abc1"), &[]));
    assert!(check("numeric", json!("0123"), &[]));
    assert!(!check("numeric", json!("12a"), &[]));
}

#[test]
fn equal_matches_any_argument() {
    let options = [json!("one"), json!("two"), json!("three")];
    assert!(check("equal", json!("two"), &options));
    assert!(!check("equal", json!("number"), &options));
    assert!(check("equal", json!(["one", "three"]), &options));
    assert!(!check("equal", json!(["one", "four"]), &options));
}

#[test]
fn regex_phone_and_url_validators() {
    assert!(check("regex", json!("AB12"), &[json!("^[A-Z]{2}\\d{2}$")]));
    assert!(!check("regex", json!("ab12"), &[json!("^[A-Z]{2}\\d{2}$")]));
    assert!(check("phonenumber", json!("+44 (0)20 7946 0000"), &[]));
    assert!(!check("phonenumber", json!("call me"), &[]));
    assert!(check("url", json!("https://example.com/path"), &[]));
    assert!(!check("url", json!("example"), &[]));
}

#[test]
fn date_validators_compare_iso_dates() {
    assert!(check("date", json!("2024-02-29"), &[]));
    assert!(!check("date", json!("2023-02-29"), &[]));
    assert!(check("before", json!("2020-01-01"), &[json!("2021-01-01")]));
    assert!(!check("before", json!("2022-01-01"), &[json!("2021-01-01")]));
    assert!(check("after", json!("2022-01-01"), &[json!("2021-01-01")]));
    assert!(check("before", json!("1999-12-31"), &[]));
}

#[test]
fn argument_checks_reject_bad_configuration() {
    let registry = default_registry();
    let minlength = registry.validator("minlength").expect("validator");
    assert!(minlength.check_arguments(&[json!(3)]).is_ok());
    assert!(minlength.check_arguments(&[]).is_err());
    let regex = registry.validator("regex").expect("validator");
    assert!(regex.check_arguments(&[json!("(")]).is_err());
    let before = registry.validator("before").expect("validator");
    assert!(before.check_arguments(&[]).is_ok());
    assert!(before.check_arguments(&[json!("soon")]).is_err());
}

#[test]
fn custom_entries_override_builtins() {
    let mut registry = Registry::default();
    registry
        .register_validator("email", |_: &FieldValue, _: &[FieldValue]| false)
        .register_formatter("shout", |value: FieldValue| match value {
            FieldValue::String(text) => FieldValue::String(format!("{text}!")),
            other => other,
        });
    let email = registry.validator("email").expect("validator");
    assert!(!email.validate(&json!("test@example.com"), &[]));
    let shout = registry.formatter("shout").expect("formatter");
    assert_eq!(shout.format(json!("hi")), json!("hi!"));
    assert!(registry.formatter_names().contains(&"shout"));
}
