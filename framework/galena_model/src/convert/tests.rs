use galena_ir::{Value, ValueType};
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_identity_and_any() {
    let c = DefaultConverter;
    assert_eq!(c.convert(Value::Int(1), ValueType::Int), Ok(Value::Int(1)));
    assert_eq!(
        c.convert(Value::from("x"), ValueType::Any),
        Ok(Value::from("x"))
    );
}

#[test]
fn test_numeric_conversions() {
    let c = DefaultConverter;
    assert_eq!(
        c.convert(Value::Int(2), ValueType::Float),
        Ok(Value::Float(2.0))
    );
    assert_eq!(
        c.convert(Value::Float(4.0), ValueType::Int),
        Ok(Value::Int(4))
    );
    assert!(c.convert(Value::Float(4.5), ValueType::Int).is_err());
    assert_eq!(c.convert(Value::Bool(true), ValueType::Int), Ok(Value::Int(1)));
}

#[test]
fn test_string_parsing() {
    let c = DefaultConverter;
    assert_eq!(c.convert(Value::from(" 17 "), ValueType::Int), Ok(Value::Int(17)));
    assert_eq!(
        c.convert(Value::from("true"), ValueType::Bool),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        c.convert(Value::from("abc"), ValueType::Int),
        Err(ConversionError::Parse {
            text: "abc".to_owned(),
            target: ValueType::Int
        })
    );
    assert_eq!(
        c.convert(Value::Int(5), ValueType::Str),
        Ok(Value::from("5"))
    );
}

#[test]
fn test_can_convert_matches_convert() {
    let c = DefaultConverter;
    assert!(c.can_convert(ValueType::Int, ValueType::Float));
    assert!(c.can_convert(ValueType::List, ValueType::Str));
    assert!(!c.can_convert(ValueType::List, ValueType::Int));
    assert!(c
        .convert(Value::list(vec![Value::Int(1)]), ValueType::Int)
        .is_err());
}

#[test]
fn test_default_formatter() {
    let f = DefaultFormatter;
    assert_eq!(f.format(&Value::from("a\"b")), "\"a\\\"b\"");
    assert_eq!(
        f.format_values(&[
            Value::Int(1),
            Value::from("x"),
            Value::list(vec![Value::Bool(false)])
        ]),
        "1, \"x\", [false]"
    );
}
