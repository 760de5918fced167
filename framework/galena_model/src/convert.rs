//! Value conversion and formatting services.
//!
//! Both are injected into the engine; the defaults here cover the built-in
//! `Value` types.

use galena_ir::{Value, ValueType};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("cannot convert {from} value '{value}' to {target}")]
    Unsupported {
        value: String,
        from: ValueType,
        target: ValueType,
    },

    #[error("cannot parse '{text}' as {target}")]
    Parse { text: String, target: ValueType },
}

/// Converts bound values to the declared type of their slot.
pub trait Converter: Send + Sync {
    fn can_convert(&self, from: ValueType, to: ValueType) -> bool;

    fn convert(&self, value: Value, target: ValueType) -> Result<Value, ConversionError>;
}

/// Formats values for step names and diagnostics.
pub trait Formatter: Send + Sync {
    fn format(&self, value: &Value) -> String;

    fn format_values(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| self.format(value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Identity, numeric widening, string parsing and display-to-string.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultConverter;

impl Converter for DefaultConverter {
    fn can_convert(&self, from: ValueType, to: ValueType) -> bool {
        use ValueType as T;
        matches!(
            (from, to),
            (_, T::Any | T::Str)
                | (T::Int | T::Str | T::Bool, T::Int)
                | (T::Int | T::Float | T::Str, T::Float)
                | (T::Bool | T::Str, T::Bool)
                | (T::Unit, T::Unit)
                | (T::List, T::List)
        ) || from == to
    }

    fn convert(&self, value: Value, target: ValueType) -> Result<Value, ConversionError> {
        let from = value.value_type();
        if target == ValueType::Any || from == target {
            return Ok(value);
        }
        let converted = match (&value, target) {
            (_, ValueType::Str) => Some(Value::string(value.to_string())),
            (Value::Int(n), ValueType::Float) => {
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "test data widening; precision loss above 2^53 is accepted"
                )]
                let widened = *n as f64;
                Some(Value::Float(widened))
            }
            (Value::Float(n), ValueType::Int) if n.fract() == 0.0 => {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "integral float checked above"
                )]
                let narrowed = *n as i64;
                Some(Value::Int(narrowed))
            }
            (Value::Bool(b), ValueType::Int) => Some(Value::Int(i64::from(*b))),
            (Value::Str(text), target) => return parse(text, target),
            _ => None,
        };
        converted.ok_or_else(|| ConversionError::Unsupported {
            value: value.to_string(),
            from,
            target,
        })
    }
}

fn parse(text: &str, target: ValueType) -> Result<Value, ConversionError> {
    let trimmed = text.trim();
    let parsed = match target {
        ValueType::Int => trimmed.parse().ok().map(Value::Int),
        ValueType::Float => trimmed.parse().ok().map(Value::Float),
        ValueType::Bool => trimmed.parse().ok().map(Value::Bool),
        _ => None,
    };
    parsed.ok_or_else(|| ConversionError::Parse {
        text: text.to_owned(),
        target,
    })
}

/// Strings quoted, lists bracketed, everything else via `Display`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn format(&self, value: &Value) -> String {
        match value {
            Value::Str(s) => format!("\"{}\"", s.replace('"', "\\\"")),
            Value::List(items) => format!("[{}]", self.format_values(items)),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests;
