//! Validate an env file against its example/schema file.
//!
//! The example file doubles as the schema: its keys are the required set and
//! each example value hints the expected type.

use crate::kvfile::{unquote, KeyValueBody};

/// Value type inferred from an example value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Boolean,
    Url,
    /// Accepts anything
    String,
}

impl ValueType {
    pub fn infer(value: &str) -> Self {
        let v = unquote(value);
        if v.is_empty() {
            ValueType::String
        } else if v.parse::<f64>().is_ok() {
            ValueType::Number
        } else if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false") {
            ValueType::Boolean
        } else if v.starts_with("http://") || v.starts_with("https://") {
            ValueType::Url
        } else {
            ValueType::String
        }
    }

    pub fn accepts(self, value: &str) -> bool {
        match self {
            ValueType::String => true,
            other => ValueType::infer(value) == other,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Url => "url",
            ValueType::String => "string",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub key: String,
    pub expected: ValueType,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Keys in the example but not in the file
    pub missing: Vec<String>,
    /// Keys in the file but not in the example
    pub extra: Vec<String>,
    /// Keys present but empty while the example has a value
    pub empty: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ValidationReport {
    /// Extra keys are reported but do not make a file invalid.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.empty.is_empty() && self.type_mismatches.is_empty()
    }
}

/// Compare `body` against `example`. Values starting with `skip_prefix`
/// (encrypted inline values) are excluded from emptiness and type checks.
pub fn validate(
    body: &KeyValueBody,
    example: &KeyValueBody,
    skip_prefix: &str,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (key, example_value) in example.assignments() {
        if report.missing.iter().any(|k| k == key) {
            continue;
        }
        let Some(value) = body.get(key) else {
            report.missing.push(key.to_string());
            continue;
        };
        if value.trim_start().starts_with(skip_prefix) {
            continue;
        }
        if unquote(value).is_empty() {
            if !unquote(example_value).is_empty() {
                report.empty.push(key.to_string());
            }
            continue;
        }
        let expected = ValueType::infer(example_value);
        if !expected.accepts(value) && !report.type_mismatches.iter().any(|m| m.key == key) {
            report.type_mismatches.push(TypeMismatch {
                key: key.to_string(),
                expected,
                value: unquote(value).to_string(),
            });
        }
    }

    for (key, _) in body.assignments() {
        if !example.contains_key(key) && !report.extra.iter().any(|k| k == key) {
            report.extra.push(key.to_string());
        }
    }

    report
}
