//! Parameter schemas and argument validation.
//!
//! Each operation declares an ordered list of [`ParamSpec`]s. Validation walks
//! the whole list and the whole argument map before reporting, so a caller
//! sees every problem in one [`BridgeError::Validation`].

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::error::{BridgeError, FieldViolation, Result};

/// Length of `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
const HYPHENATED_UUID_LEN: usize = 36;

/// Scoping fields that always come from the credential context.
const CONTEXT_FIELDS: [&str; 2] = ["organization_id", "environment_id"];

/// Type and constraints of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// String holding a UUID in the hyphenated 8-4-4-4-12 form.
    Uuid,
    /// Opaque backend identifier: 1-128 ASCII alphanumerics, `-` or `_`.
    Identifier,
    /// Free text.
    Text {
        /// Maximum length in characters.
        max_len: usize,
        /// Reject empty or whitespace-only values.
        non_blank: bool,
    },
    /// Integer within an inclusive range.
    Integer {
        /// Minimum value.
        min: i64,
        /// Maximum value, if bounded.
        max: Option<i64>,
    },
    /// BOLT11 payment request.
    Bolt11,
    /// String from a fixed set.
    OneOf(&'static [&'static str]),
    /// Arbitrary JSON object.
    Object,
}

impl ParamKind {
    /// Checks a single value, returning the violation reason on failure.
    fn check(self, value: &Value) -> std::result::Result<(), String> {
        match self {
            Self::Uuid => {
                let text = value.as_str().ok_or("must be a string")?;
                // parse_str also takes braced, urn and simple forms; only the
                // 36-character hyphenated form may reach a request path.
                match Uuid::parse_str(text) {
                    Ok(_) if text.len() == HYPHENATED_UUID_LEN => Ok(()),
                    _ => Err("must be a valid UUID".to_owned()),
                }
            }
            Self::Identifier => {
                let text = value.as_str().ok_or("must be a string")?;
                validate_identifier(text)
            }
            Self::Text { max_len, non_blank } => {
                let text = value.as_str().ok_or("must be a string")?;
                if non_blank && text.trim().is_empty() {
                    return Err("must not be empty".to_owned());
                }
                if text.chars().count() > max_len {
                    return Err(format!("must be at most {max_len} characters"));
                }
                Ok(())
            }
            Self::Integer { min, max } => {
                let describe = || match max {
                    Some(max) => format!("must be an integer between {min} and {max}"),
                    None => format!("must be an integer >= {min}"),
                };
                let number = value.as_i64().ok_or_else(describe)?;
                if number < min || max.is_some_and(|max| number > max) {
                    return Err(describe());
                }
                Ok(())
            }
            Self::Bolt11 => {
                let text = value.as_str().ok_or("must be a string")?;
                validate_bolt11(text)
            }
            Self::OneOf(allowed) => {
                let text = value.as_str().ok_or("must be a string")?;
                if allowed.contains(&text) {
                    Ok(())
                } else {
                    Err(format!("must be one of: {}", allowed.join(", ")))
                }
            }
            Self::Object => {
                if value.is_object() {
                    Ok(())
                } else {
                    Err("must be an object".to_owned())
                }
            }
        }
    }

    /// Renders the JSON Schema fragment for this kind.
    fn schema(self) -> Value {
        match self {
            Self::Uuid => json!({ "type": "string", "format": "uuid" }),
            Self::Identifier => json!({
                "type": "string",
                "minLength": 1,
                "maxLength": MAX_IDENTIFIER_LEN,
                "pattern": "^[A-Za-z0-9_-]+$"
            }),
            Self::Text { max_len, non_blank } => {
                json!({ "type": "string", "minLength": usize::from(non_blank), "maxLength": max_len })
            }
            Self::Integer { min, max } => {
                let mut schema = json!({ "type": "integer", "minimum": min });
                if let Some(max) = max {
                    schema["maximum"] = json!(max);
                }
                schema
            }
            Self::Bolt11 => json!({
                "type": "string",
                "minLength": MIN_BOLT11_LEN,
                "maxLength": MAX_BOLT11_LEN,
                "pattern": "^[Ll][Nn][A-Za-z0-9]+$"
            }),
            Self::OneOf(allowed) => json!({ "type": "string", "enum": allowed }),
            Self::Object => json!({ "type": "object" }),
        }
    }
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Argument name.
    pub name: &'static str,
    /// Type and constraints.
    pub kind: ParamKind,
    /// Whether the argument must be present.
    pub required: bool,
    /// Description shown to the agent.
    pub description: &'static str,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self { name, kind, required: true, description }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self { name, kind, required: false, description }
    }
}

/// Arguments that passed validation, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs {
    values: Vec<(&'static str, Value)>,
}

impl ValidatedArgs {
    /// Returns the value of an argument, if supplied.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(key, _)| *key == name).map(|(_, value)| value)
    }

    /// Iterates over supplied arguments in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    /// Returns the number of supplied arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validates `arguments` against `params`.
///
/// `null` values count as absent. Keys not declared in `params` are
/// violations; `organization_id` and `environment_id` get a dedicated reason
/// because they are always injected from the credential context.
///
/// # Errors
///
/// Returns [`BridgeError::Validation`] carrying every violation found.
pub fn validate_arguments(params: &[ParamSpec], arguments: &Map<String, Value>) -> Result<ValidatedArgs> {
    let mut violations = Vec::new();
    let mut values = Vec::with_capacity(params.len());

    for spec in params {
        match arguments.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    violations.push(FieldViolation::missing(spec.name));
                }
            }
            Some(value) => match spec.kind.check(value) {
                Ok(()) => values.push((spec.name, value.clone())),
                Err(reason) => violations.push(FieldViolation::new(spec.name, reason)),
            },
        }
    }

    for key in arguments.keys() {
        if params.iter().any(|spec| spec.name == key) {
            continue;
        }
        let reason = if CONTEXT_FIELDS.contains(&key.as_str()) {
            "supplied from credentials; must not be passed"
        } else {
            "unknown argument"
        };
        violations.push(FieldViolation::new(key.clone(), reason));
    }

    if violations.is_empty() {
        Ok(ValidatedArgs { values })
    } else {
        Err(BridgeError::validation(violations))
    }
}

/// Renders the JSON Schema object describing `params`.
#[must_use]
pub fn input_schema(params: &[ParamSpec]) -> Map<String, Value> {
    let mut properties = Map::new();
    for spec in params {
        let mut schema = spec.kind.schema();
        schema["description"] = json!(spec.description);
        properties.insert(spec.name.to_owned(), schema);
    }

    let required: Vec<&str> = params.iter().filter(|spec| spec.required).map(|spec| spec.name).collect();

    let mut schema = Map::new();
    schema.insert("type".to_owned(), json!("object"));
    schema.insert("properties".to_owned(), Value::Object(properties));
    schema.insert("required".to_owned(), json!(required));
    schema.insert("additionalProperties".to_owned(), json!(false));
    schema
}

const MAX_IDENTIFIER_LEN: usize = 128;
const MIN_BOLT11_LEN: usize = 20;
const MAX_BOLT11_LEN: usize = 8192;

/// Validates an opaque identifier used as a path segment.
fn validate_identifier(id: &str) -> std::result::Result<(), String> {
    if id.is_empty() {
        return Err("must not be empty".to_owned());
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(format!("must be {MAX_IDENTIFIER_LEN} characters or less"));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err("must contain only alphanumeric characters, hyphens, and underscores".to_owned());
    }
    Ok(())
}

/// Shallow BOLT11 sanity check; decoding is left to the backend.
fn validate_bolt11(invoice: &str) -> std::result::Result<(), String> {
    if !invoice.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("ln")) {
        return Err("must be a BOLT11 invoice starting with 'ln'".to_owned());
    }
    if invoice.len() < MIN_BOLT11_LEN || invoice.len() > MAX_BOLT11_LEN {
        return Err(format!("must be between {MIN_BOLT11_LEN} and {MAX_BOLT11_LEN} characters"));
    }
    if !invoice.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("must contain only ASCII letters and digits".to_owned());
    }
    Ok(())
}
