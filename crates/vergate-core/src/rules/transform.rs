//! Parameter value transforms
//!
//! A closed, serde-tagged set: an unknown tag in a rule file fails at load
//! time, never at request time. Transforms that do not apply to a value's
//! type pass it through unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transform applied to a single parameter value during request adaptation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueTransform {
    /// `"a;b;c"` becomes `"a,b,c"`
    SemicolonToCommaList,
    /// `"a,b,c"` becomes `"a;b;c"`
    CommaToSemicolonList,
    /// `["a", "b"]` becomes `"a,b"`
    JoinArrayComma,
    /// `true` becomes `"true"`
    StringifyBool,
}

impl ValueTransform {
    /// Apply the transform to a value
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            ValueTransform::SemicolonToCommaList => match value {
                Value::String(s) => Value::String(s.replace(';', ",")),
                other => other.clone(),
            },
            ValueTransform::CommaToSemicolonList => match value {
                Value::String(s) => Value::String(s.replace(',', ";")),
                other => other.clone(),
            },
            ValueTransform::JoinArrayComma => match value {
                Value::Array(items) => {
                    let joined = items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(",");
                    Value::String(joined)
                }
                other => other.clone(),
            },
            ValueTransform::StringifyBool => match value {
                Value::Bool(b) => Value::String(b.to_string()),
                other => other.clone(),
            },
        }
    }

    /// Stable identifier, matching the serde tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTransform::SemicolonToCommaList => "semicolon-to-comma-list",
            ValueTransform::CommaToSemicolonList => "comma-to-semicolon-list",
            ValueTransform::JoinArrayComma => "join-array-comma",
            ValueTransform::StringifyBool => "stringify-bool",
        }
    }
}

impl fmt::Display for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
