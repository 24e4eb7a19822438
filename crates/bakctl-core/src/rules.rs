//! Rule codec.
//!
//! Include/exclude rule lists are persisted as compact JSON arrays. An empty
//! list is always stored as the literal `[]`, never as an empty string or NULL.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Literal stored for an empty rule list.
pub const EMPTY_RULES: &str = "[]";

/// Encodes a rule list into its stored JSON form.
pub fn encode(rules: &[String]) -> Result<String> {
    if rules.is_empty() {
        return Ok(EMPTY_RULES.to_string());
    }
    Ok(serde_json::to_string(rules)?)
}

/// Decodes a stored rule list. Both `""` and `"[]"` decode to an empty list.
pub fn decode(stored: &str) -> Result<Vec<String>> {
    let trimmed = stored.trim();
    if trimmed.is_empty() || trimmed == EMPTY_RULES {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// A rule list kept in its stored JSON form.
///
/// Tasks read from the database carry their rules undecoded, so a malformed
/// column only fails the operation that needs the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleList {
    stored: String,
}

impl RuleList {
    /// Wraps a stored column value without decoding it.
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self {
            stored: stored.into(),
        }
    }

    /// The text written to the database.
    pub fn as_stored(&self) -> &str {
        &self.stored
    }

    /// Decodes the rules.
    pub fn decode(&self) -> Result<Vec<String>> {
        decode(&self.stored)
    }

    /// Decoded rules for display; a malformed value is shown as stored.
    pub fn display(&self, separator: &str) -> String {
        match self.decode() {
            Ok(rules) => rules.join(separator),
            Err(_) => format!("<invalid: {}>", self.stored),
        }
    }
}

impl Default for RuleList {
    fn default() -> Self {
        Self::from_stored(EMPTY_RULES)
    }
}

impl From<Vec<String>> for RuleList {
    fn from(rules: Vec<String>) -> Self {
        if rules.is_empty() {
            return Self::default();
        }
        Self::from_stored(serde_json::Value::from(rules).to_string())
    }
}

impl Serialize for RuleList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.decode() {
            Ok(rules) => rules.serialize(serializer),
            Err(_) => serializer.serialize_str(&self.stored),
        }
    }
}

impl<'de> Deserialize<'de> for RuleList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(Self::from)
    }
}

/// Splits comma separated flag values into trimmed, non-empty rules.
///
/// Commas inside `{...}` belong to a glob alternation and do not split.
pub fn split_list(values: &[String]) -> Vec<String> {
    let mut rules = Vec::new();
    for value in values {
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in value.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    push_rule(&mut rules, &value[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        push_rule(&mut rules, &value[start..]);
    }
    rules
}

fn push_rule(rules: &mut Vec<String>, raw: &str) {
    let rule = raw.trim();
    if !rule.is_empty() {
        rules.push(rule.to_string());
    }
}
