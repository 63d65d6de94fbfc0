// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! A small indexing/wildcard expression language over parsed JSON, used by
//! `Query::JsonPath`. No published crate in the dependency set implements
//! JSONPath, so this is hand-rolled the same way `dogma-core::patch` hand-rolls
//! JSON Patch.
//!
//! Grammar (optional leading `$` is accepted but not required):
//!
//! ```text
//! expr     = ["$"] (".", field | "[" index "]" | ".*" | "[*]")*
//! field    = [A-Za-z0-9_-]+
//! index    = digit+
//! ```
//!
//! `*` (as `.* ` or `[*]`) fans out over every member of an object or every
//! element of an array at that point; the result of a wildcard step is
//! always a JSON array of the matches, in source order.

use serde_json::Value;

use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Field(String),
    Index(usize),
    Wildcard,
}

/// A parsed, reusable expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPathExpr {
    raw: String,
    steps: Vec<Step>,
}

impl JsonPathExpr {
    pub fn parse(raw: &str) -> QueryResult<Self> {
        let body = raw.strip_prefix('$').unwrap_or(raw);
        let mut steps = Vec::new();
        let mut chars = body.chars().peekable();

        while let Some(&c) = chars.peek() {
            match c {
                '.' => {
                    chars.next();
                    let mut field = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' {
                            break;
                        }
                        field.push(c);
                        chars.next();
                    }
                    if field.is_empty() {
                        return Err(invalid(raw, "empty field after '.'"));
                    }
                    if field == "*" {
                        steps.push(Step::Wildcard);
                    } else {
                        steps.push(Step::Field(field));
                    }
                }
                '[' => {
                    chars.next();
                    let mut token = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        token.push(c);
                    }
                    if !closed {
                        return Err(invalid(raw, "unterminated '['"));
                    }
                    if token == "*" {
                        steps.push(Step::Wildcard);
                    } else {
                        let idx: usize = token
                            .parse()
                            .map_err(|_| invalid(raw, &format!("bad array index '{token}'")))?;
                        steps.push(Step::Index(idx));
                    }
                }
                _ => {
                    return Err(invalid(raw, &format!("unexpected character '{c}'")));
                }
            }
        }

        Ok(Self { raw: raw.to_string(), steps })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Evaluate against a root JSON value. A wildcard step collapses its
    /// matches into a single JSON array before the next step is applied;
    /// the final result is always one `Value` (an array if the last step
    /// evaluated was a wildcard, or fed from one).
    pub fn evaluate(&self, root: &Value) -> QueryResult<Value> {
        let mut current = vec![root.clone()];
        for step in &self.steps {
            let mut next = Vec::new();
            for value in &current {
                match step {
                    Step::Field(name) => {
                        if let Value::Object(map) = value {
                            if let Some(v) = map.get(name) {
                                next.push(v.clone());
                            }
                        }
                    }
                    Step::Index(idx) => {
                        if let Value::Array(arr) = value {
                            if let Some(v) = arr.get(*idx) {
                                next.push(v.clone());
                            }
                        }
                    }
                    Step::Wildcard => match value {
                        Value::Object(map) => next.extend(map.values().cloned()),
                        Value::Array(arr) => next.extend(arr.iter().cloned()),
                        _ => {}
                    },
                }
            }
            current = next;
            if current.is_empty() {
                return Err(QueryError::PathNotFound {
                    path: String::new(),
                    expression: self.raw.clone(),
                });
            }
        }

        if self.steps.last() == Some(&Step::Wildcard) {
            Ok(Value::Array(current))
        } else {
            Ok(current.into_iter().next().unwrap_or(Value::Null))
        }
    }
}

fn invalid(raw: &str, reason: &str) -> QueryError {
    QueryError::InvalidExpression(raw.to_string(), reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_and_nested_field() {
        let e = JsonPathExpr::parse("$.a.b").unwrap();
        assert_eq!(e.evaluate(&json!({"a": {"b": 42}})).unwrap(), json!(42));
    }

    #[test]
    fn array_index() {
        let e = JsonPathExpr::parse(".items[1]").unwrap();
        assert_eq!(e.evaluate(&json!({"items": [1, 2, 3]})).unwrap(), json!(2));
    }

    #[test]
    fn wildcard_over_object_values() {
        let e = JsonPathExpr::parse("$.*").unwrap();
        let result = e.evaluate(&json!({"a": 1, "b": 2})).unwrap();
        let arr = result.as_array().unwrap();
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn wildcard_then_field_fans_out() {
        let e = JsonPathExpr::parse("$.items[*].name").unwrap();
        let result = e
            .evaluate(&json!({"items": [{"name": "a"}, {"name": "b"}]}))
            .unwrap();
        assert_eq!(result, json!(["a", "b"]));
    }

    #[test]
    fn missing_path_errors() {
        let e = JsonPathExpr::parse("$.missing").unwrap();
        assert!(e.evaluate(&json!({"a": 1})).is_err());
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(JsonPathExpr::parse("$.a[").is_err());
        assert!(JsonPathExpr::parse("$.a[x]").is_err());
    }
}
