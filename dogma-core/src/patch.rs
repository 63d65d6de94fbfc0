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

//! A minimal RFC 6902 JSON Patch engine, extended with the `safeReplace`
//! test-and-set operation. No published crate in this workspace's
//! dependency set implements JSON Patch, so it is hand-rolled here the way
//! the storage layer hand-rolls its own text diff engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// One operation of a JSON Patch document (RFC 6902), plus `safeReplace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum JsonPatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
    /// Non-standard: succeeds only if the value currently at `path` equals
    /// `old_value`, then replaces it with `value`.
    SafeReplace {
        path: String,
        old_value: Value,
        value: Value,
    },
}

/// A `safeReplace` request kept as its own type for call sites that only
/// ever build this one kind of patch (e.g. the meta-repo indexer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeReplace {
    pub path: String,
    pub old_value: Value,
    pub value: Value,
}

/// Apply an ordered list of patch operations to `doc`, returning the new
/// document. All operations are applied; the first failure aborts with no
/// partial mutation visible to the caller (it operates on a clone).
pub fn apply_patch(doc: &Value, ops: &[JsonPatchOp]) -> CoreResult<Value> {
    let mut working = doc.clone();
    for op in ops {
        apply_one(&mut working, op)?;
    }
    Ok(working)
}

fn apply_one(doc: &mut Value, op: &JsonPatchOp) -> CoreResult<()> {
    match op {
        JsonPatchOp::Add { path, value } => set_at(doc, path, value.clone()),
        JsonPatchOp::Remove { path } => remove_at(doc, path),
        JsonPatchOp::Replace { path, value } => {
            get_at(doc, path)?;
            set_at(doc, path, value.clone())
        }
        JsonPatchOp::Move { from, path } => {
            let v = get_at(doc, from)?.clone();
            remove_at(doc, from)?;
            set_at(doc, path, v)
        }
        JsonPatchOp::Copy { from, path } => {
            let v = get_at(doc, from)?.clone();
            set_at(doc, path, v)
        }
        JsonPatchOp::Test { path, value } => {
            let current = get_at(doc, path)?;
            if current != value {
                return Err(CoreError::ChangePatchConflict(format!(
                    "test failed at {path}"
                )));
            }
            Ok(())
        }
        JsonPatchOp::SafeReplace {
            path,
            old_value,
            value,
        } => {
            let current = get_at(doc, path)?;
            if current != old_value {
                return Err(CoreError::ChangePatchConflict(format!(
                    "safeReplace precondition failed at {path}"
                )));
            }
            set_at(doc, path, value.clone())
        }
    }
}

fn split_pointer(path: &str) -> Vec<String> {
    if path.is_empty() || path == "/" {
        return Vec::new();
    }
    path.trim_start_matches('/')
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn get_at<'a>(doc: &'a Value, path: &str) -> CoreResult<&'a Value> {
    let tokens = split_pointer(path);
    let mut cur = doc;
    for t in &tokens {
        cur = match cur {
            Value::Object(m) => m
                .get(t)
                .ok_or_else(|| CoreError::NotFound(format!("json pointer {path}")))?,
            Value::Array(a) => {
                let idx: usize = t
                    .parse()
                    .map_err(|_| CoreError::InvalidPush(format!("bad array index: {t}")))?;
                a.get(idx)
                    .ok_or_else(|| CoreError::NotFound(format!("json pointer {path}")))?
            }
            _ => return Err(CoreError::NotFound(format!("json pointer {path}"))),
        };
    }
    Ok(cur)
}

fn set_at(doc: &mut Value, path: &str, value: Value) -> CoreResult<()> {
    let tokens = split_pointer(path);
    if tokens.is_empty() {
        *doc = value;
        return Ok(());
    }
    let mut cur = doc;
    for t in &tokens[..tokens.len() - 1] {
        cur = match cur {
            Value::Object(m) => m
                .entry(t.clone())
                .or_insert_with(|| Value::Object(Default::default())),
            Value::Array(a) => {
                let idx: usize = t
                    .parse()
                    .map_err(|_| CoreError::InvalidPush(format!("bad array index: {t}")))?;
                a.get_mut(idx)
                    .ok_or_else(|| CoreError::NotFound(format!("json pointer {path}")))?
            }
            _ => return Err(CoreError::InvalidPush(format!("cannot descend into {path}"))),
        };
    }
    let last = &tokens[tokens.len() - 1];
    match cur {
        Value::Object(m) => {
            m.insert(last.clone(), value);
        }
        Value::Array(a) => {
            if last == "-" {
                a.push(value);
            } else {
                let idx: usize = last
                    .parse()
                    .map_err(|_| CoreError::InvalidPush(format!("bad array index: {last}")))?;
                if idx > a.len() {
                    return Err(CoreError::InvalidPush(format!("index out of bounds: {last}")));
                }
                a.insert(idx, value);
            }
        }
        _ => return Err(CoreError::InvalidPush(format!("cannot set at {path}"))),
    }
    Ok(())
}

fn remove_at(doc: &mut Value, path: &str) -> CoreResult<()> {
    let tokens = split_pointer(path);
    if tokens.is_empty() {
        return Err(CoreError::InvalidPush("cannot remove document root".into()));
    }
    let mut cur = doc;
    for t in &tokens[..tokens.len() - 1] {
        cur = match cur {
            Value::Object(m) => m
                .get_mut(t)
                .ok_or_else(|| CoreError::NotFound(format!("json pointer {path}")))?,
            Value::Array(a) => {
                let idx: usize = t
                    .parse()
                    .map_err(|_| CoreError::InvalidPush(format!("bad array index: {t}")))?;
                a.get_mut(idx)
                    .ok_or_else(|| CoreError::NotFound(format!("json pointer {path}")))?
            }
            _ => return Err(CoreError::NotFound(format!("json pointer {path}"))),
        };
    }
    let last = &tokens[tokens.len() - 1];
    match cur {
        Value::Object(m) => {
            m.remove(last)
                .ok_or_else(|| CoreError::NotFound(format!("json pointer {path}")))?;
        }
        Value::Array(a) => {
            let idx: usize = last
                .parse()
                .map_err(|_| CoreError::InvalidPush(format!("bad array index: {last}")))?;
            if idx >= a.len() {
                return Err(CoreError::NotFound(format!("json pointer {path}")));
            }
            a.remove(idx);
        }
        _ => return Err(CoreError::NotFound(format!("json pointer {path}"))),
    }
    Ok(())
}

/// Compute a minimal RFC 6902 diff turning `from` into `to`. Used to
/// normalize `UPSERT_JSON` changes against an existing differing value.
pub fn diff(from: &Value, to: &Value) -> Vec<JsonPatchOp> {
    let mut ops = Vec::new();
    diff_at(from, to, "", &mut ops);
    ops
}

fn pointer_push(base: &str, segment: &str) -> String {
    format!("{base}/{}", segment.replace('~', "~0").replace('/', "~1"))
}

fn diff_at(from: &Value, to: &Value, path: &str, ops: &mut Vec<JsonPatchOp>) {
    if from == to {
        return;
    }
    match (from, to) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, av) in a {
                let child_path = pointer_push(path, k);
                match b.get(k) {
                    Some(bv) => diff_at(av, bv, &child_path, ops),
                    None => ops.push(JsonPatchOp::Remove { path: child_path }),
                }
            }
            for (k, bv) in b {
                if !a.contains_key(k) {
                    ops.push(JsonPatchOp::Add {
                        path: pointer_push(path, k),
                        value: bv.clone(),
                    });
                }
            }
        }
        _ => {
            let p = if path.is_empty() { "/".to_string() } else { path.to_string() };
            ops.push(JsonPatchOp::Replace {
                path: p,
                value: to.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_replace_remove() {
        let doc = json!({"a": 1});
        let ops = vec![
            JsonPatchOp::Add { path: "/b".into(), value: json!(2) },
            JsonPatchOp::Replace { path: "/a".into(), value: json!(9) },
        ];
        let out = apply_patch(&doc, &ops).unwrap();
        assert_eq!(out, json!({"a": 9, "b": 2}));

        let ops = vec![JsonPatchOp::Remove { path: "/a".into() }];
        let out = apply_patch(&out, &ops).unwrap();
        assert_eq!(out, json!({"b": 2}));
    }

    #[test]
    fn test_op_fails_on_mismatch() {
        let doc = json!({"a": 1});
        let ops = vec![JsonPatchOp::Test { path: "/a".into(), value: json!(2) }];
        assert!(apply_patch(&doc, &ops).is_err());
    }

    #[test]
    fn safe_replace_checks_old_value() {
        let doc = json!({"a": 1});
        let ops = vec![JsonPatchOp::SafeReplace {
            path: "/a".into(),
            old_value: json!(1),
            value: json!(2),
        }];
        let out = apply_patch(&doc, &ops).unwrap();
        assert_eq!(out, json!({"a": 2}));

        let ops = vec![JsonPatchOp::SafeReplace {
            path: "/a".into(),
            old_value: json!(999),
            value: json!(2),
        }];
        assert!(apply_patch(&doc, &ops).is_err());
    }

    #[test]
    fn diff_roundtrips() {
        let from = json!({"a": 1, "b": {"c": 2}});
        let to = json!({"a": 1, "b": {"c": 3}, "d": 4});
        let ops = diff(&from, &to);
        let applied = apply_patch(&from, &ops).unwrap();
        assert_eq!(applied, to);
    }
}
