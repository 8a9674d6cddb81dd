//! Step input references.
//!
//! String inputs may refer to the workflow target or to data produced by
//! earlier steps:
//!
//! - `${target}`: the workflow target
//! - `${results.<step>}`: the full `data` payload of a step
//! - `${results.<step>.<field>}`: a field of that payload, with dot
//!   navigation and array indices (`${results.scan.hosts[0].ip}`)
//!
//! A string that is exactly one reference keeps the referenced JSON type.
//! References embedded in longer text are stringified in place.

use std::collections::{BTreeMap, HashMap};

use secv_types::ModuleResult;
use serde_json::Value;

use crate::error::{Result, WorkflowError};

/// Resolves `${...}` references against a target and prior step results.
pub struct InputResolver<'a> {
    target: &'a str,
    results: &'a HashMap<String, ModuleResult>,
}

impl<'a> InputResolver<'a> {
    pub fn new(target: &'a str, results: &'a HashMap<String, ModuleResult>) -> Self {
        Self { target, results }
    }

    /// Resolve every input of a step.
    pub fn resolve_inputs(
        &self,
        inputs: &BTreeMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        inputs
            .iter()
            .map(|(key, value)| self.resolve_value(value).map(|v| (key.clone(), v)))
            .collect()
    }

    /// Resolve references anywhere in a JSON value tree.
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => self.resolve_string(s),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::new();
                for (k, v) in map {
                    resolved.insert(k.clone(), self.resolve_value(v)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(arr) => arr
                .iter()
                .map(|v| self.resolve_value(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, s: &str) -> Result<Value> {
        let pieces = split_template(s);

        match pieces.as_slice() {
            [Piece::Reference(path)] => self.resolve_path(path),
            _ if pieces.iter().all(|p| matches!(p, Piece::Text(_))) => {
                Ok(Value::String(s.to_string()))
            }
            _ => {
                let mut out = String::with_capacity(s.len());
                for piece in &pieces {
                    match piece {
                        Piece::Text(text) => out.push_str(text),
                        Piece::Reference(path) => match self.resolve_path(path)? {
                            Value::String(text) => out.push_str(&text),
                            other => out.push_str(&other.to_string()),
                        },
                    }
                }
                Ok(Value::String(out))
            }
        }
    }

    fn resolve_path(&self, path: &str) -> Result<Value> {
        let tokens = tokenize(path)
            .ok_or_else(|| unresolved(path, "malformed reference".to_string()))?;

        match tokens.as_slice() {
            [Token::Key("target")] => Ok(Value::String(self.target.to_string())),
            [Token::Key("results"), Token::Key(step), rest @ ..] => {
                let result = self.results.get(*step).ok_or_else(|| {
                    unresolved(path, format!("no result recorded for step '{step}'"))
                })?;
                rest.iter()
                    .try_fold(&result.data, |value, token| {
                        token
                            .select(value)
                            .ok_or_else(|| unresolved(path, format!("cannot resolve {token}")))
                    })
                    .cloned()
            }
            _ => Err(unresolved(
                path,
                "expected 'target' or 'results.<step>.<field>'".to_string(),
            )),
        }
    }
}

fn unresolved(path: &str, reason: String) -> WorkflowError {
    WorkflowError::InputResolution(format!("input resolution failed: '${{{path}}}': {reason}"))
}

/// Literal text or the trimmed body of a `${...}`.
#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Reference(&'a str),
}

/// Split a string into literal text and references. An unclosed `${` and
/// an empty `${}` stay literal.
fn split_template(s: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = s;

    while let Some(open) = rest.find("${") {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let close = open + len;
        let body = rest[open + 2..close].trim();
        if body.is_empty() {
            pieces.push(Piece::Text(&rest[..=close]));
        } else {
            if open > 0 {
                pieces.push(Piece::Text(&rest[..open]));
            }
            pieces.push(Piece::Reference(body));
        }
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    pieces
}

/// One step of a reference path.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Key(&'a str),
    Index(usize),
}

impl Token<'_> {
    fn select<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        match *self {
            Token::Key(key) => value.get(key),
            Token::Index(i) => value.get(i),
        }
    }
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Key(key) => write!(f, "'{key}'"),
            Token::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// `"scan.hosts[0].ip"` → `Key(scan) Key(hosts) Index(0) Key(ip)`.
///
/// `None` for empty segments, unterminated brackets or non-numeric indices.
fn tokenize(path: &str) -> Option<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    for segment in path.split('.') {
        let (key, mut brackets) = segment.split_at(segment.find('[').unwrap_or(segment.len()));
        if !key.is_empty() {
            tokens.push(Token::Key(key));
        } else if brackets.is_empty() {
            return None;
        }
        while let Some(inner) = brackets.strip_prefix('[') {
            let (index, after) = inner.split_once(']')?;
            tokens.push(Token::Index(index.trim().parse().ok()?));
            brackets = after;
        }
        if !brackets.is_empty() {
            return None;
        }
    }
    Some(tokens)
}
