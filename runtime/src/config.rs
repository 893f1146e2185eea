//! The configuration view (C3): a read-only lookup by section-and-key over
//! scalar values, plus the narrow reader that produces it.
//!
//! The original's configuration format is parsed by a hand-written
//! tree-walking namelist AST (`parser.cpp`/`ast.hpp`) — deliberately out of
//! scope per §1, treated as an external collaborator. This module is not a
//! port of that parser: it is a small, purpose-built reader for exactly the
//! grammar §6 documents (ampersand-introduced sections, `key = value`
//! assignments, a terminating slash), built the way the rest of this crate
//! is built rather than translated line-for-line from the AST-walking
//! original.

use std::collections::HashMap;
use std::fmt;

use crate::error::RuntimeError;

/// A scalar value as read from a configuration stream.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "'{v}'"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Read-only lookup of configuration scalars by `(section, key)`.
#[derive(Clone, Debug, Default)]
pub struct ConfigView {
    values: HashMap<(String, String), Value>,
}

impl ConfigView {
    /// Parses a configuration stream of the form:
    ///
    /// ```text
    /// &runtime
    ///   implementation = 'MPI Alltoall'
    ///   hints = 'pack coalesce'
    /// /
    /// &log
    ///   debug = 1
    /// /
    /// ```
    ///
    /// Blank lines and lines starting with `#` are ignored. This reader
    /// accepts exactly the shape the core consumes (§6); it is not a
    /// general namelist parser.
    pub fn parse(text: &str) -> Result<Self, RuntimeError> {
        let mut values = HashMap::new();
        let mut section: Option<String> = None;

        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('&') {
                section = Some(name.trim().to_string());
                continue;
            }
            if line == "/" {
                section = None;
                continue;
            }

            let Some(current) = section.clone() else {
                return Err(RuntimeError::Config(format!(
                    "line {}: assignment outside of any &section: {raw_line:?}",
                    lineno + 1
                )));
            };

            let (key, value) = line.split_once('=').ok_or_else(|| {
                RuntimeError::Config(format!("line {}: expected `key = value`, got {raw_line:?}", lineno + 1))
            })?;
            let key = key.trim().to_string();
            let value = parse_value(value.trim()).map_err(|e| {
                RuntimeError::Config(format!("line {}: {e}", lineno + 1))
            })?;

            values.insert((current, key), value);
        }

        Ok(ConfigView { values })
    }

    fn get(&self, section: &str, key: &str) -> Result<&Value, RuntimeError> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .ok_or_else(|| RuntimeError::Config(format!("missing key `{key}` in section `&{section}`")))
    }

    pub fn find_int(&self, section: &str, key: &str) -> Result<i64, RuntimeError> {
        match self.get(section, key)? {
            Value::Int(v) => Ok(*v),
            other => Err(RuntimeError::Config(format!(
                "`{section}.{key}` = {other}, expected an int"
            ))),
        }
    }

    pub fn find_float(&self, section: &str, key: &str) -> Result<f64, RuntimeError> {
        match self.get(section, key)? {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(RuntimeError::Config(format!(
                "`{section}.{key}` = {other}, expected a float"
            ))),
        }
    }

    pub fn find_str(&self, section: &str, key: &str) -> Result<&str, RuntimeError> {
        match self.get(section, key)? {
            Value::Str(v) => Ok(v.as_str()),
            other => Err(RuntimeError::Config(format!(
                "`{section}.{key}` = {other}, expected a string"
            ))),
        }
    }

    pub fn find_bool(&self, section: &str, key: &str) -> Result<bool, RuntimeError> {
        match self.get(section, key)? {
            Value::Bool(v) => Ok(*v),
            other => Err(RuntimeError::Config(format!(
                "`{section}.{key}` = {other}, expected a bool"
            ))),
        }
    }

    /// `find_int` with a default when the key is absent, used for `log.debug`
    /// (the original defaults silently to whatever garbage was on the stack;
    /// this reimplementation defaults to 0, the quietest level).
    pub fn find_int_or(&self, section: &str, key: &str, default: i64) -> i64 {
        self.find_int(section, key).unwrap_or(default)
    }
}

fn parse_value(text: &str) -> Result<Value, String> {
    if let Some(inner) = text.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Ok(Value::Str(inner.to_string()));
    }
    match text {
        "true" | "TRUE" | ".true." => return Ok(Value::Bool(true)),
        "false" | "FALSE" | ".false." => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Ok(Value::Float(f));
    }
    Err(format!("cannot parse value: {text:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_documented_grammar() {
        let text = "\
&log
debug = 1
/
&runtime
implementation = 'MPI Alltoall'
hints = 'pack exch_with_pt2pt'
/
";
        let cfg = ConfigView::parse(text).unwrap();
        assert_eq!(cfg.find_int("log", "debug").unwrap(), 1);
        assert_eq!(cfg.find_str("runtime", "implementation").unwrap(), "MPI Alltoall");
        assert_eq!(cfg.find_str("runtime", "hints").unwrap(), "pack exch_with_pt2pt");
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let cfg = ConfigView::parse("&log\n/\n").unwrap();
        assert!(matches!(cfg.find_int("log", "debug"), Err(RuntimeError::Config(_))));
    }

    #[test]
    fn wrong_kind_is_a_config_error() {
        let cfg = ConfigView::parse("&log\ndebug = 'one'\n/\n").unwrap();
        assert!(matches!(cfg.find_int("log", "debug"), Err(RuntimeError::Config(_))));
    }
}
