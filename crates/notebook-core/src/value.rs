//! The shared namespace's value representation.
//!
//! `Value` is a tagged union over the primitive shapes the query interpolator
//! needs, plus an opaque `Other` carrier for imperative values that never
//! cross into a query placeholder (functions, classes, and anything else
//! without a direct SQL literal form).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value bound in the shared namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// A value with no SQL literal form: its `repr()`-like textual rendering.
    Other(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Other(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Other(_) => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Other(repr) => write!(f, "{repr}"),
        }
    }
}

/// The process-wide mutable mapping `name -> value` representing the
/// imperative globals. Owned by the scheduler; mutated only on the
/// scheduler's run while it holds the run lock.
#[derive(Debug, Default)]
pub struct SharedNamespace {
    bindings: HashMap<String, Value>,
}

impl SharedNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) {
        self.bindings.remove(name);
    }

    /// Remove a set of names, e.g. the stale defs of a cell about to re-run.
    pub fn remove_all<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.bindings.remove(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.bindings.clone()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_set_get_remove() {
        let mut ns = SharedNamespace::new();
        ns.set("x", Value::Int(10));
        assert_eq!(ns.get("x"), Some(&Value::Int(10)));
        ns.remove("x");
        assert_eq!(ns.get("x"), None);
    }

    #[test]
    fn remove_all_clears_stale_defs() {
        let mut ns = SharedNamespace::new();
        ns.set("x", Value::Int(1));
        ns.set("y", Value::Int(2));
        ns.set("z", Value::Int(3));
        let stale = vec!["x".to_string(), "y".to_string()];
        ns.remove_all(&stale);
        assert!(!ns.contains("x"));
        assert!(!ns.contains("y"));
        assert!(ns.contains("z"));
    }

    #[test]
    fn truthiness_matches_python_semantics() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }
}
