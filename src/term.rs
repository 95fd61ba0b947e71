//! Native values: what encode consumes and decode produces.
//!
//! `Struct` is a named record instance; `Map` is a plain, untagged mapping.
//! The distinction matters on encode, where a record type expects the former.

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Term {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Atom(String),
    List(Vec<Term>),
    Map(IndexMap<String, Term>),
    Struct { name: String, fields: IndexMap<String, Term> },
}

impl Term {
    pub fn atom(value: impl Into<String>) -> Self {
        Term::Atom(value.into())
    }

    pub fn structure<I, K>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Term)>,
        K: Into<String>,
    {
        Term::Struct {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Term)>,
        K: Into<String>,
    {
        Term::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::Nil)
    }

    /// Field lookup on a struct or map; anything else has no fields.
    pub fn get(&self, key: &str) -> Option<&Term> {
        match self {
            Term::Struct { fields, .. } | Term::Map(fields) => fields.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self { Term::Bool(b) }
}

impl From<i64> for Term {
    fn from(i: i64) -> Self { Term::Integer(i) }
}

impl From<f64> for Term {
    fn from(f: f64) -> Self { Term::Float(f) }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self { Term::String(s.to_string()) }
}

impl From<String> for Term {
    fn from(s: String) -> Self { Term::String(s) }
}

impl<T: Into<Term>> From<Option<T>> for Term {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Term::Nil)
    }
}

impl<T: Into<Term>> From<Vec<T>> for Term {
    fn from(xs: Vec<T>) -> Self {
        Term::List(xs.into_iter().map(Into::into).collect())
    }
}
