//! Decode direction: Dynamic Value → Term.

use indexmap::IndexMap;

use crate::descriptor::{PrimitiveKind, RecordDescriptor, TypeDescriptor};
use crate::error::{ErrorContext, ErrorKind, Offending, Segment};
use crate::registry::Resolve;
use crate::term::Term;
use crate::value::{Number, Value};

use super::accumulator::{Accumulator, Halt, Step};
use super::{UnknownKeys, Walk};

impl<R: Resolve + ?Sized> Walk<'_, R> {
    pub(super) fn decode(&self, acc: &mut Accumulator, d: &TypeDescriptor, v: &Value) -> Step<Term> {
        acc.nested(|acc| match d {
            TypeDescriptor::Primitive(kind) => decode_primitive(acc, kind, v),
            TypeDescriptor::Optional(inner) => match v {
                Value::Null => Ok(Term::Nil),
                _ => self.decode(acc, inner, v),
            },
            TypeDescriptor::Union(variants) => self.decode_union(acc, variants, v),
            TypeDescriptor::Record(record) => self.decode_record(acc, record, v),
            TypeDescriptor::Collection(element) => self.decode_collection(acc, element, v),
            TypeDescriptor::Ref(r) => {
                let target = self.resolve(r)?;
                self.decode(acc, &target, v)
            }
            TypeDescriptor::Unsupported(reason) => self.unsupported(reason),
        })
    }

    fn decode_union(&self, acc: &mut Accumulator, variants: &[TypeDescriptor], v: &Value) -> Step<Term> {
        match acc.most_specific(variants, |acc, variant| self.decode(acc, variant, v))? {
            Some(term) => Ok(term),
            None => acc.fail_value(ErrorKind::NoMatch, Offending::Data(v.clone())),
        }
    }

    fn decode_record(&self, acc: &mut Accumulator, record: &RecordDescriptor, v: &Value) -> Step<Term> {
        // Wrong container shape is `no_match`, unlike a mistyped field.
        let Some(map) = v.as_map() else {
            return acc.fail_value(ErrorKind::NoMatch, Offending::Data(v.clone()));
        };

        let mut fields = IndexMap::with_capacity(record.fields.len());
        let mut failed = false;
        for (name, fd) in &record.fields {
            let segment = Segment::Field(name.clone());
            let step = match map.get(name) {
                Some(x) => acc.with_segment(segment, |acc| self.decode(acc, fd, x)),
                None => {
                    if self.is_optional(fd)? {
                        Ok(Term::Nil)
                    } else {
                        acc.with_segment(segment, |acc| {
                            acc.fail(ErrorKind::MissingData, ErrorContext::Undefined)
                        })
                    }
                }
            };
            match step {
                Ok(term) => {
                    fields.insert(name.clone(), term);
                }
                Err(Halt::Invalid) if acc.collect_all() => failed = true,
                Err(halt) => return Err(halt),
            }
        }

        if acc.options().unknown_keys == UnknownKeys::Reject {
            let mut extra: Vec<String> = map
                .keys()
                .filter(|k| !record.fields.contains_key(*k))
                .cloned()
                .collect();
            if !extra.is_empty() {
                extra.sort();
                let _ = acc.fail::<()>(ErrorKind::NotMatchedFields, ErrorContext::Fields { fields: extra });
                failed = true;
            }
        }

        if failed {
            return Err(Halt::Invalid);
        }
        Ok(Term::Struct { name: record.name.clone(), fields })
    }

    fn decode_collection(&self, acc: &mut Accumulator, element: &TypeDescriptor, v: &Value) -> Step<Term> {
        let Value::List(xs) = v else {
            return acc.fail_value(ErrorKind::TypeMismatch, Offending::Data(v.clone()));
        };
        let mut out = Vec::with_capacity(xs.len());
        let mut failed = false;
        for (i, x) in xs.iter().enumerate() {
            match acc.with_segment(Segment::Index(i), |acc| self.decode(acc, element, x)) {
                Ok(term) => out.push(term),
                Err(Halt::Invalid) if acc.collect_all() => failed = true,
                Err(halt) => return Err(halt),
            }
        }
        if failed {
            return Err(Halt::Invalid);
        }
        Ok(Term::List(out))
    }
}

fn decode_primitive(acc: &mut Accumulator, kind: &PrimitiveKind, v: &Value) -> Step<Term> {
    let failure = match (kind, v) {
        (PrimitiveKind::String, Value::String(s)) => {
            acc.note_general();
            return Ok(Term::String(s.clone()));
        }
        (PrimitiveKind::Boolean, Value::Bool(b)) => return Ok(Term::Bool(*b)),
        (PrimitiveKind::Float, Value::Number(n)) => {
            if !matches!(n, Number::Float(_)) {
                acc.note_general();
            }
            return Ok(Term::Float(n.as_f64()));
        }

        (PrimitiveKind::Integer, Value::Number(Number::Float(_))) => ErrorKind::TypeMismatch,
        (PrimitiveKind::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => return Ok(Term::Integer(i)),
            None => ErrorKind::NoMatch,
        },

        (PrimitiveKind::NonNegativeInteger, Value::Number(n)) => match n.as_i64() {
            Some(i) if i >= 0 => return Ok(Term::Integer(i)),
            _ => ErrorKind::NoMatch,
        },

        (PrimitiveKind::Atom(expected), Value::String(s)) if s == expected => {
            return Ok(Term::Atom(s.clone()));
        }
        (PrimitiveKind::Atom(_), Value::String(_)) => ErrorKind::NoMatch,

        _ => ErrorKind::TypeMismatch,
    };
    acc.fail_value(failure, Offending::Data(v.clone()))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
