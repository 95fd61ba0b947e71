//! Encode direction: Term → wire-ready Dynamic Value.
//!
//! Records come out with keys in lexicographic order and without their nil
//! optional fields; the schema generator sorts properties the same way.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::descriptor::{PrimitiveKind, RecordDescriptor, TypeDescriptor};
use crate::error::{ErrorContext, ErrorKind, Offending, Segment};
use crate::registry::Resolve;
use crate::term::Term;
use crate::value::{Number, Value};

use super::accumulator::{Accumulator, Halt, Step};
use super::Walk;

impl<R: Resolve + ?Sized> Walk<'_, R> {
    pub(super) fn encode(&self, acc: &mut Accumulator, d: &TypeDescriptor, t: &Term) -> Step<Value> {
        acc.nested(|acc| match d {
            TypeDescriptor::Primitive(kind) => encode_primitive(acc, kind, t),
            TypeDescriptor::Optional(inner) => match t {
                Term::Nil => Ok(Value::Null),
                _ => self.encode(acc, inner, t),
            },
            TypeDescriptor::Union(variants) => self.encode_union(acc, variants, t),
            TypeDescriptor::Record(record) => self.encode_record(acc, record, t),
            TypeDescriptor::Collection(element) => self.encode_collection(acc, element, t),
            TypeDescriptor::Ref(r) => {
                let target = self.resolve(r)?;
                self.encode(acc, &target, t)
            }
            TypeDescriptor::Unsupported(reason) => self.unsupported(reason),
        })
    }

    /// Same variant choice as decode, so a value comes back as itself.
    fn encode_union(&self, acc: &mut Accumulator, variants: &[TypeDescriptor], t: &Term) -> Step<Value> {
        match acc.most_specific(variants, |acc, variant| self.encode(acc, variant, t))? {
            Some(value) => Ok(value),
            None => acc.fail_value(ErrorKind::NoMatch, Offending::Native(t.clone())),
        }
    }

    fn encode_record(&self, acc: &mut Accumulator, record: &RecordDescriptor, t: &Term) -> Step<Value> {
        let candidate = match t {
            Term::Struct { name, fields } if *name == record.name => Some(fields),
            Term::Map(fields) => Some(fields),
            _ => None,
        };
        // Structs and maps alike must carry every required key.
        let fields = match candidate {
            Some(fields) => self.has_required_keys(record, fields)?.then_some(fields),
            None => None,
        };
        let Some(fields) = fields else {
            return acc.fail(ErrorKind::TypeMismatch, ErrorContext::Struct {
                value: Offending::Native(t.clone()),
                expected_struct: record.name.clone(),
            });
        };

        let mut declared: Vec<(&String, &TypeDescriptor)> = record.fields.iter().collect();
        declared.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = IndexMap::with_capacity(declared.len());
        let mut failed = false;
        static NIL: Term = Term::Nil;
        for (name, fd) in declared {
            let field = fields.get(name).unwrap_or(&NIL);
            if field.is_nil() && self.is_optional(fd)? {
                continue;
            }
            match acc.with_segment(Segment::Field(name.clone()), |acc| self.encode(acc, fd, field)) {
                Ok(value) => {
                    out.insert(name.clone(), value);
                }
                Err(Halt::Invalid) if acc.collect_all() => failed = true,
                Err(halt) => return Err(halt),
            }
        }
        if failed {
            return Err(Halt::Invalid);
        }
        Ok(Value::Map(out))
    }

    fn has_required_keys(&self, record: &RecordDescriptor, fields: &IndexMap<String, Term>) -> Step<bool> {
        for (name, fd) in &record.fields {
            if !fields.contains_key(name) && !self.is_optional(fd)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn encode_collection(&self, acc: &mut Accumulator, element: &TypeDescriptor, t: &Term) -> Step<Value> {
        let Term::List(xs) = t else {
            return acc.fail_value(ErrorKind::TypeMismatch, Offending::Native(t.clone()));
        };
        let mut out = Vec::with_capacity(xs.len());
        let mut failed = false;
        for (i, x) in xs.iter().enumerate() {
            match acc.with_segment(Segment::Index(i), |acc| self.encode(acc, element, x)) {
                Ok(value) => out.push(value),
                Err(Halt::Invalid) if acc.collect_all() => failed = true,
                Err(halt) => return Err(halt),
            }
        }
        if failed {
            return Err(Halt::Invalid);
        }
        Ok(Value::List(out))
    }
}

fn encode_primitive(acc: &mut Accumulator, kind: &PrimitiveKind, t: &Term) -> Step<Value> {
    let failure = match (kind, t) {
        (PrimitiveKind::String, Term::String(s)) => return Ok(Value::String(s.clone())),
        (PrimitiveKind::Boolean, Term::Bool(b)) => return Ok(Value::Bool(*b)),
        (PrimitiveKind::Integer, Term::Integer(i)) => return Ok(Value::Number(Number::Int(*i))),

        (PrimitiveKind::NonNegativeInteger, Term::Integer(i)) if *i >= 0 => {
            return Ok(Value::Number(Number::Int(*i)));
        }
        (PrimitiveKind::NonNegativeInteger, Term::Integer(_) | Term::Float(_)) => ErrorKind::NoMatch,

        // JSON has no spelling for NaN or infinities.
        (PrimitiveKind::Float, Term::Float(f)) if f.is_finite() => {
            return Ok(Value::Number(Number::Float(OrderedFloat(*f))));
        }
        (PrimitiveKind::Float, Term::Float(_)) => ErrorKind::NoMatch,
        (PrimitiveKind::Float, Term::Integer(i)) => {
            acc.note_general();
            return Ok(Value::Number(Number::Float(OrderedFloat(*i as f64))));
        }

        (PrimitiveKind::Atom(expected), Term::Atom(s)) if s == expected => {
            return Ok(Value::String(s.clone()));
        }
        (PrimitiveKind::Atom(expected), Term::String(s)) if s == expected => {
            acc.note_general();
            return Ok(Value::String(s.clone()));
        }
        (PrimitiveKind::Atom(_), Term::Atom(_) | Term::String(_)) => ErrorKind::NoMatch,

        _ => ErrorKind::TypeMismatch,
    };
    acc.fail_value(failure, Offending::Native(t.clone()))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
