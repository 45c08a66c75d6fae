//! Filter evaluation for in-memory documents.
//!
//! This module provides the evaluation engine for filter expressions,
//! enabling matching, comparison and sorting of BSON documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use doclink_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 for easy comparison. Values of other
/// types only compare equal to identical values.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position in the server's cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Total order used for sorting; values of different types order by type.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        match self.type_rank().cmp(&other.type_rank()) {
            Ordering::Equal => self.partial_cmp(other).unwrap_or(Ordering::Equal),
            unequal => unequal,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path such as `address.street` inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Equality as the server applies it: a missing field equals `null`, and an
/// array field matches when any element equals the value.
pub(crate) fn matches_value(found: Option<&Bson>, value: &Bson) -> bool {
    let expected = Comparable::from(value);

    match found {
        None => expected == Comparable::Null,
        Some(field_value) => {
            Comparable::from(field_value) == expected
                || match field_value {
                    Bson::Array(items) => items.iter().any(|item| Comparable::from(item) == expected),
                    _ => false,
                }
        }
    }
}

fn compare_value(found: &Bson, value: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let expected = Comparable::from(value);
    let check = |candidate: &Bson| {
        Comparable::from(candidate)
            .partial_cmp(&expected)
            .is_some_and(accept)
    };

    match found {
        Bson::Array(items) => items.iter().any(check),
        other => check(other),
    }
}

/// Parsed sort document: each field with `true` when descending.
pub(crate) type SortKeys<'a> = Vec<(&'a str, bool)>;

/// Reads a sort document such as `{ "age": -1, "name": 1 }`.
pub(crate) fn sort_keys(sort: &Document) -> DocumentStoreResult<SortKeys<'_>> {
    sort.iter()
        .map(|(field, direction)| match direction {
            Bson::Int32(1) | Bson::Int64(1) => Ok((field.as_str(), false)),
            Bson::Int32(-1) | Bson::Int64(-1) => Ok((field.as_str(), true)),
            Bson::Double(d) if *d == 1.0 => Ok((field.as_str(), false)),
            Bson::Double(d) if *d == -1.0 => Ok((field.as_str(), true)),
            _ => Err(DocumentStoreError::Driver(
                "$sort key ordering must be 1 (for ascending) or -1 (for descending)".to_string(),
            )),
        })
        .collect()
}

/// Orders two documents by `keys`. Missing fields sort as `null`.
pub(crate) fn compare_documents(a: &Document, b: &Document, keys: &SortKeys<'_>) -> Ordering {
    for (field, descending) in keys {
        let left = lookup(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = lookup(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match descending {
            true => right.sort_cmp(&left),
            false => left.sort_cmp(&right),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Sorts documents by a sort document such as `{ "age": -1, "name": 1 }`.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> DocumentStoreResult<()> {
    let keys = sort_keys(sort)?;
    documents.sort_by(|a, b| compare_documents(a, b, &keys));

    Ok(())
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn matches(document: &'a Document, expr: &Expr) -> DocumentStoreResult<bool> {
        DocumentEvaluator::new(document).evaluate(expr)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let found = lookup(self.document, field);

        Ok(match op {
            FieldOp::Eq => matches_value(found, value),
            FieldOp::Ne => !matches_value(found, value),
            FieldOp::Gt => found.is_some_and(|v| compare_value(v, value, |o| o == Ordering::Greater)),
            FieldOp::Gte => found.is_some_and(|v| compare_value(v, value, |o| o != Ordering::Less)),
            FieldOp::Lt => found.is_some_and(|v| compare_value(v, value, |o| o == Ordering::Less)),
            FieldOp::Lte => found.is_some_and(|v| compare_value(v, value, |o| o != Ordering::Greater)),
            FieldOp::AnyOf | FieldOp::NoneOf => {
                let any = match value {
                    Bson::Array(candidates) => candidates
                        .iter()
                        .any(|candidate| matches_value(found, candidate)),
                    _ => {
                        return Err(DocumentStoreError::Driver(
                            "$in/$nin needs an array".to_string(),
                        ));
                    }
                };

                match op {
                    FieldOp::AnyOf => any,
                    _ => !any,
                }
            }
        })
    }
}
