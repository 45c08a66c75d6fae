//! Typed filter construction.
//!
//! Every façade operation takes its filter as a plain [`bson::Document`] in the
//! database's own query syntax. This module offers an optional typed way of
//! building one, plus the reverse direction (parsing a filter document into an
//! [`Expr`]) for backends that evaluate filters themselves.
//!
//! ```ignore
//! use doclink::query::Filter;
//!
//! let filter = Filter::eq("familyName", "Barrios")
//!     .and(Filter::gte("age", 18))
//!     .to_document()?;
//! let people = store.find("people", filter, None).await?;
//! ```
//!
//! The [`Filter`] struct provides static constructors:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Existence: `exists`, `not_exists`
//! - Membership: `any_of`, `none_of`
//! - Logical: `and`, `or`

use bson::{Bson, Document, doc};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to, or for array fields, containing the value.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field equals any of the listed values.
    AnyOf,
    /// Field equals none of the listed values.
    NoneOf,
}

impl FieldOp {
    fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match). Empty matches everything.
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare; dotted paths reach into subdocuments.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Renders this expression as a filter document.
    pub fn to_document(&self) -> DocumentStoreResult<Document> {
        FilterTranslator.visit_expr(self)
    }

    /// Parses a filter document written in the database's query syntax.
    ///
    /// Unknown operators are reported as [`DocumentStoreError::Driver`], the
    /// same way the server rejects them.
    pub fn from_document(filter: &Document) -> DocumentStoreResult<Self> {
        let mut exprs = Vec::with_capacity(filter.len());

        for (key, value) in filter {
            exprs.push(match key.as_str() {
                "$and" => Expr::And(parse_clauses(key, value)?),
                "$or" => Expr::Or(parse_clauses(key, value)?),
                "$nor" => Expr::Or(parse_clauses(key, value)?).not(),
                operator if operator.starts_with('$') => {
                    return Err(DocumentStoreError::Driver(format!(
                        "unknown top level operator: {operator}"
                    )));
                }
                field => parse_field(field, value)?,
            });
        }

        Ok(match exprs.len() {
            1 => exprs.remove(0),
            _ => Expr::And(exprs),
        })
    }
}

fn parse_clauses(operator: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    match value {
        Bson::Array(clauses) if !clauses.is_empty() => clauses
            .iter()
            .map(|clause| match clause {
                Bson::Document(doc) => Expr::from_document(doc),
                _ => Err(DocumentStoreError::Driver(format!(
                    "{operator} argument's entries must be objects"
                ))),
            })
            .collect(),
        _ => Err(DocumentStoreError::Driver(format!(
            "{operator} argument must be a non-empty array"
        ))),
    }
}

fn parse_field(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let operators = match value {
        Bson::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => doc,
        other => return Ok(Expr::field(field.to_string(), FieldOp::Eq, other.clone())),
    };

    let mut exprs = Vec::with_capacity(operators.len());

    for (operator, operand) in operators {
        exprs.push(match operator.as_str() {
            "$exists" => Expr::Exists(field.to_string(), is_truthy(operand)),
            "$not" => match operand {
                Bson::Document(_) => parse_field(field, operand)?.not(),
                _ => {
                    return Err(DocumentStoreError::Driver(
                        "$not needs a document argument".to_string(),
                    ));
                }
            },
            other => match FieldOp::from_operator(other) {
                Some(op @ (FieldOp::AnyOf | FieldOp::NoneOf)) if !matches!(operand, Bson::Array(_)) => {
                    return Err(DocumentStoreError::Driver(format!(
                        "{} needs an array",
                        op.operator()
                    )));
                }
                Some(op) => Expr::field(field.to_string(), op, operand.clone()),
                None => {
                    return Err(DocumentStoreError::Driver(format!("unknown operator: {other}")));
                }
            },
        });
    }

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(v) => *v != 0,
        Bson::Int64(v) => *v != 0,
        Bson::Double(v) => *v != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Helper struct for constructing filter expressions.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>` for ergonomics.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals any of the listed values.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches documents where the field equals none of the listed values.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Renders expressions into the database's filter syntax.
struct FilterTranslator;

impl QueryVisitor for FilterTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Err(DocumentStoreError::Driver("$or needs at least one clause".to_string()));
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // Top-level `$not` is not valid filter syntax, `$nor` with one clause is.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf) && !matches!(value, Bson::Array(_)) {
            return Err(DocumentStoreError::Driver(format!("{} needs an array", op.operator())));
        }

        let operator = op.operator();

        Ok(doc! {
            field: { operator: value.clone() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_combined_filters() {
        let filter = Filter::eq("familyName", "Barrios")
            .and(Filter::gte("age", 18))
            .to_document()
            .unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [
                { "familyName": { "$eq": "Barrios" } },
                { "age": { "$gte": 18 } },
            ] }
        );
    }

    #[test]
    fn negation_renders_as_nor() {
        let filter = Filter::exists("deletedAt").not().to_document().unwrap();

        assert_eq!(filter, doc! { "$nor": [{ "deletedAt": { "$exists": true } }] });
    }

    #[test]
    fn parses_implicit_equality_and_operator_documents() {
        let expr = Expr::from_document(&doc! {
            "email": "jose@x.io",
            "age": { "$gt": 1, "$lt": 99 },
        })
        .unwrap();

        assert_eq!(
            expr,
            Expr::And(vec![
                Filter::eq("email", "jose@x.io"),
                Expr::And(vec![Filter::gt("age", 1), Filter::lt("age", 99)]),
            ])
        );
    }

    #[test]
    fn parses_logical_operators() {
        let expr = Expr::from_document(&doc! {
            "$nor": [{ "a": 1 }],
            "b": { "$exists": 0 },
        })
        .unwrap();

        assert_eq!(
            expr,
            Expr::And(vec![
                Expr::Or(vec![Filter::eq("a", 1)]).not(),
                Filter::not_exists("b"),
            ])
        );
        assert_eq!(Expr::from_document(&doc! {}).unwrap(), Expr::And(vec![]));
    }

    #[test]
    fn rejects_unknown_operators() {
        assert!(matches!(
            Expr::from_document(&doc! { "$where": "true" }),
            Err(DocumentStoreError::Driver(_))
        ));
        assert!(matches!(
            Expr::from_document(&doc! { "a": { "$regex": "x" } }),
            Err(DocumentStoreError::Driver(_))
        ));
        assert!(matches!(
            Expr::from_document(&doc! { "a": { "$in": 1 } }),
            Err(DocumentStoreError::Driver(_))
        ));
    }

    #[test]
    fn membership_requires_arrays() {
        assert_eq!(
            Filter::any_of("tag", ["a", "b"]).to_document().unwrap(),
            doc! { "tag": { "$in": ["a", "b"] } }
        );
        assert!(Expr::field("tag".into(), FieldOp::NoneOf, Bson::Int32(1)).to_document().is_err());
    }
}
