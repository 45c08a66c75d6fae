//! Update operators and projections applied to in-memory documents.

use bson::{Bson, Document};

use doclink_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::evaluator::lookup;

/// Rejects update documents that are not made of update operators, as the
/// driver does for find-and-modify.
pub(crate) fn validate_update(update: &Document) -> DocumentStoreResult<()> {
    match update.keys().next() {
        Some(key) if key.starts_with('$') => Ok(()),
        _ => Err(DocumentStoreError::Driver(
            "update document must have first key starting with '$'".to_string(),
        )),
    }
}

/// Applies `$set`, `$unset`, `$inc` and, when `inserting`, `$setOnInsert`.
pub(crate) fn apply_update(
    document: &mut Document,
    update: &Document,
    inserting: bool,
) -> DocumentStoreResult<()> {
    for (operator, fields) in update {
        let fields = match fields {
            Bson::Document(fields) => fields,
            _ => {
                return Err(DocumentStoreError::Driver(format!(
                    "Modifiers operate on fields but we found another type instead: {operator}"
                )));
            }
        };

        for (path, value) in fields {
            if path == "_id" && operator != "$setOnInsert" {
                return Err(DocumentStoreError::Driver(
                    "Performing an update on the path '_id' would modify the immutable field '_id'"
                        .to_string(),
                ));
            }

            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$setOnInsert" if inserting => set_path(document, path, value.clone())?,
                "$setOnInsert" => {}
                "$unset" => remove_path(document, path),
                "$inc" => {
                    let current = lookup(document, path).cloned();
                    set_path(document, path, increment(current, value, path)?)?
                }
                other => {
                    return Err(DocumentStoreError::Driver(format!("Unknown modifier: {other}")));
                }
            }
        }
    }

    Ok(())
}

fn increment(current: Option<Bson>, by: &Bson, path: &str) -> DocumentStoreResult<Bson> {
    let non_numeric = || {
        DocumentStoreError::Driver(format!(
            "Cannot apply $inc to a value of non-numeric type at '{path}'"
        ))
    };

    let overflow = || {
        DocumentStoreError::Driver(format!(
            "Failed to apply $inc operations: overflow at '{path}'"
        ))
    };
    let wide = |a: i64, b: i64| a.checked_add(b).map(Bson::Int64).ok_or_else(overflow);

    Ok(match (current.unwrap_or(Bson::Int32(0)), by) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(a as i64 + *b as i64),
        },
        (Bson::Int32(a), Bson::Int64(b)) => wide(a as i64, *b)?,
        (Bson::Int64(a), Bson::Int32(b)) => wide(a, *b as i64)?,
        (Bson::Int64(a), Bson::Int64(b)) => wide(a, *b)?,
        (Bson::Double(a), b) => Bson::Double(a + as_f64(b).ok_or_else(non_numeric)?),
        (a, Bson::Double(b)) => Bson::Double(as_f64(&a).ok_or_else(non_numeric)? + b),
        _ => return Err(non_numeric()),
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Sets a dotted path, creating intermediate subdocuments.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::Driver(format!(
                    "Cannot create field '{rest}' in element {{{head}: ...}}"
                ))),
            }
        }
    }
}

pub(crate) fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn is_included(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(v) => *v != 0,
        Bson::Int64(v) => *v != 0,
        Bson::Double(v) => *v != 0.0,
        _ => true,
    }
}

/// Applies an inclusion or exclusion projection. `_id` is kept unless excluded.
pub(crate) fn project(document: Document, projection: Option<&Document>) -> DocumentStoreResult<Document> {
    let projection = match projection {
        Some(projection) if !projection.is_empty() => projection,
        _ => return Ok(document),
    };

    let keep_id = projection.get("_id").is_none_or(is_included);
    let fields = projection
        .iter()
        .filter(|(field, _)| field.as_str() != "_id")
        .map(|(field, value)| (field.as_str(), is_included(value)))
        .collect::<Vec<_>>();

    let inclusion = fields.iter().any(|(_, included)| *included);
    if let Some((field, _)) = fields.iter().find(|(_, included)| *included != inclusion) {
        return Err(DocumentStoreError::Driver(format!(
            "Cannot do {} on field {field} in {} projection",
            if inclusion { "exclusion" } else { "inclusion" },
            if inclusion { "inclusion" } else { "exclusion" },
        )));
    }

    if !inclusion {
        let mut projected = document;
        for (field, _) in fields {
            remove_path(&mut projected, field);
        }
        if !keep_id {
            projected.remove("_id");
        }

        return Ok(projected);
    }

    let mut projected = Document::new();
    if keep_id {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }
    for (field, _) in fields {
        if let Some(value) = lookup(&document, field) {
            set_path(&mut projected, field, value.clone())?;
        }
    }

    Ok(projected)
}
