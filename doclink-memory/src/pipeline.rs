//! Aggregation stages supported by the in-memory backend.

use bson::{Bson, Document, doc};

use doclink_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::Expr,
};

use crate::{
    evaluator::{DocumentEvaluator, lookup, matches_value, sort_documents},
    update::project,
};

/// Source of documents for `$lookup` stages.
pub(crate) trait LookupSource {
    fn documents(&self, collection: &str) -> Vec<Document>;
}

fn driver(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::Driver(message.into())
}

fn as_count(stage: &str, value: &Bson) -> DocumentStoreResult<usize> {
    let count = match value {
        Bson::Int32(v) => *v as i64,
        Bson::Int64(v) => *v,
        Bson::Double(v) if v.fract() == 0.0 => *v as i64,
        _ => return Err(driver(format!("invalid argument to {stage} stage: expected a number"))),
    };

    usize::try_from(count).map_err(|_| driver(format!("invalid argument to {stage} stage: must not be negative")))
}

fn stage_document<'a>(stage: &str, value: &'a Bson) -> DocumentStoreResult<&'a Document> {
    value
        .as_document()
        .ok_or_else(|| driver(format!("the {stage} stage argument must be an object")))
}

/// Runs `pipeline` over `input`, in order.
pub(crate) fn run(
    pipeline: &[Document],
    mut documents: Vec<Document>,
    source: &impl LookupSource,
) -> DocumentStoreResult<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = match (stage.len(), stage.iter().next()) {
            (1, Some(entry)) => entry,
            _ => {
                return Err(driver(
                    "A pipeline stage object must contain exactly one field.",
                ));
            }
        };

        documents = match name.as_str() {
            "$match" => {
                let filter = Expr::from_document(stage_document(name, spec)?)?;
                let mut matched = Vec::with_capacity(documents.len());
                for document in documents {
                    if DocumentEvaluator::matches(&document, &filter)? {
                        matched.push(document);
                    }
                }
                matched
            }
            "$project" => {
                let projection = stage_document(name, spec)?;
                documents
                    .into_iter()
                    .map(|document| project(document, Some(projection)))
                    .collect::<DocumentStoreResult<Vec<_>>>()?
            }
            "$sort" => {
                sort_documents(&mut documents, stage_document(name, spec)?)?;
                documents
            }
            "$skip" => documents.into_iter().skip(as_count(name, spec)?).collect(),
            "$limit" => match as_count(name, spec)? {
                0 => return Err(driver("the limit must be positive")),
                limit => documents.into_iter().take(limit).collect(),
            },
            "$count" => {
                let field = spec
                    .as_str()
                    .filter(|field| !field.is_empty() && !field.starts_with('$'))
                    .ok_or_else(|| driver("the count field must be a non-empty string"))?;

                match documents.len() {
                    0 => Vec::new(),
                    count => vec![doc! { field: i32::try_from(count).map(Bson::Int32).unwrap_or(Bson::Int64(count as i64)) }],
                }
            }
            "$lookup" => lookup_stage(stage_document(name, spec)?, documents, source)?,
            other => return Err(driver(format!("Unrecognized pipeline stage name: '{other}'"))),
        };
    }

    Ok(documents)
}

fn lookup_stage(
    spec: &Document,
    documents: Vec<Document>,
    source: &impl LookupSource,
) -> DocumentStoreResult<Vec<Document>> {
    let field = |key: &str| {
        spec.get_str(key)
            .map_err(|_| driver(format!("$lookup requires a string '{key}' field")))
    };

    let from = field("from")?;
    let local_field = field("localField")?;
    let foreign_field = field("foreignField")?;
    let output = field("as")?;

    let foreign = source.documents(from);

    Ok(documents
        .into_iter()
        .map(|mut document| {
            let local = lookup(&document, local_field).cloned().unwrap_or(Bson::Null);
            let candidates = match &local {
                Bson::Array(values) => values.clone(),
                value => vec![value.clone()],
            };

            let joined = foreign
                .iter()
                .filter(|other| {
                    candidates
                        .iter()
                        .any(|value| matches_value(lookup(other, foreign_field), value))
                })
                .cloned()
                .map(Bson::Document)
                .collect::<Vec<_>>();

            document.insert(output, Bson::Array(joined));
            document
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Collections(HashMap<&'static str, Vec<Document>>);

    impl LookupSource for Collections {
        fn documents(&self, collection: &str) -> Vec<Document> {
            self.0.get(collection).cloned().unwrap_or_default()
        }
    }

    fn no_source() -> Collections {
        Collections(HashMap::new())
    }

    #[test]
    fn match_sort_skip_limit() {
        let people = vec![
            doc! { "name": "a", "age": 30 },
            doc! { "name": "b", "age": 10 },
            doc! { "name": "c", "age": 20 },
            doc! { "name": "d", "age": 40 },
        ];

        let output = run(
            &[
                doc! { "$match": { "age": { "$gte": 20 } } },
                doc! { "$sort": { "age": 1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 1 },
                doc! { "$project": { "name": 1, "_id": 0 } },
            ],
            people,
            &no_source(),
        )
        .unwrap();

        assert_eq!(output, vec![doc! { "name": "a" }]);
    }

    #[test]
    fn count_emits_nothing_for_empty_input() {
        let stage = [doc! { "$count": "total" }];

        assert!(run(&stage, vec![], &no_source()).unwrap().is_empty());
        assert_eq!(
            run(&stage, vec![doc! {}, doc! {}], &no_source()).unwrap(),
            vec![doc! { "total": 2 }]
        );
    }

    #[test]
    fn lookup_joins_foreign_documents() {
        let reference = bson::oid::ObjectId::new();
        let source = Collections(HashMap::from([(
            "address",
            vec![doc! { "_id": reference, "street": "Main st" }, doc! { "_id": 1, "street": "Other" }],
        )]));

        let output = run(
            &[doc! { "$lookup": {
                "from": "address",
                "localField": "reference",
                "foreignField": "_id",
                "as": "address",
            } }],
            vec![doc! { "givenName": "Jose", "reference": reference }, doc! { "givenName": "Ana" }],
            &source,
        )
        .unwrap();

        assert_eq!(
            output[0].get_array("address").unwrap(),
            &vec![Bson::Document(doc! { "_id": reference, "street": "Main st" })]
        );
        assert!(output[1].get_array("address").unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_or_malformed_stages() {
        assert!(run(&[doc! { "$out": "x" }], vec![], &no_source()).is_err());
        assert!(run(&[doc! { "$match": {}, "$limit": 1 }], vec![], &no_source()).is_err());
        assert!(run(&[doc! { "$limit": 0 }], vec![], &no_source()).is_err());
    }
}
