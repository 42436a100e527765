use std::collections::HashSet;

use crate::services::question_store::{Document, FieldUpdate};

use super::QuestionRecord;

/// Decodes a snapshot into display order. Undecodable documents are skipped.
pub(crate) fn hydrate(documents: &[Document]) -> Vec<QuestionRecord> {
    let mut records: Vec<QuestionRecord> = documents
        .iter()
        .enumerate()
        .filter_map(|(position, document)| {
            match QuestionRecord::from_document(document, position) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed question document");
                    None
                }
            }
        })
        .collect();

    records.sort_by_key(QuestionRecord::sort_key);
    records
}

/// Rank for position `index`; `None` once positions no longer fit the stored `order`.
fn rank(index: usize) -> Option<i32> {
    i32::try_from(index).ok()
}

/// Stamps `order` with each record's position in `next`. `None` when the
/// sequence is too long to rank.
pub(crate) fn restamp(next: Vec<QuestionRecord>) -> Option<Vec<QuestionRecord>> {
    next.into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            record.order = Some(rank(index)?);
            Some(record)
        })
        .collect()
}

/// True when `next` holds exactly the ids of `current`, each once.
pub(crate) fn is_permutation(current: &[QuestionRecord], next: &[QuestionRecord]) -> bool {
    if current.len() != next.len() {
        return false;
    }

    let expected: HashSet<&str> = current.iter().map(|record| record.id.as_str()).collect();
    let mut seen = HashSet::with_capacity(next.len());

    next.iter().all(|record| expected.contains(record.id.as_str()) && seen.insert(&record.id))
}

pub(crate) fn order_updates(records: &[QuestionRecord]) -> Vec<FieldUpdate> {
    records
        .iter()
        .map(|record| FieldUpdate {
            id: record.id.clone(),
            field: "order".to_string(),
            value: serde_json::Value::from(record.order),
        })
        .collect()
}
