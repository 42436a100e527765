use serde::{Deserialize, Serialize};

use crate::db::types::DifficultyLevel;
use crate::services::question_store::{Document, StoreError};

/// A question as displayed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionRecord {
    pub(crate) id: String,
    /// Display rank. Older records may lack it; gaps and duplicates are allowed.
    #[serde(default)]
    pub(crate) order: Option<i32>,
    pub(crate) text: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default = "default_active")]
    pub(crate) active: bool,
    pub(crate) kind: QuestionKind,
    /// Index in the snapshot this record was hydrated from.
    #[serde(skip)]
    pub(crate) fetch_position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    MultipleChoice {
        options: Vec<String>,
        correct_option: usize,
    },
    OpenEnded {
        #[serde(default)]
        reference_answer: Option<String>,
    },
}

/// The question kind with the answer key removed, for the people taking the quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum PublicQuestionKind {
    MultipleChoice { options: Vec<String> },
    OpenEnded,
}

impl QuestionRecord {
    pub(crate) fn from_document(document: &Document, position: usize) -> Result<Self, StoreError> {
        let mut fields = document.fields.clone();
        fields.insert("id".to_string(), serde_json::Value::String(document.id.clone()));

        let mut record: QuestionRecord = serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|err| StoreError::Decode {
                id: document.id.clone(),
                reason: err.to_string(),
            })?;
        record.fetch_position = position;
        Ok(record)
    }

    /// Key used to sequence the board: explicit order first, fetch order when absent.
    pub(crate) fn sort_key(&self) -> (i64, usize) {
        let rank = self.order.map(i64::from).unwrap_or(self.fetch_position as i64);
        (rank, self.fetch_position)
    }
}

impl QuestionKind {
    pub(crate) fn public(&self) -> PublicQuestionKind {
        match self {
            Self::MultipleChoice { options, .. } => {
                PublicQuestionKind::MultipleChoice { options: options.clone() }
            }
            Self::OpenEnded { .. } => PublicQuestionKind::OpenEnded,
        }
    }
}

fn default_active() -> bool {
    true
}
