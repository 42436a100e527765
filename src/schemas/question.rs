use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::DifficultyLevel;
use crate::services::board::{BoardSnapshot, Notice, QuestionKind, QuestionRecord};
use crate::services::question_store::{NewQuestion, QuestionPatch};

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 10;
const MAX_ANSWER_LEN: usize = 2000;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, max = 2000, message = "text must be 1 to 2000 characters"))]
    pub(crate) text: String,
    #[validate(length(min = 1, max = 100, message = "category must be 1 to 100 characters"))]
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default = "default_true")]
    pub(crate) active: bool,
    pub(crate) kind: QuestionKind,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "text must be 1 to 2000 characters"))]
    pub(crate) text: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "category must be 1 to 100 characters"))]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) active: Option<bool>,
    #[serde(default)]
    pub(crate) kind: Option<QuestionKind>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReorderRequest {
    pub(crate) ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BoardResponse {
    pub(crate) items: Vec<QuestionRecord>,
    pub(crate) reordering: bool,
    pub(crate) generation: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReorderResponse {
    pub(crate) notice: Notice,
    #[serde(flatten)]
    pub(crate) board: BoardResponse,
}

impl From<BoardSnapshot> for BoardResponse {
    fn from(snapshot: BoardSnapshot) -> Self {
        Self {
            items: snapshot.items,
            reordering: snapshot.reordering,
            generation: snapshot.generation,
        }
    }
}

impl QuestionCreate {
    /// Field rules plus the kind-specific checks.
    pub(crate) fn check(&self) -> Result<(), String> {
        self.validate().map_err(|err| err.to_string())?;
        ensure_not_blank("text", &self.text)?;
        ensure_not_blank("category", &self.category)?;
        validate_kind(&self.kind)
    }

    pub(crate) fn into_new_question(self) -> NewQuestion {
        NewQuestion {
            text: self.text.trim().to_string(),
            category: self.category.trim().to_string(),
            difficulty: self.difficulty,
            active: self.active,
            kind: self.kind,
        }
    }
}

impl QuestionUpdate {
    pub(crate) fn check(&self) -> Result<(), String> {
        self.validate().map_err(|err| err.to_string())?;
        if let Some(text) = &self.text {
            ensure_not_blank("text", text)?;
        }
        if let Some(category) = &self.category {
            ensure_not_blank("category", category)?;
        }
        if let Some(kind) = &self.kind {
            validate_kind(kind)?;
        }
        Ok(())
    }

    pub(crate) fn into_patch(self) -> QuestionPatch {
        QuestionPatch {
            text: self.text.map(|text| text.trim().to_string()),
            category: self.category.map(|category| category.trim().to_string()),
            difficulty: self.difficulty,
            active: self.active,
            kind: self.kind,
        }
    }
}

pub(crate) fn validate_kind(kind: &QuestionKind) -> Result<(), String> {
    match kind {
        QuestionKind::MultipleChoice { options, correct_option } => {
            if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
                return Err(format!(
                    "multiple choice questions need {MIN_OPTIONS} to {MAX_OPTIONS} options"
                ));
            }
            if options.iter().any(|option| option.trim().is_empty()) {
                return Err("options must not be blank".to_string());
            }

            let mut seen = HashSet::with_capacity(options.len());
            if !options.iter().all(|option| seen.insert(option.trim().to_lowercase())) {
                return Err("options must be unique".to_string());
            }
            if *correct_option >= options.len() {
                return Err("correct_option must point at one of the options".to_string());
            }
            Ok(())
        }
        QuestionKind::OpenEnded { reference_answer } => match reference_answer {
            Some(answer) if answer.chars().count() > MAX_ANSWER_LEN => {
                Err(format!("reference_answer must be at most {MAX_ANSWER_LEN} characters"))
            }
            _ => Ok(()),
        },
    }
}

fn ensure_not_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be blank"))
    } else {
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
