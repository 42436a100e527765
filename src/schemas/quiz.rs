use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{QuizResult, QuizSession};
use crate::db::types::{DifficultyLevel, QuizStatus};
use crate::services::board::{PublicQuestionKind, QuestionRecord};
use crate::services::scoring::Answer;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizCreate {
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub(crate) title: String,
    #[serde(alias = "assigneeIds")]
    #[validate(length(min = 1, message = "at least one assignee is required"))]
    pub(crate) assignee_ids: Vec<String>,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizSubmit {
    pub(crate) answers: HashMap<String, Answer>,
}

/// A question as shown to the person taking the quiz.
#[derive(Debug, Serialize)]
pub(crate) struct PublicQuestion {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) kind: PublicQuestionKind,
}

impl PublicQuestion {
    fn from_record(record: &QuestionRecord) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            category: record.category.clone(),
            difficulty: record.difficulty,
            kind: record.kind.public(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum QuizQuestions {
    WithAnswers(Vec<QuestionRecord>),
    Public(Vec<PublicQuestion>),
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResultResponse {
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) outcomes: serde_json::Value,
    pub(crate) submitted_at: String,
}

impl QuizResultResponse {
    pub(crate) fn from_db(result: QuizResult) -> Self {
        Self {
            score: result.score,
            max_score: result.max_score,
            needs_review: result.needs_review,
            outcomes: result.outcomes.0,
            submitted_at: format_primitive(result.submitted_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizSessionResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) launched_by: String,
    pub(crate) assignee_id: String,
    pub(crate) status: QuizStatus,
    pub(crate) created_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) questions: QuizQuestions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<QuizResultResponse>,
}

impl QuizSessionResponse {
    pub(crate) fn from_db(session: QuizSession, with_answers: bool) -> Self {
        let questions = if with_answers {
            QuizQuestions::WithAnswers(session.questions.0)
        } else {
            QuizQuestions::Public(session.questions.0.iter().map(PublicQuestion::from_record).collect())
        };

        Self {
            id: session.id,
            title: session.title,
            launched_by: session.launched_by,
            assignee_id: session.assignee_id,
            status: session.status,
            created_at: format_primitive(session.created_at),
            completed_at: session.completed_at.map(format_primitive),
            questions,
            result: None,
        }
    }

    pub(crate) fn with_result(mut self, result: Option<QuizResult>) -> Self {
        self.result = result.map(QuizResultResponse::from_db);
        self
    }
}
