use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::services::board::{QuestionKind, QuestionRecord};

/// A submitted answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Answer {
    Choice { option: usize },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionOutcome {
    pub(crate) question_id: String,
    pub(crate) answered: bool,
    pub(crate) points: f64,
    pub(crate) needs_review: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreSheet {
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) outcomes: Vec<QuestionOutcome>,
}

/// Scores `answers` against the session's questions, one point per question.
pub(crate) fn score(questions: &[QuestionRecord], answers: &HashMap<String, Answer>) -> ScoreSheet {
    let outcomes: Vec<QuestionOutcome> = questions
        .iter()
        .map(|question| score_one(question, answers.get(&question.id)))
        .collect();

    ScoreSheet {
        score: outcomes.iter().map(|outcome| outcome.points).sum(),
        max_score: questions.len() as f64,
        needs_review: outcomes.iter().any(|outcome| outcome.needs_review),
        outcomes,
    }
}

fn score_one(question: &QuestionRecord, answer: Option<&Answer>) -> QuestionOutcome {
    let mut outcome = QuestionOutcome {
        question_id: question.id.clone(),
        answered: answer.is_some(),
        points: 0.0,
        needs_review: false,
    };

    match (&question.kind, answer) {
        (QuestionKind::MultipleChoice { correct_option, .. }, Some(Answer::Choice { option })) => {
            if option == correct_option {
                outcome.points = 1.0;
            }
        }
        (QuestionKind::OpenEnded { reference_answer }, Some(Answer::Text { text })) => {
            match reference_answer.as_deref().map(normalize) {
                Some(reference) if !reference.is_empty() => {
                    if normalize(text) == reference {
                        outcome.points = 1.0;
                    }
                }
                _ => outcome.needs_review = true,
            }
        }
        // Unanswered, or an answer of the wrong shape.
        _ => {}
    }

    outcome
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
