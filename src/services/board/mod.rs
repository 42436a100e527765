//! The question board: the ordered in-memory view of every question and the
//! optimistic reorder protocol on top of it.

mod coordinator;
mod notifier;
mod record;
mod view;

pub(crate) use coordinator::{BoardSnapshot, ReorderCoordinator, ReorderError};
#[cfg(test)]
pub(crate) use notifier::RecordingNotifier;
pub(crate) use notifier::{LogNotifier, Notice};
pub(crate) use record::{PublicQuestionKind, QuestionKind, QuestionRecord};
