pub(crate) mod board;
pub(crate) mod question_store;
pub(crate) mod scoring;
