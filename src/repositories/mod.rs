pub(crate) mod quizzes;
pub(crate) mod users;
