pub(crate) mod auth;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod router;
pub(crate) mod users;
pub(crate) mod validation;
