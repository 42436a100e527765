pub(crate) mod question_feed;
