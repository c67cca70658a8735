pub mod auth;
pub mod seating;
