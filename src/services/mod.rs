pub mod ai;
pub mod auth;
pub mod error;
pub mod todos;
pub mod token;
