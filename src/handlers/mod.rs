pub mod admin;
pub mod auth;
pub mod forms;
pub mod generation;
pub mod payment;
