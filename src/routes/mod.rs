pub mod admin;
pub mod auth;
pub mod forms;
pub mod payment;
pub mod user;
