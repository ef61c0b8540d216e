pub mod asset;
pub mod community;
pub mod forms;
pub mod user;
