use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ProposalRequest {
    #[validate(length(min = 1, message = "Please enter all fields"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Please enter all fields"))]
    pub idea: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(length(min = 1, message = "Please enter an email or phone number"))]
    pub contact: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, message = "All fields are required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "All fields are required"))]
    pub message: String,
}
