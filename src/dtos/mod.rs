pub mod auth_dtos;
pub mod forms_dtos;
pub mod generation_dtos;
pub mod payment_dtos;
