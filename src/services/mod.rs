pub mod cache;
pub mod cloudinary;
pub mod gemini;
pub mod ledger;
pub mod mailer;
pub mod razorpay;
pub mod templates;
pub mod tokens;
