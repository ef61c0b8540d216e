//! Per-account credit balance.
//!
//! `debit` must be a single atomic decrement-if-sufficient; two concurrent
//! debits against an exactly-sufficient balance must never both succeed.
//! The Mongo implementation leans on `find_one_and_update` with a
//! `credits >= amount` filter rather than read-modify-write.

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::errors::{AppError, Result};
use crate::models::user::User;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn balance(&self, user_id: &ObjectId) -> Result<i64>;

    /// Atomically subtract `amount` if the balance covers it. Returns the
    /// remaining balance, or `InsufficientCredits` without mutating.
    async fn debit(&self, user_id: &ObjectId, amount: i64) -> Result<i64>;

    /// Unconditional increment; purchases and refunds both land here.
    /// Returns the new balance.
    async fn credit(&self, user_id: &ObjectId, amount: i64) -> Result<i64>;
}

#[derive(Clone)]
pub struct MongoLedger {
    users: Collection<User>,
}

impl MongoLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection("users"),
        }
    }
}

#[async_trait]
impl CreditLedger for MongoLedger {
    async fn balance(&self, user_id: &ObjectId) -> Result<i64> {
        let user = self
            .users
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or(AppError::NotFound("user"))?;
        Ok(user.credits)
    }

    async fn debit(&self, user_id: &ObjectId, amount: i64) -> Result<i64> {
        let updated = self
            .users
            .find_one_and_update(
                doc! { "_id": user_id, "credits": { "$gte": amount } },
                doc! { "$inc": { "credits": -amount } },
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(user) => Ok(user.credits),
            // Filter mismatch is either a missing account or not enough
            // credits; distinguish for the caller.
            None => {
                if self.users.find_one(doc! { "_id": user_id }).await?.is_some() {
                    Err(AppError::InsufficientCredits)
                } else {
                    Err(AppError::NotFound("user"))
                }
            }
        }
    }

    async fn credit(&self, user_id: &ObjectId, amount: i64) -> Result<i64> {
        let updated = self
            .users
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! { "$inc": { "credits": amount } },
            )
            .return_document(ReturnDocument::After)
            .await?;

        updated
            .map(|user| user.credits)
            .ok_or(AppError::NotFound("user"))
    }
}
