//! Users collection access behind a trait so handlers can be tested
//! against an in-memory double.

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::errors::{AppError, Result};
use crate::models::user::{ProfileImage, User};

/// Partial profile update; only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub profile_image: Option<ProfileImage>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>>;
    /// Insert a new account and return its id.
    async fn create(&self, user: User) -> Result<ObjectId>;
    async fn update_password(&self, id: &ObjectId, password_hash: &str) -> Result<()>;
    /// Apply a partial update and return the fresh document.
    async fn update_profile(&self, id: &ObjectId, update: ProfileUpdate) -> Result<User>;
}

#[derive(Clone)]
pub struct MongoUserRepo {
    users: Collection<User>,
}

impl MongoUserRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepo for MongoUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn create(&self, mut user: User) -> Result<ObjectId> {
        let id = ObjectId::new();
        user.id = Some(id);
        self.users.insert_one(user).await?;
        Ok(id)
    }

    async fn update_password(&self, id: &ObjectId, password_hash: &str) -> Result<()> {
        let result = self
            .users
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "password": password_hash } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound("user"));
        }
        Ok(())
    }

    async fn update_profile(&self, id: &ObjectId, update: ProfileUpdate) -> Result<User> {
        let mut set = doc! {};
        if let Some(name) = update.name {
            set.insert("name", name);
        }
        if let Some(contact) = update.contact {
            set.insert("contact", contact);
        }
        if let Some(address) = update.address {
            set.insert("address", address);
        }
        if let Some(city) = update.city {
            set.insert("city", city);
        }
        if let Some(country) = update.country {
            set.insert("country", country);
        }
        if let Some(image) = update.profile_image {
            set.insert(
                "profile_image",
                to_bson(&image).map_err(|e| AppError::invalid_data(e.to_string()))?,
            );
        }

        if set.is_empty() {
            return self
                .find_by_id(id)
                .await?
                .ok_or(AppError::NotFound("user"));
        }

        self.users
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(AppError::NotFound("user"))
    }
}
