use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    /// bcrypt hash, never the plaintext.
    pub password: String,
    pub contact: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub credits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<ProfileImage>,
    pub created_at: DateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Signup payload parked in the ephemeral store until the email
/// verification link is clicked. Never written to the users collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub name: String,
    pub email: String,
    /// Already hashed at signup time.
    pub password: String,
    pub contact: String,
    pub role: Role,
}

/// Public view of an account, without the credential hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub role: Role,
    pub credits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<ProfileImage>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            contact: user.contact,
            role: user.role,
            credits: user.credits,
            address: user.address,
            city: user.city,
            country: user.country,
            profile_image: user.profile_image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_as_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn user_response_drops_password() {
        let user = User {
            id: Some(ObjectId::new()),
            name: "A".into(),
            email: "a@x.com".into(),
            password: "$2b$10$hash".into(),
            contact: "1234567890".into(),
            role: Role::User,
            credits: 3,
            address: None,
            city: None,
            country: None,
            profile_image: None,
            created_at: DateTime::now(),
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["credits"], 3);
    }
}
