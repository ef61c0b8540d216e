use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One archived generation shown in the public feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityPost {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    pub original_image_url: String,
    pub generated_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_prompt: Option<String>,
    pub created_at: DateTime,
}
