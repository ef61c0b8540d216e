use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Pose buckets the analysis model classifies into; assets are matched
/// against the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoseCategory {
    FrontFullBody,
    SideProfile,
    BackView,
    Sitting,
    CloseUpPortrait,
    ActionShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    /// Applicable to any subject.
    Neutral,
}

/// Admin-curated style reference. `preedited_prompt` is what the
/// generation endpoint feeds to the model when this asset is chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub pose_category: PoseCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub cloudinary_url: String,
    pub preedited_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_category_uses_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&PoseCategory::FrontFullBody).unwrap(),
            "\"FRONT_FULL_BODY\""
        );
        let pose: PoseCategory = serde_json::from_str("\"CLOSE_UP_PORTRAIT\"").unwrap();
        assert_eq!(pose, PoseCategory::CloseUpPortrait);
    }
}
