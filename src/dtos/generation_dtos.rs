use serde::Deserialize;
use validator::Validate;

/// Shared by the full and lite generation endpoints. `user_image_url` is
/// the Cloudinary URL handed back by analyze-pose.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateEditRequest {
    #[validate(length(min = 1, message = "Style prompt is required"))]
    pub preedited_prompt: String,
    #[serde(rename = "userImageUrl")]
    #[validate(url(message = "Invalid image URL"))]
    pub user_image_url: String,
    pub additional_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_url_image_reference() {
        let req = GenerateEditRequest {
            preedited_prompt: "oil painting".into(),
            user_image_url: "not a url".into(),
            additional_prompt: None,
        };
        assert!(req.validate().is_err());
    }
}
