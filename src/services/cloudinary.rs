//! Cloudinary signed uploads and deletes.
//!
//! Generated images come back from the model as base64 data URLs, so the
//! upload path accepts both raw bytes and data URLs.

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use reqwest::multipart;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::env;

use crate::errors::{AppError, Result};

pub const UPLOADS_FOLDER: &str = "art-ai-uploads";
pub const GENERATED_FOLDER: &str = "art-ai-generated";
pub const GENERATED_LITE_FOLDER: &str = "art-ai-generated-lite";
pub const ASSETS_FOLDER: &str = "art-ai-assets";
pub const AVATARS_FOLDER: &str = "art-ai-avatars";

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Clone)]
pub struct CloudinaryService {
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

/// Split a `data:<mime>;base64,<payload>` URL into mime and decoded bytes.
fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(AppError::InvalidImageFormat)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or(AppError::InvalidImageFormat)?;
    let bytes = base64
        .decode(payload)
        .map_err(|_| AppError::InvalidImageFormat)?;
    Ok((mime.to_string(), bytes))
}

impl CloudinaryService {
    pub fn from_env() -> Result<Self> {
        let cloud_name = env::var("CLOUDINARY_CLOUD_NAME")
            .map_err(|_| AppError::cloudinary("CLOUDINARY_CLOUD_NAME not set"))?;
        let api_key = env::var("CLOUDINARY_API_KEY")
            .map_err(|_| AppError::cloudinary("CLOUDINARY_API_KEY not set"))?;
        let api_secret = env::var("CLOUDINARY_API_SECRET")
            .map_err(|_| AppError::cloudinary("CLOUDINARY_API_SECRET not set"))?;

        Ok(Self {
            cloud_name,
            api_key,
            api_secret,
        })
    }

    // Params must be signed in alphabetical order.
    fn sign(&self, params: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(params.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Signed upload of raw image bytes into `folder`.
    pub async fn upload_image(&self, image_data: &[u8], folder: &str) -> Result<UploadedImage> {
        self.upload_part(
            multipart::Part::bytes(image_data.to_vec())
                .file_name("image.jpg")
                .mime_str("image/jpeg")
                .map_err(|e| AppError::cloudinary(e.to_string()))?,
            folder,
        )
        .await
    }

    /// Upload a base64 data URL (how generated images arrive).
    pub async fn upload_data_url(&self, data_url: &str, folder: &str) -> Result<UploadedImage> {
        let (mime, bytes) = decode_data_url(data_url)?;
        self.upload_part(
            multipart::Part::bytes(bytes)
                .file_name("image")
                .mime_str(&mime)
                .map_err(|e| AppError::cloudinary(e.to_string()))?,
            folder,
        )
        .await
    }

    async fn upload_part(&self, file: multipart::Part, folder: &str) -> Result<UploadedImage> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&format!("folder={}&timestamp={}", folder, timestamp));

        let upload_url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );

        let form = multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .text("folder", folder.to_string())
            .part("file", file);

        let response = reqwest::Client::new()
            .post(&upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::cloudinary(format!("upload failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::cloudinary(format!("upload rejected: {}", error_text)));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::cloudinary(format!("invalid upload response: {}", e)))?;

        if let Some(error) = result.get("error") {
            let message = error["message"].as_str().unwrap_or("unknown error");
            return Err(AppError::cloudinary(message.to_string()));
        }

        let url = result["secure_url"]
            .as_str()
            .ok_or_else(|| AppError::cloudinary("no secure URL in response"))?
            .to_string();
        let public_id = result["public_id"]
            .as_str()
            .ok_or_else(|| AppError::cloudinary("no public ID in response"))?
            .to_string();

        Ok(UploadedImage { url, public_id })
    }

    pub async fn delete_image(&self, public_id: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&format!("public_id={}&timestamp={}", public_id, timestamp));

        let delete_url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/destroy",
            self.cloud_name
        );

        let params = [
            ("public_id", public_id),
            ("api_key", &self.api_key),
            ("timestamp", &timestamp),
            ("signature", &signature),
            ("signature_algorithm", "sha256"),
        ];

        let response = reqwest::Client::new()
            .post(&delete_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::cloudinary(format!("delete failed: {}", e)))?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::cloudinary(format!("invalid delete response: {}", e)))?;

        // "not found" still clears our reference; anything else is an error.
        match result["result"].as_str() {
            Some("ok") | Some("not found") => Ok(()),
            other => Err(AppError::cloudinary(format!(
                "delete did not complete: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_decodes_mime_and_payload() {
        let (mime, bytes) = decode_data_url("data:image/png;base64,QUJD").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"ABC");
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(decode_data_url("http://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,rawdata").is_err());
        assert!(decode_data_url("data:image/png;base64,not~base64!").is_err());
    }
}
