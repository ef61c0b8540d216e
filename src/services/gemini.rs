//! Gemini-backed image analysis and generation.
//!
//! All calls go through the `ImageGenerator` trait so handlers can be
//! exercised without the real API. Responses come back as loose JSON; we
//! pull out only the parts we need.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, Result};
use crate::models::asset::{Gender, PoseCategory};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const ANALYZE_MODEL: &str = "gemini-2.5-flash";
const EDIT_MODEL: &str = "gemini-3-pro-image-preview";
const EDIT_LITE_MODEL: &str = "gemini-2.5-flash-image";

/// Credit pricing per generation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTier {
    Full,
    Lite,
}

impl GenerationTier {
    pub fn cost(self) -> i64 {
        match self {
            GenerationTier::Full => 2,
            GenerationTier::Lite => 1,
        }
    }

    fn model(self) -> &'static str {
        match self {
            GenerationTier::Full => EDIT_MODEL,
            GenerationTier::Lite => EDIT_LITE_MODEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseAnalysis {
    pub pose: PoseCategory,
    pub gender: Gender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptExtraction {
    pub prompt: String,
    pub gender: Gender,
    pub pose: PoseCategory,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Classify the subject's pose and gender.
    async fn analyze_pose(&self, image: &[u8], mime: &str) -> Result<PoseAnalysis>;

    /// Apply a style to the image at `image_url`. `Ok(None)` means the
    /// model produced no usable image; callers refund the debit.
    async fn generate_edit<'a>(
        &self,
        tier: GenerationTier,
        style_prompt: &str,
        additional_prompt: Option<&'a str>,
        image_url: &str,
    ) -> Result<Option<String>>;

    /// Describe an admin reference image as a reusable style prompt.
    async fn extract_prompt(&self, image: &[u8], mime: &str) -> Result<PromptExtraction>;
}

#[derive(Clone)]
pub struct GeminiService {
    api_key: String,
    client: Client,
}

impl GeminiService {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        GeminiService { api_key, client }
    }

    async fn generate_content(&self, model: &str, parts: Value) -> Result<Value> {
        let url = format!("{}/{}:generateContent?key={}", API_BASE, model, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await
            .map_err(|e| AppError::generation(format!("model request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::generation(format!(
                "model call failed: {} - {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::generation(format!("invalid model response: {}", e)))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::generation(format!("image fetch failed: {}", e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::generation(format!("image fetch failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

fn inline_image_part(image: &[u8], mime: &str) -> Value {
    json!({
        "inline_data": {
            "mime_type": mime,
            "data": base64.encode(image),
        }
    })
}

/// Pull the first text part out of a generateContent response.
fn response_text(response: &Value) -> Option<&str> {
    response["candidates"][0]["content"]["parts"]
        .as_array()?
        .iter()
        .find_map(|part| part["text"].as_str())
}

/// Pull the first inline image out of a generateContent response as a
/// data URL.
fn response_image_data_url(response: &Value) -> Option<String> {
    response["candidates"][0]["content"]["parts"]
        .as_array()?
        .iter()
        .find_map(|part| {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
            let mime = inline["mimeType"]
                .as_str()
                .or_else(|| inline["mime_type"].as_str())?;
            if !mime.starts_with("image/") {
                return None;
            }
            let data = inline["data"].as_str()?;
            Some(format!("data:{};base64,{}", mime, data))
        })
}

/// Models wrap JSON answers in markdown code fences; strip them.
fn strip_code_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

const ANALYZE_PROMPT: &str = r#"Analyze the person in this image.
1. Classify the pose into exactly one of these categories: ['FRONT_FULL_BODY', 'SIDE_PROFILE', 'BACK_VIEW', 'SITTING', 'CLOSE_UP_PORTRAIT'].
2. Classify the gender as either 'MALE' or 'FEMALE'.

Return the response in this JSON format:
{
    "pose": "CATEGORY_NAME",
    "gender": "MALE" or "FEMALE"
}"#;

const EXTRACT_PROMPT: &str = r#"Analyze this image.
1. Describe the artistic style, lighting, composition, and subject in a detailed prompt suitable for image generation (under 50 words).
2. Classify the gender of the main subject as either 'MALE' or 'FEMALE'.
3. Classify the pose into exactly one of these categories: ['FRONT_FULL_BODY', 'SIDE_PROFILE', 'BACK_VIEW', 'SITTING', 'CLOSE_UP_PORTRAIT'].

Return the response in this JSON format:
{
    "prompt": "your description here",
    "gender": "MALE" or "FEMALE",
    "pose": "CATEGORY_NAME"
}"#;

#[async_trait]
impl ImageGenerator for GeminiService {
    async fn analyze_pose(&self, image: &[u8], mime: &str) -> Result<PoseAnalysis> {
        let parts = json!([{ "text": ANALYZE_PROMPT }, inline_image_part(image, mime)]);
        let response = self.generate_content(ANALYZE_MODEL, parts).await?;

        let text = response_text(&response)
            .ok_or_else(|| AppError::generation("analysis returned no text"))?;
        serde_json::from_str(strip_code_fences(text))
            .map_err(|e| AppError::generation(format!("unparseable analysis: {}", e)))
    }

    async fn generate_edit<'a>(
        &self,
        tier: GenerationTier,
        style_prompt: &str,
        additional_prompt: Option<&'a str>,
        image_url: &str,
    ) -> Result<Option<String>> {
        let image = self.fetch_image(image_url).await?;

        let mut prompt = format!(
            "Generate a high-quality 1024x1024 image. Transform the attached image based on the \
             following style description: {}. ",
            style_prompt
        );
        if let Some(extra) = additional_prompt {
            prompt.push_str(&format!("Additional user instructions: {}. ", extra));
        }
        prompt.push_str(
            "Maintain the original pose and composition of the subject but apply the artistic \
             style requested. Output ONLY the resulting image.",
        );

        info!("calling model {} for image generation", tier.model());
        let parts = json!([{ "text": prompt }, inline_image_part(&image, "image/jpeg")]);
        let response = self.generate_content(tier.model(), parts).await?;

        Ok(response_image_data_url(&response))
    }

    async fn extract_prompt(&self, image: &[u8], mime: &str) -> Result<PromptExtraction> {
        let parts = json!([{ "text": EXTRACT_PROMPT }, inline_image_part(image, mime)]);
        let response = self.generate_content(ANALYZE_MODEL, parts).await?;

        let text = response_text(&response)
            .ok_or_else(|| AppError::generation("extraction returned no text"))?;
        serde_json::from_str(strip_code_fences(text))
            .map_err(|e| AppError::generation(format!("unparseable extraction: {}", e)))
    }
}
