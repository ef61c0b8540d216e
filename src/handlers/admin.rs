//! Admin asset catalog and community moderation. Every route here sits
//! behind both the auth and admin middleware layers.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde_json::{json, Value};

use crate::errors::{AppError, Result};
use crate::handlers::generation::read_image_field;
use crate::models::asset::{Asset, Gender, PoseCategory};
use crate::models::community::CommunityPost;
use crate::services::cloudinary::ASSETS_FOLDER;
use crate::state::AppState;

fn parse_pose(value: &str) -> Result<PoseCategory> {
    serde_json::from_value(Value::String(value.to_string()))
        .map_err(|_| AppError::invalid_data(format!("unknown pose category: {}", value)))
}

fn parse_gender(value: &str) -> Result<Gender> {
    serde_json::from_value(Value::String(value.to_string()))
        .map_err(|_| AppError::invalid_data(format!("unknown gender: {}", value)))
}

/// POST /api/admin/assets — multipart: `image` plus the catalog fields.
pub async fn create_asset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let cloudinary = state
        .cloudinary
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("image storage not configured".into()))?;

    let mut image: Option<Vec<u8>> = None;
    let mut pose_category: Option<PoseCategory> = None;
    let mut gender: Option<Gender> = None;
    let mut preedited_prompt: Option<String> = None;
    let mut admin_notes: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Multipart(e.to_string()))?;
                image = Some(bytes.to_vec());
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(e.to_string()))?;
                match name.as_str() {
                    "pose_category" => pose_category = Some(parse_pose(&value)?),
                    "gender" => gender = Some(parse_gender(&value)?),
                    "preedited_prompt" => preedited_prompt = Some(value),
                    "admin_notes" => admin_notes = Some(value),
                    _ => {}
                }
            }
        }
    }

    let image = image.ok_or(AppError::NoImageProvided)?;
    let pose_category =
        pose_category.ok_or_else(|| AppError::invalid_data("pose_category is required"))?;
    let preedited_prompt =
        preedited_prompt.ok_or_else(|| AppError::invalid_data("preedited_prompt is required"))?;

    let uploaded = cloudinary.upload_image(&image, ASSETS_FOLDER).await?;

    let mut asset = Asset {
        id: None,
        pose_category,
        gender,
        cloudinary_url: uploaded.url,
        preedited_prompt,
        admin_notes,
        created_at: DateTime::now(),
    };
    let id = ObjectId::new();
    asset.id = Some(id);
    state
        .db
        .collection::<Asset>("assets")
        .insert_one(asset.clone())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(asset))))
}

/// GET /api/admin/assets — newest first.
pub async fn list_assets(State(state): State<AppState>) -> Result<Json<Value>> {
    let assets: Vec<Asset> = state
        .db
        .collection::<Asset>("assets")
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(Json(json!(assets)))
}

/// DELETE /api/admin/assets/:id
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = ObjectId::parse_str(&id)?;
    let assets = state.db.collection::<Asset>("assets");

    assets
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(AppError::NotFound("asset"))?;
    assets.delete_one(doc! { "_id": id }).await?;

    Ok(Json(json!({ "message": "Asset deleted", "success": true })))
}

/// POST /api/admin/extract-prompt — describe a reference image as a
/// reusable style prompt plus pose/gender classification.
pub async fn extract_prompt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let generator = state
        .generator
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("image analysis not configured".into()))?;

    let (image, mime) = read_image_field(&mut multipart).await?;
    let extraction = generator.extract_prompt(&image, &mime).await?;

    Ok(Json(json!(extraction)))
}

/// DELETE /api/admin/community/:id
pub async fn delete_community_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = ObjectId::parse_str(&id)?;
    let community = state.db.collection::<CommunityPost>("community");

    community
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(AppError::NotFound("post"))?;
    community.delete_one(doc! { "_id": id }).await?;

    Ok(Json(json!({ "message": "Community post deleted", "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_and_gender_parse_from_catalog_field_values() {
        assert_eq!(parse_pose("SIDE_PROFILE").unwrap(), PoseCategory::SideProfile);
        assert_eq!(parse_gender("NEUTRAL").unwrap(), Gender::Neutral);
        assert!(parse_pose("HANDSTAND").is_err());
        assert!(parse_gender("OTHER").is_err());
    }
}
