//! The user-facing AI pipeline: pose analysis, credit-gated generation,
//! balance lookup, and the public community feed.
//!
//! Generation debits first and refunds before reporting failure, so a
//! request that produces no image costs nothing.

use axum::{
    extract::{Multipart, State},
    response::Json,
    Extension,
};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, to_bson, DateTime, Document};
use serde_json::{json, Value};
use tracing::{error, info};
use validator::Validate;

use crate::dtos::generation_dtos::GenerateEditRequest;
use crate::errors::{AppError, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::asset::Asset;
use crate::models::community::CommunityPost;
use crate::services::cloudinary::{GENERATED_FOLDER, GENERATED_LITE_FOLDER, UPLOADS_FOLDER};
use crate::services::gemini::GenerationTier;
use crate::state::AppState;

const COMMUNITY_SAMPLE_SIZE: i32 = 14;

/// Pull the `image` part out of a multipart body.
pub(crate) async fn read_image_field(multipart: &mut Multipart) -> Result<(Vec<u8>, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let mime = field
            .content_type()
            .unwrap_or("image/jpeg")
            .to_string();
        if !mime.starts_with("image/") {
            return Err(AppError::InvalidImageFormat);
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Multipart(e.to_string()))?;
        return Ok((bytes.to_vec(), mime));
    }
    Err(AppError::NoImageProvided)
}

/// POST /api/user/analyze-pose — upload, classify, then match catalog
/// assets for that pose. Gender-specific assets come first; NEUTRAL ones
/// apply to anyone, and a pose-only fallback covers empty results.
pub async fn analyze_pose(
    State(state): State<AppState>,
    Extension(_current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let generator = state
        .generator
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("image analysis not configured".into()))?;
    let cloudinary = state
        .cloudinary
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("image storage not configured".into()))?;

    let (image, mime) = read_image_field(&mut multipart).await?;
    let uploaded = cloudinary.upload_image(&image, UPLOADS_FOLDER).await?;
    let analysis = generator.analyze_pose(&image, &mime).await?;

    let assets = state.db.collection::<Asset>("assets");
    let pose = to_bson(&analysis.pose).map_err(|e| AppError::invalid_data(e.to_string()))?;
    let gender = to_bson(&analysis.gender).map_err(|e| AppError::invalid_data(e.to_string()))?;

    let mut matches: Vec<Asset> = assets
        .find(doc! {
            "pose_category": &pose,
            "$or": [
                { "gender": &gender },
                { "gender": "NEUTRAL" },
                { "gender": { "$exists": false } },
            ],
        })
        .await?
        .try_collect()
        .await?;

    if matches.is_empty() {
        matches = assets
            .find(doc! { "pose_category": &pose })
            .await?
            .try_collect()
            .await?;
    }

    Ok(Json(json!({
        "pose": analysis.pose,
        "gender": analysis.gender,
        "matches": matches,
        "userImageUrl": uploaded.url,
    })))
}

/// POST /api/user/generate-edit (2 credits)
pub async fn generate_edit(
    state: State<AppState>,
    current: Extension<CurrentUser>,
    body: Json<GenerateEditRequest>,
) -> Result<Json<Value>> {
    run_generation(state, current, GenerationTier::Full, body).await
}

/// POST /api/user/generate-edit-lite (1 credit)
pub async fn generate_edit_lite(
    state: State<AppState>,
    current: Extension<CurrentUser>,
    body: Json<GenerateEditRequest>,
) -> Result<Json<Value>> {
    run_generation(state, current, GenerationTier::Lite, body).await
}

async fn run_generation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    tier: GenerationTier,
    Json(body): Json<GenerateEditRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let generator = state
        .generator
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("image generation not configured".into()))?;

    let user_id = current.id();
    let cost = tier.cost();

    // Debit up front; anything short of a delivered image refunds it.
    let mut remaining = state.ledger.debit(&user_id, cost).await?;

    let generated = match generator
        .generate_edit(
            tier,
            &body.preedited_prompt,
            body.additional_prompt.as_deref(),
            &body.user_image_url,
        )
        .await
    {
        Ok(Some(image)) => image,
        Ok(None) => {
            remaining = state.ledger.credit(&user_id, cost).await?;
            return Err(AppError::generation(format!(
                "no image data returned; {} credits refunded, balance {}",
                cost, remaining
            )));
        }
        Err(e) => {
            state.ledger.credit(&user_id, cost).await?;
            return Err(e);
        }
    };

    // Archive to storage and the community feed; failures here are logged
    // and never cost the user their result.
    if let Some(cloudinary) = &state.cloudinary {
        let folder = match tier {
            GenerationTier::Full => GENERATED_FOLDER,
            GenerationTier::Lite => GENERATED_LITE_FOLDER,
        };
        let style_prompt = match tier {
            GenerationTier::Full => body.preedited_prompt.clone(),
            GenerationTier::Lite => format!("{} (Lite)", body.preedited_prompt),
        };

        match cloudinary.upload_data_url(&generated, folder).await {
            Ok(uploaded) => {
                let post = CommunityPost {
                    id: None,
                    user: user_id,
                    original_image_url: body.user_image_url.clone(),
                    generated_image_url: uploaded.url,
                    style_prompt: Some(style_prompt),
                    created_at: DateTime::now(),
                };
                if let Err(e) = state
                    .db
                    .collection::<CommunityPost>("community")
                    .insert_one(post)
                    .await
                {
                    error!("failed to archive generation to community: {}", e);
                } else {
                    info!("generation archived to community feed");
                }
            }
            Err(e) => error!("failed to archive generation to storage: {}", e),
        }
    }

    Ok(Json(json!({
        "imageUrl": generated,
        "remainingCredits": remaining,
    })))
}

/// GET /api/user/credits
pub async fn get_credits(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>> {
    let credits = state.ledger.balance(&current.id()).await?;
    Ok(Json(json!({ "credits": credits })))
}

/// GET /api/user/community — random sample of recent generations; public.
pub async fn community_feed(State(state): State<AppState>) -> Result<Json<Value>> {
    let posts: Vec<Document> = state
        .db
        .collection::<Document>("community")
        .aggregate([doc! { "$sample": { "size": COMMUNITY_SAMPLE_SIZE } }])
        .await?
        .try_collect()
        .await?;

    Ok(Json(json!(posts)))
}
