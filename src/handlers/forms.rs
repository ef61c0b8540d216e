//! Public forms: business proposals, newsletter signups, contact messages.

use axum::{extract::State, http::StatusCode, response::Json};
use mongodb::bson::{doc, DateTime};
use serde_json::{json, Value};
use validator::Validate;

use crate::dtos::forms_dtos::{ContactRequest, ProposalRequest, SubscribeRequest};
use crate::errors::{AppError, Result};
use crate::models::forms::{ContactMessage, Proposal, Subscriber};
use crate::state::AppState;

/// POST /api/forms/proposal
pub async fn submit_proposal(
    State(state): State<AppState>,
    Json(body): Json<ProposalRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let proposal = Proposal {
        id: None,
        name: body.name,
        email: body.email,
        idea: body.idea,
        created_at: DateTime::now(),
    };
    state
        .db
        .collection::<Proposal>("proposals")
        .insert_one(proposal)
        .await?;

    Ok(Json(json!({
        "message": "Proposal submitted successfully",
        "success": true,
    })))
}

/// POST /api/forms/subscribe — duplicate contacts are rejected.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<Value>> {
    body.validate()?;

    let subscribers = state.db.collection::<Subscriber>("subscribers");
    if subscribers
        .find_one(doc! { "contact": &body.contact })
        .await?
        .is_some()
    {
        return Err(AppError::invalid_data("You are already subscribed"));
    }

    subscribers
        .insert_one(Subscriber {
            id: None,
            contact: body.contact,
            created_at: DateTime::now(),
        })
        .await?;

    Ok(Json(json!({
        "message": "Subscribed successfully",
        "success": true,
    })))
}

/// POST /api/contact
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(body): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    body.validate()?;

    let message = ContactMessage {
        id: None,
        name: body.name,
        email: body.email,
        message: body.message,
        created_at: DateTime::now(),
    };
    state
        .db
        .collection::<ContactMessage>("contacts")
        .insert_one(message)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Message sent successfully",
            "success": true,
        })),
    ))
}
