use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::handlers::api::{parse_body, AppState, TenantId, UserId};
use crate::models::candidate_match::{
    apply_status, toggle_shortlist, MatchStatus, UpdateMatchStatusRequest,
};
use crate::services::database::{run_blocking, Collection, Document, DocumentEdit};

fn match_not_found() -> ApiError {
    ApiError::NotFound("Match not found".to_string())
}

pub async fn get_match(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(match_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = Arc::clone(&state.store);
    let candidate_match =
        run_blocking(move || store.find_by_id(Collection::Matches, &tenant_id, &match_id))
            .await?
            .ok_or_else(match_not_found)?;

    Ok(Json(json!({ "success": true, "data": candidate_match })))
}

// Review decision on a match
pub async fn update_match_status(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    user: Option<UserId>,
    Path(match_id): Path<String>,
    payload: Result<Json<UpdateMatchStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = parse_body(payload)?;
    let raw_status = request
        .status
        .filter(|status| !status.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Status is required".to_string()))?;
    let status = MatchStatus::parse(raw_status.trim()).ok_or_else(|| {
        ApiError::Validation(format!(
            "Invalid status. Must be one of: {}",
            MatchStatus::allowed_values()
        ))
    })?;
    info!("Setting status of match {} to {}", match_id, status.as_str());

    let reviewer = user.map(|UserId(user_id)| user_id);
    let notes = request.notes;
    let now = Utc::now();
    let edit: DocumentEdit = Box::new(move |document: &mut Document| {
        apply_status(document, status, reviewer.as_deref(), notes.as_deref(), now);
    });

    let store = Arc::clone(&state.store);
    let candidate_match =
        run_blocking(move || store.modify(Collection::Matches, &tenant_id, &match_id, edit))
            .await?
            .ok_or_else(match_not_found)?;

    Ok(Json(json!({ "success": true, "data": candidate_match })))
}

pub async fn toggle_match_shortlist(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    user: Option<UserId>,
    Path(match_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = user.map(|UserId(user_id)| user_id);
    let now = Utc::now();
    let edit: DocumentEdit = Box::new(move |document: &mut Document| {
        toggle_shortlist(document, user.as_deref(), now);
    });

    let store = Arc::clone(&state.store);
    let id = match_id.clone();
    let candidate_match =
        run_blocking(move || store.modify(Collection::Matches, &tenant_id, &id, edit))
            .await?
            .ok_or_else(match_not_found)?;

    let shortlisted = candidate_match
        .get("isShortlisted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    info!("Match {} shortlisted: {}", match_id, shortlisted);

    let message = if shortlisted {
        "Candidate shortlisted"
    } else {
        "Candidate removed from shortlist"
    };
    Ok(Json(json!({
        "success": true,
        "data": candidate_match,
        "message": message,
    })))
}
