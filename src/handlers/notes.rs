use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, StoreError};
use crate::handlers::api::{parse_body, validate, AppState, TenantId, UserId};
use crate::models::note::{
    toggle_pin, CreateNoteRequest, Note, NoteMetadata, RelatedType, UpdateNoteRequest,
};
use crate::services::database::{lookup, run_blocking, Collection, Document, DocumentEdit};

async fn find_in_tenant(
    state: &AppState,
    collection: Collection,
    tenant_id: &str,
    id: &str,
) -> Result<Option<Document>, ApiError> {
    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.to_string(), id.to_string());
    Ok(run_blocking(move || store.find_by_id(collection, &tenant, &id)).await?)
}

fn text_at(document: &Document, path: &str) -> Option<String> {
    lookup(document, path)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn candidate_name(resume: &Document) -> Option<String> {
    text_at(resume, "personalInfo.fullName").or_else(|| text_at(resume, "candidateInfo.name"))
}

/// Denormalized labels shown next to a note, taken from the record it is attached to.
async fn related_metadata(
    state: &AppState,
    tenant_id: &str,
    related_type: RelatedType,
    related: &Document,
) -> Result<NoteMetadata, ApiError> {
    let metadata = match related_type {
        RelatedType::Job => NoteMetadata {
            job_title: text_at(related, "title"),
            ..NoteMetadata::default()
        },
        RelatedType::Resume => NoteMetadata {
            candidate_name: candidate_name(related),
            ..NoteMetadata::default()
        },
        RelatedType::Match => {
            let job = match text_at(related, "jobId") {
                Some(job_id) => find_in_tenant(state, Collection::Jobs, tenant_id, &job_id).await?,
                None => None,
            };
            let resume = match text_at(related, "resumeId") {
                Some(resume_id) => {
                    find_in_tenant(state, Collection::Resumes, tenant_id, &resume_id).await?
                }
                None => None,
            };
            NoteMetadata {
                job_title: job.as_ref().and_then(|job| text_at(job, "title")),
                candidate_name: resume.as_ref().and_then(candidate_name),
            }
        }
    };
    Ok(metadata)
}

/// Loads a note and checks that `user_id` wrote it.
async fn owned_note(
    state: &AppState,
    tenant_id: &str,
    user_id: &str,
    note_id: &str,
    action: &str,
) -> Result<Document, ApiError> {
    let note = find_in_tenant(state, Collection::Notes, tenant_id, note_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    let author = lookup(&note, "userId").and_then(Value::as_str);
    if author != Some(user_id) {
        warn!("User {} may not {} note {}", user_id, action, note_id);
        return Err(ApiError::Forbidden(format!(
            "Unauthorized to {} this note",
            action
        )));
    }
    Ok(note)
}

// Create note endpoint
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    UserId(user_id): UserId,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = parse_body(payload)?;
    validate(&request)?;

    let related_type = request.related_to.related_type;
    let related = find_in_tenant(
        &state,
        related_type.collection(),
        &tenant_id,
        &request.related_to.id,
    )
    .await?
    .ok_or_else(|| {
        ApiError::NotFound(format!("{} not found or access denied", related_type.as_str()))
    })?;

    let metadata = related_metadata(&state, &tenant_id, related_type, &related).await?;
    let document = Note::from_request(request, &tenant_id, &user_id, metadata)
        .into_document()
        .map_err(StoreError::from)?;

    let store = Arc::clone(&state.store);
    let note = run_blocking(move || store.insert(Collection::Notes, document)).await?;

    let note_id = note.get("_id").and_then(Value::as_str).unwrap_or_default();
    info!(
        "Created note {} on {} for tenant {}",
        note_id,
        related_type.as_str(),
        tenant_id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": note,
            "message": "Note created successfully",
        })),
    ))
}

pub async fn get_note(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(note_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let note = find_in_tenant(&state, Collection::Notes, &tenant_id, &note_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": note })))
}

// Update note endpoint; only the author may edit
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    UserId(user_id): UserId,
    Path(note_id): Path<String>,
    payload: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = parse_body(payload)?;
    validate(&request)?;
    owned_note(&state, &tenant_id, &user_id, &note_id, "update").await?;

    let changes = request.into_changes().map_err(StoreError::from)?;
    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.clone(), note_id.clone());
    let note = run_blocking(move || store.update(Collection::Notes, &tenant, &id, changes))
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    info!("Updated note {}", note_id);
    Ok(Json(json!({
        "success": true,
        "data": note,
        "message": "Note updated successfully",
    })))
}

pub async fn toggle_note_pin(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    UserId(user_id): UserId,
    Path(note_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    owned_note(&state, &tenant_id, &user_id, &note_id, "pin").await?;

    let edit: DocumentEdit = Box::new(toggle_pin);
    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.clone(), note_id.clone());
    let note = run_blocking(move || store.modify(Collection::Notes, &tenant, &id, edit))
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    let pinned = note
        .get("isPinned")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    info!("Note {} pinned: {}", note_id, pinned);

    Ok(Json(json!({ "success": true, "data": note })))
}

pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    UserId(user_id): UserId,
    Path(note_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    owned_note(&state, &tenant_id, &user_id, &note_id, "delete").await?;

    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.clone(), note_id.clone());
    run_blocking(move || store.delete(Collection::Notes, &tenant, &id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    info!("Deleted note {}", note_id);
    Ok(Json(json!({
        "success": true,
        "message": "Note deleted successfully",
    })))
}
