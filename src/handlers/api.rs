use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use validator::Validate;

use crate::error::{ApiError, StoreError};
use crate::models::candidate_match::MatchFilters;
use crate::models::common::{
    ListQuery, PaginatedResponse, PaginationConfig, SortOrder, DEFAULT_SORT_FIELD,
};
use crate::models::interview_kit::InterviewKitFilters;
use crate::models::job::{
    close_if_expired, is_expired_active, ChangeStatusRequest, CreateJobRequest, Job, JobFilters,
    JobListResponse, JobStats, JobStatus, UpdateJobRequest,
};
use crate::models::note::NoteFilters;
use crate::models::resume::ResumeFilters;
use crate::services::database::{
    run_blocking, Collection, Document, DocumentEdit, DocumentStore, Filter, FindOptions,
};
use crate::services::pagination::{build_sort_spec, fetch_page, parse_list_query};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

// AppState struct containing shared resources
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub pagination: PaginationConfig,
}

/// Tenant the request acts for, set by the authentication layer in front of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| TenantId(value.to_string()))
            .ok_or_else(|| {
                warn!("Rejected request without tenant context");
                ApiError::Unauthorized("Not authorized, tenant context missing".to_string())
            })
    }
}

/// Acting user, set by the same authentication layer as the tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("Not authorized, user context missing".to_string()))
    }
}

pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

pub(crate) fn validate<T: Validate>(body: &T) -> Result<(), ApiError> {
    body.validate()
        .map_err(|errors| ApiError::Validation(errors.to_string()))
}

async fn list_collection(
    state: &AppState,
    collection: Collection,
    filter: Filter,
    query: &ListQuery,
) -> Result<PaginatedResponse<Document>, ApiError> {
    let request = parse_list_query(query, &state.pagination);
    info!(
        "Listing {} with page={}, limit={}, sortBy={}, sortOrder={:?}",
        collection.name(),
        request.page,
        request.limit,
        request.sort_field,
        request.sort_order
    );

    let response = fetch_page(Arc::clone(&state.store), collection, filter, &request).await?;
    info!(
        "Returning {} of {} {}",
        response.data.len(),
        response.pagination.total,
        collection.name()
    );
    Ok(response)
}

// List jobs endpoint
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let filter = JobFilters::from_query(&query).to_filter(&tenant_id);
    let response = list_collection(&state, Collection::Jobs, filter, &query).await?;
    Ok(Json(response.into()))
}

pub async fn list_resumes(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResponse<Document>>, ApiError> {
    let filter = ResumeFilters::from_query(&query).to_filter(&tenant_id);
    list_collection(&state, Collection::Resumes, filter, &query)
        .await
        .map(Json)
}

pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResponse<Document>>, ApiError> {
    let filter = MatchFilters::from_query(&query).to_filter(&tenant_id);
    list_collection(&state, Collection::Matches, filter, &query)
        .await
        .map(Json)
}

pub async fn list_interview_kits(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResponse<Document>>, ApiError> {
    let filter = InterviewKitFilters::from_query(&query).to_filter(&tenant_id);
    list_collection(&state, Collection::InterviewKits, filter, &query)
        .await
        .map(Json)
}

pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResponse<Document>>, ApiError> {
    let filter = NoteFilters::from_query(&query).to_filter(&tenant_id);
    list_collection(&state, Collection::Notes, filter, &query)
        .await
        .map(Json)
}

// Job statistics endpoint
pub async fn job_stats(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
) -> Result<Json<Value>, ApiError> {
    let store = Arc::clone(&state.store);
    let filter = Filter::for_tenant(&tenant_id);
    let jobs = run_blocking(move || {
        store.find(Collection::Jobs, &filter, &FindOptions::default())
    })
    .await?;

    let stats = JobStats::from_documents(&jobs);
    info!(
        "Computed job stats for tenant {}: {} jobs, {} active",
        tenant_id, stats.total_jobs, stats.active_jobs
    );

    Ok(Json(json!({ "success": true, "data": stats })))
}

// Active jobs endpoint; an active job past its deadline is left out
pub async fn active_jobs(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
) -> Result<Json<Value>, ApiError> {
    let store = Arc::clone(&state.store);
    let filter = Filter::for_tenant(&tenant_id).equals("status", JobStatus::Active.as_str());
    let options = FindOptions {
        sort: Some(build_sort_spec(DEFAULT_SORT_FIELD, SortOrder::Desc)),
        ..FindOptions::default()
    };
    let mut jobs = run_blocking(move || store.find(Collection::Jobs, &filter, &options)).await?;

    let now = Utc::now();
    jobs.retain(|job| !is_expired_active(job, now));

    Ok(Json(json!({
        "success": true,
        "count": jobs.len(),
        "data": jobs,
    })))
}

// Create job endpoint
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = parse_body(payload)?;
    validate(&request)?;
    info!("Received request to create job: {}", request.title);

    let document = Job::from_request(request, &tenant_id, Utc::now())
        .into_document()
        .map_err(StoreError::from)?;

    let store = Arc::clone(&state.store);
    let job = run_blocking(move || store.insert(Collection::Jobs, document)).await?;

    let job_id = job.get("_id").and_then(Value::as_str).unwrap_or_default();
    info!("Created job {} for tenant {}", job_id, tenant_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": job,
            "message": "Job created successfully",
        })),
    ))
}

// Get single job endpoint
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.clone(), job_id.clone());
    let job = run_blocking(move || store.find_by_id(Collection::Jobs, &tenant, &id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    // View counting must never fail the read
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || {
        if let Err(err) = store.increment(Collection::Jobs, &tenant_id, &job_id, "viewsCount", 1) {
            error!("Failed to increment view count for job {}: {}", job_id, err);
        }
    });

    Ok(Json(json!({ "success": true, "data": job })))
}

/// Writes job changes, closing an active job whose deadline has already passed.
///
/// The merge and the deadline check run as one store operation.
async fn save_job_changes(
    state: &AppState,
    tenant_id: &str,
    job_id: &str,
    changes: Document,
) -> Result<Document, ApiError> {
    let now = Utc::now();
    let id = job_id.to_string();
    let edit: DocumentEdit = Box::new(move |document: &mut Document| {
        document.extend(changes);
        if close_if_expired(document, now) {
            info!("Job {} is past its deadline, closing it", id);
        }
    });

    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.to_string(), job_id.to_string());
    run_blocking(move || store.modify(Collection::Jobs, &tenant, &id, edit))
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}

// Update job endpoint
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(job_id): Path<String>,
    payload: Result<Json<UpdateJobRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = parse_body(payload)?;
    validate(&request)?;
    info!("Received request to update job: {}", job_id);

    let changes = request.into_changes().map_err(StoreError::from)?;
    let job = save_job_changes(&state, &tenant_id, &job_id, changes).await?;

    Ok(Json(json!({
        "success": true,
        "data": job,
        "message": "Job updated successfully",
    })))
}

// Change job status endpoint
pub async fn change_job_status(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(job_id): Path<String>,
    payload: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = parse_body(payload)?;
    let status = JobStatus::parse(&request.status).ok_or_else(|| {
        ApiError::Validation(format!(
            "Invalid status. Must be one of: {}",
            JobStatus::allowed_values()
        ))
    })?;
    info!("Changing status of job {} to {}", job_id, status.as_str());

    let mut changes = Document::new();
    changes.insert("status".to_string(), Value::from(status.as_str()));
    let job = save_job_changes(&state, &tenant_id, &job_id, changes).await?;

    Ok(Json(json!({
        "success": true,
        "data": job,
        "message": format!("Job status changed to {}", status.as_str()),
    })))
}

// Delete job endpoint; matches computed for the job go with it
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    info!("Received request to delete job: {}", job_id);

    let store = Arc::clone(&state.store);
    let (tenant, id) = (tenant_id.clone(), job_id.clone());
    let job = run_blocking(move || store.delete(Collection::Jobs, &tenant, &id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    let store = Arc::clone(&state.store);
    let matches = Filter::for_tenant(&tenant_id).equals("jobId", job_id.as_str());
    let deleted_matches =
        run_blocking(move || store.delete_many(Collection::Matches, &matches)).await?;

    info!(
        "Deleted job {} and {} associated matches",
        job_id, deleted_matches
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "job": job,
            "deletedMatches": deleted_matches,
        },
        "message": "Job deleted successfully",
    })))
}
