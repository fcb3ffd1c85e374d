use axum::{
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    active_jobs, change_job_status, create_job, delete_job, get_job, job_stats,
    list_interview_kits, list_jobs, list_matches, list_notes, list_resumes, update_job, AppState,
};
use crate::handlers::health::health_check;
use crate::handlers::matches::{get_match, toggle_match_shortlist, update_match_status};
use crate::handlers::notes::{create_note, delete_note, get_note, toggle_note_pin, update_note};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));

    // Static segments win over `:id`
    let job_routes = Router::new()
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/active", get(active_jobs))
        .route("/api/jobs/stats/summary", get(job_stats))
        .route(
            "/api/jobs/:id",
            get(get_job).put(update_job).delete(delete_job),
        )
        .route("/api/jobs/:id/status", patch(change_job_status));

    let note_routes = Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/:id",
            get(get_note).put(update_note).delete(delete_note),
        )
        .route("/api/notes/:id/pin", patch(toggle_note_pin));

    let match_routes = Router::new()
        .route("/api/matches", get(list_matches))
        .route("/api/matches/:id", get(get_match))
        .route("/api/matches/:id/status", patch(update_match_status))
        .route("/api/matches/:id/shortlist", patch(toggle_match_shortlist));

    // Remaining collections are list-only
    let list_routes = Router::new()
        .route("/api/resumes", get(list_resumes))
        .route("/api/interviews", get(list_interview_kits));

    info!(
        "API routes enabled with default page size {} (max {})",
        app_state.pagination.default_limit, app_state.pagination.max_limit
    );

    Router::new()
        .merge(health_route)
        .merge(job_routes)
        .merge(note_routes)
        .merge(match_routes)
        .merge(list_routes)
        .with_state(app_state)
}
