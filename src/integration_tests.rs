#[cfg(test)]
mod integration_tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::{TestRequest, TestServer, TestServerConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    use crate::handlers::api::AppState;
    use crate::models::common::PaginationConfig;
    use crate::routes::create_router;
    use crate::services::database::{
        create_database_service, Collection, CsvDocumentStore, Document, DocumentStore, Filter,
    };

    const TENANT: &str = "tenant-a";

    // The TempDir must outlive the server or the collection files disappear
    struct TestEnvironment {
        server: TestServer,
        store: Arc<CsvDocumentStore>,
        _dir: TempDir,
    }

    impl TestEnvironment {
        fn get(&self, path: &str) -> TestRequest {
            self.server.get(path).add_header(tenant_name(), tenant_value())
        }
    }

    fn tenant_name() -> HeaderName {
        HeaderName::from_static("x-tenant-id")
    }

    fn tenant_value() -> HeaderValue {
        HeaderValue::from_static(TENANT)
    }

    // Tenant plus acting user, as the authentication layer would set them
    fn as_user(request: TestRequest, user: &'static str) -> TestRequest {
        request
            .add_header(tenant_name(), tenant_value())
            .add_header(HeaderName::from_static("x-user-id"), HeaderValue::from_static(user))
    }

    fn setup_test_environment() -> TestEnvironment {
        let dir = tempdir().unwrap();
        let store = create_database_service(dir.path()).unwrap();

        let app_state = Arc::new(AppState {
            store: Arc::clone(&store) as Arc<dyn DocumentStore>,
            pagination: PaginationConfig::default(),
        });

        let config = TestServerConfig::builder().mock_transport().build();
        let server = TestServer::new_with_config(create_router(app_state), config).unwrap();

        TestEnvironment {
            server,
            store,
            _dir: dir,
        }
    }

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn seed(env: &TestEnvironment, collection: Collection, value: Value) -> String {
        let stored = env.store.insert(collection, document(value)).unwrap();
        stored["_id"].as_str().unwrap().to_string()
    }

    fn seed_job(env: &TestEnvironment, title: &str, status: &str, created_at: &str) -> String {
        seed(
            env,
            Collection::Jobs,
            json!({
                "tenantId": TENANT,
                "title": title,
                "description": format!("We are hiring a {}", title),
                "status": status,
                "location": {"type": "remote"},
                "createdAt": created_at,
            }),
        )
    }

    fn job_titles(body: &Value) -> Vec<String> {
        body["data"]["jobs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|job| job["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let env = setup_test_environment();

        let response = env.server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_default_listing_returns_everything_newest_first() {
        let env = setup_test_environment();
        seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        seed_job(&env, "Data Analyst", "active", "2025-01-02T00:00:00.000Z");

        let response = env.get("/api/jobs").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();

        assert_eq!(body["success"], json!(true));
        assert_eq!(job_titles(&body), vec!["Data Analyst", "Backend Engineer"]);
        let pagination = &body["data"]["pagination"];
        assert_eq!(pagination["total"], json!(2));
        assert_eq!(pagination["page"], json!(1));
        assert_eq!(pagination["limit"], json!(20));
        assert_eq!(pagination["totalPages"], json!(1));
        assert_eq!(pagination["hasNextPage"], json!(false));
        assert_eq!(pagination["hasPrevPage"], json!(false));
    }

    #[tokio::test]
    async fn test_one_per_page_walks_both_pages() {
        let env = setup_test_environment();
        seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        seed_job(&env, "Data Analyst", "active", "2025-01-02T00:00:00.000Z");

        let body: Value = env
            .get("/api/jobs")
            .add_query_param("page", 1)
            .add_query_param("limit", 1)
            .await
            .json();
        assert_eq!(job_titles(&body), vec!["Data Analyst"]);
        assert_eq!(body["data"]["pagination"]["page"], json!(1));
        assert_eq!(body["data"]["pagination"]["pages"], json!(2));
        assert_eq!(body["data"]["pagination"]["nextPage"], json!(2));

        let body: Value = env
            .get("/api/jobs")
            .add_query_param("page", 2)
            .add_query_param("limit", 1)
            .await
            .json();
        assert_eq!(job_titles(&body), vec!["Backend Engineer"]);
        assert_eq!(body["data"]["pagination"]["hasNextPage"], json!(false));
        assert_eq!(body["data"]["pagination"]["prevPage"], json!(1));
    }

    #[tokio::test]
    async fn test_status_filter_narrows_the_total() {
        let env = setup_test_environment();
        seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        seed_job(&env, "Data Analyst", "closed", "2025-01-02T00:00:00.000Z");
        seed_job(&env, "Product Designer", "active", "2025-01-03T00:00:00.000Z");

        let body: Value = env
            .get("/api/jobs")
            .add_query_param("status", "active")
            .await
            .json();
        assert_eq!(body["data"]["pagination"]["total"], json!(2));
        assert_eq!(
            job_titles(&body),
            vec!["Product Designer", "Backend Engineer"]
        );

        let body: Value = env
            .get("/api/jobs")
            .add_query_param("search", "analyst")
            .await
            .json();
        assert_eq!(job_titles(&body), vec!["Data Analyst"]);
    }

    #[tokio::test]
    async fn test_other_tenants_are_invisible() {
        let env = setup_test_environment();
        seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        seed(
            &env,
            Collection::Jobs,
            json!({"tenantId": "tenant-b", "title": "Hidden", "status": "active"}),
        );

        let body: Value = env.get("/api/jobs").await.json();
        assert_eq!(job_titles(&body), vec!["Backend Engineer"]);
        assert_eq!(body["data"]["pagination"]["total"], json!(1));
    }

    #[tokio::test]
    async fn test_sort_order_and_field_selection() {
        let env = setup_test_environment();
        seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        seed_job(&env, "Data Analyst", "active", "2025-01-02T00:00:00.000Z");

        let body: Value = env
            .get("/api/jobs")
            .add_query_param("sortBy", "createdAt")
            .add_query_param("sortOrder", "asc")
            .add_query_param("fields", "title")
            .await
            .json();
        assert_eq!(job_titles(&body), vec!["Backend Engineer", "Data Analyst"]);
        for job in body["data"]["jobs"].as_array().unwrap() {
            let mut keys: Vec<&str> = job.as_object().unwrap().keys().map(String::as_str).collect();
            keys.sort_unstable();
            assert_eq!(keys, vec!["_id", "title"]);
        }

        // Anything but the exact "asc" sorts descending
        let body: Value = env
            .get("/api/jobs")
            .add_query_param("sortOrder", "ASC")
            .await
            .json();
        assert_eq!(job_titles(&body), vec!["Data Analyst", "Backend Engineer"]);
    }

    #[tokio::test]
    async fn test_generic_envelope_reports_out_of_range_page() {
        let env = setup_test_environment();
        for name in ["ada.pdf", "grace.pdf", "linus.pdf"] {
            seed(
                &env,
                Collection::Resumes,
                json!({"tenantId": TENANT, "fileName": name, "status": "new"}),
            );
        }

        let response = env
            .get("/api/resumes")
            .add_query_param("page", 5)
            .add_query_param("limit", 2)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();

        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"], json!([]));
        let pagination = &body["pagination"];
        assert_eq!(pagination["page"], json!(5));
        assert_eq!(pagination["total"], json!(3));
        assert_eq!(pagination["totalPages"], json!(2));
        assert_eq!(pagination["hasNextPage"], json!(false));
        assert_eq!(pagination["hasPrevPage"], json!(true));
        assert_eq!(pagination["nextPage"], Value::Null);
        assert_eq!(pagination["prevPage"], json!(4));
    }

    #[tokio::test]
    async fn test_match_score_threshold() {
        let env = setup_test_environment();
        for score in [55, 70, 92] {
            seed(
                &env,
                Collection::Matches,
                json!({"tenantId": TENANT, "jobId": "j1", "overallScore": score}),
            );
        }

        let body: Value = env
            .get("/api/matches")
            .add_query_param("jobId", "j1")
            .add_query_param("minScore", 70)
            .await
            .json();
        assert_eq!(body["pagination"]["total"], json!(2));

        let body: Value = env
            .get("/api/matches")
            .add_query_param("minScore", 0)
            .await
            .json();
        assert_eq!(body["pagination"]["total"], json!(3));
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let env = setup_test_environment();

        let response = env
            .server
            .post("/api/jobs")
            .add_header(tenant_name(), tenant_value())
            .json(&json!({
                "title": "  Platform Engineer ",
                "description": "Own the deploy pipeline",
                "location": {"type": "hybrid", "city": "Berlin"},
                "status": "active",
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["message"], json!("Job created successfully"));
        assert_eq!(body["data"]["title"], json!("Platform Engineer"));
        assert_eq!(body["data"]["tenantId"], json!(TENANT));
        let job_id = body["data"]["_id"].as_str().unwrap().to_string();

        let body: Value = env.get(&format!("/api/jobs/{}", job_id)).await.json();
        assert_eq!(body["data"]["location"]["city"], json!("Berlin"));

        let response = env
            .server
            .put(&format!("/api/jobs/{}", job_id))
            .add_header(tenant_name(), tenant_value())
            .json(&json!({"title": "Staff Platform Engineer"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["title"], json!("Staff Platform Engineer"));
        assert_eq!(body["data"]["description"], json!("Own the deploy pipeline"));

        let response = env
            .server
            .patch(&format!("/api/jobs/{}/status", job_id))
            .add_header(tenant_name(), tenant_value())
            .json(&json!({"status": "paused"}))
            .await;
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], json!("paused"));
        assert_eq!(body["message"], json!("Job status changed to paused"));

        let body: Value = env
            .get("/api/jobs")
            .add_query_param("status", "paused")
            .await
            .json();
        assert_eq!(body["data"]["pagination"]["total"], json!(1));
    }

    #[tokio::test]
    async fn test_active_job_past_deadline_is_closed() {
        let env = setup_test_environment();

        let response = env
            .server
            .post("/api/jobs")
            .add_header(tenant_name(), tenant_value())
            .json(&json!({
                "title": "Seasonal Support",
                "description": "Winter rush",
                "status": "active",
                "deadline": "2020-01-01T00:00:00Z",
            }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], json!("closed"));
    }

    #[tokio::test]
    async fn test_deleting_job_removes_its_matches() {
        let env = setup_test_environment();
        let job_id = seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        for resume in ["r1", "r2"] {
            seed(
                &env,
                Collection::Matches,
                json!({"tenantId": TENANT, "jobId": job_id, "resumeId": resume}),
            );
        }
        seed(
            &env,
            Collection::Matches,
            json!({"tenantId": TENANT, "jobId": "another-job", "resumeId": "r1"}),
        );

        let response = env
            .server
            .delete(&format!("/api/jobs/{}", job_id))
            .add_header(tenant_name(), tenant_value())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["deletedMatches"], json!(2));
        assert_eq!(body["data"]["job"]["title"], json!("Backend Engineer"));

        let response = env.get(&format!("/api/jobs/{}", job_id)).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let remaining = env
            .store
            .count(Collection::Matches, &Filter::for_tenant(TENANT))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_blank_job_title_is_rejected() {
        let env = setup_test_environment();

        let response = env
            .server
            .post("/api/jobs")
            .add_header(tenant_name(), tenant_value())
            .json(&json!({"title": "   ", "description": "Own the deploy pipeline"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = env.get("/api/jobs").await.json();
        assert_eq!(body["data"]["pagination"]["total"], json!(0));

        let job_id = seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        let response = env
            .server
            .put(&format!("/api/jobs/{}", job_id))
            .add_header(tenant_name(), tenant_value())
            .json(&json!({"title": "  "}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let body: Value = env.get(&format!("/api/jobs/{}", job_id)).await.json();
        assert_eq!(body["data"]["title"], json!("Backend Engineer"));
    }

    #[tokio::test]
    async fn test_update_with_past_deadline_closes_job() {
        let env = setup_test_environment();
        let job_id = seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");

        let response = env
            .server
            .put(&format!("/api/jobs/{}", job_id))
            .add_header(tenant_name(), tenant_value())
            .json(&json!({"deadline": "2020-01-01T00:00:00Z"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], json!("closed"));

        let stored = env
            .store
            .find_by_id(Collection::Jobs, TENANT, &job_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored["status"], json!("closed"));
    }

    #[tokio::test]
    async fn test_job_stats_and_active_jobs() {
        let env = setup_test_environment();
        for (title, status, deadline, created_at, applicants, views) in [
            ("Backend Engineer", "active", None, "2025-01-01T00:00:00.000Z", 4, 10),
            ("Data Analyst", "active", Some("2999-01-01T00:00:00Z"), "2025-01-03T00:00:00.000Z", 2, 6),
            ("Seasonal Support", "active", Some("2020-01-01T00:00:00Z"), "2025-01-04T00:00:00.000Z", 1, 1),
            ("Product Designer", "closed", None, "2025-01-02T00:00:00.000Z", 3, 0),
        ] {
            seed(
                &env,
                Collection::Jobs,
                json!({
                    "tenantId": TENANT,
                    "title": title,
                    "status": status,
                    "deadline": deadline,
                    "createdAt": created_at,
                    "applicantsCount": applicants,
                    "viewsCount": views,
                }),
            );
        }
        seed(
            &env,
            Collection::Jobs,
            json!({"tenantId": "tenant-b", "title": "Hidden", "status": "active"}),
        );

        let response = env.get("/api/jobs/stats/summary").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        let stats = &body["data"];
        assert_eq!(stats["totalJobs"], json!(4));
        assert_eq!(stats["activeJobs"], json!(3));
        assert_eq!(stats["totalApplicants"], json!(10));
        assert_eq!(stats["totalViews"], json!(17));
        assert_eq!(stats["statusBreakdown"][0]["_id"], json!("active"));
        assert_eq!(stats["statusBreakdown"][0]["count"], json!(3));
        assert_eq!(stats["statusBreakdown"][1]["_id"], json!("closed"));

        let response = env.get("/api/jobs/active").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["count"], json!(2));
        let titles: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|job| job["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Data Analyst", "Backend Engineer"]);
    }

    #[tokio::test]
    async fn test_note_lifecycle_is_owned_by_its_author() {
        let env = setup_test_environment();
        let job_id = seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");

        let response = as_user(env.server.post("/api/notes"), "recruiter-1")
            .json(&json!({
                "relatedTo": {"type": "job", "id": job_id},
                "content": "  Strong systems background ",
                "tags": [" rust ", ""],
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: Value = response.json();
        let note = &body["data"];
        assert_eq!(note["content"], json!("Strong systems background"));
        assert_eq!(note["type"], json!("general"));
        assert_eq!(note["userId"], json!("recruiter-1"));
        assert_eq!(note["tags"], json!(["rust"]));
        assert_eq!(note["relatedTo"]["model"], json!("Job"));
        assert_eq!(note["metadata"]["jobTitle"], json!("Backend Engineer"));
        let note_id = note["_id"].as_str().unwrap().to_string();
        let note_path = format!("/api/notes/{}", note_id);

        let response = as_user(env.server.post("/api/notes"), "recruiter-1")
            .json(&json!({"relatedTo": {"type": "job", "id": "missing"}, "content": "Orphan"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], json!("job not found or access denied"));

        let response = as_user(env.server.put(&note_path), "recruiter-2")
            .json(&json!({"content": "Rewritten"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["error"], json!("Unauthorized to update this note"));

        let response = as_user(env.server.put(&note_path), "recruiter-1")
            .json(&json!({"content": " Follow up next week ", "type": "follow-up"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["content"], json!("Follow up next week"));
        assert_eq!(body["data"]["type"], json!("follow-up"));
        assert_eq!(body["data"]["userId"], json!("recruiter-1"));

        let pin_path = format!("{}/pin", note_path);
        let body: Value = as_user(env.server.patch(&pin_path), "recruiter-1").await.json();
        assert_eq!(body["data"]["isPinned"], json!(true));
        let body: Value = env
            .get("/api/notes")
            .add_query_param("isPinned", "true")
            .await
            .json();
        assert_eq!(body["pagination"]["total"], json!(1));
        let body: Value = as_user(env.server.patch(&pin_path), "recruiter-1").await.json();
        assert_eq!(body["data"]["isPinned"], json!(false));

        let response = as_user(env.server.delete(&note_path), "recruiter-2").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        let response = as_user(env.server.delete(&note_path), "recruiter-1").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["message"], json!("Note deleted successfully"));

        let response = env.get(&note_path).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_note_on_match_names_job_and_candidate() {
        let env = setup_test_environment();
        let job_id = seed_job(&env, "Backend Engineer", "active", "2025-01-01T00:00:00.000Z");
        let resume_id = seed(
            &env,
            Collection::Resumes,
            json!({"tenantId": TENANT, "personalInfo": {"fullName": "Ada Lovelace"}}),
        );
        let match_id = seed(
            &env,
            Collection::Matches,
            json!({"tenantId": TENANT, "jobId": job_id, "resumeId": resume_id}),
        );

        let response = as_user(env.server.post("/api/notes"), "recruiter-1")
            .json(&json!({
                "relatedTo": {"type": "match", "id": match_id},
                "content": "Schedule a screening call",
                "type": "screening",
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["data"]["relatedTo"]["model"], json!("Match"));
        assert_eq!(body["data"]["metadata"]["jobTitle"], json!("Backend Engineer"));
        assert_eq!(body["data"]["metadata"]["candidateName"], json!("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_match_review_and_shortlist() {
        let env = setup_test_environment();
        let match_id = seed(
            &env,
            Collection::Matches,
            json!({"tenantId": TENANT, "jobId": "j1", "resumeId": "r1", "status": "completed"}),
        );

        let response = as_user(
            env.server.patch(&format!("/api/matches/{}/status", match_id)),
            "recruiter-1",
        )
        .json(&json!({"status": "reviewed", "notes": "Good culture fit"}))
        .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], json!("reviewed"));
        assert_eq!(body["data"]["reviewedBy"], json!("recruiter-1"));
        assert_eq!(body["data"]["reviewNotes"], json!("Good culture fit"));
        assert!(body["data"]["reviewedAt"].is_string());

        let shortlist_path = format!("/api/matches/{}/shortlist", match_id);
        let body: Value = as_user(env.server.patch(&shortlist_path), "recruiter-1")
            .await
            .json();
        assert_eq!(body["message"], json!("Candidate shortlisted"));
        assert_eq!(body["data"]["isShortlisted"], json!(true));
        assert_eq!(body["data"]["shortlistedBy"], json!("recruiter-1"));

        let body: Value = as_user(env.server.patch(&shortlist_path), "recruiter-1")
            .await
            .json();
        assert_eq!(body["message"], json!("Candidate removed from shortlist"));
        assert_eq!(body["data"]["isShortlisted"], json!(false));
        assert!(body["data"].get("shortlistedBy").is_none());

        let body: Value = env.get(&format!("/api/matches/{}", match_id)).await.json();
        assert_eq!(body["data"]["status"], json!("reviewed"));

        let response = as_user(
            env.server.patch("/api/matches/missing/shortlist"),
            "recruiter-1",
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
