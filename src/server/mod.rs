//! Web server for browsing the newspaper archive.
//!
//! Serves a read-only JSON API over newspapers, issues and pages, plus
//! admin endpoints for ingest jobs and the stored page images.

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use handlers::ADMIN_KEY_HEADER;
pub use routes::create_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::repository::{
    DbContext, IngestJobRepository, IssueRepository, NewspaperRepository, PageRepository,
};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub newspapers: Arc<NewspaperRepository>,
    pub issues: Arc<IssueRepository>,
    pub pages: Arc<PageRepository>,
    pub ingest_jobs: Arc<IngestJobRepository>,
    pub images_dir: PathBuf,
    pub admin_api_key: Option<String>,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let ctx = DbContext::from_url(&settings.database_url())?;
        Ok(Self::from_context(&ctx, settings))
    }

    pub fn from_context(ctx: &DbContext, settings: &Settings) -> Self {
        Self {
            newspapers: Arc::new(ctx.newspapers()),
            issues: Arc::new(ctx.issues()),
            pages: Arc::new(ctx.pages()),
            ingest_jobs: Arc::new(ctx.ingest_jobs()),
            images_dir: settings.images_dir(),
            admin_api_key: settings.admin_api_key.clone(),
            cors_origins: settings.cors_origins_list(),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::models::{Issue, JobStatus, OcrOutput, PageStatus};

    const ADMIN_KEY: &str = "test-admin-key";

    async fn setup_test_app() -> (axum::Router, DbContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut settings = Settings::with_data_dir(dir.path());
        settings.admin_api_key = Some(ADMIN_KEY.to_string());
        settings.ensure_directories().unwrap();

        let ctx = DbContext::from_url(&settings.database_url()).unwrap();
        ctx.init_schema().await.unwrap();

        let app = create_router(AppState::from_context(&ctx, &settings));
        (app, ctx, dir)
    }

    async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn seed_issues(ctx: &DbContext, newspaper: &str, count: i64) -> String {
        let paper = ctx.newspapers().get_or_create(newspaper).await.unwrap();
        let first = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        for day in 0..count {
            ctx.issues()
                .create_or_get(&Issue::new(&paper.id, first + Duration::days(day)))
                .await
                .unwrap();
        }
        paper.id
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (app, _ctx, _dir) = setup_test_app().await;

        let (status, json) = get(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["service"], "Time Browser API");
        assert_eq!(json["status"], "running");

        let (status, json) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_issues_has_more() {
        let (app, ctx, _dir) = setup_test_app().await;
        seed_issues(&ctx, "The Daily Courier", 11).await;

        let (status, json) = get(&app, "/api/issues?limit=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["has_more"], true);
        assert_eq!(json["items"].as_array().unwrap().len(), 10);
        assert_eq!(json["total"], 11);
        assert_eq!(json["limit"], 10);
        assert_eq!(json["offset"], 0);
        // Newest first
        assert_eq!(json["items"][0]["issue_date"], "1900-01-11");
        assert!(json["items"][0]["newspaper"].is_null());

        let (_, json) = get(&app, "/api/issues?limit=10&offset=10").await;
        assert_eq!(json["has_more"], false);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
        assert_eq!(json["total"], 11);
    }

    #[tokio::test]
    async fn test_list_issues_exact_page() {
        let (app, ctx, _dir) = setup_test_app().await;
        seed_issues(&ctx, "The Daily Courier", 10).await;

        let (status, json) = get(&app, "/api/issues?limit=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["has_more"], false);
        assert_eq!(json["items"].as_array().unwrap().len(), 10);
        assert_eq!(json["total"], 10);
    }

    #[tokio::test]
    async fn test_list_issues_by_newspaper() {
        let (app, ctx, _dir) = setup_test_app().await;
        let courier = seed_issues(&ctx, "The Daily Courier", 3).await;
        seed_issues(&ctx, "Evening Herald", 2).await;

        let (status, json) = get(&app, &format!("/api/issues?newspaper_id={}", courier)).await;
        assert_eq!(status, StatusCode::OK);
        let items = json["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i["newspaper_id"] == courier.as_str()));
        assert_eq!(json["limit"], 50);
    }

    #[tokio::test]
    async fn test_list_issues_validation() {
        let (app, _ctx, _dir) = setup_test_app().await;

        for uri in [
            "/api/issues?limit=0",
            "/api/issues?limit=101",
            "/api/issues?offset=-1",
            "/api/issues?limit=ten",
            "/api/issues?newspaper_id=not-a-uuid",
        ] {
            let (status, json) = get(&app, uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
            assert!(json["detail"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_issue_detail() {
        let (app, ctx, _dir) = setup_test_app().await;
        let paper = ctx.newspapers().get_or_create("The Daily Courier").await.unwrap();
        let mut draft = Issue::new(&paper.id, NaiveDate::from_ymd_opt(1911, 3, 4).unwrap());
        draft.num_pages = 2;
        let issue = ctx.issues().create_or_get(&draft).await.unwrap();
        for n in [2, 1] {
            ctx.pages()
                .create_or_get(&issue.id, n, &format!("p{}.png", n), PageStatus::OcrPending)
                .await
                .unwrap();
        }

        let (status, json) = get(&app, &format!("/api/issues/{}", issue.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], issue.id.as_str());
        assert_eq!(json["issue_date"], "1911-03-04");
        assert_eq!(json["newspaper"]["name"], "The Daily Courier");
        let pages = json["pages"].as_array().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0]["page_number"], 1);
        assert_eq!(pages[1]["page_number"], 2);
        assert_eq!(pages[0]["ingestion_status"], "ocr_pending");
    }

    #[tokio::test]
    async fn test_issue_not_found() {
        let (app, _ctx, _dir) = setup_test_app().await;

        let uri = format!("/api/issues/{}", uuid::Uuid::new_v4());
        let (status, json) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["detail"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("not found"));
    }

    /// Remove a newspaper while its issues stay behind, bypassing the
    /// foreign key the connection normally enforces.
    async fn orphan_newspaper(
        ctx: &DbContext,
        newspaper_id: &str,
    ) -> Result<(), crate::repository::DbError> {
        use diesel_async::SimpleAsyncConnection;

        crate::with_conn!(ctx.pool(), conn, {
            conn.batch_execute(&format!(
                "PRAGMA foreign_keys = OFF; DELETE FROM newspapers WHERE id = '{}';",
                newspaper_id
            ))
            .await
        })
    }

    #[tokio::test]
    async fn test_issue_with_missing_newspaper_is_server_error() {
        let (app, ctx, _dir) = setup_test_app().await;
        let paper = ctx.newspapers().get_or_create("Vanished Gazette").await.unwrap();
        let orphan = ctx
            .issues()
            .create_or_get(&Issue::new(
                &paper.id,
                NaiveDate::from_ymd_opt(1920, 1, 1).unwrap(),
            ))
            .await
            .unwrap();
        orphan_newspaper(&ctx, &paper.id).await.unwrap();
        assert!(ctx.newspapers().get_by_id(&paper.id).await.unwrap().is_none());

        let (status, json) = get(&app, &format!("/api/issues/{}", orphan.id)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["detail"], "Associated newspaper not found");
    }

    #[tokio::test]
    async fn test_issue_lookup_accepts_any_uuid_spelling() {
        let (app, ctx, _dir) = setup_test_app().await;
        let paper = ctx.newspapers().get_or_create("The Daily Courier").await.unwrap();
        let issue = ctx
            .issues()
            .create_or_get(&Issue::new(
                &paper.id,
                NaiveDate::from_ymd_opt(1915, 5, 8).unwrap(),
            ))
            .await
            .unwrap();

        let upper = issue.id.to_uppercase();
        let simple = issue.id.replace('-', "");
        for id in [issue.id.as_str(), upper.as_str(), simple.as_str()] {
            let (status, json) = get(&app, &format!("/api/issues/{}", id)).await;
            assert_eq!(status, StatusCode::OK, "lookup by {}", id);
            assert_eq!(json["id"], issue.id.as_str());
        }

        let (status, json) = get(
            &app,
            &format!("/api/issues?newspaper_id={}", paper.id.to_uppercase()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_page_detail() {
        let (app, ctx, _dir) = setup_test_app().await;
        let paper = ctx.newspapers().get_or_create("The Daily Courier").await.unwrap();
        let issue = ctx
            .issues()
            .create_or_get(&Issue::new(
                &paper.id,
                NaiveDate::from_ymd_opt(1906, 4, 18).unwrap(),
            ))
            .await
            .unwrap();
        let page = ctx
            .pages()
            .create_or_get(&issue.id, 1, "p1.png", PageStatus::OcrPending)
            .await
            .unwrap();
        let ocr = OcrOutput {
            text: "EXTRA! EXTRA!".to_string(),
            confidence: Some(0.75),
            provider: "stub".to_string(),
            version: None,
            meta: None,
        };
        ctx.pages()
            .update_ocr(&page.id, &ocr, PageStatus::OcrCompleted)
            .await
            .unwrap();

        let (status, json) = get(&app, &format!("/api/pages/{}", page.id.to_uppercase())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], page.id.as_str());
        assert_eq!(json["ocr_text"], "EXTRA! EXTRA!");
        assert_eq!(json["ocr_confidence"], 0.75);
        assert_eq!(json["ocr_provider"], "stub");
        assert_eq!(json["ingestion_status"], "ocr_completed");

        let (status, json) = get(&app, &format!("/api/pages/{}", uuid::Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Page not found");
    }

    #[tokio::test]
    async fn test_jobs_require_admin_key() {
        let (app, ctx, _dir) = setup_test_app().await;
        ctx.ingest_jobs()
            .create_with_key("upload-1", JobStatus::Pending)
            .await
            .unwrap();

        let (status, _) = get(&app, "/api/jobs").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/api/jobs/upload-1")
            .header(ADMIN_KEY_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let list = Request::builder()
            .uri("/api/jobs?status=pending")
            .header(ADMIN_KEY_HEADER, ADMIN_KEY)
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, list).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"][0]["idempotency_key"], "upload-1");
        assert_eq!(json["items"][0]["progress"]["pages_total"], 0);

        let one = Request::builder()
            .uri("/api/jobs/upload-1")
            .header(ADMIN_KEY_HEADER, ADMIN_KEY)
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, one).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "pending");

        let missing = Request::builder()
            .uri("/api/jobs/never-seen")
            .header(ADMIN_KEY_HEADER, ADMIN_KEY)
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, missing).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Job not found");
    }

    #[tokio::test]
    async fn test_serve_file() {
        let (app, _ctx, dir) = setup_test_app().await;
        let issue_dir = dir.path().join("pages").join("issue-1");
        std::fs::create_dir_all(&issue_dir).unwrap();
        std::fs::write(issue_dir.join("page-0001.png"), b"\x89PNG fake").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/files/issue-1/page-0001.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");

        let (status, _) = get(&app, "/files/../timebrowser.db").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&app, "/files/issue-1/page-0002.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let (app, _ctx, _dir) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()["access-control-allow-credentials"],
            "true"
        );
    }
}
