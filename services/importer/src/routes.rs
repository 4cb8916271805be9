use crate::infra::{parse_entity, parse_status, AppState};
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use pt_jobs::error::AppError;
use pt_jobs::imports::ImportReport;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImportQuery {
    #[serde(default)]
    pub(crate) dry_run: bool,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// Source name used in reports and for status detection, e.g. `jobs_expired.csv`.
    #[serde(default)]
    pub(crate) source: Option<String>,
}

pub(crate) fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/imports/:entity", post(import_endpoint))
        .route("/api/v1/exports/:entity", get(export_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn import_endpoint(
    Extension(state): Extension<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Result<Json<ImportReport>, AppError> {
    let entity = parse_entity(&entity)?;
    if body.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "request body must be a CSV document with a header row".to_string(),
        ));
    }

    let status = parse_status(query.status.as_deref())?;
    let options = state.imports.options(query.dry_run, status, query.limit);
    let name = query.source.unwrap_or_else(|| format!("{entity}.csv"));

    let report = state
        .imports
        .import_csv(entity, name, body.into_bytes(), options)
        .await?;
    Ok(Json(report))
}

pub(crate) async fn export_endpoint(
    Extension(state): Extension<AppState>,
    Path(entity): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = parse_entity(&entity)?;
    let body = state.imports.export_csv(entity).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ImportState;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pt_jobs::records::{EntityKind, MemoryStore, RecordStore};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(store_path: Option<PathBuf>) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            imports: ImportState {
                store: Arc::new(MemoryStore::new()),
                gate: Arc::default(),
                store_path,
                notifier: None,
                currency: "CAD".to_string(),
            },
        }
    }

    fn app(state: AppState) -> Router {
        router().layer(Extension(state))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    fn post_csv(uri: &str, csv: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(csv.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_flagged() {
        let state = test_state(None);
        state
            .readiness
            .store(false, std::sync::atomic::Ordering::Release);

        let response = app(state)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request builds"))
            .await
            .expect("route responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn import_endpoint_returns_report_and_persists() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store_path = dir.path().join("store.json");
        let state = test_state(Some(store_path.clone()));

        let response = app(state.clone())
            .oneshot(post_csv(
                "/api/v1/imports/employers",
                "Email,Company\nhr@northside.ca,Northside Physio\n",
            ))
            .await
            .expect("route responds");
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["entity"], "employer");
        assert_eq!(body["stats"]["created"], 1);
        assert_eq!(state.imports.store.count(EntityKind::Employer), 1);
        assert!(store_path.exists());
    }

    #[tokio::test]
    async fn dry_run_import_leaves_store_empty() {
        let state = test_state(None);
        let response = app(state.clone())
            .oneshot(post_csv(
                "/api/v1/imports/jobseekers?dry_run=true&status=pending",
                "Email Address,Full Name\njane@example.com,Jane Doe\n",
            ))
            .await
            .expect("route responds");

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["stats"]["created"], 1);
        assert_eq!(state.imports.store.count(EntityKind::JobSeeker), 0);
    }

    #[tokio::test]
    async fn missing_columns_are_a_bad_request() {
        let response = app(test_state(None))
            .oneshot(post_csv("/api/v1/imports/jobs", "Title\nPhysiotherapist\n"))
            .await
            .expect("route responds");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("missing required columns"));
    }

    #[tokio::test]
    async fn unknown_entity_is_not_found() {
        let response = app(test_state(None))
            .oneshot(
                Request::get("/api/v1/exports/packages")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_endpoint_streams_csv() {
        let state = test_state(None);
        state
            .imports
            .import_csv(
                EntityKind::Employer,
                "employers.csv".to_string(),
                b"Email,Company\nhr@harbour.ca,Harbour Clinic\n".to_vec(),
                state.imports.options(false, None, None),
            )
            .await
            .expect("seed import");

        let response = app(state)
            .oneshot(
                Request::get("/api/v1/exports/employers")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let csv = body_text(response).await;
        assert!(csv.starts_with("id,email,"));
        assert!(csv.contains("hr@harbour.ca"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_imports_keep_committed_rows() {
        let state = test_state(None);
        let mut rehearsal = String::from("Email,Company\n");
        for index in 0..3000 {
            rehearsal.push_str(&format!("trial{index}@clinic.ca,Trial Clinic {index}\n"));
        }

        let dry_run = app(state.clone()).oneshot(post_csv(
            "/api/v1/imports/employers?dry_run=true",
            &rehearsal,
        ));
        let live = app(state.clone()).oneshot(post_csv(
            "/api/v1/imports/employers",
            "Email,Company\nhr@northside.ca,Northside Physio\n",
        ));
        let (dry_run, live) = tokio::join!(dry_run, live);

        assert_eq!(dry_run.expect("route responds").status(), StatusCode::OK);
        assert_eq!(live.expect("route responds").status(), StatusCode::OK);
        let employers = state
            .imports
            .store
            .all(EntityKind::Employer)
            .expect("all employers");
        assert_eq!(employers.len(), 1);
        assert_eq!(employers[0].text("email"), Some("hr@northside.ca"));
    }
}
