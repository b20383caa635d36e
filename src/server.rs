use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use log::{error, info};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::data::{PreferenceEntry, ReservationRecord, SchedulingInput, SchedulingOutput};
use crate::error::SolveError;
use crate::{preferences, solver};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn status_for(err: &SolveError) -> StatusCode {
    match err {
        SolveError::Infeasible => StatusCode::UNPROCESSABLE_ENTITY,
        SolveError::DomainViolation { .. } => StatusCode::BAD_REQUEST,
        SolveError::Interrupted => StatusCode::SERVICE_UNAVAILABLE,
        SolveError::DuplicateVariable(_)
        | SolveError::UnboundedVariable(_)
        | SolveError::Backend(_)
        | SolveError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn solve_handler(
    State(config): State<Arc<EngineConfig>>,
    Json(input): Json<SchedulingInput>,
) -> ApiResult<SchedulingOutput> {
    let outcome = tokio::task::spawn_blocking(move || solver::solve(&input, &config))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match outcome {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            error!("Solve failed: {}", e);
            Err((status_for(&e), e.to_string()))
        }
    }
}

async fn extract_handler(
    State(config): State<Arc<EngineConfig>>,
    Json(records): Json<Vec<ReservationRecord>>,
) -> Json<Vec<PreferenceEntry>> {
    Json(preferences::extract(&records, &config.catalog).to_entries())
}

async fn config_handler(State(config): State<Arc<EngineConfig>>) -> Json<EngineConfig> {
    Json(config.as_ref().clone())
}

async fn health() -> &'static str {
    "ok"
}

pub fn router(config: Arc<EngineConfig>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(config_handler))
        .route("/v1/preferences/extract", post(extract_handler))
        .route("/v1/schedule/solve", post(solve_handler))
        .with_state(config)
}

pub async fn run_server(config: Arc<EngineConfig>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(EngineConfig {
            backend: BackendKind::Search,
            ..EngineConfig::default()
        }))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_solve_endpoint_returns_schedule() {
        let body = json!({
            "offerings": [{
                "code": "IT00AA01",
                "teacher": "Smith",
                "group": "G1",
                "name": "Algorithms",
                "starts": "2023-09-04T00:00:00",
                "ends": "2023-10-29T00:00:00"
            }]
        });
        let (status, bytes) = post_json(app(), "/v1/schedule/solve", body).await;
        assert_eq!(status, StatusCode::OK);
        let output: SchedulingOutput = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(output.schedule.len(), 2);
        assert!(output.schedule.iter().all(|e| e.period == "2023-P1"));
        assert_ne!(output.schedule[0].day, output.schedule[1].day);
    }

    #[tokio::test]
    async fn test_infeasible_maps_to_422() {
        let body = json!({
            "offerings": [{
                "code": "IT00AA01",
                "teacher": "Smith",
                "group": "G1",
                "name": "Algorithms",
                "starts": "2023-09-04T00:00:00",
                "ends": "2023-10-29T00:00:00"
            }],
            "preferences": [{
                "courseCode": "IT00AA01",
                "teacher": "Smith",
                "slots": [{"day": 0, "slot": 0}]
            }]
        });
        let (status, _) = post_json(app(), "/v1/schedule/solve", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_extract_endpoint() {
        let body = json!([
            {"courseVersion": "IT00AA01-3001", "bookedFor": "Smith", "starts": "18.09.2023 08.15"},
            {"courseVersion": "IT00AA01-3001", "bookedFor": "Smith", "starts": "23.09.2023 08.15"}
        ]);
        let (status, bytes) = post_json(app(), "/v1/preferences/extract", body).await;
        assert_eq!(status, StatusCode::OK);
        let entries: Vec<PreferenceEntry> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].slots.len(), 1);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&SolveError::Interrupted), StatusCode::SERVICE_UNAVAILABLE);
        let violation = SolveError::DomainViolation {
            what: "fixed day".into(),
            value: 7,
            bound: 5,
        };
        assert_eq!(status_for(&violation), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&SolveError::InvalidConfig("no rooms".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
