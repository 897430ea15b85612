use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use log::{error, info};

use crate::config::SchedulerConfig;
use crate::data::SchedulingInput;
use crate::error::SchedulerError;
use crate::pipeline::{ScheduleOutcome, SchedulingOptimizer};

fn status_for(e: &SchedulerError) -> StatusCode {
    match e {
        SchedulerError::Data(_) | SchedulerError::Model(_) | SchedulerError::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        SchedulerError::Infeasible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulerError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        SchedulerError::Solver(_) | SchedulerError::Decode(_) | SchedulerError::Verification { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn solve_handler(
    State(config): State<Arc<SchedulerConfig>>,
    Json(input): Json<SchedulingInput>,
) -> Result<Json<ScheduleOutcome>, (StatusCode, String)> {
    // HiGHS blocks; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        SchedulingOptimizer::new(config.as_ref().clone()).optimize(&input)
    })
    .await
    .map_err(|e| {
        error!("Optimization task failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    match outcome {
        Ok(output) => Ok(Json(output)),
        Err(e) => Err((status_for(&e), e.to_string())),
    }
}

pub fn router(config: SchedulerConfig) -> Router {
    Router::new()
        .route("/v1/schedule/solve", post(solve_handler))
        .with_state(Arc::new(config))
}

pub async fn run_server(config: SchedulerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/schedule/solve")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn out_of_range_rank_is_bad_request() {
        let response = router(SchedulerConfig::default())
            .oneshot(request(serde_json::json!({
                "preferences": [{"course": "HIST101", "ranks": [1, 2, 3, 4, 5, 6, 7, 8, 9, 42]}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("rank 42"));
    }

    #[tokio::test]
    async fn solves_and_returns_entries() {
        let preferences: Vec<_> = (0..10)
            .map(|i| {
                serde_json::json!({
                    "course": format!("HIST{i}"),
                    "ranks": (1..=10).map(|r| ((r + i) % 10) + 1).collect::<Vec<i32>>()
                })
            })
            .collect();
        let response = router(SchedulerConfig::default())
            .oneshot(request(serde_json::json!({
                "courses": [{"id": "HIST0", "faculty": "Adams"}],
                "faculty": [{"name": "Adams", "voting": true}],
                "preferences": preferences,
                "seed": 5
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "OPTIMAL");
        assert_eq!(json["entries"].as_array().unwrap().len(), 10);
        assert!(json["entries"]
            .as_array()
            .unwrap()
            .iter()
            .all(|e| !(e["course"] == "HIST0" && e["slot"] == "s10")));
        assert!(json["report"]["stats"]["balanceDiff"].as_u64().unwrap() <= 2);
    }
}
