use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::AdmissionError;
use crate::scheduler::{ScoringJob, WorkerPool};

const INDEX: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Contest scorer</title></head>
<body>
  <h1>Request a benchmark</h1>
  <form method="post" action="/benchmark">
    <label>Userkey <input name="userkey" required></label>
    <label>Endpoint <input name="endpoint" placeholder="http://203.0.113.10" required></label>
    <label>Project ID <input name="project_id" required></label>
    <button type="submit">Submit</button>
  </form>
  <p><a href="/api/jobs">Jobs in flight</a> | <a href="/api/ranking">Ranking</a></p>
</body>
</html>
"#;

#[derive(Clone, Debug)]
pub struct PortalState {
    pub pool: WorkerPool,
}

#[derive(Deserialize)]
struct BenchmarkForm {
    userkey: String,
    endpoint: String,
    project_id: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    success: bool,
    job_id: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct JobResponse {
    job_id: String,
    display_name: String,
    submitted_at: DateTime<Utc>,
    state: String,
}

#[derive(Serialize)]
struct RankingResponse {
    rank: usize,
    display_name: String,
    score: u64,
    executed_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: PortalState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(health_handler))
        .route("/benchmark", post(submit_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/ranking", get(ranking_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the portal until `shutdown` is cancelled.
pub async fn run_portal(
    addr: SocketAddr,
    state: PortalState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting intake portal");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn submit_handler(
    State(state): State<PortalState>,
    Form(form): Form<BenchmarkForm>,
) -> impl IntoResponse {
    let job = ScoringJob::new(form.userkey, form.endpoint, form.project_id);

    match state.pool.submit(job) {
        Ok(ticket) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                success: true,
                job_id: Some(ticket.job_id.to_string()),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "Submission rejected");
            (
                admission_status(&e),
                Json(SubmitResponse {
                    success: false,
                    job_id: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

fn admission_status(err: &AdmissionError) -> StatusCode {
    match err {
        AdmissionError::InvalidEndpoint(_) | AdmissionError::UnknownParticipant(_) => {
            StatusCode::BAD_REQUEST
        }
        AdmissionError::AlreadyInQueue(_) => StatusCode::NOT_ACCEPTABLE,
        AdmissionError::QueueFull(_) | AdmissionError::QueueClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn list_jobs_handler(State(state): State<PortalState>) -> impl IntoResponse {
    let jobs: Vec<JobResponse> = state
        .pool
        .queue()
        .snapshot()
        .into_iter()
        .map(|ticket| JobResponse {
            job_id: ticket.job_id.to_string(),
            display_name: ticket.display_name,
            submitted_at: ticket.submitted_at,
            state: ticket.state.to_string(),
        })
        .collect();

    Json(jobs)
}

async fn ranking_handler(State(state): State<PortalState>) -> axum::response::Response {
    match state.pool.store().rankings().await {
        Ok(entries) => {
            let ranking: Vec<RankingResponse> = entries
                .into_iter()
                .enumerate()
                .map(|(i, entry)| RankingResponse {
                    rank: i + 1,
                    display_name: entry.display_name,
                    score: entry.score,
                    executed_at: entry.executed_at,
                })
                .collect();
            Json(ranking).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read ranking");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
