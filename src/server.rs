//! HTTP surface for service mode.
//!
//! - `GET /?question=...` and `POST /query` answer one question
//! - `GET /health` reports the indexed document

use crate::rag::{degraded_answer, PipelineError, QaResult, RagEngine};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type AppState = Arc<RagEngine>;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub document_id: String,
    pub chunks: usize,
    pub embedding_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failure of a query that cannot be expressed as an answer
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_answer))
        .route("/query", post(post_answer))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

async fn get_answer(
    State(engine): State<AppState>,
    Query(request): Query<QuestionRequest>,
) -> Result<Json<QaResult>, ApiError> {
    answer_question(&engine, request.question).await
}

async fn post_answer(
    State(engine): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QaResult>, ApiError> {
    answer_question(&engine, request.question).await
}

async fn answer_question(engine: &RagEngine, question: String) -> Result<Json<QaResult>, ApiError> {
    info!("Received question: {:?}", question);

    match engine.answer(&question).await {
        Ok(result) => Ok(Json(result)),
        Err(PipelineError::EmptyQuestion) => Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            message: PipelineError::EmptyQuestion.to_string(),
        }),
        Err(e) if e.is_configuration_error() => {
            error!("Query failed on the index: {}", e);
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            })
        }
        // Backend failures keep the exchange and carry the cause in the answer
        Err(e) => {
            error!("Query failed: {}", e);
            Ok(Json(QaResult {
                answer: degraded_answer(&e),
                question: question.trim().to_string(),
            }))
        }
    }
}

async fn health_check(State(engine): State<AppState>) -> Json<HealthResponse> {
    let index = engine.index();
    Json(HealthResponse {
        status: "ok".to_string(),
        document_id: index.document_id().to_string(),
        chunks: index.len(),
        embedding_model: index.embedding_model().to_string(),
    })
}
