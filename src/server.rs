//! # HTTP server
//!
//! `POST /lsh/query` in front of a [`QueryService`], plus health and stats
//! endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::index::IndexStats;
use crate::metrics::MetricsSnapshot;
use crate::service::{QueryRejection, QueryService};
use crate::signature::ColumnId;

// ========== API Types ==========

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub index: IndexStats,
    pub metrics: Option<MetricsSnapshot>,
}

impl QueryRejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryRejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            QueryRejection::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryRejection::DimensionMismatch { .. } | QueryRejection::SeedMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            QueryRejection::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
            QueryRejection::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QueryRejection {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

// ========== Server State ==========

pub struct AppState {
    pub service: QueryService,
}

// ========== Routes ==========

pub fn create_router(service: QueryService) -> Router {
    let limit = service.max_payload_bytes();
    Router::new()
        .route("/health", get(health))
        .route("/lsh/query", post(query))
        .route("/lsh/stats", get(stats))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(Arc::new(AppState { service }))
}

async fn health() -> &'static str {
    "ok"
}

async fn query(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Vec<ColumnId>>, QueryRejection> {
    let result = body
        .map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                QueryRejection::PayloadTooLarge {
                    limit: state.service.max_payload_bytes(),
                }
            } else {
                QueryRejection::Malformed(rejection.body_text())
            }
        })
        .and_then(|body| state.service.handle(&body));

    match result {
        Ok(ids) => Ok(Json(ids)),
        Err(rejection) => {
            warn!(kind = rejection.kind(), "rejected query: {rejection}");
            Err(rejection)
        }
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let index = state.service.index();
    Json(StatsResponse {
        index: index.stats(),
        metrics: index.metrics(),
    })
}

// ========== Serving ==========

/// Serve `service` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, service: QueryService) -> std::io::Result<()> {
    info!("serving LSH queries on {}", listener.local_addr()?);
    axum::serve(listener, create_router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
