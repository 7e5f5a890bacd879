//! REST API server for the financial intelligence engine
//!
//! Exposes the orchestrator and its audit trail via HTTP endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::models::QueryPlan;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let fallback = state.orchestrator.fallback();
    Json(serde_json::json!({
        "status": "healthy",
        "fallback_backend": fallback.name(),
        "fallback_available": fallback.is_available(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Query Endpoint
/// =============================

/// Runs a classified plan. The envelope status, not the HTTP code, carries
/// the governance outcome.
async fn run_query(
    State(state): State<ApiState>,
    Json(plan): Json<QueryPlan>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(intent = %plan.intent, query = %plan.query, "Received query");

    let envelope = state.orchestrator.run(plan).await;
    (StatusCode::OK, Json(ApiResponse::success(envelope)))
}

/// =============================
/// Audit Endpoint
/// =============================

async fn get_audit(
    State(state): State<ApiState>,
    Path(request_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let Ok(request_id) = Uuid::parse_str(&request_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid request id: {}", request_id))),
        );
    };

    let audit_log = state.orchestrator.audit_log();
    let record = match audit_log.get(request_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("No audit record for {}", request_id))),
            )
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Audit lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Audit lookup failed: {}", e))),
            );
        }
    };

    let integrity_verified = audit_log.verify_integrity(request_id).await.unwrap_or(false);

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "record": record,
            "integrity_verified": integrity_verified,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(run_query))
        .route("/api/audit/:request_id", get(get_audit))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::confidence::ConfidenceAggregator;
    use crate::context::ContextBuilder;
    use crate::execution::ExecutionCoordinator;
    use crate::fallback::StaticFallback;
    use crate::governance::create_default_governance_engine;
    use crate::models::WorkerKind;
    use crate::news::RuleBasedNewsAnalyzer;
    use crate::policy::Policy;
    use crate::workers::{StaticWorker, WorkerError, WorkerRegistry};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        let policy = Arc::new(Policy::default());
        let registry = WorkerRegistry::new().with(Arc::new(StaticWorker::new(
            WorkerKind::News,
            WorkerError::network(WorkerKind::News, "connection refused").into(),
        )));
        let orchestrator = Orchestrator::new(
            ContextBuilder::default(),
            ExecutionCoordinator::new(registry, Arc::clone(&policy), Arc::new(RuleBasedNewsAnalyzer::new())),
            ConfidenceAggregator::new(policy),
            create_default_governance_engine(),
            Arc::new(StaticFallback::answering("static", "Fallback answer")),
            AuditLog::new(),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["fallback_available"], true);
    }

    #[tokio::test]
    async fn test_query_then_audit() {
        let app = router();
        let plan = serde_json::json!({
            "query": "latest RBI news",
            "intent": "NEWS_ANALYSIS",
            "confidence": 0.9
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/query")
                    .header("content-type", "application/json")
                    .body(Body::from(plan.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "APPROVED");
        assert!(json["data"]["fallback"]["response"]["response"].is_string());

        let request_id = json["data"]["request_id"].as_str().unwrap().to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/audit/{}", request_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["integrity_verified"], true);
    }

    #[tokio::test]
    async fn test_audit_bad_and_unknown_ids() {
        let response = router()
            .oneshot(Request::builder().uri("/api/audit/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/audit/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
