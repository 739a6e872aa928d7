use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::admission::{
    ADMISSION_API_VERSION, AdmissionRequest, AdmissionResponse, AdmissionReview, ReviewResponse,
};
use crate::engine::AdmissionEngine;
use crate::metrics::{AdmissionMetrics, KindLabels, RequestLabels, ResponseLabels};
use crate::verdict::Verdict;

const MAX_REVIEW_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    pub engine: AdmissionEngine,
    pub metrics: AdmissionMetrics,
}

pub type SharedState = Arc<AppState>;

pub fn webhook_router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(handle_validate))
        .route("/validate", post(handle_validate))
        .layer(DefaultBodyLimit::max(MAX_REVIEW_BYTES))
        .with_state(state)
}

/// The body is read as bytes so the embedded object can stay raw until the
/// request kind is known.
pub async fn handle_validate(
    State(state): State<SharedState>,
    body: Bytes,
) -> Json<ReviewResponse> {
    let start = Instant::now();

    let review: AdmissionReview = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            warn!("failed to deserialize AdmissionReview: {e}");
            return reject_review(&state, format!("failed to deserialize request: {e}"), start);
        }
    };

    let Some(request) = review.request else {
        warn!("AdmissionReview missing request field");
        return reject_review(&state, "missing request field in AdmissionReview", start);
    };

    record_request_metrics(&state, &request);

    let verdict = state.engine.review(&request);
    record_verdict_metrics(&state, &verdict);
    if verdict.allowed {
        info!(uid = %verdict.uid, kind = %request.kind.kind, "admission request allowed");
    } else {
        info!(
            uid = %verdict.uid,
            kind = %request.kind.kind,
            outcome = verdict.outcome,
            "admission request denied"
        );
    }

    state
        .metrics
        .admission_request_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    Json(AdmissionResponse::from(verdict).into_review(&review.api_version))
}

fn reject_review(
    state: &AppState,
    message: impl Into<String>,
    start: Instant,
) -> Json<ReviewResponse> {
    state
        .metrics
        .admission_responses_total
        .get_or_create(&ResponseLabels {
            allowed: "false",
            outcome: "invalid_review",
        })
        .inc();
    state
        .metrics
        .admission_request_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    Json(AdmissionResponse::invalid(message).into_review(ADMISSION_API_VERSION))
}

fn record_request_metrics(state: &AppState, request: &AdmissionRequest) {
    let operation = format!("{:?}", request.operation).to_uppercase();

    state
        .metrics
        .admission_requests_total
        .get_or_create(&RequestLabels {
            operation,
            kind: request.kind.kind.clone(),
        })
        .inc();
}

fn record_verdict_metrics(state: &AppState, verdict: &Verdict) {
    state
        .metrics
        .admission_responses_total
        .get_or_create(&ResponseLabels {
            allowed: if verdict.allowed { "true" } else { "false" },
            outcome: verdict.outcome,
        })
        .inc();

    for violation in &verdict.violations {
        state
            .metrics
            .non_compliant_images_total
            .get_or_create(&KindLabels {
                kind: violation.kind.clone(),
            })
            .inc();
    }
}
