use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::analyze::{AlertClassifier, AlertLevel, Cadence, Channel};
use crate::metrics::{self, Metrics};

#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<AlertClassifier>,
}

impl AppState {
    pub fn new(classifier: AlertClassifier) -> Self {
        Self {
            classifier: Arc::new(classifier),
        }
    }
}

/// Full HTTP surface. `metrics` is `None` when no recorder is installed.
pub fn router(state: AppState, metrics: Option<Metrics>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/classify", post(classify))
        .route("/rules", get(rules))
        .with_state(state)
        .merge(metrics::router(metrics))
        .layer(CorsLayer::very_permissive())
}

#[derive(Deserialize)]
struct ClassifyReq {
    text: String,
}

#[derive(Serialize)]
struct ClassifyResp {
    level: AlertLevel,
    keywords: Vec<String>,
    /// Cleaned text the rules ran against.
    normalized: String,
}

async fn classify(
    State(state): State<AppState>,
    Json(body): Json<ClassifyReq>,
) -> Result<Json<ClassifyResp>, (StatusCode, String)> {
    if body.text.len() > 64 * 1024 {
        return Err((StatusCode::PAYLOAD_TOO_LARGE, "text too long".into()));
    }
    let normalized = crate::ingest::clean_text(&body.text);
    let c = state.classifier.classify(&normalized);
    Ok(Json(ClassifyResp {
        level: c.level,
        keywords: c.keywords,
        normalized,
    }))
}

#[derive(Serialize)]
struct LevelSummary {
    level: AlertLevel,
    patterns: Vec<String>,
    channels: Vec<Channel>,
    cadence: Cadence,
}

async fn rules(State(state): State<AppState>) -> Json<Vec<LevelSummary>> {
    let compiled = state.classifier.rules();
    let out = AlertLevel::PRIORITY_ORDER
        .iter()
        .map(|&level| {
            let r = compiled.rules().for_level(level);
            LevelSummary {
                level,
                patterns: r.patterns.clone(),
                channels: r.channels.clone(),
                cadence: r.cadence,
            }
        })
        .collect();
    Json(out)
}
