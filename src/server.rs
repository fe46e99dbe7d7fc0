use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::error::PredictError;
use crate::pipeline::Artifacts;
use crate::types::Response;

// ---------- Server state ----------

/// Artifacts are loaded once and shared read-only; `/reload` swaps in a
/// fresh set without touching the one in-flight requests hold.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    artifacts: Arc<RwLock<Arc<Artifacts>>>,
}

impl AppState {
    pub fn load(config: Config) -> Result<Self, PredictError> {
        let artifacts = Artifacts::load(&config)?;
        Ok(Self::with_artifacts(config, artifacts))
    }

    pub fn with_artifacts(config: Config, artifacts: Artifacts) -> Self {
        Self {
            config: Arc::new(config),
            artifacts: Arc::new(RwLock::new(Arc::new(artifacts))),
        }
    }

    fn current(&self) -> Arc<Artifacts> {
        self.artifacts.read().clone()
    }
}

// ---------- Handlers ----------

pub async fn predict(State(state): State<AppState>, body: String) -> Json<Response> {
    let artifacts = state.current();
    let now = chrono::Local::now().naive_local();
    let res = artifacts.predict(&body, now);
    if let Err(e) = &res {
        tracing::warn!(kind = ?e.kind(), "{}", e);
    }
    Json(Response::from(res))
}

pub async fn reload(State(state): State<AppState>) -> Json<Value> {
    match Artifacts::load(&state.config) {
        Ok(fresh) => {
            let feature_order = fresh.bundle.feature_order.clone();
            *state.artifacts.write() = Arc::new(fresh);
            tracing::info!("reloaded artifacts; feature_order: {:?}", feature_order);
            Json(json!({ "ok": true, "feature_order": feature_order }))
        }
        Err(e) => {
            tracing::error!("reload failed, keeping previous artifacts: {}", e);
            Json(json!({ "ok": false, "error": e.to_string() }))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let artifacts = state.current();
    Json(json!({
        "ok": true,
        "classifier": artifacts.classifier.kind(),
        "feature_order": artifacts.bundle.feature_order,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/reload", post(reload))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ENC: &str = r#"{"le_from": ["BOM", "DEL"], "le_to": ["BOM", "DEL"],
        "feature_order": ["From", "To", "dep_hour", "dep_weekday"]}"#;
    const LR: &str =
        r#"{"kind": "logistic_regression", "coef": [0, 0, 0, 0], "intercept": 0}"#;

    fn setup(dir: &std::path::Path) -> AppState {
        let config = Config {
            model_path: dir.join("model.json"),
            encoder_path: dir.join("enc.json"),
        };
        fs::write(&config.model_path, LR).unwrap();
        fs::write(&config.encoder_path, ENC).unwrap();
        AppState::load(config).unwrap()
    }

    #[tokio::test]
    async fn predict_returns_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let state = setup(dir.path());
        let Json(resp) = predict(
            State(state),
            r#"{"From": "BOM", "To": "DEL", "STD": "2024-03-15T08:30:00"}"#.to_string(),
        )
        .await;
        match resp {
            Response::Prediction(p) => {
                assert_eq!(p.delay_probability, 0.5);
                assert_eq!(p.prediction_details.model_features.to, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn predict_blank_body() {
        let dir = tempfile::tempdir().unwrap();
        let state = setup(dir.path());
        let Json(resp) = predict(State(state), String::new()).await;
        assert_eq!(
            resp,
            Response::Error {
                error: "No input data received".into()
            }
        );
    }

    #[tokio::test]
    async fn reload_swaps_and_keeps_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let state = setup(dir.path());

        fs::write(
            dir.path().join("model.json"),
            r#"{"kind": "logistic_regression", "coef": [0, 0, 0, 0], "intercept": 2}"#,
        )
        .unwrap();
        let Json(v) = reload(State(state.clone())).await;
        assert_eq!(v["ok"], true);

        let body = r#"{"From": "BOM", "To": "DEL", "STD": "2024-03-15T08:30:00"}"#;
        let Json(resp) = predict(State(state.clone()), body.to_string()).await;
        assert!(matches!(resp, Response::Prediction(ref p) if p.delay_probability == 0.8808));

        fs::remove_file(dir.path().join("enc.json")).unwrap();
        let Json(v) = reload(State(state.clone())).await;
        assert_eq!(v["ok"], false);
        assert!(v["error"].as_str().unwrap().starts_with("Encoder file not found: "));

        // previous artifacts still serve
        let Json(resp) = predict(State(state.clone()), body.to_string()).await;
        assert!(!resp.is_error());

        let Json(h) = health(State(state)).await;
        assert_eq!(h["classifier"], "logistic_regression");
        assert_eq!(h["feature_order"][3], "dep_weekday");
    }
}
