//! One prediction, start to finish.
//!
//! `Start → ModelArtifactsChecked → InputParsed → EncodersApplied →
//! FeaturesAssembled → Inferred → Emitted`. Any stage may stop early with a
//! [`PredictError`]; nothing is retried.

use chrono::NaiveDateTime;
use std::io;

use crate::config::Config;
use crate::encoding::EncodingBundle;
use crate::error::PredictError;
use crate::features::assemble;
use crate::model::{delay_probability, load_classifier, Classifier};
use crate::normalize::normalize;
use crate::types::{ModelFeatures, PredictionDetails, PredictionResult, RawFlightRequest, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ModelArtifactsChecked,
    InputParsed,
    EncodersApplied,
    FeaturesAssembled,
    Inferred,
    Emitted,
}

fn enter(stage: Stage) {
    tracing::debug!(?stage, "pipeline stage");
}

/// Both artifacts must exist before anything else happens.
pub fn check_artifacts(config: &Config) -> Result<(), PredictError> {
    if !config.model_path.exists() {
        return Err(PredictError::ModelNotFound(config.model_path.clone()));
    }
    if !config.encoder_path.exists() {
        return Err(PredictError::EncoderNotFound(config.encoder_path.clone()));
    }
    Ok(())
}

/// Loaded, read-only model artifacts. Never mutated after loading.
pub struct Artifacts {
    pub bundle: EncodingBundle,
    pub classifier: Box<dyn Classifier>,
}

impl Artifacts {
    pub fn new(bundle: EncodingBundle, classifier: Box<dyn Classifier>) -> Self {
        Self { bundle, classifier }
    }

    /// Existence check followed by load.
    pub fn load(config: &Config) -> Result<Self, PredictError> {
        check_artifacts(config)?;
        Self::load_checked(config)
    }

    fn load_checked(config: &Config) -> Result<Self, PredictError> {
        let load_failed = |e: anyhow::Error| PredictError::ArtifactLoad(format!("{:#}", e));
        let bundle = EncodingBundle::load(&config.encoder_path).map_err(load_failed)?;
        let classifier =
            load_classifier(&config.model_path, bundle.feature_order.len()).map_err(load_failed)?;
        tracing::info!("Model loaded successfully ({})", classifier.kind());
        Ok(Self { bundle, classifier })
    }

    /// Predict from the raw input text.
    pub fn predict(&self, raw: &str, now: NaiveDateTime) -> Result<PredictionResult, PredictError> {
        let request = parse_input(raw)?;
        self.predict_request(&request, now)
    }

    pub fn predict_request(
        &self,
        request: &RawFlightRequest,
        now: NaiveDateTime,
    ) -> Result<PredictionResult, PredictError> {
        let normalized = normalize(request, now);
        enter(Stage::InputParsed);

        let from = self.bundle.le_from.encode(&normalized.from_code);
        let to = self.bundle.le_to.encode(&normalized.to_code);
        let features = ModelFeatures {
            from: from.id,
            to: to.id,
            dep_hour: normalized.dep_hour,
            dep_weekday: normalized.dep_weekday,
        };
        enter(Stage::EncodersApplied);
        tracing::info!("Features: {:?}", features);

        let row = assemble(&features, &self.bundle.feature_order)?;
        enter(Stage::FeaturesAssembled);

        let delay_probability = delay_probability(self.classifier.as_ref(), &row)?;
        enter(Stage::Inferred);

        Ok(PredictionResult {
            delay_probability,
            prediction_details: PredictionDetails {
                from_airport: normalized.from_code,
                to_airport: normalized.to_code,
                departure_hour: normalized.dep_hour,
                departure_weekday: normalized.dep_weekday,
                model_features: features,
            },
        })
    }
}

fn parse_input(raw: &str) -> Result<RawFlightRequest, PredictError> {
    if raw.trim().is_empty() {
        return Err(PredictError::NoInput);
    }
    RawFlightRequest::from_json(raw)
}

/// The one-shot path: check artifacts, then read input, then load and
/// predict. `read_input` is only called once the artifacts are known to
/// exist.
pub fn run_once<F>(config: &Config, read_input: F, now: NaiveDateTime) -> Response
where
    F: FnOnce() -> io::Result<String>,
{
    enter(Stage::Start);
    let res = (|| -> Result<PredictionResult, PredictError> {
        check_artifacts(config)?;
        enter(Stage::ModelArtifactsChecked);

        let raw = read_input().map_err(PredictError::ReadInput)?;
        let request = parse_input(&raw)?;

        let artifacts = Artifacts::load_checked(config)?;
        artifacts.predict_request(&request, now)
    })();

    if let Err(e) = &res {
        tracing::error!(kind = ?e.kind(), "{}", e);
    }
    enter(Stage::Emitted);
    Response::from(res)
}
