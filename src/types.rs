use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PredictError;

// ---------- Request ----------

/// Flight description as supplied by the caller. Nothing here is validated;
/// `from`/`to` may hold "Mumbai (BOM)" style text, `std` any timestamp text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFlightRequest {
    pub from: String,
    pub to: String,
    pub std: String,
}

impl RawFlightRequest {
    /// Parse the input blob. It must be a JSON object; missing fields become
    /// empty strings and non-string values are kept as their JSON text.
    pub fn from_json(raw: &str) -> Result<Self, PredictError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PredictError::MalformedInput(e.to_string()))?;
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(PredictError::MalformedInput(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let field = |key: &str| match map.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            from: field("From"),
            to: field("To"),
            std: field("STD"),
        })
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------- Response ----------

/// The encoded row as it is reported back (`model_features`). Keys follow the
/// column names the encoding bundle uses.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFeatures {
    #[serde(rename = "From")]
    pub from: u32,
    #[serde(rename = "To")]
    pub to: u32,
    pub dep_hour: u32,
    pub dep_weekday: u32, // Monday=0 .. Sunday=6
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionDetails {
    pub from_airport: String,
    pub to_airport: String,
    pub departure_hour: u32,
    pub departure_weekday: u32,
    pub model_features: ModelFeatures,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub delay_probability: f64, // rounded to 4 decimals, always in [0, 1]
    pub prediction_details: PredictionDetails,
}

/// Exactly one of these is written per invocation.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Prediction(PredictionResult),
    Error { error: String },
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Single-line JSON text for the primary output channel.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("General error: {}", e) }).to_string()
        })
    }
}

impl From<Result<PredictionResult, PredictError>> for Response {
    fn from(res: Result<PredictionResult, PredictError>) -> Self {
        match res {
            Ok(p) => Response::Prediction(p),
            Err(e) => Response::Error {
                error: e.to_string(),
            },
        }
    }
}
