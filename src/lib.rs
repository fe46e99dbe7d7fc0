//! Flight delay inference adapter.
//!
//! Turns a loosely formatted flight description (origin, destination,
//! scheduled departure) into the numeric row a pretrained binary classifier
//! expects, runs it, and reports the probability of a delay.

pub mod config;
pub mod encoding;
pub mod error;
pub mod features;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod server;
#[cfg(feature = "torch")]
pub mod torch;
pub mod types;

pub use config::Config;
pub use error::{ErrorKind, PredictError};
pub use pipeline::{run_once, Artifacts, Stage};
pub use types::{ModelFeatures, PredictionResult, RawFlightRequest, Response};
