use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "models/delay_rf.json";
pub const DEFAULT_ENCODER_PATH: &str = "models/delay_rf_encoders.json";

/// Where the two artifacts live. Passed explicitly into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub model_path: PathBuf,
    pub encoder_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            encoder_path: PathBuf::from(DEFAULT_ENCODER_PATH),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Classifier artifact (JSON, or TorchScript with the `torch` feature)
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH, global = true)]
    pub model_path: PathBuf,

    /// Encoding bundle: category tables and feature order
    #[arg(long, env = "ENCODER_PATH", default_value = DEFAULT_ENCODER_PATH, global = true)]
    pub encoder_path: PathBuf,
}

impl From<ArtifactArgs> for Config {
    fn from(a: ArtifactArgs) -> Self {
        Self {
            model_path: a.model_path,
            encoder_path: a.encoder_path,
        }
    }
}
