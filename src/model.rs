use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{cmp::Ordering, fs, path::Path};

use crate::error::PredictError;
use crate::features::FeatureVector;

// ---------- Capability interface ----------

/// Classifiers that report per-class probabilities for one row.
pub trait PredictProba {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>>;
}

/// Classifiers that only report an unbounded decision score for one row.
pub trait DecisionFunction {
    fn decision_function(&self, row: &[f64]) -> Result<f64>;
}

pub enum Capability<'a> {
    Probabilities(&'a dyn PredictProba),
    DecisionScore(&'a dyn DecisionFunction),
}

pub trait Classifier: Send + Sync {
    fn kind(&self) -> &'static str;
    fn capability(&self) -> Capability<'_>;
}

// ---------- Invoker ----------

pub fn sigmoid(score: f64) -> f64 {
    1.0 / (1.0 + (-score).exp())
}

/// Round to 4 decimals the way the exact binary value rounds: half-way
/// cases go to even. A product that only looks like a tie after rounding is
/// settled by its residual.
fn round4(p: f64) -> f64 {
    let s = p * 10_000.0;
    let r = if (s - s.trunc()).abs() == 0.5 {
        match p.mul_add(10_000.0, -s).partial_cmp(&0.0) {
            Some(Ordering::Greater) => s.ceil(),
            Some(Ordering::Less) => s.floor(),
            _ => s.round_ties_even(),
        }
    } else {
        s.round()
    };
    r / 10_000.0
}

/// Probability of the positive ("delay") class, rounded to 4 decimals.
/// Capability is resolved once per call.
pub fn delay_probability(classifier: &dyn Classifier, row: &FeatureVector) -> Result<f64, PredictError> {
    let failed = |e: anyhow::Error| PredictError::Prediction(format!("{:#}", e));

    let p = match classifier.capability() {
        Capability::Probabilities(m) => {
            let probs = m.predict_proba(row.values()).map_err(failed)?;
            match probs.as_slice() {
                [] => {
                    return Err(PredictError::Prediction(
                        "classifier returned no probability columns".into(),
                    ))
                }
                [only] => *only, // single-class model
                [_, delay, ..] => *delay,
            }
        }
        Capability::DecisionScore(m) => sigmoid(m.decision_function(row.values()).map_err(failed)?),
    };

    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(PredictError::Prediction(format!(
            "classifier produced an invalid probability: {}",
            p
        )));
    }
    Ok(round4(p))
}

// ---------- Built-in classifiers (JSON artifacts) ----------

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>, // per-class sample counts (or weights)
    },
}

#[derive(Deserialize, Debug, Clone)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf(&self, row: &[f64]) -> Result<&[f64]> {
        let mut at = 0usize;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(at) {
                Some(Node::Leaf { value }) => return Ok(value),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = *row.get(*feature).with_context(|| {
                        format!("split on feature {} but row has {} columns", feature, row.len())
                    })?;
                    at = if x <= *threshold { *left } else { *right };
                }
                None => bail!("node index {} out of range ({} nodes)", at, self.nodes.len()),
            }
        }
        bail!("tree does not terminate")
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct RandomForest {
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl PredictProba for RandomForest {
    /// Mean of the normalized leaf distributions across trees.
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            bail!("random forest has no trees");
        }
        let mut acc = vec![0.0; self.n_classes];
        for (i, tree) in self.trees.iter().enumerate() {
            let value = tree.leaf(row).with_context(|| format!("tree {}", i))?;
            if value.len() != self.n_classes {
                bail!(
                    "tree {} leaf has {} classes, expected {}",
                    i,
                    value.len(),
                    self.n_classes
                );
            }
            let total: f64 = value.iter().sum();
            if !(total > 0.0) {
                bail!("tree {} leaf has no samples", i);
            }
            for (a, v) in acc.iter_mut().zip(value) {
                *a += v / total;
            }
        }
        let n = self.trees.len() as f64;
        Ok(acc.into_iter().map(|a| a / n).collect())
    }
}

/// Linear model exposing only a decision score (`coef · x + intercept`).
#[derive(Deserialize, Debug, Clone)]
pub struct LinearModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl DecisionFunction for LinearModel {
    fn decision_function(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coef.len() {
            bail!(
                "feature length mismatch: got {}, expected {}",
                row.len(),
                self.coef.len()
            );
        }
        Ok(self.coef.iter().zip(row).map(|(c, x)| c * x).sum::<f64>() + self.intercept)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JsonClassifier {
    RandomForest(RandomForest),
    LogisticRegression(LinearModel),
    LinearSvm(LinearModel),
}

impl Classifier for JsonClassifier {
    fn kind(&self) -> &'static str {
        match self {
            JsonClassifier::RandomForest(_) => "random_forest",
            JsonClassifier::LogisticRegression(_) => "logistic_regression",
            JsonClassifier::LinearSvm(_) => "linear_svm",
        }
    }

    fn capability(&self) -> Capability<'_> {
        match self {
            JsonClassifier::RandomForest(m) => Capability::Probabilities(m),
            JsonClassifier::LogisticRegression(m) | JsonClassifier::LinearSvm(m) => {
                Capability::DecisionScore(m)
            }
        }
    }
}

// ---------- Loading ----------

fn is_torchscript(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("pt") | Some("ts")
    )
}

/// Load the classifier artifact. `in_dim` is the row width the encoding
/// bundle declares; TorchScript models are probed with it.
pub fn load_classifier(path: &Path, in_dim: usize) -> Result<Box<dyn Classifier>> {
    if is_torchscript(path) {
        #[cfg(feature = "torch")]
        {
            let m = crate::torch::TorchClassifier::load(path, in_dim)?;
            return Ok(Box::new(m));
        }
        #[cfg(not(feature = "torch"))]
        bail!(
            "{} is a TorchScript model; rebuild with the `torch` feature",
            path.display()
        );
    }

    let txt = fs::read_to_string(path)
        .with_context(|| format!("failed to read model at {}", path.display()))?;
    let model: JsonClassifier =
        serde_json::from_str(&txt).with_context(|| "failed to parse model json")?;
    if let JsonClassifier::LogisticRegression(m) | JsonClassifier::LinearSvm(m) = &model {
        if m.coef.len() != in_dim {
            tracing::warn!(
                "model coef len ({}) != feature_order len ({}); prediction will fail",
                m.coef.len(),
                in_dim
            );
        }
    }
    tracing::debug!(kind = model.kind(), "loaded classifier");
    Ok(Box::new(model))
}
