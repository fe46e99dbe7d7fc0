use anyhow::{bail, Context, Result};
use std::path::Path;
use tch::{kind::Kind, CModule, Device, IndexOp, Tensor};

use crate::model::{Capability, Classifier, DecisionFunction, PredictProba};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Probabilities, // [1, C]
    DecisionScore, // [1] or scalar
}

/// TorchScript classifier. Its capability is decided once, at load time, by
/// probing the output shape.
pub struct TorchClassifier {
    model: CModule,
    device: Device,
    in_dim: usize,
    output: Output,
}

impl TorchClassifier {
    pub fn load(path: &Path, in_dim: usize) -> Result<Self> {
        let device = Device::Cpu;

        let model = CModule::load_on_device(path, device)
            .with_context(|| format!("failed to load TorchScript {}", path.display()))?;

        // Probe output shape with a dummy forward
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = model.forward_ts(&[dummy])?;
        let sz = t.size();
        let output = match sz.as_slice() {
            [1, _] => Output::Probabilities,
            [] | [1] => Output::DecisionScore,
            _ => bail!("unexpected model output size: {:?}", sz),
        };
        tracing::info!("probed TorchScript output {:?} -> {:?}", sz, output);

        Ok(Self {
            model,
            device,
            in_dim,
            output,
        })
    }

    fn forward(&self, row: &[f64]) -> Result<Tensor> {
        if row.len() != self.in_dim {
            bail!(
                "feature length mismatch: got {}, expected {}",
                row.len(),
                self.in_dim
            );
        }
        let x: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let input = Tensor::from_slice(&x)
            .reshape([1, self.in_dim as i64])
            .to_device(self.device);
        Ok(self.model.forward_ts(&[input])?)
    }
}

impl PredictProba for TorchClassifier {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        let t = self.forward(row)?.to_kind(Kind::Double);
        let sz = t.size();
        if sz.len() != 2 || sz[0] != 1 {
            bail!("unexpected probability shape: {:?}", sz);
        }
        Ok((0..sz[1]).map(|j| t.i((0, j)).double_value(&[])).collect())
    }
}

impl DecisionFunction for TorchClassifier {
    fn decision_function(&self, row: &[f64]) -> Result<f64> {
        let t = self.forward(row)?.to_kind(Kind::Double).reshape([-1]);
        if t.size() != [1] {
            bail!("unexpected decision shape: {:?}", t.size());
        }
        Ok(t.double_value(&[0]))
    }
}

impl Classifier for TorchClassifier {
    fn kind(&self) -> &'static str {
        "torchscript"
    }

    fn capability(&self) -> Capability<'_> {
        match self.output {
            Output::Probabilities => Capability::Probabilities(self),
            Output::DecisionScore => Capability::DecisionScore(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load_classifier;

    #[test]
    fn missing_module_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("absent.pt");
        assert!(TorchClassifier::load(&p, 4).is_err());
        let err = load_classifier(&p, 4).err().unwrap();
        assert!(format!("{:#}", err).contains("failed to load TorchScript"));
    }

    #[test]
    fn garbage_module_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("model.pt");
        std::fs::write(&p, b"not a torchscript archive").unwrap();
        assert!(TorchClassifier::load(&p, 4).is_err());
    }
}
