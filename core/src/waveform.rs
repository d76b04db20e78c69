//! Canonical mono waveform used at every internal boundary.

use crate::tensor::{Placement, Tensor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    /// Build a waveform, replacing non-finite samples with silence.
    /// Out-of-range values are kept; clipping happens when serializing.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let samples = samples
            .into_iter()
            .map(|s| if s.is_finite() { s } else { 0.0 })
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn silent(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// `[1, n]` tensor with a leading batch dimension.
    pub fn to_batched_tensor(&self, placement: Placement) -> Tensor {
        Tensor::batched_f32(self.samples.clone()).placed(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_samples_become_silence() {
        let w = Waveform::new(vec![0.5, f32::NAN, f32::INFINITY, 1.5], 24_000);
        assert_eq!(w.samples, vec![0.5, 0.0, 0.0, 1.5]);
    }

    #[test]
    fn batched_tensor_has_leading_dim() {
        let w = Waveform::new(vec![0.1, 0.2, 0.3], 24_000);
        let t = w.to_batched_tensor(Placement::Host);
        assert_eq!(t.shape(), &[1, 3]);
        assert_eq!(w.duration_ms(), 0);
    }
}
