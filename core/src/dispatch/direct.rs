use super::{normalize_output, GenerationStrategy, StrategyAudio, SynthesisRequest};
use crate::backend::{DirectSynthesisParams, LoadedBackend};
use crate::device::DeviceDescriptor;
use crate::strategy::StrategyResult;
use crate::tensor::Placement;
use async_trait::async_trait;
use tracing::info;

/// Calls the model's own text-to-speech entry point.
pub struct DirectSynthesisStrategy;

impl DirectSynthesisStrategy {
    pub fn params(request: &SynthesisRequest) -> DirectSynthesisParams {
        DirectSynthesisParams {
            text: request.text.clone(),
            speed: request.speed,
            instruct: request.effective_instruction(),
            ref_audio: request
                .reference
                .as_ref()
                .map(|w| w.to_batched_tensor(Placement::Device)),
            ref_text: request.reference_transcript.clone(),
        }
    }
}

#[async_trait]
impl GenerationStrategy for DirectSynthesisStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn try_generate(
        &self,
        backend: &LoadedBackend,
        request: &SynthesisRequest,
        _device: &DeviceDescriptor,
    ) -> StrategyResult<StrategyAudio> {
        if !backend.model.capabilities().direct_tts {
            return StrategyResult::NotApplicable;
        }

        info!(
            target: "dispatcher",
            cloning = request.reference.is_some(),
            "Using direct synthesis"
        );
        let params = Self::params(request);
        let output = match backend.model.backend().tts_generate(&params).await {
            Ok(o) => o,
            Err(e) => return StrategyResult::Failed(e),
        };

        StrategyResult::from(normalize_output(&output, request.sample_rate)).map(|waveform| {
            StrategyAudio {
                waveform,
                degraded: false,
            }
        })
    }
}
