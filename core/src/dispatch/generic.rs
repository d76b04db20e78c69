use super::{normalize_output, GenerationStrategy, StrategyAudio, SynthesisRequest};
use crate::backend::{ChatMessage, GenerationOutput, InputBundle, InputValue, LoadedBackend, ProcessorHandle};
use crate::device::DeviceDescriptor;
use crate::strategy::StrategyResult;
use crate::tensor::Placement;
use crate::{CompatError, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Processor + generic sequence generation, then audio decoding.
pub struct ProcessorGenerateStrategy;

/// Optional system turn from the instruction, then the user turn with the text.
pub fn build_messages(instruction: Option<&str>, text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(instruction) = instruction {
        messages.push(ChatMessage::system(instruction));
    }
    messages.push(ChatMessage::user(text));
    messages
}

/// Prompt for processors without a chat template.
pub fn plain_prompt(instruction: Option<&str>, text: &str) -> String {
    match instruction {
        Some(instruction) => format!("{}\n{}", instruction, text),
        None => text.to_string(),
    }
}

async fn tokenize(processor: &ProcessorHandle, prompt: &str) -> Result<InputBundle> {
    if !processor.capabilities().callable {
        debug!(target: "dispatcher", kind = ?processor.kind(), "Processor is not callable, encoding prompt");
        let ids = processor.backend().encode(prompt).await?;
        let mut inputs = InputBundle::new();
        inputs.insert("input_ids", InputValue::Tensor(ids));
        return Ok(inputs);
    }

    match processor.backend().tokenize(prompt, true).await {
        Err(CompatError::ProcessorRejectedOption(reason)) => {
            debug!(target: "dispatcher", %reason, "Processor rejected padding, retrying without it");
            processor.backend().tokenize(prompt, false).await
        }
        other => other,
    }
}

impl ProcessorGenerateStrategy {
    async fn run(
        &self,
        backend: &LoadedBackend,
        request: &SynthesisRequest,
    ) -> Result<StrategyAudio> {
        let processor = &backend.processor;
        let model = &backend.model;

        let instruction = request.effective_instruction();
        let prompt = if processor.capabilities().chat_template {
            let messages = build_messages(instruction.as_deref(), &request.text);
            processor.backend().apply_chat_template(&messages).await?
        } else {
            plain_prompt(instruction.as_deref(), &request.text)
        };

        let mut inputs = tokenize(processor, &prompt).await?;

        if let Some(reference) = &request.reference {
            if processor.capabilities().feature_extractor {
                let audio = reference.to_batched_tensor(Placement::Host);
                let features = processor
                    .backend()
                    .extract_features(&audio, reference.sample_rate)
                    .await?;
                inputs.merge(features);
            } else {
                debug!(target: "dispatcher", "Processor has no feature extractor, reference audio ignored");
            }
        }

        let inputs = inputs.to_device();
        // Many generic generators reject an unknown speed argument.
        let speed = if request.speed != 1.0 {
            Some(request.speed)
        } else {
            None
        };
        let output = model.backend().generate(&inputs, speed).await?;

        self.decode(backend, output, request.sample_rate).await
    }

    async fn decode(
        &self,
        backend: &LoadedBackend,
        output: GenerationOutput,
        sample_rate: u32,
    ) -> Result<StrategyAudio> {
        let (decoded, degraded) = if backend.processor.capabilities().decode_audio {
            debug!(target: "dispatcher", "Decoding with processor");
            (backend.processor.backend().decode_audio(&output).await?, false)
        } else if backend.model.capabilities().decode_audio {
            debug!(target: "dispatcher", "Decoding with model");
            (backend.model.backend().decode_audio(&output).await?, false)
        } else {
            warn!(
                target: "dispatcher",
                "Could not find an audio decoder. Output may be incorrect."
            );
            (output, true)
        };

        let waveform = normalize_output(&decoded, sample_rate)?;
        Ok(StrategyAudio { waveform, degraded })
    }
}

#[async_trait]
impl GenerationStrategy for ProcessorGenerateStrategy {
    fn name(&self) -> &'static str {
        "processor-generate"
    }

    async fn try_generate(
        &self,
        backend: &LoadedBackend,
        request: &SynthesisRequest,
        _device: &DeviceDescriptor,
    ) -> StrategyResult<StrategyAudio> {
        if !backend.model.capabilities().generate {
            return StrategyResult::NotApplicable;
        }
        info!(target: "dispatcher", "Using processor + generate");
        StrategyResult::from(self.run(backend, request).await)
    }
}
