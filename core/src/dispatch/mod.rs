//! Generation Dispatcher
//!
//! Turns a synthesis request into a waveform using the first generation
//! strategy the loaded backend supports:
//! - `direct`: the model's own text-to-speech entry point (the only path that
//!   cleanly supports reference-audio voice cloning)
//! - `processor-generate`: prompt rendering + tokenization + generic
//!   sequence generation + audio decoding
//!
//! Strategies are gated on capability flags, not on library versions. Every
//! strategy normalizes its raw result into a [`Waveform`] before returning.

mod direct;
mod generic;
mod normalize;

pub use direct::DirectSynthesisStrategy;
pub use generic::{build_messages, plain_prompt, ProcessorGenerateStrategy};
pub use normalize::normalize_output;

use crate::backend::LoadedBackend;
use crate::device::DeviceDescriptor;
use crate::strategy::{log_outcome, StrategyResult};
use crate::waveform::Waveform;
use crate::{CompatError, Result};
use async_trait::async_trait;
use tracing::info;

/// Sample rate of reference features and of generated audio by default.
pub const CANONICAL_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub style_instruction: Option<String>,
    pub voice_name: Option<String>,
    pub speed: f32,
    /// Mono, already at `sample_rate`.
    pub reference: Option<Waveform>,
    pub reference_transcript: Option<String>,
    pub sample_rate: u32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style_instruction: None,
            voice_name: None,
            speed: 1.0,
            reference: None,
            reference_transcript: None,
            sample_rate: CANONICAL_SAMPLE_RATE,
        }
    }

    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.style_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice_name = voice.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_reference(mut self, reference: Option<Waveform>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_reference_transcript(mut self, transcript: Option<String>) -> Self {
        self.reference_transcript = transcript;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(CompatError::InvalidRequest("text must not be empty".into()));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(CompatError::InvalidRequest(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        if self.sample_rate == 0 {
            return Err(CompatError::InvalidRequest("sample rate must be positive".into()));
        }
        if let Some(reference) = &self.reference {
            if reference.sample_rate != self.sample_rate {
                return Err(CompatError::InvalidRequest(format!(
                    "reference audio is at {} Hz, expected {} Hz",
                    reference.sample_rate, self.sample_rate
                )));
            }
        }
        Ok(())
    }

    /// The explicit instruction, or one synthesized from the voice name.
    pub fn effective_instruction(&self) -> Option<String> {
        match (&self.style_instruction, &self.voice_name) {
            (Some(instruction), _) => Some(instruction.clone()),
            (None, Some(voice)) => Some(format!("You are a TTS model. Speak as {}.", voice)),
            (None, None) => None,
        }
    }
}

/// Audio produced by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAudio {
    pub waveform: Waveform,
    /// Raw generation output was reinterpreted as samples.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub waveform: Waveform,
    pub strategy: &'static str,
    pub degraded: bool,
}

#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_generate(
        &self,
        backend: &LoadedBackend,
        request: &SynthesisRequest,
        device: &DeviceDescriptor,
    ) -> StrategyResult<StrategyAudio>;
}

pub struct GenerationDispatcher {
    strategies: Vec<Box<dyn GenerationStrategy>>,
}

impl Default for GenerationDispatcher {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

impl GenerationDispatcher {
    pub fn new(strategies: Vec<Box<dyn GenerationStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_default_strategies() -> Self {
        Self::new(vec![
            Box::new(DirectSynthesisStrategy),
            Box::new(ProcessorGenerateStrategy),
        ])
    }

    pub async fn synthesize(
        &self,
        backend: &LoadedBackend,
        request: &SynthesisRequest,
        device: &DeviceDescriptor,
    ) -> Result<Synthesis> {
        request.validate()?;
        info!(
            target: "dispatcher",
            chars = request.text.chars().count(),
            "Generating speech"
        );

        let mut last_failure: Option<CompatError> = None;
        for strategy in &self.strategies {
            let outcome = strategy.try_generate(backend, request, device).await;
            log_outcome("dispatcher", strategy.name(), &outcome);
            match outcome {
                StrategyResult::Success(audio) => {
                    info!(
                        target: "dispatcher",
                        strategy = strategy.name(),
                        samples = audio.waveform.len(),
                        duration_ms = audio.waveform.duration_ms(),
                        "Speech generated"
                    );
                    return Ok(Synthesis {
                        waveform: audio.waveform,
                        strategy: strategy.name(),
                        degraded: audio.degraded,
                    });
                }
                StrategyResult::NotApplicable => {}
                StrategyResult::Failed(e) => last_failure = Some(e),
            }
        }

        let cause = match last_failure {
            Some(e) => e.to_string(),
            None => "model exposes neither direct synthesis nor generic generation".to_string(),
        };
        Err(CompatError::Generation { cause })
    }
}
