// TTS compatibility core
// Capability-probing model resolution and generation dispatch

pub mod backend;
pub mod bridge;
pub mod device;
pub mod dispatch;
pub mod resolver;
pub mod runtime;
pub mod strategy;
pub mod tensor;
pub mod waveform;

// Export core types
pub use backend::{
    ChatMessage, DirectSynthesisParams, GenerationOutput, InputBundle, InputValue, LoadedBackend, ModelBackend,
    ModelCapabilities, ModelHandle, ProcessorBackend, ProcessorCapabilities, ProcessorHandle,
    ProcessorKind,
};
pub use bridge::{PythonRuntime, PythonRuntimeConfig};
pub use device::{select_device, DeviceDescriptor, DeviceKind, DevicePreference, Precision};
pub use dispatch::{
    GenerationDispatcher, GenerationStrategy, StrategyAudio, Synthesis, SynthesisRequest,
    CANONICAL_SAMPLE_RATE,
};
pub use resolver::{BackendResolver, LoadStrategy};
pub use runtime::{LoadSpec, Runtime, RuntimeReport};
pub use strategy::{log_outcome, StrategyResult};
pub use tensor::{Placement, Tensor, TensorData};
pub use waveform::Waveform;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompatError {
    #[error("Missing required packages: {}\nInstall them with:\n  pip install {}", .packages.join(", "), .packages.join(" "))]
    DependencyMissing { packages: Vec<String> },

    #[error("Could not load model: {cause}\nMake sure the model has been downloaded and that your transformers version supports it.\n  pip install --upgrade transformers")]
    BackendUnavailable { cause: String },

    #[error("Unsupported audio format for {path}: {cause}")]
    UnsupportedAudioFormat { path: String, cause: String },

    #[error("Generation error: {cause}")]
    Generation { cause: String },

    #[error("Playback failure: {0}")]
    PlaybackFailure(String),

    #[error("Processor rejected option: {0}")]
    ProcessorRejectedOption(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CompatError {
    /// Soft errors are reported but still let the process finish normally.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CompatError::Generation { .. } | CompatError::PlaybackFailure(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            1
        } else {
            0
        }
    }
}

pub type Result<T> = std::result::Result<T, CompatError>;
