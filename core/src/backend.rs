//! Loaded model/processor handles and the shapes they exchange.
//!
//! Capability flags are read once when a handle is created; dispatch consults
//! the flags instead of re-probing the backend on every call.

use crate::device::{DeviceDescriptor, Precision};
use crate::tensor::{Placement, Tensor};
use crate::{CompatError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Exposes a "text + controls -> audio" entry point.
    #[serde(default)]
    pub direct_tts: bool,
    /// Exposes generic sequence generation.
    #[serde(default)]
    pub generate: bool,
    #[serde(default)]
    pub decode_audio: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCapabilities {
    #[serde(default)]
    pub chat_template: bool,
    /// Accepts the general `processor(text=..., padding=...)` call.
    #[serde(default)]
    pub callable: bool,
    #[serde(default)]
    pub feature_extractor: bool,
    #[serde(default)]
    pub decode_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    Processor,
    Tokenizer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Tensor(Tensor),
    Scalar(serde_json::Value),
}

/// Named generation inputs (token ids, attention mask, audio features...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputBundle {
    entries: BTreeMap<String, InputValue>,
}

impl InputBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: InputValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Later entries overwrite earlier ones with the same name.
    pub fn merge(&mut self, other: InputBundle) {
        self.entries.extend(other.entries);
    }

    /// Mark every tensor-valued input for the target device; scalars are untouched.
    pub fn to_device(self) -> Self {
        let entries = self
            .entries
            .into_iter()
            .map(|(k, v)| match v {
                InputValue::Tensor(t) => (k, InputValue::Tensor(t.placed(Placement::Device))),
                scalar => (k, scalar),
            })
            .collect();
        Self { entries }
    }

    pub fn tensors(&self) -> impl Iterator<Item = (&String, &Tensor)> {
        self.entries.iter().filter_map(|(k, v)| match v {
            InputValue::Tensor(t) => Some((k, t)),
            InputValue::Scalar(_) => None,
        })
    }
}

/// Whatever a backend call hands back, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationOutput {
    Tensor {
        tensor: Tensor,
    },
    /// dict-like result
    Mapping {
        entries: BTreeMap<String, GenerationOutput>,
    },
    /// attribute-bearing object (named tuple, model output record)
    Record {
        type_name: String,
        fields: BTreeMap<String, GenerationOutput>,
    },
    Sequence {
        items: Vec<GenerationOutput>,
    },
    Number {
        value: f64,
    },
    Opaque {
        type_name: String,
    },
}

impl GenerationOutput {
    pub fn tensor(tensor: Tensor) -> Self {
        GenerationOutput::Tensor { tensor }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationOutput::Tensor { .. } => "tensor",
            GenerationOutput::Mapping { .. } => "mapping",
            GenerationOutput::Record { .. } => "record",
            GenerationOutput::Sequence { .. } => "sequence",
            GenerationOutput::Number { .. } => "number",
            GenerationOutput::Opaque { .. } => "opaque",
        }
    }
}

/// Keyword parameters of the direct text-to-speech entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectSynthesisParams {
    pub text: String,
    pub speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_audio: Option<Tensor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_text: Option<String>,
}

fn unsupported(what: &str) -> CompatError {
    CompatError::Runtime(format!("{} is not supported by this backend", what))
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn capabilities(&self) -> ModelCapabilities;

    async fn tts_generate(&self, _params: &DirectSynthesisParams) -> Result<GenerationOutput> {
        Err(unsupported("tts_generate"))
    }

    async fn generate(
        &self,
        _inputs: &InputBundle,
        _speed: Option<f32>,
    ) -> Result<GenerationOutput> {
        Err(unsupported("generate"))
    }

    async fn decode_audio(&self, _output: &GenerationOutput) -> Result<GenerationOutput> {
        Err(unsupported("decode_audio"))
    }
}

#[async_trait]
pub trait ProcessorBackend: Send + Sync {
    fn kind(&self) -> ProcessorKind;

    fn capabilities(&self) -> ProcessorCapabilities;

    /// Render messages to a prompt string with the generation prompt appended.
    async fn apply_chat_template(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(unsupported("apply_chat_template"))
    }

    /// Returns `ProcessorRejectedOption` when the processor refuses `padding`.
    async fn tokenize(&self, _text: &str, _padding: bool) -> Result<InputBundle> {
        Err(unsupported("tokenize"))
    }

    async fn encode(&self, _text: &str) -> Result<Tensor> {
        Err(unsupported("encode"))
    }

    async fn extract_features(&self, _audio: &Tensor, _sampling_rate: u32) -> Result<InputBundle> {
        Err(unsupported("extract_features"))
    }

    async fn decode_audio(&self, _output: &GenerationOutput) -> Result<GenerationOutput> {
        Err(unsupported("decode_audio"))
    }
}

#[derive(Clone)]
pub struct ModelHandle {
    backend: Arc<dyn ModelBackend>,
    capabilities: ModelCapabilities,
    device: DeviceDescriptor,
    precision: Precision,
    type_name: String,
}

impl ModelHandle {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        type_name: impl Into<String>,
        device: &DeviceDescriptor,
    ) -> Self {
        let capabilities = backend.capabilities();
        Self {
            backend,
            capabilities,
            device: device.clone(),
            precision: device.precision,
            type_name: type_name.into(),
        }
    }

    pub fn backend(&self) -> &dyn ModelBackend {
        self.backend.as_ref()
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("device", &self.device)
            .field("precision", &self.precision)
            .finish()
    }
}

#[derive(Clone)]
pub struct ProcessorHandle {
    backend: Arc<dyn ProcessorBackend>,
    capabilities: ProcessorCapabilities,
    kind: ProcessorKind,
    type_name: String,
}

impl ProcessorHandle {
    pub fn new(backend: Arc<dyn ProcessorBackend>, type_name: impl Into<String>) -> Self {
        let capabilities = backend.capabilities();
        let kind = backend.kind();
        Self {
            backend,
            capabilities,
            kind,
            type_name: type_name.into(),
        }
    }

    pub fn backend(&self) -> &dyn ProcessorBackend {
        self.backend.as_ref()
    }

    pub fn capabilities(&self) -> ProcessorCapabilities {
        self.capabilities
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// A model and the processor it was loaded with; never split up.
#[derive(Debug, Clone)]
pub struct LoadedBackend {
    pub model: ModelHandle,
    pub processor: ProcessorHandle,
    /// Name of the load strategy that produced the pair.
    pub strategy: &'static str,
}
