use super::protocol::{ModelLoaded, ProcessorLoaded, TemplateReply};
use super::WorkerClient;
use crate::backend::{
    ChatMessage, DirectSynthesisParams, GenerationOutput, InputBundle, ModelBackend,
    ModelCapabilities, ProcessorBackend, ProcessorCapabilities, ProcessorKind,
};
use crate::tensor::Tensor;
use crate::{CompatError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// A model object held by the worker.
pub struct PyModel {
    client: Arc<WorkerClient>,
    handle: String,
    capabilities: ModelCapabilities,
}

impl PyModel {
    pub(crate) fn new(client: Arc<WorkerClient>, loaded: ModelLoaded) -> Self {
        Self {
            client,
            handle: loaded.handle,
            capabilities: loaded.capabilities,
        }
    }
}

#[async_trait]
impl ModelBackend for PyModel {
    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    async fn tts_generate(&self, params: &DirectSynthesisParams) -> Result<GenerationOutput> {
        let params = serde_json::to_value(params)?;
        self.client
            .call("tts_generate", json!({ "model": self.handle, "params": params }))
            .await
    }

    async fn generate(&self, inputs: &InputBundle, speed: Option<f32>) -> Result<GenerationOutput> {
        let inputs = serde_json::to_value(inputs)?;
        self.client
            .call(
                "generate",
                json!({ "model": self.handle, "inputs": inputs, "speed": speed }),
            )
            .await
    }

    async fn decode_audio(&self, output: &GenerationOutput) -> Result<GenerationOutput> {
        let output = serde_json::to_value(output)?;
        self.client
            .call("decode_audio", json!({ "handle": self.handle, "output": output }))
            .await
    }
}

/// A processor or tokenizer object held by the worker.
pub struct PyProcessor {
    client: Arc<WorkerClient>,
    handle: String,
    kind: ProcessorKind,
    capabilities: ProcessorCapabilities,
}

impl PyProcessor {
    pub(crate) fn new(client: Arc<WorkerClient>, loaded: ProcessorLoaded) -> Self {
        Self {
            client,
            handle: loaded.handle,
            kind: loaded.kind,
            capabilities: loaded.capabilities,
        }
    }
}

#[async_trait]
impl ProcessorBackend for PyProcessor {
    fn kind(&self) -> ProcessorKind {
        self.kind
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        self.capabilities
    }

    async fn apply_chat_template(&self, messages: &[ChatMessage]) -> Result<String> {
        let messages = serde_json::to_value(messages)?;
        let reply: TemplateReply = self
            .client
            .call(
                "apply_chat_template",
                json!({ "processor": self.handle, "messages": messages }),
            )
            .await?;
        Ok(reply.text)
    }

    async fn tokenize(&self, text: &str, padding: bool) -> Result<InputBundle> {
        let args = json!({ "processor": self.handle, "text": text, "padding": padding });
        match self.client.exchange("tokenize", args).await? {
            Ok(value) => serde_json::from_value(value).map_err(|e| {
                CompatError::Protocol(format!("unexpected reply to 'tokenize': {}", e))
            }),
            // Keyword rejections surface as TypeError in the worker.
            Err(failure) if padding && failure.is_type_error() => {
                Err(CompatError::ProcessorRejectedOption(failure.message))
            }
            Err(failure) => Err(failure.into()),
        }
    }

    async fn encode(&self, text: &str) -> Result<Tensor> {
        self.client
            .call("encode", json!({ "processor": self.handle, "text": text }))
            .await
    }

    async fn extract_features(&self, audio: &Tensor, sampling_rate: u32) -> Result<InputBundle> {
        let audio = serde_json::to_value(audio)?;
        self.client
            .call(
                "extract_features",
                json!({
                    "processor": self.handle,
                    "audio": audio,
                    "sampling_rate": sampling_rate,
                }),
            )
            .await
    }

    async fn decode_audio(&self, output: &GenerationOutput) -> Result<GenerationOutput> {
        let output = serde_json::to_value(output)?;
        self.client
            .call("decode_audio", json!({ "handle": self.handle, "output": output }))
            .await
    }
}
