//! Shared fakes: a runtime, model and processor that record every call.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tts_compat_core::{
    ChatMessage, CompatError, DeviceDescriptor, DirectSynthesisParams, GenerationOutput,
    InputBundle, InputValue, LoadSpec, LoadedBackend, ModelBackend, ModelCapabilities,
    ModelHandle, ProcessorBackend, ProcessorCapabilities, ProcessorHandle, ProcessorKind, Result,
    Runtime, RuntimeReport, Tensor,
};

#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

pub fn samples(values: &[f32]) -> GenerationOutput {
    GenerationOutput::tensor(Tensor::from_f32(vec![1, values.len()], values.to_vec()).unwrap())
}

pub fn token_ids() -> GenerationOutput {
    GenerationOutput::tensor(Tensor::from_i64(vec![1, 3], vec![11, 12, 13]).unwrap())
}

pub struct FakeModel {
    capabilities: ModelCapabilities,
    output: GenerationOutput,
    decoded: GenerationOutput,
    pub log: CallLog,
    pub direct_params: Mutex<Vec<DirectSynthesisParams>>,
    pub generate_calls: Mutex<Vec<(InputBundle, Option<f32>)>>,
}

impl FakeModel {
    fn with_capabilities(capabilities: ModelCapabilities, output: GenerationOutput) -> Self {
        Self {
            capabilities,
            output,
            decoded: samples(&[0.5, -0.5]),
            log: CallLog::default(),
            direct_params: Mutex::new(Vec::new()),
            generate_calls: Mutex::new(Vec::new()),
        }
    }

    /// Exposes direct synthesis as well as generic generation.
    pub fn direct() -> Self {
        Self::with_capabilities(
            ModelCapabilities {
                direct_tts: true,
                generate: true,
                decode_audio: false,
            },
            samples(&[0.1, 0.2, 0.3]),
        )
    }

    /// Generic generation only; returns token ids.
    pub fn generic() -> Self {
        Self::with_capabilities(
            ModelCapabilities {
                direct_tts: false,
                generate: true,
                decode_audio: false,
            },
            token_ids(),
        )
    }

    pub fn without_any_entry_point() -> Self {
        Self::with_capabilities(ModelCapabilities::default(), token_ids())
    }

    pub fn with_decoder(mut self) -> Self {
        self.capabilities.decode_audio = true;
        self
    }

    pub fn with_output(mut self, output: GenerationOutput) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
impl ModelBackend for FakeModel {
    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    async fn tts_generate(&self, params: &DirectSynthesisParams) -> Result<GenerationOutput> {
        self.log.push("tts_generate");
        self.direct_params.lock().unwrap().push(params.clone());
        Ok(self.output.clone())
    }

    async fn generate(&self, inputs: &InputBundle, speed: Option<f32>) -> Result<GenerationOutput> {
        self.log.push("generate");
        self.generate_calls
            .lock()
            .unwrap()
            .push((inputs.clone(), speed));
        Ok(self.output.clone())
    }

    async fn decode_audio(&self, _output: &GenerationOutput) -> Result<GenerationOutput> {
        self.log.push("decode_audio");
        Ok(self.decoded.clone())
    }
}

pub struct FakeProcessor {
    kind: ProcessorKind,
    capabilities: ProcessorCapabilities,
    reject_padding: bool,
    pub log: CallLog,
    pub templated: Mutex<Vec<Vec<ChatMessage>>>,
    pub tokenized: Mutex<Vec<(String, bool)>>,
}

impl FakeProcessor {
    /// Chat template, callable and a feature extractor; no audio decoder.
    pub fn full() -> Self {
        Self {
            kind: ProcessorKind::Processor,
            capabilities: ProcessorCapabilities {
                chat_template: true,
                callable: true,
                feature_extractor: true,
                decode_audio: false,
            },
            reject_padding: false,
            log: CallLog::default(),
            templated: Mutex::new(Vec::new()),
            tokenized: Mutex::new(Vec::new()),
        }
    }

    pub fn tokenizer() -> Self {
        Self {
            kind: ProcessorKind::Tokenizer,
            capabilities: ProcessorCapabilities {
                chat_template: false,
                callable: false,
                feature_extractor: false,
                decode_audio: false,
            },
            ..Self::full()
        }
    }

    pub fn with_decoder(mut self) -> Self {
        self.capabilities.decode_audio = true;
        self
    }

    pub fn rejecting_padding(mut self) -> Self {
        self.reject_padding = true;
        self
    }
}

fn ids_bundle() -> InputBundle {
    let mut bundle = InputBundle::new();
    bundle.insert(
        "input_ids",
        InputValue::Tensor(Tensor::from_i64(vec![1, 2], vec![1, 2]).unwrap()),
    );
    bundle.insert(
        "attention_mask",
        InputValue::Tensor(Tensor::from_i64(vec![1, 2], vec![1, 1]).unwrap()),
    );
    bundle
}

#[async_trait]
impl ProcessorBackend for FakeProcessor {
    fn kind(&self) -> ProcessorKind {
        self.kind
    }

    fn capabilities(&self) -> ProcessorCapabilities {
        self.capabilities
    }

    async fn apply_chat_template(&self, messages: &[ChatMessage]) -> Result<String> {
        self.log.push("apply_chat_template");
        self.templated.lock().unwrap().push(messages.to_vec());
        Ok(messages
            .iter()
            .map(|m| format!("<{}>{}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn tokenize(&self, text: &str, padding: bool) -> Result<InputBundle> {
        self.log.push(format!("tokenize:padding={}", padding));
        if padding && self.reject_padding {
            return Err(CompatError::ProcessorRejectedOption(
                "unexpected keyword argument 'padding'".into(),
            ));
        }
        self.tokenized
            .lock()
            .unwrap()
            .push((text.to_string(), padding));
        Ok(ids_bundle())
    }

    async fn encode(&self, text: &str) -> Result<Tensor> {
        self.log.push("encode");
        self.tokenized.lock().unwrap().push((text.to_string(), false));
        Ok(Tensor::from_i64(vec![1, 2], vec![1, 2]).unwrap())
    }

    async fn extract_features(&self, audio: &Tensor, sampling_rate: u32) -> Result<InputBundle> {
        self.log
            .push(format!("extract_features:{}:{}", sampling_rate, audio.len()));
        let mut bundle = InputBundle::new();
        bundle.insert(
            "input_features",
            InputValue::Tensor(Tensor::from_f32(vec![1, 2], vec![0.0, 1.0]).unwrap()),
        );
        Ok(bundle)
    }

    async fn decode_audio(&self, _output: &GenerationOutput) -> Result<GenerationOutput> {
        self.log.push("decode_audio");
        Ok(samples(&[0.25, 0.25, 0.25]))
    }
}

/// Runtime whose library surface is a configurable set of type names.
pub struct FakeRuntime {
    types: HashSet<String>,
    failing_loads: HashSet<String>,
    pub model: Arc<FakeModel>,
    pub processor: Arc<FakeProcessor>,
    pub report: RuntimeReport,
    pub log: CallLog,
}

impl FakeRuntime {
    pub fn new(types: &[&str], model: FakeModel, processor: FakeProcessor) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            failing_loads: HashSet::new(),
            model: Arc::new(model),
            processor: Arc::new(processor),
            report: RuntimeReport::default(),
            log: CallLog::default(),
        }
    }

    /// Loading this type name raises, even though the type exists.
    pub fn failing(mut self, type_name: &str) -> Self {
        self.failing_loads.insert(type_name.to_string());
        self
    }

    fn check_load(&self, what: &str, spec: &LoadSpec) -> Result<()> {
        self.log.push(format!(
            "{}:{}:trust={}",
            what, spec.type_name, spec.trust_remote_code
        ));
        if self.failing_loads.contains(&spec.type_name) {
            return Err(CompatError::Runtime(format!(
                "{} could not be loaded from {}",
                spec.type_name, spec.path
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    async fn probe(&self) -> Result<RuntimeReport> {
        Ok(self.report.clone())
    }

    async fn has_types(&self, names: &[&str]) -> Result<bool> {
        self.log.push(format!("has_types:{}", names.join(",")));
        Ok(names.iter().all(|n| self.types.contains(*n)))
    }

    async fn load_processor(&self, spec: &LoadSpec) -> Result<Arc<dyn ProcessorBackend>> {
        self.check_load("load_processor", spec)?;
        Ok(self.processor.clone())
    }

    async fn load_model(&self, spec: &LoadSpec) -> Result<Arc<dyn ModelBackend>> {
        self.check_load("load_model", spec)?;
        Ok(self.model.clone())
    }
}

/// Pair the fakes into a loaded backend on the generic device.
pub fn loaded(model: Arc<FakeModel>, processor: Arc<FakeProcessor>) -> LoadedBackend {
    let device = DeviceDescriptor::generic();
    LoadedBackend {
        model: ModelHandle::new(model, "FakeModel", &device),
        processor: ProcessorHandle::new(processor, "FakeProcessor"),
        strategy: "test",
    }
}
