use super::LoadStrategy;
use crate::backend::{LoadedBackend, ModelHandle, ProcessorHandle};
use crate::device::DeviceDescriptor;
use crate::runtime::{LoadSpec, Runtime};
use crate::strategy::StrategyResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// (model type, processor type)
pub const DEDICATED_PAIR: (&str, &str) = ("Qwen3TTSModel", "Qwen3TTSProcessor");
pub const LEGACY_OMNI_PAIR: (&str, &str) = ("Qwen2_5OmniModel", "Qwen2_5OmniProcessor");

pub const GENERIC_MODEL_TYPE: &str = "AutoModelForCausalLM";
pub const GENERIC_PROCESSOR_TYPE: &str = "AutoProcessor";
pub const GENERIC_TOKENIZER_TYPE: &str = "AutoTokenizer";

/// Loads a specific model/processor type pair, if the runtime has it.
pub struct DedicatedPairStrategy {
    name: &'static str,
    model_type: &'static str,
    processor_type: &'static str,
    runtime: Arc<dyn Runtime>,
}

impl DedicatedPairStrategy {
    pub fn new(
        name: &'static str,
        (model_type, processor_type): (&'static str, &'static str),
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            name,
            model_type,
            processor_type,
            runtime,
        }
    }

    pub fn dedicated(runtime: Arc<dyn Runtime>) -> Self {
        Self::new("dedicated", DEDICATED_PAIR, runtime)
    }

    /// The dedicated types are missing from older library releases.
    pub fn legacy_omni(runtime: Arc<dyn Runtime>) -> Self {
        Self::new("legacy-omni", LEGACY_OMNI_PAIR, runtime)
    }
}

#[async_trait]
impl LoadStrategy for DedicatedPairStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn try_load(
        &self,
        model_path: &str,
        device: &DeviceDescriptor,
    ) -> StrategyResult<LoadedBackend> {
        match self
            .runtime
            .has_types(&[self.model_type, self.processor_type])
            .await
        {
            Ok(true) => {}
            Ok(false) => return StrategyResult::NotApplicable,
            Err(e) => return StrategyResult::Failed(e),
        }

        info!(target: "resolver", model_type = self.model_type, model_path, "Loading with dedicated types");
        let processor = match self
            .runtime
            .load_processor(&LoadSpec::new(self.processor_type, model_path, device))
            .await
        {
            Ok(p) => p,
            Err(e) => return StrategyResult::Failed(e),
        };
        let model = match self
            .runtime
            .load_model(&LoadSpec::new(self.model_type, model_path, device))
            .await
        {
            Ok(m) => m,
            Err(e) => return StrategyResult::Failed(e),
        };

        StrategyResult::Success(LoadedBackend {
            model: ModelHandle::new(model, self.model_type, device),
            processor: ProcessorHandle::new(processor, self.processor_type),
            strategy: self.name,
        })
    }
}

/// Causal LM + auto processor, with remote code enabled for non-standard
/// architectures. Falls back to a tokenizer-only processor inside the same
/// strategy.
pub struct GenericCausalStrategy {
    runtime: Arc<dyn Runtime>,
}

impl GenericCausalStrategy {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl LoadStrategy for GenericCausalStrategy {
    fn name(&self) -> &'static str {
        "generic-causal"
    }

    async fn try_load(
        &self,
        model_path: &str,
        device: &DeviceDescriptor,
    ) -> StrategyResult<LoadedBackend> {
        match self.runtime.has_types(&[GENERIC_MODEL_TYPE]).await {
            Ok(true) => {}
            Ok(false) => return StrategyResult::NotApplicable,
            Err(e) => return StrategyResult::Failed(e),
        }

        info!(target: "resolver", model_type = GENERIC_MODEL_TYPE, model_path, "Loading with generic types");
        let processor_spec =
            LoadSpec::new(GENERIC_PROCESSOR_TYPE, model_path, device).trusting_remote_code();
        let (processor, processor_type) = match self.runtime.load_processor(&processor_spec).await {
            Ok(p) => (p, GENERIC_PROCESSOR_TYPE),
            Err(e) => {
                warn!(target: "resolver", cause = %e, "Auto processor failed, trying tokenizer only");
                let tokenizer_spec = LoadSpec::new(GENERIC_TOKENIZER_TYPE, model_path, device)
                    .trusting_remote_code();
                match self.runtime.load_processor(&tokenizer_spec).await {
                    Ok(p) => (p, GENERIC_TOKENIZER_TYPE),
                    Err(e) => return StrategyResult::Failed(e),
                }
            }
        };

        let model_spec = LoadSpec::new(GENERIC_MODEL_TYPE, model_path, device).trusting_remote_code();
        let model = match self.runtime.load_model(&model_spec).await {
            Ok(m) => m,
            Err(e) => return StrategyResult::Failed(e),
        };

        StrategyResult::Success(LoadedBackend {
            model: ModelHandle::new(model, GENERIC_MODEL_TYPE, device),
            processor: ProcessorHandle::new(processor, processor_type),
            strategy: self.name(),
        })
    }
}
