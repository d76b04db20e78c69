//! Backend Resolver
//!
//! Locates a usable model/processor pair by walking a fixed list of load
//! strategies in order:
//! - `dedicated`: purpose-built TTS model + processor types
//! - `legacy-omni`: the older omni model + processor types
//! - `generic-causal`: causal LM + auto processor (tokenizer as a narrower fallback)
//!
//! The first strategy that succeeds wins and the rest are never invoked. When
//! every strategy fails, the last failure's cause is surfaced.

mod strategies;

pub use strategies::{
    DedicatedPairStrategy, GenericCausalStrategy, DEDICATED_PAIR, GENERIC_MODEL_TYPE,
    GENERIC_PROCESSOR_TYPE, GENERIC_TOKENIZER_TYPE, LEGACY_OMNI_PAIR,
};

use crate::backend::LoadedBackend;
use crate::device::DeviceDescriptor;
use crate::runtime::Runtime;
use crate::strategy::{log_outcome, StrategyResult};
use crate::{CompatError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// One way of loading a model/processor pair.
#[async_trait]
pub trait LoadStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_load(
        &self,
        model_path: &str,
        device: &DeviceDescriptor,
    ) -> StrategyResult<LoadedBackend>;
}

pub struct BackendResolver {
    strategies: Vec<Box<dyn LoadStrategy>>,
}

impl BackendResolver {
    pub fn new(strategies: Vec<Box<dyn LoadStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_default_strategies(runtime: Arc<dyn Runtime>) -> Self {
        Self::new(vec![
            Box::new(DedicatedPairStrategy::dedicated(Arc::clone(&runtime))),
            Box::new(DedicatedPairStrategy::legacy_omni(Arc::clone(&runtime))),
            Box::new(GenericCausalStrategy::new(runtime)),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn resolve(&self, model_path: &str, device: &DeviceDescriptor) -> Result<LoadedBackend> {
        info!(target: "resolver", model_path, device = %device, "Loading model");

        let mut last_failure: Option<CompatError> = None;
        for strategy in &self.strategies {
            let outcome = strategy.try_load(model_path, device).await;
            log_outcome("resolver", strategy.name(), &outcome);
            match outcome {
                StrategyResult::Success(loaded) => {
                    info!(
                        target: "resolver",
                        strategy = strategy.name(),
                        model_type = loaded.model.type_name(),
                        processor_type = loaded.processor.type_name(),
                        "Model resolved"
                    );
                    return Ok(loaded);
                }
                StrategyResult::NotApplicable => {}
                StrategyResult::Failed(e) => last_failure = Some(e),
            }
        }

        let cause = match last_failure {
            Some(e) => e.to_string(),
            None => format!(
                "no load strategy was applicable (tried {})",
                self.strategy_names().join(", ")
            ),
        };
        Err(CompatError::BackendUnavailable { cause })
    }
}
