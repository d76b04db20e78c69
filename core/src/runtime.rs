//! The ML runtime's library surface as seen by the resolver.
//!
//! A runtime is probed by type name rather than by version: a load strategy
//! asks whether a model/processor type pair exists before loading it.

use crate::backend::{ModelBackend, ProcessorBackend};
use crate::device::DeviceDescriptor;
use crate::{CompatError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Packages the runtime cannot work without.
pub const REQUIRED_PACKAGES: [&str; 3] = ["torch", "transformers", "numpy"];

/// What the runtime reports about itself before any work begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeReport {
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub cuda_available: bool,
    #[serde(default)]
    pub cuda_device_name: Option<String>,
    #[serde(default)]
    pub torch_version: Option<String>,
    #[serde(default)]
    pub transformers_version: Option<String>,
}

impl RuntimeReport {
    pub fn ensure_dependencies(&self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(CompatError::DependencyMissing {
                packages: self.missing.clone(),
            })
        }
    }
}

/// Parameters for loading one model or processor type from a path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSpec {
    pub type_name: String,
    pub path: String,
    pub device: DeviceDescriptor,
    pub trust_remote_code: bool,
}

impl LoadSpec {
    pub fn new(type_name: &str, path: &str, device: &DeviceDescriptor) -> Self {
        Self {
            type_name: type_name.to_string(),
            path: path.to_string(),
            device: device.clone(),
            trust_remote_code: false,
        }
    }

    pub fn trusting_remote_code(mut self) -> Self {
        self.trust_remote_code = true;
        self
    }
}

#[async_trait]
pub trait Runtime: Send + Sync {
    /// A static identifier for the runtime implementation
    fn name(&self) -> &str;

    /// Dependency and accelerator report; must not load any model.
    async fn probe(&self) -> Result<RuntimeReport>;

    /// True when every named type exists in the runtime's library surface.
    async fn has_types(&self, names: &[&str]) -> Result<bool>;

    async fn load_processor(&self, spec: &LoadSpec) -> Result<Arc<dyn ProcessorBackend>>;

    /// Loads weights at the device's precision and switches to inference mode.
    async fn load_model(&self, spec: &LoadSpec) -> Result<Arc<dyn ModelBackend>>;
}
