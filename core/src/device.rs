//! Device selection.
//!
//! The core accepts any descriptor; running without an accelerator is a slower
//! degraded mode, never an error.

use crate::runtime::RuntimeReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceKind {
    Accelerated { name: String },
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// float16 weights
    Half,
    /// float32 weights
    Full,
}

impl Precision {
    pub fn as_dtype(&self) -> &'static str {
        match self {
            Precision::Half => "float16",
            Precision::Full => "float32",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub precision: Precision,
}

impl DeviceDescriptor {
    pub fn accelerated(name: impl Into<String>) -> Self {
        Self {
            kind: DeviceKind::Accelerated { name: name.into() },
            precision: Precision::Half,
        }
    }

    pub fn generic() -> Self {
        Self {
            kind: DeviceKind::Generic,
            precision: Precision::Full,
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self.kind, DeviceKind::Accelerated { .. })
    }

    /// Device string understood by the runtime ("cuda" / "cpu").
    pub fn runtime_name(&self) -> &'static str {
        if self.is_accelerated() {
            "cuda"
        } else {
            "cpu"
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DeviceKind::Accelerated { name } => write!(f, "cuda ({})", name),
            DeviceKind::Generic => write!(f, "cpu"),
        }
    }
}

/// Operator preference, from config or environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cuda,
    Cpu,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(DevicePreference::Auto),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "cpu" => Ok(DevicePreference::Cpu),
            other => Err(format!("unknown device: {} (expected auto, cuda, or cpu)", other)),
        }
    }
}

/// Pick CUDA when the runtime reports it and the operator allows it, CPU otherwise.
pub fn select_device(report: &RuntimeReport, preference: DevicePreference) -> DeviceDescriptor {
    let cuda = report
        .cuda_available
        .then(|| report.cuda_device_name.clone().unwrap_or_else(|| "cuda:0".into()));

    match (preference, cuda) {
        (DevicePreference::Cpu, _) => {
            info!(target: "device", "CPU requested, using CPU");
            DeviceDescriptor::generic()
        }
        (_, Some(name)) => {
            info!(target: "device", device = %name, "Using CUDA");
            DeviceDescriptor::accelerated(name)
        }
        (DevicePreference::Cuda, None) => {
            info!(target: "device", "CUDA requested but not available, using CPU (this will be slow)");
            DeviceDescriptor::generic()
        }
        (DevicePreference::Auto, None) => {
            info!(target: "device", "CUDA not available, using CPU (this will be slow)");
            DeviceDescriptor::generic()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(cuda: bool) -> RuntimeReport {
        RuntimeReport {
            missing: vec![],
            cuda_available: cuda,
            cuda_device_name: cuda.then(|| "RTX 4090".to_string()),
            torch_version: None,
            transformers_version: None,
        }
    }

    #[test]
    fn accelerated_device_uses_half_precision() {
        let d = select_device(&report(true), DevicePreference::Auto);
        assert!(d.is_accelerated());
        assert_eq!(d.precision, Precision::Half);
        assert_eq!(d.runtime_name(), "cuda");
    }

    #[test]
    fn missing_accelerator_degrades_to_cpu() {
        let d = select_device(&report(false), DevicePreference::Cuda);
        assert_eq!(d, DeviceDescriptor::generic());
        assert_eq!(d.precision.as_dtype(), "float32");
    }

    #[test]
    fn cpu_preference_wins_over_cuda() {
        let d = select_device(&report(true), DevicePreference::Cpu);
        assert!(!d.is_accelerated());
        assert_eq!("GPU".parse::<DevicePreference>(), Ok(DevicePreference::Cuda));
    }
}
