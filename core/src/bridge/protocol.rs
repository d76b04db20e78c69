//! Line-delimited JSON messages exchanged with the runtime worker.

use crate::backend::{ModelCapabilities, ProcessorCapabilities, ProcessorKind};
use crate::CompatError;
use serde::{Deserialize, Serialize};

/// Request to the worker
#[derive(Debug, Serialize)]
pub struct WorkerRequest<'a> {
    pub id: u64,
    pub command: &'a str,
    pub args: serde_json::Value,
}

/// Response from the worker
#[derive(Debug, Deserialize)]
pub struct WorkerResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// An exception raised inside the worker while running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub kind: String,
    pub message: String,
}

impl WorkerFailure {
    pub fn is_type_error(&self) -> bool {
        self.kind == "TypeError"
    }
}

impl From<WorkerFailure> for CompatError {
    fn from(f: WorkerFailure) -> Self {
        CompatError::Runtime(format!("{}: {}", f.kind, f.message))
    }
}

impl WorkerResponse {
    pub fn into_outcome(self) -> std::result::Result<serde_json::Value, WorkerFailure> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(WorkerFailure {
                kind: self.kind.unwrap_or_else(|| "Exception".to_string()),
                message: self.message.unwrap_or_default(),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HasTypesReply {
    pub present: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProcessorLoaded {
    pub handle: String,
    pub kind: ProcessorKind,
    #[serde(default)]
    pub capabilities: ProcessorCapabilities,
}

#[derive(Debug, Deserialize)]
pub struct ModelLoaded {
    pub handle: String,
    #[serde(default)]
    pub capabilities: ModelCapabilities,
}

#[derive(Debug, Deserialize)]
pub struct TemplateReply {
    pub text: String,
}
