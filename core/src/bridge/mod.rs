//! Python bridge for the transformers runtime.
//!
//! Keeps one worker process alive for the whole run and talks to it over
//! stdin/stdout, one JSON document per line. Models and processors live in the
//! worker and are addressed by handle ids. Requests are strictly sequential.

mod handles;
pub mod protocol;

pub use handles::{PyModel, PyProcessor};

use crate::backend::{ModelBackend, ProcessorBackend};
use crate::runtime::{LoadSpec, Runtime, RuntimeReport, REQUIRED_PACKAGES};
use crate::{CompatError, Result};
use async_trait::async_trait;
use protocol::{HasTypesReply, ModelLoaded, ProcessorLoaded, WorkerFailure, WorkerRequest, WorkerResponse};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Worker source shipped inside the binary.
pub const WORKER_SOURCE: &str = include_str!("worker.py");

#[derive(Debug, Clone, PartialEq)]
pub struct PythonRuntimeConfig {
    /// Interpreter used to run the worker
    pub python: PathBuf,
    /// Use this worker script instead of the embedded one
    pub worker_script: Option<PathBuf>,
    /// Where the embedded worker is written before launch
    pub scratch_dir: PathBuf,
}

impl Default for PythonRuntimeConfig {
    fn default() -> Self {
        let python = if cfg!(windows) { "python" } else { "python3" };
        Self {
            python: PathBuf::from(python),
            worker_script: None,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

enum WorkerScript {
    Provided(PathBuf),
    Extracted(PathBuf),
}

impl WorkerScript {
    fn path(&self) -> &Path {
        match self {
            WorkerScript::Provided(p) | WorkerScript::Extracted(p) => p,
        }
    }
}

struct WorkerIo {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

pub(crate) struct WorkerClient {
    io: Mutex<WorkerIo>,
    next_id: AtomicU64,
    script: WorkerScript,
}

impl WorkerClient {
    /// Send one command and wait for its reply. The outer error is a transport
    /// problem, the inner one an exception raised by the command itself.
    pub(crate) async fn exchange(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<std::result::Result<serde_json::Value, WorkerFailure>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&WorkerRequest { id, command, args })?;
        line.push('\n');

        let mut io = self.io.lock().await;
        debug!(target: "python_bridge", id, command, "Sending request");
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        loop {
            let mut reply = String::new();
            if io.stdout.read_line(&mut reply).await? == 0 {
                return Err(CompatError::Protocol(format!(
                    "worker exited while handling '{}'",
                    command
                )));
            }
            let reply = reply.trim();
            if !reply.starts_with('{') {
                debug!(target: "python_bridge", output = reply, "Skipping non-protocol output");
                continue;
            }

            let response: WorkerResponse = serde_json::from_str(reply).map_err(|e| {
                CompatError::Protocol(format!("malformed reply to '{}': {}", command, e))
            })?;
            if matches!(response.id, Some(got) if got != id) {
                return Err(CompatError::Protocol(format!(
                    "reply id {:?} does not match request {}",
                    response.id, id
                )));
            }
            return Ok(response.into_outcome());
        }
    }

    pub(crate) async fn call<R: DeserializeOwned>(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<R> {
        let value = self.exchange(command, args).await??;
        serde_json::from_value(value)
            .map_err(|e| CompatError::Protocol(format!("unexpected reply to '{}': {}", command, e)))
    }
}

impl Drop for WorkerClient {
    fn drop(&mut self) {
        if let WorkerScript::Extracted(path) = &self.script {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// [`Runtime`] backed by a Python transformers worker.
pub struct PythonRuntime {
    client: Arc<WorkerClient>,
}

impl PythonRuntime {
    /// Launch the worker. Does not import any ML library yet; call
    /// [`Runtime::probe`] for that.
    pub async fn spawn(config: PythonRuntimeConfig) -> Result<Self> {
        let script = match &config.worker_script {
            Some(path) => WorkerScript::Provided(path.clone()),
            None => {
                let path = config
                    .scratch_dir
                    .join(format!("generate_compat_worker_{}.py", std::process::id()));
                tokio::fs::write(&path, WORKER_SOURCE).await?;
                WorkerScript::Extracted(path)
            }
        };

        info!(
            target: "python_bridge",
            python = %config.python.display(),
            script = %script.path().display(),
            "Starting runtime worker"
        );

        let spawned = Command::new(&config.python)
            .arg("-u")
            .arg(script.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                if let WorkerScript::Extracted(path) = &script {
                    let _ = std::fs::remove_file(path);
                }
                return Err(match e.kind() {
                    io::ErrorKind::NotFound => CompatError::Runtime(format!(
                        "Python interpreter '{}' not found",
                        config.python.display()
                    )),
                    _ => CompatError::Io(e),
                });
            }
        };

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CompatError::Runtime("worker stdin is not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CompatError::Runtime("worker stdout is not piped".into()))?;

        Ok(Self {
            client: Arc::new(WorkerClient {
                io: Mutex::new(WorkerIo {
                    child,
                    stdin,
                    stdout: BufReader::new(stdout),
                }),
                next_id: AtomicU64::new(1),
                script,
            }),
        })
    }

    /// Ask the worker to exit and wait for it.
    pub async fn shutdown(&self) -> Result<()> {
        if let Err(failure) = self.client.exchange("shutdown", json!({})).await? {
            warn!(target: "python_bridge", kind = %failure.kind, "Worker reported an error on shutdown");
        }
        let mut io = self.client.io.lock().await;
        let status = io.child.wait().await?;
        debug!(target: "python_bridge", %status, "Runtime worker exited");
        Ok(())
    }
}

fn load_args(spec: &LoadSpec) -> serde_json::Value {
    json!({
        "type_name": spec.type_name,
        "path": spec.path,
        "trust_remote_code": spec.trust_remote_code,
        "device": spec.device.runtime_name(),
        "dtype": spec.device.precision.as_dtype(),
    })
}

#[async_trait]
impl Runtime for PythonRuntime {
    fn name(&self) -> &str {
        "python-transformers"
    }

    async fn probe(&self) -> Result<RuntimeReport> {
        let report: RuntimeReport = self
            .client
            .call("check", json!({ "packages": REQUIRED_PACKAGES }))
            .await?;
        debug!(
            target: "python_bridge",
            torch = ?report.torch_version,
            transformers = ?report.transformers_version,
            cuda = report.cuda_available,
            "Runtime probed"
        );
        Ok(report)
    }

    async fn has_types(&self, names: &[&str]) -> Result<bool> {
        let reply: HasTypesReply = self
            .client
            .call("has_types", json!({ "names": names }))
            .await?;
        Ok(reply.present)
    }

    async fn load_processor(&self, spec: &LoadSpec) -> Result<Arc<dyn ProcessorBackend>> {
        let loaded: ProcessorLoaded = self.client.call("load_processor", load_args(spec)).await?;
        debug!(
            target: "python_bridge",
            handle = %loaded.handle,
            type_name = %spec.type_name,
            "Processor loaded"
        );
        Ok(Arc::new(PyProcessor::new(self.client.clone(), loaded)))
    }

    async fn load_model(&self, spec: &LoadSpec) -> Result<Arc<dyn ModelBackend>> {
        let loaded: ModelLoaded = self.client.call("load_model", load_args(spec)).await?;
        debug!(
            target: "python_bridge",
            handle = %loaded.handle,
            type_name = %spec.type_name,
            "Model loaded"
        );
        Ok(Arc::new(PyModel::new(self.client.clone(), loaded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_worker_handles_every_command() {
        for command in [
            "check",
            "has_types",
            "load_processor",
            "load_model",
            "tts_generate",
            "apply_chat_template",
            "tokenize",
            "encode",
            "extract_features",
            "generate",
            "decode_audio",
            "shutdown",
        ] {
            assert!(
                WORKER_SOURCE.contains(&format!("\"{}\": cmd_{}", command, command)),
                "worker does not register {}",
                command
            );
        }
    }

    #[test]
    fn load_args_carry_device_and_precision() {
        let device = crate::device::DeviceDescriptor::accelerated("A100");
        let spec = LoadSpec::new("AutoModelForCausalLM", "/models/m", &device).trusting_remote_code();
        let args = load_args(&spec);
        assert_eq!(args["device"], "cuda");
        assert_eq!(args["dtype"], "float16");
        assert_eq!(args["trust_remote_code"], true);
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let dir = std::env::temp_dir();
        let config = PythonRuntimeConfig {
            python: PathBuf::from("/nonexistent/bin/python-for-generate-compat"),
            worker_script: None,
            scratch_dir: dir,
        };
        let err = PythonRuntime::spawn(config).await.err().unwrap();
        assert!(err.to_string().contains("not found"));
        assert!(err.is_fatal());
    }
}
