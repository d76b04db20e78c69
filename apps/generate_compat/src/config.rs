use std::fs;
use std::path::{Path, PathBuf};

use tts_compat_core::{DevicePreference, PythonRuntimeConfig, CANONICAL_SAMPLE_RATE};

/// Settings that are not part of the command line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompatConfig {
    pub runtime: RuntimeConfig,
    pub audio: AudioConfig,
}

/// How the ML runtime worker is started and where models run
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    pub python: PathBuf,
    pub worker_script: Option<PathBuf>,
    pub device: DevicePreference,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioConfig {
    /// Rate of the written file; model output is resampled to it
    pub sample_rate: u32,
    /// Preferred playback binary (aplay|paplay|ffplay|...)
    pub player: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let defaults = PythonRuntimeConfig::default();
        Self {
            python: std::env::var("GENERATE_COMPAT_PYTHON")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.python),
            worker_script: std::env::var("GENERATE_COMPAT_WORKER")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            device: std::env::var("GENERATE_COMPAT_DEVICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: std::env::var("GENERATE_COMPAT_SAMPLE_RATE")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|r| *r > 0)
                .unwrap_or(CANONICAL_SAMPLE_RATE),
            player: std::env::var("GENERATE_COMPAT_PLAYER")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

impl RuntimeConfig {
    pub fn python_runtime(&self) -> PythonRuntimeConfig {
        PythonRuntimeConfig {
            python: self.python.clone(),
            worker_script: self.worker_script.clone(),
            ..PythonRuntimeConfig::default()
        }
    }
}

impl CompatConfig {
    /// Load configuration from a TOML file (explicit path, GENERATE_COMPAT_CONFIG or
    /// ./generate_compat.toml), overlaying values onto env-driven defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let default = Self::default();
        let path = explicit.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var("GENERATE_COMPAT_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("generate_compat.toml"))
        });
        if !path.exists() {
            tracing::debug!(target: "generate_compat", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(&path) {
            Ok(s) => Self::from_toml_str(&s, default),
            Err(e) => {
                tracing::warn!(target: "generate_compat", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str, base: Self) -> Self {
        match toml::from_str::<CompatToml>(s) {
            Ok(t) => t.overlay(base),
            Err(e) => {
                tracing::warn!(target: "generate_compat", error = %e, "Failed to parse TOML; using defaults");
                base
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CompatToml {
    pub runtime: Option<RuntimeToml>,
    pub audio: Option<AudioToml>,
}

impl CompatToml {
    fn overlay(self, mut base: CompatConfig) -> CompatConfig {
        if let Some(r) = self.runtime {
            r.apply(&mut base.runtime);
        }
        if let Some(a) = self.audio {
            a.apply(&mut base.audio);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RuntimeToml {
    pub python: Option<PathBuf>,
    pub worker_script: Option<PathBuf>,
    pub device: Option<DevicePreference>,
}

impl RuntimeToml {
    fn apply(self, cfg: &mut RuntimeConfig) {
        if let Some(v) = self.python {
            cfg.python = v;
        }
        if let Some(v) = self.worker_script {
            cfg.worker_script = Some(v);
        }
        if let Some(v) = self.device {
            cfg.device = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AudioToml {
    pub sample_rate: Option<u32>,
    pub player: Option<String>,
}

impl AudioToml {
    fn apply(self, cfg: &mut AudioConfig) {
        if let Some(v) = self.sample_rate.filter(|r| *r > 0) {
            cfg.sample_rate = v;
        }
        if let Some(v) = self.player {
            cfg.player = Some(v);
        }
    }
}
