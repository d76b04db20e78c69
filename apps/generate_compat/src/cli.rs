use clap::Parser;
use std::path::PathBuf;

/// Generate speech from text with a local transformers TTS model.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "generate_compat", version)]
pub struct Cli {
    /// Model directory or hub id
    #[arg(long)]
    pub model: String,

    /// Text to synthesize
    #[arg(long, value_parser = non_empty)]
    pub text: String,

    /// Voice name; turned into a style instruction when --instruct is absent
    #[arg(long)]
    pub voice: Option<String>,

    /// Free-form style instruction
    #[arg(long)]
    pub instruct: Option<String>,

    #[arg(long, default_value_t = 1.0, value_parser = positive_speed)]
    pub speed: f32,

    /// Reference audio for voice cloning
    #[arg(long = "ref_audio", alias = "ref-audio")]
    pub ref_audio: Option<PathBuf>,

    /// Transcript of the reference audio
    #[arg(long = "ref_text", alias = "ref-text")]
    pub ref_text: Option<String>,

    /// Play the result after writing it
    #[arg(long)]
    pub play: bool,

    #[arg(long = "output_path", alias = "output-path", default_value = "output.wav")]
    pub output_path: PathBuf,

    /// Accepted for compatibility; output is always a single file
    #[arg(long = "join_audio", alias = "join-audio", hide = true)]
    pub join_audio: bool,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn non_empty(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("must not be empty".into())
    } else {
        Ok(s.to_string())
    }
}

fn positive_speed(s: &str) -> Result<f32, String> {
    let speed: f32 = s.parse().map_err(|_| format!("not a number: {}", s))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err("must be greater than 0".into())
    }
}
