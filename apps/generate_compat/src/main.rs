mod cli;
mod config;

use clap::error::ErrorKind;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tts_compat_audio::{load_waveform, play_wav, resample_waveform, save_waveform};
use tts_compat_core::{
    select_device, BackendResolver, CompatError, GenerationDispatcher, PythonRuntime, Result,
    Runtime, SynthesisRequest, Waveform, CANONICAL_SAMPLE_RATE,
};

use crate::cli::Cli;
use crate::config::CompatConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Logging / tracing; stdout is reserved for the result line
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "info,tts_compat_core=info,tts_compat_audio=info,generate_compat=info".to_string()
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };
    if cli.join_audio {
        debug!(target: "generate_compat", "--join_audio has no effect; output is always one file");
    }

    let config = CompatConfig::load(cli.config.as_deref());
    match run(&cli, &config).await {
        Ok(path) => {
            println!("Audio saved to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli, config: &CompatConfig) -> Result<PathBuf> {
    if let Some(reference) = &cli.ref_audio {
        if !reference.exists() {
            return Err(CompatError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Reference audio file not found: {}", reference.display()),
            )));
        }
    }

    let runtime = Arc::new(PythonRuntime::spawn(config.runtime.python_runtime()).await?);
    let outcome = synthesize(cli, config, Arc::clone(&runtime)).await;
    if let Err(e) = runtime.shutdown().await {
        debug!(target: "generate_compat", error = %e, "Runtime worker did not shut down cleanly");
    }

    let waveform = output_waveform(outcome, config.audio.sample_rate)?;
    save_waveform(&cli.output_path, &waveform)?;
    info!(
        target: "generate_compat",
        path = %cli.output_path.display(),
        duration_ms = waveform.duration_ms(),
        "Audio written"
    );

    if cli.play {
        if let Err(e) = play_wav(&cli.output_path, config.audio.player.as_deref()).await {
            warn!(target: "generate_compat", error = %e, "Could not play audio");
        }
    }
    Ok(cli.output_path.clone())
}

/// Bring a synthesis outcome to the output rate; soft failures become silence.
fn output_waveform(outcome: Result<Waveform>, rate: u32) -> Result<Waveform> {
    match outcome {
        Ok(waveform) => Ok(resample_waveform(&waveform, rate)),
        Err(e) if !e.is_fatal() => {
            warn!(target: "generate_compat", error = %e, "Generation failed; writing empty audio");
            Ok(Waveform::silent(rate))
        }
        Err(e) => Err(e),
    }
}

async fn synthesize(
    cli: &Cli,
    config: &CompatConfig,
    runtime: Arc<PythonRuntime>,
) -> Result<Waveform> {
    let report = runtime.probe().await?;
    report.ensure_dependencies()?;
    let device = select_device(&report, config.runtime.device);

    let backend = BackendResolver::with_default_strategies(runtime)
        .resolve(&cli.model, &device)
        .await?;

    // The model always consumes and produces audio at the canonical rate.
    let reference = match &cli.ref_audio {
        Some(path) => Some(load_waveform(path, CANONICAL_SAMPLE_RATE)?),
        None => None,
    };

    let request = SynthesisRequest::new(cli.text.clone())
        .with_voice(cli.voice.clone())
        .with_instruction(cli.instruct.clone())
        .with_speed(cli.speed)
        .with_reference(reference)
        .with_reference_transcript(cli.ref_text.clone());

    let synthesis = GenerationDispatcher::default()
        .synthesize(&backend, &request, &device)
        .await?;
    if synthesis.degraded {
        warn!(
            target: "generate_compat",
            strategy = synthesis.strategy,
            "Audio was taken from raw generation output and may be incorrect"
        );
    }
    Ok(synthesis.waveform)
}
