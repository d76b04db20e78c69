use crate::codec::{AudioDecoder, DecodedAudio};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;
use tts_compat_core::{CompatError, Result, StrategyResult, Waveform};

/// RIFF/WAVE reader: PCM 8/16/24/32-bit integer and 32-bit float.
#[derive(Debug, Default)]
pub struct WavDecoder;

fn unsupported(path: &Path, cause: impl ToString) -> CompatError {
    CompatError::UnsupportedAudioFormat {
        path: path.display().to_string(),
        cause: cause.to_string(),
    }
}

/// True when the file starts with a RIFF/WAVE header, however broken the rest is.
fn has_riff_header(path: &Path) -> bool {
    let mut header = [0u8; 12];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map(|_| &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE")
        .unwrap_or(false)
}

impl AudioDecoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, path: &Path) -> StrategyResult<DecodedAudio> {
        let mut reader = match WavReader::open(path) {
            Ok(r) => r,
            Err(hound::Error::IoError(e)) => return StrategyResult::Failed(CompatError::Io(e)),
            Err(hound::Error::FormatError(e)) if has_riff_header(path) => {
                return StrategyResult::Failed(unsupported(path, format!("malformed WAV: {}", e)))
            }
            // Not a RIFF/WAVE container at all.
            Err(hound::Error::FormatError(_)) => return StrategyResult::NotApplicable,
            Err(e) => return StrategyResult::Failed(unsupported(path, e)),
        };

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let mut samples = vec![Vec::new(); channels];

        let read = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .enumerate()
                .try_for_each(|(idx, s)| s.map(|v| samples[idx % channels].push(v))),
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .enumerate()
                    .try_for_each(|(idx, s)| s.map(|v| samples[idx % channels].push(v as f32 * scale)))
            }
        };
        if let Err(e) = read {
            return StrategyResult::Failed(unsupported(path, e));
        }

        debug!(
            target: "codec",
            channels,
            bits = spec.bits_per_sample,
            sample_rate = spec.sample_rate,
            "Decoded WAV"
        );
        StrategyResult::Success(DecodedAudio {
            channels: samples,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Clip to [-1, 1] and map onto the full signed 16-bit range.
pub fn quantize_sample(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s >= 0.0 {
        (s * i16::MAX as f32).round() as i16
    } else {
        (s * -(i16::MIN as f32)).round() as i16
    }
}

fn write_error(e: hound::Error) -> CompatError {
    match e {
        hound::Error::IoError(e) => CompatError::Io(e),
        other => CompatError::Io(io::Error::new(io::ErrorKind::Other, other.to_string())),
    }
}

/// Write a mono 16-bit PCM WAV, creating parent directories as needed.
pub fn save_waveform(path: impl AsRef<Path>, waveform: &Waveform) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(write_error)?;
    for &sample in &waveform.samples {
        writer
            .write_sample(quantize_sample(sample))
            .map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)?;

    debug!(
        target: "codec",
        path = %path.display(),
        samples = waveform.len(),
        "Wrote WAV"
    );
    Ok(())
}
