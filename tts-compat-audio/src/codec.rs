//! Reference audio loading.
//!
//! Decoders are tried in order; each one reports whether it recognised the
//! file (`NotApplicable` when it did not). The result is downmixed to mono and
//! linearly resampled to the requested rate.

use crate::resample::{downmix, resample_linear};
use crate::wav::WavDecoder;
use std::path::Path;
use tracing::info;
use tts_compat_core::{log_outcome, CompatError, Result, StrategyResult, Waveform};

/// Channel-separated samples as they came out of a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

pub trait AudioDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, path: &Path) -> StrategyResult<DecodedAudio>;
}

pub struct DecoderChain {
    decoders: Vec<Box<dyn AudioDecoder>>,
}

impl Default for DecoderChain {
    fn default() -> Self {
        #[allow(unused_mut)]
        let mut decoders: Vec<Box<dyn AudioDecoder>> = vec![Box::new(WavDecoder)];
        #[cfg(feature = "codecs")]
        decoders.push(Box::new(compressed::SymphoniaDecoder));
        Self { decoders }
    }
}

impl DecoderChain {
    pub fn new(decoders: Vec<Box<dyn AudioDecoder>>) -> Self {
        Self { decoders }
    }

    pub fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        // A missing or unreadable file is an I/O problem, not a format problem.
        std::fs::metadata(path)?;

        let mut last_failure: Option<CompatError> = None;
        for decoder in &self.decoders {
            let outcome = decoder.decode(path);
            log_outcome("codec", decoder.name(), &outcome);
            match outcome {
                StrategyResult::Success(audio) => return Ok(audio),
                StrategyResult::NotApplicable => {}
                StrategyResult::Failed(e) => last_failure = Some(e),
            }
        }

        let cause = match last_failure {
            Some(CompatError::UnsupportedAudioFormat { cause, .. }) => cause,
            Some(other) => other.to_string(),
            None if cfg!(feature = "codecs") => "no decoder recognised the file".to_string(),
            None => "not a WAV file (build with the `codecs` feature for compressed formats)"
                .to_string(),
        };
        Err(CompatError::UnsupportedAudioFormat {
            path: path.display().to_string(),
            cause,
        })
    }
}

/// Decode `path`, downmix to mono and resample to `target_rate`.
pub fn load_waveform(path: impl AsRef<Path>, target_rate: u32) -> Result<Waveform> {
    let path = path.as_ref();
    let decoded = DecoderChain::default().decode(path)?;
    let source_rate = decoded.sample_rate;
    let channel_count = decoded.channels.len();

    let mono = downmix(&decoded.channels);
    let samples = resample_linear(&mono, source_rate, target_rate);
    info!(
        target: "codec",
        path = %path.display(),
        channels = channel_count,
        source_rate,
        target_rate,
        samples = samples.len(),
        "Loaded reference audio"
    );
    Ok(Waveform::new(samples, target_rate))
}

#[cfg(feature = "codecs")]
mod compressed {
    use super::{AudioDecoder, DecodedAudio};
    use std::fs::File;
    use std::io::ErrorKind;
    use std::path::Path;
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;
    use tts_compat_core::{CompatError, StrategyResult};

    /// Compressed containers and codecs (mp3, flac, ogg/vorbis, aac...).
    pub struct SymphoniaDecoder;

    fn failed<T>(path: &Path, cause: impl ToString) -> StrategyResult<T> {
        StrategyResult::Failed(CompatError::UnsupportedAudioFormat {
            path: path.display().to_string(),
            cause: cause.to_string(),
        })
    }

    impl AudioDecoder for SymphoniaDecoder {
        fn name(&self) -> &'static str {
            "symphonia"
        }

        fn decode(&self, path: &Path) -> StrategyResult<DecodedAudio> {
            let file = match File::open(path) {
                Ok(f) => f,
                Err(e) => return StrategyResult::Failed(CompatError::Io(e)),
            };
            let stream = MediaSourceStream::new(Box::new(file), Default::default());
            let mut hint = Hint::new();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                hint.with_extension(ext);
            }

            let probed = match symphonia::default::get_probe().format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            ) {
                Ok(p) => p,
                Err(_) => return StrategyResult::NotApplicable,
            };
            let mut format = probed.format;

            let (track_id, params) = match format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            {
                Some(track) => (track.id, track.codec_params.clone()),
                None => return failed(path, "no audio track"),
            };
            let Some(mut sample_rate) = params.sample_rate else {
                return failed(path, "unknown sample rate");
            };
            let mut decoder =
                match symphonia::default::get_codecs().make(&params, &DecoderOptions::default()) {
                    Ok(d) => d,
                    Err(e) => return failed(path, e),
                };

            let mut channels: Vec<Vec<f32>> = Vec::new();
            loop {
                let packet = match format.next_packet() {
                    Ok(p) => p,
                    Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                    Err(SymphoniaError::ResetRequired) => break,
                    Err(e) => return failed(path, e),
                };
                if packet.track_id() != track_id {
                    continue;
                }

                let decoded = match decoder.decode(&packet) {
                    Ok(d) => d,
                    // Corrupt frame; skip it.
                    Err(SymphoniaError::DecodeError(_)) => continue,
                    Err(e) => return failed(path, e),
                };
                let spec = *decoded.spec();
                let count = spec.channels.count().max(1);
                sample_rate = spec.rate;
                if channels.len() != count {
                    channels = vec![Vec::new(); count];
                }
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                for (idx, sample) in buffer.samples().iter().enumerate() {
                    channels[idx % count].push(*sample);
                }
            }

            if channels.iter().all(Vec::is_empty) {
                return failed(path, "stream holds no audio frames");
            }
            StrategyResult::Success(DecodedAudio {
                channels,
                sample_rate,
            })
        }
    }
}
