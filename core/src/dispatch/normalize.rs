use crate::backend::GenerationOutput;
use crate::waveform::Waveform;
use crate::{CompatError, Result};

/// Keys looked up, in order, on dict- and record-shaped results.
const AUDIO_KEYS: [&str; 2] = ["audio", "waveform"];

/// Collapse whatever a backend returned into a flat waveform at `sample_rate`.
pub fn normalize_output(output: &GenerationOutput, sample_rate: u32) -> Result<Waveform> {
    let samples = extract_samples(output)?;
    if samples.is_empty() {
        return Err(CompatError::Generation {
            cause: "backend returned empty audio".into(),
        });
    }
    Ok(Waveform::new(samples, sample_rate))
}

fn extract_samples(output: &GenerationOutput) -> Result<Vec<f32>> {
    match output {
        GenerationOutput::Tensor { tensor } => Ok(tensor.flatten_f32()),
        GenerationOutput::Mapping { entries: fields }
        | GenerationOutput::Record { fields, .. } => {
            let audio = AUDIO_KEYS.iter().find_map(|k| fields.get(*k)).ok_or_else(|| {
                CompatError::Generation {
                    cause: format!(
                        "{} result has no audio or waveform field (found: {})",
                        output.kind(),
                        fields.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                }
            })?;
            extract_samples(audio)
        }
        GenerationOutput::Sequence { items } => items
            .iter()
            .map(|item| match item {
                GenerationOutput::Number { value } => Ok(*value as f32),
                other => Err(CompatError::Generation {
                    cause: format!("sequence result holds a {}, expected numbers", other.kind()),
                }),
            })
            .collect(),
        GenerationOutput::Number { .. } => Err(CompatError::Generation {
            cause: "backend returned a single number instead of audio".into(),
        }),
        GenerationOutput::Opaque { type_name } => Err(CompatError::Generation {
            cause: format!("cannot interpret backend result of type {}", type_name),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use std::collections::BTreeMap;

    fn tensor(values: Vec<f32>) -> GenerationOutput {
        GenerationOutput::tensor(Tensor::from_f32(vec![1, values.len()], values).unwrap())
    }

    #[test]
    fn tensor_is_flattened() {
        let w = normalize_output(&tensor(vec![0.1, 0.2]), 24_000).unwrap();
        assert_eq!(w.samples, vec![0.1, 0.2]);
        assert_eq!(w.sample_rate, 24_000);
    }

    #[test]
    fn mapping_prefers_audio_over_waveform() {
        let mut entries = BTreeMap::new();
        entries.insert("waveform".to_string(), tensor(vec![9.0]));
        entries.insert("audio".to_string(), tensor(vec![0.5]));
        let w = normalize_output(&GenerationOutput::Mapping { entries }, 16_000).unwrap();
        assert_eq!(w.samples, vec![0.5]);
    }

    #[test]
    fn record_falls_back_to_waveform_field() {
        let mut fields = BTreeMap::new();
        fields.insert("waveform".to_string(), tensor(vec![0.25, -0.25]));
        let out = GenerationOutput::Record {
            type_name: "TTSOutput".into(),
            fields,
        };
        assert_eq!(normalize_output(&out, 24_000).unwrap().samples, vec![0.25, -0.25]);
    }

    #[test]
    fn missing_audio_key_and_empty_audio_fail() {
        let mut entries = BTreeMap::new();
        entries.insert("sequences".to_string(), tensor(vec![1.0]));
        let err = normalize_output(&GenerationOutput::Mapping { entries }, 24_000).unwrap_err();
        assert!(err.to_string().contains("sequences"));
        assert!(normalize_output(&tensor(vec![]), 24_000).is_err());
    }
}
