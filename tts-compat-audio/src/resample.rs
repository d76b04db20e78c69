//! Channel mixing and sample-rate conversion.

use tts_compat_core::Waveform;

/// Average all channels into one. Extra samples on longer channels are dropped.
pub fn downmix(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [mono] => mono.clone(),
        _ => {
            let len = channels.iter().map(Vec::len).min().unwrap_or(0);
            let scale = 1.0 / channels.len() as f32;
            let mut mixed = vec![0.0_f32; len];
            for channel in channels {
                for (acc, value) in mixed.iter_mut().zip(channel) {
                    *acc += *value;
                }
            }
            for value in &mut mixed {
                *value *= scale;
            }
            mixed
        }
    }
}

/// `round(n * target / source)`, computed in integers.
pub fn resampled_len(n: usize, source_rate: u32, target_rate: u32) -> usize {
    if source_rate == 0 {
        return 0;
    }
    let num = n as u128 * target_rate as u128;
    let den = source_rate as u128;
    ((2 * num + den) / (2 * den)) as usize
}

/// Linear interpolation. Output sample `i` is read at source position
/// `i * source_rate / target_rate`, clamped to the last source sample.
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let out_len = resampled_len(samples.len(), source_rate, target_rate);
    let last = samples.len() - 1;
    let step = source_rate as f64 / target_rate as f64;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64).clamp(0.0, 1.0) as f32;
            let a = samples[idx];
            let b = samples[next];
            a + (b - a) * frac
        })
        .collect()
}

/// Convert a whole waveform to `target_rate`; a no-op when the rates match.
pub fn resample_waveform(waveform: &Waveform, target_rate: u32) -> Waveform {
    if waveform.sample_rate == target_rate {
        return waveform.clone();
    }
    Waveform::new(
        resample_linear(&waveform.samples, waveform.sample_rate, target_rate),
        target_rate,
    )
}
