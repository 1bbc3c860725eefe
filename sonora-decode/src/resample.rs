//! One-shot resampling via rubato.
//!
//! Grounded on `wkmp-ap`'s `StatefulResampler`, simplified from a
//! chunk-at-a-time streaming resampler (which must preserve filter state
//! across calls for seamless playback) to a single whole-buffer call, since
//! every clip this crate handles is already fully decoded in memory.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use sonora_common::{Error, Result};

/// Resamples mono `input` from `input_rate` to `output_rate`. Passes through
/// unchanged when the rates already match.
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let chunk_size = input.len();
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        chunk_size,
        1,
    )
    .map_err(|e| {
        Error::DecodeFailed(format!(
            "failed to create resampler {input_rate}Hz -> {output_rate}Hz: {e}"
        ))
    })?;

    let planar_input = vec![input.to_vec()];
    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::DecodeFailed(format!("resampling failed: {e}")))?;

    Ok(planar_output.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3];
        let output = resample_mono(&input, 16000, 16000).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn resampling_changes_sample_count_proportionally() {
        let input = vec![0.0f32; 16000]; // 1 second at 16kHz
        let output = resample_mono(&input, 16000, 48000).unwrap();
        // Allow rubato's usual off-by-a-few-samples edge behavior.
        assert!((output.len() as i64 - 48000).abs() < 200);
    }
}
