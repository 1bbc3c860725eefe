//! Coarse content fingerprint for ingest-time duplicate detection (C6,
//! spec §4.4). Shares `sonora_fingerprint`'s spectral front end in spirit —
//! an STFT over 16 kHz PCM — but quantizes per second into a 32-bit word
//! using adjacent-band sign comparisons, the same style of fingerprint
//! `chromaprint-rust` produces for the teacher's exact-duplicate detector.
//!
//! This fingerprint is deliberately coarse: it is never used for query-time
//! search, only for ingest-time similarity comparison against duration-
//! bounded candidates (spec §4.4).

use rustfft::{num_complex::Complex32, FftPlanner};

const FRAME_SIZE: usize = 4096;
const SAMPLE_RATE: usize = 16_000;
const NUM_BANDS: usize = 33;

/// Computes one 32-bit word per second of 16 kHz PCM.
pub fn compute(pcm_16k: &[f32]) -> Vec<u32> {
    if pcm_16k.len() < FRAME_SIZE {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);

    let window: Vec<f32> = (0..FRAME_SIZE)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (FRAME_SIZE as f32 - 1.0)).cos())
        .collect();

    let seconds = pcm_16k.len() / SAMPLE_RATE;
    let mut words = Vec::with_capacity(seconds);

    for second in 0..seconds {
        let start = second * SAMPLE_RATE;
        let end = (start + FRAME_SIZE).min(pcm_16k.len());
        if end - start < FRAME_SIZE {
            break;
        }

        let mut buf: Vec<Complex32> = pcm_16k[start..end]
            .iter()
            .zip(&window)
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();
        fft.process(&mut buf);

        let bands = band_energies(&buf);
        words.push(bands_to_word(&bands));
    }

    words
}

/// Groups the lower half of the spectrum into `NUM_BANDS + 1` log-ish bands
/// so adjacent bands can be sign-compared (chromaprint's classic trick).
fn band_energies(spectrum: &[Complex32]) -> Vec<f32> {
    let usable = spectrum.len() / 2;
    let bands_count = NUM_BANDS + 1;
    let mut energies = vec![0.0f32; bands_count];

    for (i, energy) in energies.iter_mut().enumerate() {
        let lo = (usable * i) / bands_count;
        let hi = (usable * (i + 1)) / bands_count;
        let sum: f32 = spectrum[lo..hi.max(lo + 1).min(usable)].iter().map(|c| c.norm()).sum();
        *energy = sum;
    }

    energies
}

fn bands_to_word(bands: &[f32]) -> u32 {
    let mut word = 0u32;
    for i in 0..NUM_BANDS {
        if bands[i] > bands[i + 1] {
            word |= 1 << i;
        }
    }
    word
}

/// Normalized Hamming similarity in `[0, 1]` between two fingerprints,
/// compared over their overlapping length (spec §4.4: "compute pairwise
/// similarity; any similarity >= 0.85 is a content duplicate").
pub fn similarity(a: &[u32], b: &[u32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }

    let matching_bits: u32 = a[..len]
        .iter()
        .zip(&b[..len])
        .map(|(x, y)| NUM_BANDS as u32 - (x ^ y).count_ones())
        .sum();

    matching_bits as f32 / (len as f32 * NUM_BANDS as f32)
}

/// Serializes a fingerprint word sequence into the `Vec<u8>` column
/// [`sonora_common::db::Track::content_fingerprint`] stores.
pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Inverse of [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave(freq: f32, duration_s: f32) -> Vec<f32> {
        let rate = SAMPLE_RATE as f32;
        let n = (duration_s * rate) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin() * 0.5)
            .collect()
    }

    #[test]
    fn identical_audio_has_perfect_similarity() {
        let pcm = sine_wave(440.0, 10.0);
        let a = compute(&pcm);
        let b = compute(&pcm);
        assert!(!a.is_empty());
        assert_eq!(similarity(&a, &b), 1.0);
    }

    #[test]
    fn distinct_audio_has_lower_similarity() {
        let a = compute(&sine_wave(440.0, 10.0));
        let b = compute(&sine_wave(880.0, 10.0));
        assert!(similarity(&a, &b) < 0.85);
    }

    #[test]
    fn bytes_round_trip() {
        let words = compute(&sine_wave(300.0, 5.0));
        let bytes = to_bytes(&words);
        assert_eq!(from_bytes(&bytes), words);
    }

    #[test]
    fn short_clip_yields_empty_fingerprint() {
        let pcm = vec![0.0f32; 100];
        assert!(compute(&pcm).is_empty());
    }
}
