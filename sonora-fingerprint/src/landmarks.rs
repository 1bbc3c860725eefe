//! Spectral-landmark extraction (spec §4.2 "Algorithm (design level)").
//!
//! Pipeline: STFT at 16 kHz → local-maxima peak picking per frame → pair
//! each peak with nearby peaks ahead of it in time to form a landmark hash
//! encoding `(f1, f2, Δt)`.

use rustfft::{num_complex::Complex32, FftPlanner};
use std::sync::Arc;

const FRAME_SIZE: usize = 1024;
const HOP_SIZE: usize = 512;
const SAMPLE_RATE: f32 = 16_000.0;

/// Only frequency bins in this range carry usable landmarks for music
/// (roughly 150 Hz .. 5 kHz at a 16 kHz sample rate / 1024-point FFT).
const MIN_BIN: usize = 10;
const MAX_BIN: usize = 320;

/// How many frames ahead of an anchor peak to search for pairing partners.
const FAN_OUT_MIN_FRAMES: usize = 1;
const FAN_OUT_MAX_FRAMES: usize = 32;
/// Cap on how many partners each anchor pairs with, bounding hash count.
const FAN_OUT_DEGREE: usize = 5;

/// One landmark hash and the query/source time offset it was found at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub hash: u32,
    pub offset_sec: f32,
}

/// Extracts landmark hashes from 16 kHz mono f32 PCM.
pub fn extract_landmarks(pcm_16k: &[f32]) -> Vec<Landmark> {
    let spectrogram = compute_spectrogram(pcm_16k);
    let peaks = pick_peaks(&spectrogram);
    hash_peaks(&peaks)
}

struct FramePeak {
    frame: usize,
    bin: usize,
}

fn compute_spectrogram(pcm: &[f32]) -> Vec<Vec<f32>> {
    if pcm.len() < FRAME_SIZE {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);

    let window: Vec<f32> = (0..FRAME_SIZE)
        .map(|i| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (FRAME_SIZE as f32 - 1.0)).cos()
        })
        .collect();

    let mut frames = Vec::new();
    let mut start = 0;
    while start + FRAME_SIZE <= pcm.len() {
        let mut buf: Vec<Complex32> = pcm[start..start + FRAME_SIZE]
            .iter()
            .zip(&window)
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();

        fft.process(&mut buf);

        let magnitudes: Vec<f32> = buf[..FRAME_SIZE / 2]
            .iter()
            .map(|c| c.norm())
            .collect();

        frames.push(magnitudes);
        start += HOP_SIZE;
    }

    frames
}

fn pick_peaks(spectrogram: &[Vec<f32>]) -> Vec<FramePeak> {
    let mut peaks = Vec::new();

    for (frame_idx, frame) in spectrogram.iter().enumerate() {
        let hi = MAX_BIN.min(frame.len().saturating_sub(1));
        for bin in MIN_BIN..hi {
            let mag = frame[bin];
            if mag <= 0.0 {
                continue;
            }
            let is_local_max = mag >= frame[bin - 1] && mag >= frame[bin + 1];
            if is_local_max {
                peaks.push(FramePeak { frame: frame_idx, bin });
            }
        }
    }

    peaks
}

fn hash_peaks(peaks: &[FramePeak]) -> Vec<Landmark> {
    let mut landmarks = Vec::new();
    let frame_duration = HOP_SIZE as f32 / SAMPLE_RATE;

    for (i, anchor) in peaks.iter().enumerate() {
        let mut partners = 0;
        for candidate in &peaks[i + 1..] {
            let delta_frames = candidate.frame.saturating_sub(anchor.frame);
            if delta_frames < FAN_OUT_MIN_FRAMES {
                continue;
            }
            if delta_frames > FAN_OUT_MAX_FRAMES {
                break;
            }

            landmarks.push(Landmark {
                hash: encode_hash(anchor.bin, candidate.bin, delta_frames),
                offset_sec: anchor.frame as f32 * frame_duration,
            });

            partners += 1;
            if partners >= FAN_OUT_DEGREE {
                break;
            }
        }
    }

    landmarks
}

/// Packs `(f1, f2, delta_t)` into a 32-bit hash: 9 bits per frequency bin
/// (covers MAX_BIN < 512) and 6 bits for the frame delta (covers
/// FAN_OUT_MAX_FRAMES <= 63), leaving the top bits zero.
fn encode_hash(bin1: usize, bin2: usize, delta_frames: usize) -> u32 {
    let f1 = (bin1 as u32) & 0x1FF;
    let f2 = (bin2 as u32) & 0x1FF;
    let dt = (delta_frames as u32) & 0x3F;
    (f1 << 15) | (f2 << 6) | dt
}

/// A single "hop" of tolerance in the consensus histogram (spec §4.2,
/// §4.6): one STFT hop at the fingerprint sample rate.
pub fn hop_tolerance_sec() -> f32 {
    HOP_SIZE as f32 / SAMPLE_RATE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave(freq: f32, duration_s: f32) -> Vec<f32> {
        let n = (duration_s * SAMPLE_RATE) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE).sin() * 0.5)
            .collect()
    }

    #[test]
    fn extracts_landmarks_from_tonal_signal() {
        let pcm = sine_wave(440.0, 5.0);
        let landmarks = extract_landmarks(&pcm);
        assert!(!landmarks.is_empty());
    }

    #[test]
    fn short_signal_yields_no_landmarks() {
        let pcm = vec![0.0f32; 100];
        let landmarks = extract_landmarks(&pcm);
        assert!(landmarks.is_empty());
    }

    #[test]
    fn identical_signals_yield_identical_hash_sets() {
        let pcm = sine_wave(220.0, 3.0);
        let a = extract_landmarks(&pcm);
        let b = extract_landmarks(&pcm);
        let hashes_a: Vec<u32> = a.iter().map(|l| l.hash).collect();
        let hashes_b: Vec<u32> = b.iter().map(|l| l.hash).collect();
        assert_eq!(hashes_a, hashes_b);
    }
}
