//! Fixed-size windowing over 48 kHz PCM for C3/C4 chunked embedding (spec
//! §4.5 step 5). Grounded on the teacher's `passage_segmenter.rs` windowing
//! style, generalized from passage boundaries to fixed-size chunks.

pub const CHUNK_SAMPLE_RATE: usize = 48_000;

/// One windowed chunk ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: i64,
    pub offset_sec: f64,
    pub duration_sec: f64,
    pub samples: Vec<f32>,
}

/// Splits `pcm_48k` into `window_s`-second windows with `hop_s`-second hop.
/// Windows shorter than 1 s are dropped; windows in `[1, window_s)` s are
/// padded with trailing silence to `window_s` (spec §4.5 step 5).
pub fn split(pcm_48k: &[f32], window_s: f64, hop_s: f64) -> Vec<Chunk> {
    let window_samples = (window_s * CHUNK_SAMPLE_RATE as f64).round() as usize;
    let hop_samples = (hop_s * CHUNK_SAMPLE_RATE as f64).round() as usize;
    let min_samples = CHUNK_SAMPLE_RATE; // 1 s

    if pcm_48k.is_empty() || window_samples == 0 || hop_samples == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0i64;

    while start < pcm_48k.len() {
        let end = (start + window_samples).min(pcm_48k.len());
        let raw = &pcm_48k[start..end];
        let reached_end = end == pcm_48k.len();

        if raw.len() < min_samples {
            break;
        }

        let mut samples = raw.to_vec();
        let duration_sec = samples.len() as f64 / CHUNK_SAMPLE_RATE as f64;
        if samples.len() < window_samples {
            samples.resize(window_samples, 0.0);
        }

        chunks.push(Chunk {
            index,
            offset_sec: start as f64 / CHUNK_SAMPLE_RATE as f64,
            duration_sec,
            samples,
        });

        // Once a window's end reaches the end of the audio, further hops
        // would only re-cover already-windowed tail samples.
        if reached_end {
            break;
        }

        index += 1;
        start += hop_samples;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_full_windows_at_the_configured_hop() {
        let pcm = vec![0.1f32; CHUNK_SAMPLE_RATE * 22];
        let chunks = split(&pcm, 10.0, 5.0);
        // windows start at 0, 5, 10, 15; the window starting at 15 reaches
        // the end of the 22s clip, so hopping stops there.
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].offset_sec, 0.0);
        assert_eq!(chunks[1].offset_sec, 5.0);
        assert_eq!(chunks[3].offset_sec, 15.0);
        for c in &chunks {
            assert_eq!(c.samples.len(), CHUNK_SAMPLE_RATE * 10);
        }
    }

    #[test]
    fn trailing_window_shorter_than_one_second_is_dropped() {
        // 20.4s of audio: windows at 0, 5, 10, 15 fully sized (15s start -> 5.4s raw, padded),
        // next window would start at 20s with only 0.4s remaining -> dropped.
        let pcm = vec![0.1f32; (CHUNK_SAMPLE_RATE as f64 * 20.4) as usize];
        let chunks = split(&pcm, 10.0, 5.0);
        assert!(chunks.iter().all(|c| c.offset_sec < 20.0));
    }

    #[test]
    fn short_window_between_one_and_window_s_is_padded() {
        let pcm = vec![0.1f32; CHUNK_SAMPLE_RATE * 3];
        let chunks = split(&pcm, 10.0, 5.0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].samples.len(), CHUNK_SAMPLE_RATE * 10);
        assert_eq!(chunks[0].duration_sec, 3.0);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split(&[], 10.0, 5.0).is_empty());
    }
}
