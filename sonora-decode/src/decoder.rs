//! Format-agnostic decode to mono PCM (spec §4.1).

use sonora_common::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Output sample representation requested from [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    F32,
    I16,
}

const MIN_DURATION_S: f64 = 3.0;

/// Magic-byte content-type sniff, used both by the orchestrator's
/// `UNSUPPORTED_FORMAT` validation gate and as an optional hint fed to the
/// symphonia probe to disambiguate piped input (spec §4.1).
pub fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    match kind.mime_type() {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/ogg" => Some("ogg"),
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" | "video/mp4" => Some("mp4"),
        "audio/x-wav" | "audio/wav" => Some("wav"),
        "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

/// `pcm_duration_seconds` from spec §4.1.
pub fn pcm_duration_seconds(pcm_f32_len: usize, rate: u32) -> f64 {
    pcm_f32_len as f64 / rate as f64
}

/// Decodes `bytes` to mono PCM at `target_rate` in the requested
/// `sample_format`. 16-bit output is produced by a dtype cast of the 32-bit
/// float decode, never by an independent decode (spec §4.1).
pub fn decode(bytes: &[u8], target_rate: u32, sample_format: SampleFormat) -> Result<Vec<u8>> {
    let samples = decode_to_f32(bytes, target_rate)?;
    Ok(match sample_format {
        SampleFormat::F32 => f32_samples_to_bytes(&samples),
        SampleFormat::I16 => f32_to_i16_bytes(&samples),
    })
}

/// Runs the 16 kHz and 48 kHz decodes concurrently (spec §4.1's
/// `decode_dual`). Each decode is CPU-bound symphonia work, so both run on
/// the blocking thread pool per spec §5's scheduling model.
pub async fn decode_dual(bytes: &[u8]) -> Result<(Vec<f32>, Vec<f32>)> {
    let bytes_16k = bytes.to_vec();
    let bytes_48k = bytes.to_vec();

    let (pcm_16k, pcm_48k) = tokio::try_join!(
        tokio::task::spawn_blocking(move || decode_to_f32(&bytes_16k, 16_000)),
        tokio::task::spawn_blocking(move || decode_to_f32(&bytes_48k, 48_000)),
    )
    .map_err(|e| Error::Internal(format!("decode task panicked: {e}")))?;

    let pcm_16k = pcm_16k?;
    let pcm_48k = pcm_48k?;

    debug_assert!(
        (pcm_duration_seconds(pcm_16k.len(), 16_000) - pcm_duration_seconds(pcm_48k.len(), 48_000))
            .abs()
            < 1.0 / 48_000.0 * 4.0,
        "dual-rate decode durations diverged beyond a few 48kHz sample periods"
    );

    Ok((pcm_16k, pcm_48k))
}

fn decode_to_f32(bytes: &[u8], target_rate: u32) -> Result<Vec<f32>> {
    if bytes.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mono = decode_mono_native_rate(bytes)?;
    let resampled = crate::resample::resample_mono(&mono.samples, mono.sample_rate, target_rate)?;

    let min_samples = (MIN_DURATION_S * target_rate as f64).floor() as usize;
    if resampled.len() < min_samples {
        return Err(Error::AudioTooShort(format!(
            "decoded {:.2}s, minimum is {:.1}s",
            pcm_duration_seconds(resampled.len(), target_rate),
            MIN_DURATION_S
        )));
    }

    Ok(resampled)
}

struct DecodedMono {
    samples: Vec<f32>,
    sample_rate: u32,
}

fn decode_mono_native_rate(bytes: &[u8]) -> Result<DecodedMono> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = sniff_format(bytes) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::DecodeFailed(format!("probe failed: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::DecodeFailed("no audio track found".to_string()))?
        .clone();

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::DecodeFailed("sample rate unknown".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::DecodeFailed(format!("failed to create decoder: {e}")))?;

    let track_id = track.id;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(Error::DecodeFailed(format!("error reading packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::DecodeFailed(format!("failed to decode packet: {e}")))?;

        samples.extend(downmix_to_mono_f32(&decoded));
    }

    Ok(DecodedMono {
        samples,
        sample_rate,
    })
}

fn downmix_to_mono_f32(decoded: &AudioBufferRef) -> Vec<f32> {
    fn to_f32<S: Sample>(sample: S) -> f32
    where
        f32: FromSample<S>,
    {
        f32::from_sample(sample)
    }

    macro_rules! downmix {
        ($buf:expr) => {{
            let channels = $buf.spec().channels.count().max(1);
            let frames = $buf.frames();
            let mut mono = Vec::with_capacity(frames);
            for frame in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += to_f32($buf.chan(ch)[frame]);
                }
                mono.push(sum / channels as f32);
            }
            mono
        }};
    }

    match decoded {
        AudioBufferRef::F32(buf) => downmix!(buf),
        AudioBufferRef::U8(buf) => downmix!(buf),
        AudioBufferRef::U16(buf) => downmix!(buf),
        AudioBufferRef::U24(buf) => downmix!(buf),
        AudioBufferRef::U32(buf) => downmix!(buf),
        AudioBufferRef::S8(buf) => downmix!(buf),
        AudioBufferRef::S16(buf) => downmix!(buf),
        AudioBufferRef::S24(buf) => downmix!(buf),
        AudioBufferRef::S32(buf) => downmix!(buf),
        AudioBufferRef::F64(buf) => downmix!(buf),
    }
}

fn f32_samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

fn f32_to_i16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let i = (clamped * i16::MAX as f32) as i16;
        out.extend_from_slice(&i.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav(duration_s: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
            let n = (duration_s * sample_rate as f64) as usize;
            for i in 0..n {
                let t = i as f32 / sample_rate as f32;
                let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.2;
                writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = decode(&[], 16_000, SampleFormat::F32).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[test]
    fn short_clip_is_rejected() {
        let wav = make_wav(1.0, 16_000);
        let err = decode(&wav, 16_000, SampleFormat::F32).unwrap_err();
        assert!(matches!(err, Error::AudioTooShort(_)));
    }

    #[test]
    fn decodes_wav_to_requested_rate() {
        let wav = make_wav(5.0, 44_100);
        let pcm = decode(&wav, 16_000, SampleFormat::F32).unwrap();
        let samples = pcm.len() / 4;
        let duration = pcm_duration_seconds(samples, 16_000);
        assert!((duration - 5.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn dual_rate_decode_durations_agree() {
        let wav = make_wav(5.0, 44_100);
        let (pcm_16k, pcm_48k) = decode_dual(&wav).await.unwrap();
        let d16 = pcm_duration_seconds(pcm_16k.len(), 16_000);
        let d48 = pcm_duration_seconds(pcm_48k.len(), 48_000);
        assert!((d16 - d48).abs() < 0.05);
    }
}
