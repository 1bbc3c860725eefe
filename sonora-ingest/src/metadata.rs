//! Tag extraction (spec §4.5 step 3), grounded on the teacher's
//! `metadata_extractor.rs`: `lofty::probe::Probe` reads tags without
//! decoding audio.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;
use std::io::Cursor;

/// Subset of tag/file-property fields ingestion persists on the `Track`
/// row (spec §3/§4.5 step 3).
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bitrate: Option<u32>,
    pub format: Option<String>,
}

/// Extracts metadata from in-memory audio bytes. Never fails the whole
/// ingestion — an unreadable tag set yields an all-`None` (besides
/// `format`) result, since duration/decode-ability is established
/// separately by C1 in step 4.
pub fn extract(bytes: &[u8], file_extension: &str) -> TrackMetadata {
    let cursor = Cursor::new(bytes);
    let Ok(tagged_file) = Probe::new(cursor)
        .guess_file_type()
        .and_then(|probe| probe.read())
    else {
        return TrackMetadata {
            format: Some(file_extension.to_string()),
            ..Default::default()
        };
    };

    let properties = tagged_file.properties();
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    TrackMetadata {
        title: tag.and_then(|t| t.title().map(|s| s.to_string())),
        artist: tag.and_then(|t| t.artist().map(|s| s.to_string())),
        album: tag.and_then(|t| t.album().map(|s| s.to_string())),
        genre: tag.and_then(|t| t.genre().map(|s| s.to_string())),
        sample_rate: properties.sample_rate(),
        channels: properties.channels(),
        bitrate: properties.audio_bitrate(),
        format: Some(file_extension.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_bytes_still_yield_format() {
        let metadata = extract(b"not actually audio", "mp3");
        assert_eq!(metadata.format.as_deref(), Some("mp3"));
        assert!(metadata.title.is_none());
    }
}
