//! Track preparation via symphonia
//!
//! Preparing a track means confirming it can be played and reading what the
//! player needs before starting it: duration, stream format, tags. The file is
//! probed and a decoder is constructed, but no packets are decoded.

use crate::playback::preparation::TrackPreparer;
use crate::playback::track::TrackMetadata;
use cadence_common::events::TrackError;
use std::fs::File;
use std::io;
use std::path::Path;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use tracing::debug;

/// `TrackPreparer` backed by symphonia's format probe and codec registry
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaPreparer;

impl SymphoniaPreparer {
    pub fn new() -> Self {
        Self
    }
}

impl TrackPreparer for SymphoniaPreparer {
    fn prepare(&self, path: &Path) -> Result<TrackMetadata, TrackError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TrackError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => TrackError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| map_symphonia_error(path, e))?;

        let mut metadata = TrackMetadata::default();

        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            apply_tags(revision, &mut metadata);
        }

        let format = &mut probed.format;
        if let Some(revision) = format.metadata().current() {
            apply_tags(revision, &mut metadata);
        }

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TrackError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "no audio track found".to_string(),
            })?;

        // Confirms a decoder exists for the codec without decoding anything
        symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| map_symphonia_error(path, e))?;

        let params = &track.codec_params;
        metadata.sample_rate = params.sample_rate;
        metadata.channels = params.channels.map(|c| c.count() as u16);

        metadata.duration_secs = match (params.n_frames, params.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => frames as f64 / f64::from(rate),
            (Some(frames), _) => params
                .time_base
                .map(|tb| {
                    let time = tb.calc_time(frames);
                    time.seconds as f64 + time.frac
                })
                .unwrap_or(0.0),
            _ => 0.0,
        };

        debug!(
            "Prepared {}: {:.2}s, {:?} Hz, {:?} channels",
            path.display(),
            metadata.duration_secs,
            metadata.sample_rate,
            metadata.channels
        );

        Ok(metadata)
    }
}

fn map_symphonia_error(path: &Path, error: SymphoniaError) -> TrackError {
    let path = path.to_path_buf();
    match error {
        SymphoniaError::Unsupported(reason) => TrackError::UnsupportedFormat {
            path,
            reason: reason.to_string(),
        },
        SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            TrackError::Corrupt {
                path,
                reason: "unexpected end of file".to_string(),
            }
        }
        SymphoniaError::IoError(e) => TrackError::Io {
            path,
            reason: e.to_string(),
        },
        other => TrackError::Corrupt {
            path,
            reason: other.to_string(),
        },
    }
}

fn apply_tags(revision: &MetadataRevision, metadata: &mut TrackMetadata) {
    for tag in revision.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if metadata.title.is_none() => {
                metadata.title = Some(tag.value.to_string());
            }
            Some(StandardTagKey::Artist | StandardTagKey::AlbumArtist | StandardTagKey::Performer)
                if metadata.artist.is_none() =>
            {
                metadata.artist = Some(tag.value.to_string());
            }
            Some(StandardTagKey::Album) if metadata.album.is_none() => {
                metadata.album = Some(tag.value.to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_silent_wav(path: &Path, sample_rate: u32, frames: u32) {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * 2 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_prepare_wav_reads_stream_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("half_second.wav");
        write_silent_wav(&path, 44100, 22050);

        let metadata = SymphoniaPreparer::new().prepare(&path).unwrap();

        assert!((metadata.duration_secs - 0.5).abs() < 0.01);
        assert_eq!(metadata.sample_rate, Some(44100));
        assert_eq!(metadata.channels, Some(2));
        assert!(metadata.title.is_none());
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.flac");

        let err = SymphoniaPreparer::new().prepare(&path).unwrap_err();
        assert_eq!(err, TrackError::FileNotFound { path });
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_audio.mp3");
        std::fs::write(&path, b"this is plain text, not an mpeg stream").unwrap();

        let err = SymphoniaPreparer::new().prepare(&path).unwrap_err();
        assert!(
            matches!(
                err,
                TrackError::UnsupportedFormat { .. } | TrackError::Corrupt { .. }
            ),
            "unexpected error: {:?}",
            err
        );
        assert_eq!(err.path(), &path);
    }
}
