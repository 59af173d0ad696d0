// Audio probing - Decode enough of an audio buffer to learn its duration
// WAV through hound, FLAC through claxon, everything else through symphonia

use crate::error::{MediaKind, SyncError, SyncResult};
use std::io::Cursor;

/// Container detected from the buffer's magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
    Other,
}

impl AudioFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioFormat::Wav
        } else if bytes.starts_with(b"fLaC") {
            AudioFormat::Flac
        } else {
            AudioFormat::Other
        }
    }
}

/// What the sync engine needs to know about a decoded recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub format: AudioFormat,
    /// Length in seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Probe an in-memory audio file
///
/// # Errors
/// `Load` when the buffer is empty, undecodable, or has no usable length.
pub fn probe_audio(bytes: &[u8]) -> SyncResult<AudioInfo> {
    if bytes.is_empty() {
        return Err(SyncError::load(MediaKind::Audio, "audio file is empty"));
    }

    let info = match AudioFormat::detect(bytes) {
        AudioFormat::Wav => probe_wav(bytes)?,
        AudioFormat::Flac => probe_flac(bytes)?,
        AudioFormat::Other => probe_with_symphonia(bytes)?,
    };

    if !info.duration.is_finite() || info.duration <= 0.0 {
        return Err(SyncError::load(
            MediaKind::Audio,
            format!("audio has no playable length ({:.3}s)", info.duration),
        ));
    }

    log::debug!(
        "Probed {:?} audio: {:.3}s, {} Hz, {} channel(s)",
        info.format,
        info.duration,
        info.sample_rate,
        info.channels
    );
    Ok(info)
}

fn probe_wav(bytes: &[u8]) -> SyncResult<AudioInfo> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| SyncError::load(MediaKind::Audio, format!("invalid WAV: {}", e)))?;
    let spec = reader.spec();

    if spec.sample_rate == 0 {
        return Err(SyncError::load(MediaKind::Audio, "WAV sample rate is 0"));
    }

    Ok(AudioInfo {
        format: AudioFormat::Wav,
        duration: reader.duration() as f64 / spec.sample_rate as f64,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn probe_flac(bytes: &[u8]) -> SyncResult<AudioInfo> {
    let reader = claxon::FlacReader::new(Cursor::new(bytes))
        .map_err(|e| SyncError::load(MediaKind::Audio, format!("invalid FLAC: {}", e)))?;
    let info = reader.streaminfo();

    let samples = info.samples.ok_or_else(|| {
        SyncError::load(MediaKind::Audio, "FLAC stream does not declare its length")
    })?;
    if info.sample_rate == 0 {
        return Err(SyncError::load(MediaKind::Audio, "FLAC sample rate is 0"));
    }

    Ok(AudioInfo {
        format: AudioFormat::Flac,
        duration: samples as f64 / info.sample_rate as f64,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

fn probe_with_symphonia(bytes: &[u8]) -> SyncResult<AudioInfo> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let source = MediaSourceStream::new(
        Box::new(Cursor::new(bytes.to_vec())),
        MediaSourceStreamOptions::default(),
    );
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SyncError::load(MediaKind::Audio, format!("unsupported audio: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| SyncError::load(MediaKind::Audio, "no audio track found"))?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.unwrap_or(0);
    let channels = params.channels.map_or(0, |c| c.count() as u16);

    // Streams without a frame count (e.g. MP3 without a Xing header) are
    // measured by walking their packets
    let frames = match params.n_frames {
        Some(frames) => frames,
        None => {
            let mut end = 0u64;
            while let Ok(packet) = format.next_packet() {
                if packet.track_id() == track_id {
                    end = end.max(packet.ts() + packet.dur());
                }
            }
            end
        }
    };

    let duration = match params.time_base {
        Some(time_base) => {
            let time = time_base.calc_time(frames);
            time.seconds as f64 + time.frac
        }
        None if sample_rate > 0 => frames as f64 / sample_rate as f64,
        None => {
            return Err(SyncError::load(
                MediaKind::Audio,
                "audio track has neither time base nor sample rate",
            ));
        }
    };

    Ok(AudioInfo {
        format: AudioFormat::Other,
        duration,
        sample_rate,
        channels,
    })
}
