/// Audio decoder implementation using Symphonia
use crate::error::{AudioError, Result};
use crate::wav::pcm16_to_sample;
use mastering_core::{AudioDecoder, DecodedAudio, SampleRate};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fallback when the container does not declare a rate
const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Audio decoder using Symphonia
///
/// Supports: MP3, FLAC, OGG/Vorbis, WAV, AAC
///
/// Decodes the whole default track into memory. The channel layout is kept as is:
/// mono stays mono, stereo stays stereo. Downmixing happens later, when a block is
/// written into the output context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self
    }

    fn decode_stream(mss: MediaSourceStream, hint: &Hint) -> Result<DecodedAudio> {
        let probed = symphonia::default::get_probe()
            .format(hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::Symphonia(format!("Failed to probe file: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| AudioError::DecodeError("No audio tracks found".to_string()))?;

        let sample_rate = track.codec_params.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Symphonia(format!("Failed to create decoder: {}", e)))?;

        let mut channels: Vec<Vec<f32>> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::Symphonia(format!("Error reading packet: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frames are skipped, the rest of the stream is still usable
                    warn!(error = %e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(format!("Decode error: {}", e))),
            };

            append_planar(decoded, &mut channels);
        }

        if channels.is_empty() {
            return Err(AudioError::DecodeError("Stream contains no audio".to_string()));
        }

        let audio = DecodedAudio::new(channels, SampleRate::new(sample_rate))?;
        debug!(
            channels = audio.channel_count(),
            frames = audio.frames(),
            sample_rate,
            "Decoded audio"
        );
        Ok(audio)
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode_bytes(
        &mut self,
        bytes: Vec<u8>,
        extension_hint: Option<&str>,
    ) -> mastering_core::Result<DecodedAudio> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        Self::decode_stream(mss, &hint).map_err(Into::into)
    }
}

/// Append one decoded packet to planar f32 channels
///
/// Signed integers divide by 2^(N-1), except PCM16 which uses the inverse of
/// [`crate::wav::sample_to_pcm16`] so a re-encoded WAV keeps every sample.
/// Unsigned formats are re-centred around zero and float input is clamped since
/// it can carry intersample peaks above full scale.
fn append_planar(decoded: AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
    let count = decoded.spec().channels.count();
    if channels.is_empty() {
        channels.resize_with(count, Vec::new);
    }

    match decoded {
        AudioBufferRef::F32(buf) => extend_channels(&buf, channels, |s| s.clamp(-1.0, 1.0)),
        AudioBufferRef::F64(buf) => extend_channels(&buf, channels, |s| (s as f32).clamp(-1.0, 1.0)),
        AudioBufferRef::S32(buf) => extend_channels(&buf, channels, |s| s as f32 / 2147483648.0),
        AudioBufferRef::S24(buf) => extend_channels(&buf, channels, |s| s.inner() as f32 / 8388608.0),
        AudioBufferRef::S16(buf) => extend_channels(&buf, channels, pcm16_to_sample),
        AudioBufferRef::S8(buf) => extend_channels(&buf, channels, |s| f32::from(s) / 128.0),
        AudioBufferRef::U32(buf) => {
            extend_channels(&buf, channels, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        AudioBufferRef::U24(buf) => {
            extend_channels(&buf, channels, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0);
        }
        AudioBufferRef::U16(buf) => {
            extend_channels(&buf, channels, |s| (f32::from(s) / f32::from(u16::MAX)) * 2.0 - 1.0);
        }
        AudioBufferRef::U8(buf) => {
            extend_channels(&buf, channels, |s| (f32::from(s) / f32::from(u8::MAX)) * 2.0 - 1.0);
        }
    }
}

fn extend_channels<T, F>(buf: &symphonia::core::audio::AudioBuffer<T>, channels: &mut [Vec<f32>], normalize: F)
where
    T: symphonia::core::sample::Sample + Copy,
    F: Fn(T) -> f32,
{
    let available = buf.spec().channels.count();
    for (index, out) in channels.iter_mut().enumerate() {
        if index < available {
            out.extend(buf.chan(index).iter().map(|&s| normalize(s)));
        } else {
            // Layout changed mid-stream; keep channels aligned
            out.resize(out.len() + buf.frames(), 0.0);
        }
    }
}
