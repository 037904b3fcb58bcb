//! PCM16 WAV codec
//!
//! Writes the canonical 44-byte RIFF/WAVE header followed by interleaved 16-bit
//! little-endian samples. Reading goes through `hound`.

use crate::error::{AudioError, Result};
use mastering_core::{DecodedAudio, SampleRate};
use std::io::{self, Cursor, Write};

/// Size of the canonical header
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u32 = 2;

/// Convert a float sample to PCM16
///
/// Clamps to [-1, 1]; negatives scale by 32768 and the rest by 32767. NaN maps to 0.
///
/// Rounds to nearest instead of truncating toward zero, so any value produced by
/// [`pcm16_to_sample`] converts back to the same integer.
#[inline]
pub fn sample_to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

/// Inverse of [`sample_to_pcm16`]
#[inline]
pub fn pcm16_to_sample(value: i16) -> f32 {
    if value < 0 {
        f32::from(value) / 32768.0
    } else {
        f32::from(value) / 32767.0
    }
}

/// Serializes decoded audio as a PCM16 WAV file
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl WavEncoder {
    /// Create an encoder
    pub fn new() -> Self {
        Self
    }

    /// Canonical header for `frames` frames of `channels`-channel PCM16
    pub fn header(channels: u16, sample_rate: u32, frames: usize) -> [u8; WAV_HEADER_LEN] {
        let block_align = u32::from(channels) * BYTES_PER_SAMPLE;
        let byte_rate = sample_rate.saturating_mul(block_align);
        let data_size = u32::try_from(frames as u64 * u64::from(block_align)).unwrap_or(u32::MAX - 36);
        let riff_size = data_size.saturating_add(36);

        let mut header = [0u8; WAV_HEADER_LEN];
        let mut cursor = Cursor::new(&mut header[..]);
        let fields: [&[u8]; 13] = [
            b"RIFF",
            &riff_size.to_le_bytes(),
            b"WAVE",
            b"fmt ",
            &16u32.to_le_bytes(), // fmt chunk size
            &1u16.to_le_bytes(),  // PCM
            &channels.to_le_bytes(),
            &sample_rate.to_le_bytes(),
            &byte_rate.to_le_bytes(),
            &(block_align as u16).to_le_bytes(),
            &BITS_PER_SAMPLE.to_le_bytes(),
            b"data",
            &data_size.to_le_bytes(),
        ];
        for field in fields {
            // The fields add up to exactly 44 bytes
            let _ = cursor.write_all(field);
        }
        header
    }

    /// Encode to an in-memory byte vector
    pub fn encode(&self, audio: &DecodedAudio) -> Vec<u8> {
        let data_len = audio.frames() * audio.channel_count() * BYTES_PER_SAMPLE as usize;
        let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data_len);
        // Writing into a Vec cannot fail
        let _ = self.encode_to(audio, &mut bytes);
        bytes
    }

    /// Stream the encoded file into a writer
    ///
    /// # Errors
    /// Returns any error from the underlying writer
    pub fn encode_to<W: Write>(&self, audio: &DecodedAudio, mut writer: W) -> io::Result<()> {
        let channels = u16::try_from(audio.channel_count()).unwrap_or(u16::MAX);
        writer.write_all(&Self::header(channels, audio.sample_rate().as_hz(), audio.frames()))?;

        const FRAMES_PER_CHUNK: usize = 4096;
        let mut chunk = Vec::with_capacity(FRAMES_PER_CHUNK * audio.channel_count() * 2);
        let mut start = 0;
        while start < audio.frames() {
            let end = (start + FRAMES_PER_CHUNK).min(audio.frames());
            chunk.clear();
            for frame in start..end {
                for channel in audio.channels() {
                    chunk.extend_from_slice(&sample_to_pcm16(channel[frame]).to_le_bytes());
                }
            }
            writer.write_all(&chunk)?;
            start = end;
        }

        writer.flush()
    }
}

/// Decode a 16-bit integer PCM WAV file
///
/// # Errors
/// Returns `WavRead` if the bytes are not a PCM16 WAV file
pub fn decode_pcm16(bytes: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
        return Err(AudioError::WavRead(format!(
            "expected 16-bit integer PCM, found {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .map(|sample| sample.map(pcm16_to_sample))
        .collect::<std::result::Result<Vec<f32>, _>>()?;

    Ok(DecodedAudio::from_interleaved(
        &samples,
        usize::from(spec.channels),
        SampleRate::new(spec.sample_rate),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    fn read_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn header_for_one_thousand_stereo_frames() {
        let audio = DecodedAudio::silence(2, 1000, SampleRate::new(44_100)).unwrap();
        let wav = WavEncoder::new().encode(&audio);

        assert_eq!(wav.len(), 44 + 4000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(read_u32(&wav, 4), 4036);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(read_u32(&wav, 16), 16);
        assert_eq!(read_u16(&wav, 20), 1);
        assert_eq!(read_u16(&wav, 22), 2);
        assert_eq!(read_u32(&wav, 24), 44_100);
        assert_eq!(read_u32(&wav, 28), 176_400);
        assert_eq!(read_u16(&wav, 32), 4);
        assert_eq!(read_u16(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(read_u32(&wav, 40), 4000);
    }

    #[test]
    fn sample_conversion_is_asymmetric() {
        assert_eq!(sample_to_pcm16(-1.0), -32768);
        assert_eq!(sample_to_pcm16(1.0), 32767);
        assert_eq!(sample_to_pcm16(0.0), 0);
        assert_eq!(sample_to_pcm16(-0.0), 0);
        assert_eq!(sample_to_pcm16(2.5), 32767);
        assert_eq!(sample_to_pcm16(-7.0), -32768);
        assert_eq!(sample_to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn samples_are_interleaved() {
        let audio = DecodedAudio::new(vec![vec![1.0, 0.0], vec![-1.0, 0.5]], SampleRate::new(8_000)).unwrap();
        let wav = WavEncoder::new().encode(&audio);

        let samples: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![32767, -32768, 0, 16384]);
    }

    #[test]
    fn empty_buffer_is_header_only() {
        let audio = DecodedAudio::silence(1, 0, SampleRate::new(22_050)).unwrap();
        let wav = WavEncoder::new().encode(&audio);
        assert_eq!(wav.len(), 44);
        assert_eq!(read_u32(&wav, 40), 0);
        assert_eq!(read_u32(&wav, 4), 36);
    }

    #[test]
    fn every_pcm16_value_survives_decode_then_encode() {
        for value in i16::MIN..=i16::MAX {
            assert_eq!(sample_to_pcm16(pcm16_to_sample(value)), value);
        }
    }

    #[test]
    fn decode_reads_back_encoded_file() {
        let audio = DecodedAudio::new(vec![vec![0.25, -0.5, 1.0]], SampleRate::new(16_000)).unwrap();
        let wav = WavEncoder::new().encode(&audio);

        let decoded = decode_pcm16(&wav).unwrap();
        assert_eq!(decoded.channel_count(), 1);
        assert_eq!(decoded.sample_rate(), SampleRate::new(16_000));
        assert_eq!(WavEncoder::new().encode(&decoded), wav);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_pcm16(b"not a wav file"), Err(AudioError::WavRead(_))));
    }
}
