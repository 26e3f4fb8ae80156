//! WAV encoding and decoding.
//!
//! Stems travel as WAV both from the synthesis provider and in the durable
//! store. Decoding always lands on interleaved `f32` samples; 16-bit
//! sources are scaled by 1/32768. Encoding writes whatever sample encoding
//! the waveform's format declares.

use std::io::Cursor;

use thiserror::Error;

use crate::format::{Format, SampleFormat};
use crate::waveform::Waveform;

/// Error type for WAV codec operations.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("wav decode error: {0}")]
    Decode(String),

    #[error("wav encode error: {0}")]
    Encode(String),

    #[error("unsupported wav format: {0}")]
    Unsupported(String),
}

/// Decodes a WAV byte buffer into a waveform.
pub fn decode(bytes: &[u8]) -> Result<Waveform, WavError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| WavError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let (samples, sample_format) = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => {
            let samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            (
                samples.map_err(|e| WavError::Decode(e.to_string()))?,
                SampleFormat::Float32,
            )
        }
        (hound::SampleFormat::Int, 16) => {
            let samples: Result<Vec<f32>, _> = reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect();
            (
                samples.map_err(|e| WavError::Decode(e.to_string()))?,
                SampleFormat::Int16,
            )
        }
        (fmt, bits) => {
            return Err(WavError::Unsupported(format!("{fmt:?} at {bits} bits")));
        }
    };

    let format = Format {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        sample_format,
    };
    Ok(Waveform::new(format, samples))
}

/// Encodes a waveform into WAV bytes using its declared sample encoding.
pub fn encode(waveform: &Waveform) -> Result<Vec<u8>, WavError> {
    let format = waveform.format();
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.sample_format.bits(),
        sample_format: match format.sample_format {
            SampleFormat::Int16 => hound::SampleFormat::Int,
            SampleFormat::Float32 => hound::SampleFormat::Float,
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| WavError::Encode(e.to_string()))?;
        match format.sample_format {
            SampleFormat::Float32 => {
                for &s in waveform.samples() {
                    writer
                        .write_sample(s)
                        .map_err(|e| WavError::Encode(e.to_string()))?;
                }
            }
            SampleFormat::Int16 => {
                for &s in waveform.samples() {
                    let t = s.clamp(-1.0, 1.0);
                    let v = if t >= 0.0 {
                        (t * 32767.0) as i16
                    } else {
                        (t * 32768.0) as i16
                    };
                    writer
                        .write_sample(v)
                        .map_err(|e| WavError::Encode(e.to_string()))?;
                }
            }
        }
        writer
            .finalize()
            .map_err(|e| WavError::Encode(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
