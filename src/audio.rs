//! Audio container handling
//!
//! Decodes browser recordings (RIFF/WAVE), converts them to the format the
//! speech model expects and encodes model input for transport.

use crate::error::AssistantError;
use crate::Result;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FftFixedIn, Resampler};
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Scale between 16-bit samples and normalized floats
pub const NORMALIZATION_FACTOR: f32 = 32768.0;

/// Input frames per resampler chunk
const RESAMPLER_CHUNK: usize = 1024;

/// Sample layout of a clip. `sample_width` is in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub sample_width: u16,
    pub channels: u16,
}

/// What the Whisper model is fed: 16 kHz, 16-bit, mono
pub const TARGET_FORMAT: AudioFormat = AudioFormat {
    sample_rate: 16_000,
    sample_width: 2,
    channels: 1,
};

/// A decoded recording. Samples are interleaved and scaled to [-1, 1].
#[derive(Debug, Clone)]
pub struct AudioClip {
    format: AudioFormat,
    samples: Vec<f32>,
}

impl AudioClip {
    /// Build a clip from 16-bit samples
    pub fn from_pcm16(pcm: &[i16], sample_rate: u32, channels: u16) -> Self {
        Self {
            format: AudioFormat {
                sample_rate,
                sample_width: 2,
                channels,
            },
            samples: normalize(pcm),
        }
    }

    /// Decode a RIFF/WAVE buffer
    pub fn from_wav(bytes: &[u8]) -> Result<Self> {
        let mut reader = WavReader::new(Cursor::new(bytes)).map_err(wav_error)?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(AssistantError::Audio(
                "channel count and sample rate must be non-zero".to_string(),
            ));
        }

        let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect(),
            SampleFormat::Int => {
                let scale = (1i64 << spec.bits_per_sample.saturating_sub(1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect()
            }
        };

        Ok(Self {
            format: AudioFormat {
                sample_rate: spec.sample_rate,
                sample_width: spec.bits_per_sample.div_ceil(8),
                channels: spec.channels,
            },
            samples: samples.map_err(wav_error)?,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of complete frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / self.format.sample_rate.max(1) as u64
    }

    fn channels(&self) -> usize {
        self.format.channels.max(1) as usize
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Self {
        let channels = self.channels();
        if channels == 1 {
            return self.clone();
        }

        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self {
            format: AudioFormat {
                channels: 1,
                ..self.format
            },
            samples,
        }
    }

    /// Change the sample rate. Yields `ceil(frames * to / from)` frames; a
    /// trailing partial frame is dropped.
    pub fn resample(&self, to_rate: u32) -> Result<Self> {
        let from_rate = self.format.sample_rate;
        let channels = self.channels();
        let frames = self.frames();
        let format = AudioFormat {
            sample_rate: to_rate,
            ..self.format
        };

        if from_rate == to_rate || frames == 0 {
            return Ok(Self {
                format,
                samples: self.samples[..frames * channels].to_vec(),
            });
        }

        let lanes = self.lanes();
        let expected = (frames as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;

        let mut resampler = FftFixedIn::<f64>::new(
            from_rate as usize,
            to_rate as usize,
            RESAMPLER_CHUNK,
            2,
            channels,
        )
        .map_err(|e| AssistantError::Audio(format!("resampler setup failed: {}", e)))?;
        let delay = resampler.output_delay();

        let mut output: Vec<Vec<f64>> = vec![Vec::with_capacity(delay + expected); channels];
        let mut position = 0;

        while position < frames {
            let wanted = resampler.input_frames_next();
            let end = (position + wanted).min(frames);
            let chunk: Vec<&[f64]> = lanes.iter().map(|lane| &lane[position..end]).collect();

            let block = if end - position == wanted {
                resampler.process(chunk.as_slice(), None)
            } else {
                resampler.process_partial(Some(chunk.as_slice()), None)
            }
            .map_err(resample_error)?;

            append_lanes(&mut output, block);
            position = end;
        }

        // Drain the filter until the delayed tail is out.
        while output[0].len() < delay + expected {
            let block = resampler
                .process_partial::<&[f64]>(None, None)
                .map_err(resample_error)?;
            if block.first().map_or(true, Vec::is_empty) {
                break;
            }
            append_lanes(&mut output, block);
        }

        let available = output[0].len().saturating_sub(delay).min(expected);
        let mut samples = Vec::with_capacity(available * channels);
        for i in delay..delay + available {
            samples.extend(output.iter().map(|lane| lane[i] as f32));
        }

        Ok(Self { format, samples })
    }

    /// Quantize to 16-bit samples
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s * NORMALIZATION_FACTOR).round().clamp(-32768.0, 32767.0) as i16)
            .collect()
    }

    /// Convert to the target layout, touching only what differs
    pub fn conform(&self, target: AudioFormat) -> Result<Vec<i16>> {
        let mut clip = if self.format.channels != target.channels {
            self.to_mono()
        } else {
            self.clone()
        };

        if clip.format.sample_rate != target.sample_rate {
            clip = clip.resample(target.sample_rate)?;
        }

        Ok(clip.to_pcm16())
    }

    /// De-interleave complete frames into one lane per channel
    fn lanes(&self) -> Vec<Vec<f64>> {
        let channels = self.channels();
        let mut lanes = vec![Vec::with_capacity(self.frames()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (lane, &sample) in lanes.iter_mut().zip(frame) {
                lane.push(sample as f64);
            }
        }
        lanes
    }
}

/// Scale 16-bit samples into [-1, 1]
pub fn normalize(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / NORMALIZATION_FACTOR).collect()
}

/// Wrap mono float samples in a 32-bit IEEE float WAV container
pub fn encode_wav_f32(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    write_wav(spec, samples.iter().copied())
}

/// Wrap 16-bit PCM in a WAV container
pub fn encode_wav_pcm16(pcm: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    write_wav(spec, pcm.iter().copied())
}

/// SHA-256 over the little-endian bytes of normalized samples
pub fn fingerprint(samples: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for sample in samples {
        hasher.update(sample.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

fn write_wav<S: hound::Sample>(spec: WavSpec, samples: impl Iterator<Item = S>) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
    for sample in samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(cursor.into_inner())
}

fn append_lanes(output: &mut [Vec<f64>], block: Vec<Vec<f64>>) {
    for (lane, chunk) in output.iter_mut().zip(block) {
        lane.extend(chunk);
    }
}

fn wav_error(e: hound::Error) -> AssistantError {
    AssistantError::Audio(format!("invalid WAV recording: {}", e))
}

fn resample_error(e: rubato::ResampleError) -> AssistantError {
    AssistantError::Audio(format!("resampling failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_wav_decodes_losslessly() {
        let pcm: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN, 42];
        let wav = encode_wav_pcm16(&pcm, 16_000, 1).unwrap();

        let clip = AudioClip::from_wav(&wav).unwrap();
        assert_eq!(clip.format(), TARGET_FORMAT);
        assert_eq!(clip.frames(), 6);
        assert_eq!(clip.conform(TARGET_FORMAT).unwrap(), pcm);
    }

    #[test]
    fn test_stereo_is_averaged_to_mono() {
        let pcm: Vec<i16> = vec![1000, 3000, -2000, 2000];
        let clip = AudioClip::from_pcm16(&pcm, 16_000, 2);

        assert_eq!(clip.frames(), 2);
        assert_eq!(clip.conform(TARGET_FORMAT).unwrap(), vec![2000, 0]);
    }

    #[test]
    fn test_resample_keeps_level_and_length() {
        let clip = AudioClip::from_pcm16(&vec![4096i16; 32_000], 32_000, 1);

        let out = clip.conform(TARGET_FORMAT).unwrap();
        assert_eq!(out.len(), 16_000);
        // Away from the filter edges a constant stays constant.
        assert!(out[1000..15_000].iter().all(|&s| (s - 4096).abs() <= 1));
    }

    #[test]
    fn test_resample_drops_ragged_frame() {
        // Five samples over two channels: two whole frames and a stray sample
        let clip = AudioClip::from_pcm16(&[100, 200, 300, 400, 500], 16_000, 2);

        let resampled = clip.resample(8_000).unwrap();
        assert_eq!(resampled.format().sample_rate, 8_000);
        assert_eq!(resampled.format().channels, 2);
        assert_eq!(resampled.frames(), 1);
        assert_eq!(resampled.samples().len(), 2);
    }

    #[test]
    fn test_float_wav_decodes() {
        let wav = encode_wav_f32(&[0.5, -0.25], 16_000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");

        let clip = AudioClip::from_wav(&wav).unwrap();
        assert_eq!(clip.samples(), &[0.5, -0.25]);
        assert_eq!(clip.format().sample_width, 4);
    }

    #[test]
    fn test_eight_bit_wav_decodes() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 8,
            sample_format: SampleFormat::Int,
        };
        let wav = write_wav(spec, [0i8, 64].into_iter()).unwrap();

        let clip = AudioClip::from_wav(&wav).unwrap();
        assert_eq!(clip.samples(), &[0.0, 0.5]);
        assert_eq!(clip.format().sample_rate, 8_000);
        assert_eq!(clip.format().sample_width, 1);
    }

    #[test]
    fn test_rejects_non_wav() {
        assert!(matches!(
            AudioClip::from_wav(b"OggS\0\0\0\0\0\0\0\0"),
            Err(AssistantError::Audio(_))
        ));
        assert!(AudioClip::from_wav(&[]).is_err());
    }

    #[test]
    fn test_header_only_wav_is_empty() {
        let wav = encode_wav_pcm16(&[], 16_000, 1).unwrap();
        let clip = AudioClip::from_wav(&wav).unwrap();
        assert!(clip.is_empty());
        assert_eq!(clip.duration_ms(), 0);
    }

    #[test]
    fn test_normalize_divides_by_32768() {
        assert_eq!(normalize(&[16384, -32768, 0]), vec![0.5, -1.0, 0.0]);
    }

    #[test]
    fn test_fingerprint_golden() {
        assert_eq!(
            fingerprint(&normalize(&[1, 2, 3])),
            "ec127a2c352b680a4e2d02ae74e6840162ac98fbbf008f6f54da9c561c6e39ba"
        );
        assert_ne!(
            fingerprint(&normalize(&[1, 2, 3])),
            fingerprint(&normalize(&[1, 2, 4]))
        );
    }
}
