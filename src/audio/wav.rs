//! # WAV I/O
//!
//! The canonical on-disk format between the normalizer and the transcription
//! client. Writing always produces mono 32-bit float; reading accepts any
//! PCM WAV (uploads ending in `.wav` skip normalization) and hands back mono
//! 16-bit samples, which is what the recognition service consumes.

use std::path::Path;

/// Mono 16-bit samples with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Write mono `f32` samples as an IEEE-float WAV file.
pub fn write_mono_f32(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample.clamp(-1.0, 1.0))?;
    }
    writer.finalize()
}

/// Read a PCM WAV file of any layout into mono 16-bit samples.
pub fn read_mono_i16(path: &Path) -> Result<PcmAudio, hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| scale_int_to_i16(s, bits)))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(float_to_i16))
            .collect::<Result<_, _>>()?,
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    };

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn scale_int_to_i16(sample: i32, bits: u16) -> i16 {
    match bits {
        16 => sample as i16,
        b if b > 16 => (sample >> (b - 16)) as i16,
        b => (sample << (16 - b)) as i16,
    }
}

fn float_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_file_reads_back_as_i16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_mono_f32(&path, &[0.0, 0.5, -0.5, 1.0, 2.0], 16_000).unwrap();

        let spec = hound::WavReader::open(&path).unwrap().spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let pcm = read_mono_i16(&path).unwrap();
        assert_eq!(pcm.sample_rate, 16_000);
        assert_eq!(pcm.samples, vec![0, 16384, -16384, 32767, 32767]);
    }

    #[test]
    fn test_stereo_int_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (l, r) in [(1000i16, 3000i16), (-200, -400), (0, 10)] {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();

        let pcm = read_mono_i16(&path).unwrap();
        assert_eq!(pcm.sample_rate, 44_100);
        assert_eq!(pcm.samples, vec![2000, -300, 5]);
    }

    #[test]
    fn test_int_scaling() {
        assert_eq!(scale_int_to_i16(0x7FFF_FF, 24), 0x7FFF);
        assert_eq!(scale_int_to_i16(-128, 8), -32768);
        assert_eq!(scale_int_to_i16(1234, 16), 1234);
    }

    #[test]
    fn test_non_wav_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.wav");
        std::fs::write(&path, b"not a riff file").unwrap();
        assert!(read_mono_i16(&path).is_err());
    }
}
