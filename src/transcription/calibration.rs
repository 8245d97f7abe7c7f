//! # Ambient-Noise Calibration
//!
//! Samples the first part of the audio to settle the voice-activity energy
//! threshold before recognition. The calibration window is consumed: only the
//! audio after it is sent to the recognizer.
//!
//! ## Threshold update (per chunk):
//! ```text
//! damping   = DAMPING ^ seconds_per_chunk
//! threshold = threshold * damping + rms(chunk) * ENERGY_RATIO * (1 - damping)
//! ```

use crate::audio::wav::PcmAudio;
use crate::transcription::config::RecognitionConfig;

/// Frames read per calibration step.
pub const CHUNK_FRAMES: usize = 4096;

/// Fraction of the previous threshold kept per second of audio.
pub const DAMPING: f64 = 0.15;

/// Multiplier from measured energy to target threshold.
pub const ENERGY_RATIO: f64 = 1.5;

/// Audio left for recognition after the calibration window.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedAudio {
    pub energy_threshold: f64,
    pub calibration_frames: usize,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Root-mean-square energy of a chunk of 16-bit samples.
pub fn rms(chunk: &[i16]) -> f64 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = chunk.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / chunk.len() as f64).sqrt()
}

#[derive(Debug, Clone)]
pub struct AmbientNoiseCalibrator {
    initial_threshold: f64,
    dynamic: bool,
    window_secs: f64,
}

impl AmbientNoiseCalibrator {
    pub fn new(config: &RecognitionConfig) -> Self {
        Self {
            initial_threshold: config.energy_threshold,
            dynamic: config.dynamic_energy_threshold,
            window_secs: config.ambient_noise_calibration_seconds,
        }
    }

    /// Run calibration over the head of `audio` and hand back the rest.
    pub fn calibrate(&self, audio: PcmAudio) -> CalibratedAudio {
        let PcmAudio {
            mut samples,
            sample_rate,
        } = audio;

        let mut threshold = self.initial_threshold;
        let mut offset = 0;

        if sample_rate > 0 {
            let seconds_per_chunk = CHUNK_FRAMES as f64 / sample_rate as f64;
            let mut elapsed = 0.0;

            loop {
                elapsed += seconds_per_chunk;
                if elapsed > self.window_secs || offset >= samples.len() {
                    break;
                }
                let end = (offset + CHUNK_FRAMES).min(samples.len());
                threshold = adjust(threshold, rms(&samples[offset..end]), seconds_per_chunk);
                offset = end;
            }

            if self.dynamic {
                // Only the reported threshold drifts; the samples are untouched.
                for chunk in samples[offset..].chunks(CHUNK_FRAMES) {
                    threshold = adjust(threshold, rms(chunk), seconds_per_chunk);
                }
            }
        }

        let remaining = samples.split_off(offset);

        tracing::debug!(
            energy_threshold = threshold,
            calibration_frames = offset,
            remaining_frames = remaining.len(),
            "Ambient noise calibration finished"
        );

        CalibratedAudio {
            energy_threshold: threshold,
            calibration_frames: offset,
            samples: remaining,
            sample_rate,
        }
    }
}

fn adjust(threshold: f64, energy: f64, seconds_per_chunk: f64) -> f64 {
    let damping = DAMPING.powf(seconds_per_chunk);
    let target = energy * ENERGY_RATIO;
    threshold * damping + target * (1.0 - damping)
}
