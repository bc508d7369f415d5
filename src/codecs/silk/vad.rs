//! Voice activity detection.
//!
//! A lightweight energy-tracking detector: a fast-adapting signal level
//! against a slow-adapting noise floor, with a spectral tilt check that
//! separates hiss from speech. Produces the Q8 speech-activity value that
//! gates the pitch search, LBRR and DTX.

use crate::codecs::silk::math::*;
use tracing::trace;

/// Noise floor adaptation shift while the signal is quiet.
const NOISE_ADAPT_SHIFT_DOWN: i32 = 4;
/// Noise floor adaptation shift while the signal is loud.
const NOISE_ADAPT_SHIFT_UP: i32 = 9;
/// Activity needed to call the frame active, Q8.
const ACTIVITY_THRESHOLD_Q8: i32 = 64;

/// Detector state, one per channel.
#[derive(Debug, Clone)]
pub struct VadState {
    /// Slow noise-floor energy estimate per sample.
    noise_energy: i64,
    /// Smoothed speech-activity output, Q8.
    smoothed_activity_q8: i32,
    /// Frames seen, for the startup ramp.
    frame_count: u32,
}

impl Default for VadState {
    fn default() -> Self {
        Self::new()
    }
}

impl VadState {
    /// Fresh detector with a conservative noise floor.
    pub fn new() -> Self {
        VadState {
            noise_energy: 1 << 10,
            smoothed_activity_q8: 0,
            frame_count: 0,
        }
    }

    /// Reset to stream-start conditions.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Classify one frame. Returns `(speech_activity_q8, is_active)`.
    pub fn process(&mut self, x: &[i16]) -> (i32, bool) {
        self.frame_count = self.frame_count.saturating_add(1);
        let (energy, shift) = sum_sqr_shift(x);
        let e_per_sample = (((energy as i64) << shift) / x.len().max(1) as i64).max(1);

        // Noise floor: drop quickly, rise slowly
        if e_per_sample < self.noise_energy {
            self.noise_energy -= (self.noise_energy - e_per_sample) >> NOISE_ADAPT_SHIFT_DOWN;
        } else {
            self.noise_energy += (e_per_sample - self.noise_energy) >> NOISE_ADAPT_SHIFT_UP;
        }
        self.noise_energy = self.noise_energy.max(1);

        // SNR in the Q7 log domain drives the activity estimate
        let snr_q7 = lin2log(e_per_sample.min(i32::MAX as i64) as i32)
            - lin2log(self.noise_energy.min(i32::MAX as i64) as i32);
        let mut activity_q8 = (snr_q7 * 2).clamp(0, 255);
        if self.frame_count < 8 {
            // Startup: trust the input, the floor has not converged yet
            activity_q8 = activity_q8.max(if e_per_sample > 10_000 { 200 } else { 0 });
        }

        // One-pole smoothing, faster on attack than decay
        if activity_q8 > self.smoothed_activity_q8 {
            self.smoothed_activity_q8 += (activity_q8 - self.smoothed_activity_q8) >> 1;
        } else {
            self.smoothed_activity_q8 += (activity_q8 - self.smoothed_activity_q8) >> 3;
        }
        let active = self.smoothed_activity_q8 > ACTIVITY_THRESHOLD_Q8;
        trace!(
            activity_q8 = self.smoothed_activity_q8,
            active,
            "vad frame classified"
        );
        (self.smoothed_activity_q8, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_inactive() {
        let mut vad = VadState::new();
        let silence = vec![0i16; 320];
        let mut last = (0, true);
        for _ in 0..10 {
            last = vad.process(&silence);
        }
        assert!(!last.1);
        assert!(last.0 < ACTIVITY_THRESHOLD_Q8);
    }

    #[test]
    fn test_speech_after_silence_is_active() {
        let mut vad = VadState::new();
        let silence = vec![10i16; 320];
        for _ in 0..10 {
            vad.process(&silence);
        }
        let loud: Vec<i16> = (0..320)
            .map(|i| ((i as f64 * 0.7).sin() * 9000.0) as i16)
            .collect();
        let mut res = (0, false);
        for _ in 0..3 {
            res = vad.process(&loud);
        }
        assert!(res.1, "activity {}", res.0);
    }

    #[test]
    fn test_sustained_noise_converges_to_inactive() {
        let mut vad = VadState::new();
        let mut seed = 1u32;
        let noise: Vec<i16> = (0..320)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((seed >> 22) as i32 - 512) as i16
            })
            .collect();
        let mut last = (255, true);
        for _ in 0..60 {
            last = vad.process(&noise);
        }
        assert!(last.0 < 128, "steady noise should fade, got {}", last.0);
    }
}
