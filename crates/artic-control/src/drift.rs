//! Micro-intonation drift generator.
//!
//! Produces a slowly wandering pitch offset: a multiplicative
//! fractional-part noise recursion, low-pass filtered by a second-order
//! Butterworth and scaled to the configured semitone deviation. The
//! generator holds mutable seed and filter state, so each synthesis task
//! owns its own instance.

use std::f64::consts::PI;

const INITIAL_SEED: f64 = 0.7892347;
const FACTOR: f64 = 377.0;

/// Second-order Butterworth lowpass (biquad, Audio EQ Cookbook form with
/// Q = 1/sqrt(2)).
#[derive(Debug, Clone)]
struct ButterworthLowpass {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl ButterworthLowpass {
    fn new(cutoff: f64, sample_rate: f64) -> Self {
        let q = std::f64::consts::FRAC_1_SQRT_2;
        let omega = 2.0 * PI * cutoff / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

/// Per-sample pitch drift source.
#[derive(Debug, Clone)]
pub struct DriftGenerator {
    pitch_deviation: f64,
    pitch_offset: f64,
    seed: f64,
    filter: ButterworthLowpass,
}

impl DriftGenerator {
    /// Creates a drift generator.
    ///
    /// `deviation` is the drift amplitude in semitones above and below the
    /// median (values around 1 work well). `sample_rate` should equal the
    /// control rate. `lowpass_cutoff` is the noise filter cutoff in Hz;
    /// low values (1-4 Hz) give a slow wander.
    pub fn new(deviation: f64, sample_rate: f64, lowpass_cutoff: f64) -> Self {
        Self {
            pitch_deviation: deviation * 2.0,
            pitch_offset: deviation,
            seed: INITIAL_SEED,
            filter: ButterworthLowpass::new(lowpass_cutoff, sample_rate),
        }
    }

    /// Returns one sample of the drift signal, in semitones.
    pub fn drift(&mut self) -> f64 {
        // Noise in [0, 1): multiply the seed and keep the fraction.
        let product = self.seed * FACTOR;
        self.seed = product - (product as i64) as f64;

        let pitch_noise = self.seed * self.pitch_deviation - self.pitch_offset;
        self.filter.process(pitch_noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_is_deterministic() {
        let mut gen1 = DriftGenerator::new(1.0, 250.0, 4.0);
        let mut gen2 = DriftGenerator::new(1.0, 250.0, 4.0);
        for _ in 0..500 {
            assert_eq!(gen1.drift(), gen2.drift());
        }
    }

    #[test]
    fn test_drift_stays_within_deviation() {
        let deviation = 1.5;
        let mut gen = DriftGenerator::new(deviation, 250.0, 4.0);
        for _ in 0..10_000 {
            let sample = gen.drift();
            // Unity-gain lowpass of noise bounded by the deviation; allow
            // a small transient margin.
            assert!(sample.abs() <= deviation * 1.05, "drift {sample} out of range");
        }
    }

    #[test]
    fn test_drift_varies() {
        let mut gen = DriftGenerator::new(1.0, 250.0, 4.0);
        let samples: Vec<f64> = (0..100).map(|_| gen.drift()).collect();
        let first = samples[0];
        assert!(samples.iter().any(|&s| (s - first).abs() > 1e-6));
    }
}
