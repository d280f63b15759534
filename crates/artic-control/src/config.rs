//! Controller settings (`control.config`).

use std::path::Path;

use artic_model::ConfigFile;

use crate::error::ControlResult;

/// Settings that shape one synthesis run.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Control rate in Hz. One parameter frame is emitted per period.
    pub control_rate: u32,
    /// Pitch assumed before the first intonation point, in semitones.
    pub initial_pitch: f64,
    /// Constant pitch bias added to every frame, in semitones.
    pub pitch_mean: f64,
    /// Global tempo multiplier (1.0 = nominal).
    pub global_tempo: f64,
    /// Include per-parameter pitch events in the output.
    pub micro_intonation: bool,
    /// Apply the macro-intonation contour.
    pub macro_intonation: bool,
    /// Use cubic (instead of linear) interpolation between intonation
    /// points.
    pub smooth_intonation: bool,
    /// Add per-sample pitch drift.
    pub intonation_drift: bool,
    /// Pick tone-group parameter sets and perturbations at random.
    pub random_intonation: bool,
    /// Scale applied to intonation point semitones.
    pub intonation_factor: f64,
    /// Drift amplitude in semitones.
    pub drift_deviation: f64,
    /// Drift noise lowpass cutoff in Hz.
    pub drift_lowpass_cutoff: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_rate: 250,
            initial_pitch: -20.0,
            pitch_mean: 0.0,
            global_tempo: 1.0,
            micro_intonation: true,
            macro_intonation: true,
            smooth_intonation: true,
            intonation_drift: false,
            random_intonation: false,
            intonation_factor: 1.0,
            drift_deviation: 1.0,
            drift_lowpass_cutoff: 4.0,
        }
    }
}

impl ControlConfig {
    /// Loads settings from a `control.config` file. Missing keys keep
    /// their defaults.
    pub fn load(path: impl AsRef<Path>) -> ControlResult<Self> {
        let file = ConfigFile::load(path)?;
        let defaults = Self::default();
        Ok(Self {
            control_rate: file.value_or("control_rate", defaults.control_rate)?,
            initial_pitch: file.value_or("initial_pitch", defaults.initial_pitch)?,
            pitch_mean: file.value_or("pitch_mean", defaults.pitch_mean)?,
            global_tempo: file.value_or("global_tempo", defaults.global_tempo)?,
            micro_intonation: file.value_bool_or("micro_intonation", defaults.micro_intonation)?,
            macro_intonation: file.value_bool_or("macro_intonation", defaults.macro_intonation)?,
            smooth_intonation: file.value_bool_or("smooth_intonation", defaults.smooth_intonation)?,
            intonation_drift: file.value_bool_or("intonation_drift", defaults.intonation_drift)?,
            random_intonation: file.value_bool_or("random_intonation", defaults.random_intonation)?,
            intonation_factor: file.value_or("intonation_factor", defaults.intonation_factor)?,
            drift_deviation: file.value_or("drift_deviation", defaults.drift_deviation)?,
            drift_lowpass_cutoff: file
                .value_or("drift_lowpass_cutoff", defaults.drift_lowpass_cutoff)?,
        })
    }

    /// Control period in milliseconds.
    pub fn control_period_ms(&self) -> f64 {
        1000.0 / f64::from(self.control_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.control_rate, 250);
        assert_eq!(config.control_period_ms(), 4.0);
        assert!(config.macro_intonation);
        assert!(!config.intonation_drift);
    }

    #[test]
    fn test_load_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.config");
        std::fs::write(
            &path,
            "global_tempo = 1.5\nmacro_intonation = 0\ndrift_deviation = 0.5\n",
        )
        .unwrap();
        let config = ControlConfig::load(&path).unwrap();
        assert_eq!(config.global_tempo, 1.5);
        assert!(!config.macro_intonation);
        assert_eq!(config.drift_deviation, 0.5);
        // Untouched keys keep their defaults.
        assert_eq!(config.control_rate, 250);
    }
}
