//! Intonation and rhythm configuration.
//!
//! Loaded from the voice pack's `intonation_rhythm/` directory: slope and
//! timing constants from `intonation.config`, foot tempo constants from
//! `rhythm.config`, and one tone-group parameter table per tone-group
//! type.

use std::path::Path;

use artic_model::{ConfigFile, ModelError};
use rand::Rng;
use rand_pcg::Pcg32;

use crate::error::ControlResult;

const INTONATION_CONFIG_FILE: &str = "intonation.config";
const RHYTHM_CONFIG_FILE: &str = "rhythm.config";

/// The tone-group types a phonetic string can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneGroupKind {
    Statement,
    Exclamation,
    Question,
    Continuation,
    Semicolon,
}

impl ToneGroupKind {
    /// All tone-group kinds, in table order.
    pub const ALL: [ToneGroupKind; 5] = [
        ToneGroupKind::Statement,
        ToneGroupKind::Exclamation,
        ToneGroupKind::Question,
        ToneGroupKind::Continuation,
        ToneGroupKind::Semicolon,
    ];

    /// Table index of the kind.
    pub fn index(&self) -> usize {
        match self {
            ToneGroupKind::Statement => 0,
            ToneGroupKind::Exclamation => 1,
            ToneGroupKind::Question => 2,
            ToneGroupKind::Continuation => 3,
            ToneGroupKind::Semicolon => 4,
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            ToneGroupKind::Statement => "tone_group_param-statement.txt",
            ToneGroupKind::Exclamation => "tone_group_param-exclamation.txt",
            ToneGroupKind::Question => "tone_group_param-question.txt",
            ToneGroupKind::Continuation => "tone_group_param-continuation.txt",
            ToneGroupKind::Semicolon => "tone_group_param-semicolon.txt",
        }
    }
}

/// One intonation parameter set: the five pitch-contour quantities of a
/// tone group, in semitones.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntonationParameters {
    /// Baseline pitch of the tone group.
    pub notional_pitch: f32,
    /// Total pretonic pitch movement.
    pub pretonic_pitch_range: f32,
    /// Random perturbation range for pretonic points.
    pub pretonic_perturbation_range: f32,
    /// Pitch movement of the tonic foot.
    pub tonic_pitch_range: f32,
    /// Random perturbation range for the tonic point.
    pub tonic_perturbation_range: f32,
}

/// Intonation slope/timing constants and rhythm tempo constants, plus the
/// per-tone-group parameter tables.
#[derive(Debug, Clone)]
pub struct IntonationRhythm {
    tone_group_parameters: [Vec<IntonationParameters>; 5],
    fixed_parameters: IntonationParameters,
    use_fixed_parameters: bool,

    /// Offset applied to intonation points after the first foot, in ms.
    pub time_offset: f32,
    pub pretonic_base_slope: f32,
    pub pretonic_base_slope_random: f32,
    pub pretonic_slope_random_factor: f32,
    pub tonic_base_slope: f32,
    pub tonic_continuation_base_slope: f32,
    pub tonic_slope_random_factor: f32,
    pub tonic_slope_offset: f32,

    pub rhythm_marked_a: f64,
    pub rhythm_marked_b: f64,
    pub rhythm_marked_div: f64,
    pub rhythm_unmarked_a: f64,
    pub rhythm_unmarked_b: f64,
    pub rhythm_unmarked_div: f64,
    pub rhythm_min_tempo: f64,
    pub rhythm_max_tempo: f64,
}

impl IntonationRhythm {
    /// Loads the configuration from an `intonation_rhythm/` directory.
    pub fn load(dir: impl AsRef<Path>) -> ControlResult<Self> {
        let dir = dir.as_ref();

        let mut tables: [Vec<IntonationParameters>; 5] = Default::default();
        for kind in ToneGroupKind::ALL {
            tables[kind.index()] = load_tone_group_parameters(&dir.join(kind.file_name()))?;
        }

        let intonation = ConfigFile::load(dir.join(INTONATION_CONFIG_FILE))?;
        let rhythm = ConfigFile::load(dir.join(RHYTHM_CONFIG_FILE))?;

        Ok(Self {
            tone_group_parameters: tables,
            fixed_parameters: IntonationParameters::default(),
            use_fixed_parameters: false,
            time_offset: intonation.value("time_offset")?,
            pretonic_base_slope: intonation.value("pretonic_base_slope")?,
            pretonic_base_slope_random: intonation.value("pretonic_base_slope_random")?,
            pretonic_slope_random_factor: intonation.value("pretonic_slope_random_factor")?,
            tonic_base_slope: intonation.value("tonic_base_slope")?,
            tonic_continuation_base_slope: intonation.value("tonic_continuation_base_slope")?,
            tonic_slope_random_factor: intonation.value("tonic_slope_random_factor")?,
            tonic_slope_offset: intonation.value("tonic_slope_offset")?,
            rhythm_marked_a: rhythm.value("marked_a")?,
            rhythm_marked_b: rhythm.value("marked_b")?,
            rhythm_marked_div: rhythm.value("marked_div")?,
            rhythm_unmarked_a: rhythm.value("unmarked_a")?,
            rhythm_unmarked_b: rhythm.value("unmarked_b")?,
            rhythm_unmarked_div: rhythm.value("unmarked_div")?,
            rhythm_min_tempo: rhythm.value("min_tempo")?,
            rhythm_max_tempo: rhythm.value("max_tempo")?,
        })
    }

    /// Creates a configuration with the classic built-in constants and one
    /// flat parameter set per tone group. Used by tests and callers that
    /// construct models programmatically.
    pub fn built_in() -> Self {
        let flat = vec![IntonationParameters {
            notional_pitch: -2.0,
            pretonic_pitch_range: 2.0,
            pretonic_perturbation_range: 4.0,
            tonic_pitch_range: -10.0,
            tonic_perturbation_range: 6.0,
        }];
        Self {
            tone_group_parameters: [
                flat.clone(),
                flat.clone(),
                flat.clone(),
                flat.clone(),
                flat,
            ],
            fixed_parameters: IntonationParameters::default(),
            use_fixed_parameters: false,
            time_offset: -40.0,
            pretonic_base_slope: 0.02,
            pretonic_base_slope_random: 0.01,
            pretonic_slope_random_factor: 0.015,
            tonic_base_slope: 0.02,
            tonic_continuation_base_slope: 0.01,
            tonic_slope_random_factor: 0.03,
            tonic_slope_offset: 0.03,
            rhythm_marked_a: 19.36,
            rhythm_marked_b: 117.7,
            rhythm_marked_div: 180.0,
            rhythm_unmarked_a: 2.08,
            rhythm_unmarked_b: 18.5,
            rhythm_unmarked_div: 140.0,
            rhythm_min_tempo: 0.2,
            rhythm_max_tempo: 2.0,
        }
    }

    /// Overrides the tables with one fixed parameter set.
    pub fn set_fixed_parameters(&mut self, parameters: IntonationParameters) {
        self.fixed_parameters = parameters;
        self.use_fixed_parameters = true;
    }

    /// Returns to table-driven parameter selection.
    pub fn clear_fixed_parameters(&mut self) {
        self.use_fixed_parameters = false;
    }

    /// Selects the intonation parameters for a tone group.
    ///
    /// With `random` set, a parameter set is drawn uniformly from the
    /// kind's table; a single-entry table always yields entry 0.
    pub fn parameters(
        &self,
        kind: ToneGroupKind,
        random: bool,
        rng: &mut Pcg32,
    ) -> IntonationParameters {
        if self.use_fixed_parameters {
            return self.fixed_parameters;
        }
        let table = &self.tone_group_parameters[kind.index()];
        if random && table.len() > 1 {
            table[rng.gen_range(0..table.len())]
        } else {
            table[0]
        }
    }
}

fn load_tone_group_parameters(path: &Path) -> ControlResult<Vec<IntonationParameters>> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ModelError::config(display.clone(), format!("could not read: {e}")))?;

    let mut table = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut values = line.split_whitespace().map(|field| {
            field.parse::<f32>().map_err(|_| {
                ModelError::config(
                    display.clone(),
                    format!("line {}: invalid number: {field}", line_number + 1),
                )
            })
        });
        let mut next = |name: &str| {
            values.next().transpose()?.ok_or_else(|| {
                ModelError::config(
                    display.clone(),
                    format!("line {}: missing {name}", line_number + 1),
                )
            })
        };
        table.push(IntonationParameters {
            notional_pitch: next("notional pitch")?,
            pretonic_pitch_range: next("pretonic pitch range")?,
            pretonic_perturbation_range: next("pretonic perturbation range")?,
            tonic_pitch_range: next("tonic pitch range")?,
            tonic_perturbation_range: next("tonic perturbation range")?,
        });
    }

    if table.is_empty() {
        return Err(ModelError::config(display, "no parameter sets found").into());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    #[test]
    fn test_built_in_selection() {
        let config = IntonationRhythm::built_in();
        let mut rng = create_rng(1);
        let params = config.parameters(ToneGroupKind::Question, false, &mut rng);
        assert_eq!(params.notional_pitch, -2.0);
        // Single-entry tables ignore the random flag.
        let random = config.parameters(ToneGroupKind::Question, true, &mut rng);
        assert_eq!(params, random);
    }

    #[test]
    fn test_fixed_parameters_override() {
        let mut config = IntonationRhythm::built_in();
        let fixed = IntonationParameters {
            notional_pitch: 3.0,
            ..Default::default()
        };
        config.set_fixed_parameters(fixed);
        let mut rng = create_rng(1);
        assert_eq!(
            config.parameters(ToneGroupKind::Statement, true, &mut rng),
            fixed
        );
        config.clear_fixed_parameters();
        assert_ne!(
            config.parameters(ToneGroupKind::Statement, true, &mut rng),
            fixed
        );
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for kind in ToneGroupKind::ALL {
            std::fs::write(
                dir.path().join(kind.file_name()),
                "# params\n-2 2 4 -10 6\n-1 3 4 -8 6\n",
            )
            .unwrap();
        }
        std::fs::write(
            dir.path().join("intonation.config"),
            "time_offset = -40\npretonic_base_slope = 0.02\npretonic_base_slope_random = 0.01\n\
             pretonic_slope_random_factor = 0.015\ntonic_base_slope = 0.02\n\
             tonic_continuation_base_slope = 0.01\ntonic_slope_random_factor = 0.03\n\
             tonic_slope_offset = 0.03\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("rhythm.config"),
            "marked_a = 19.36\nmarked_b = 117.7\nmarked_div = 180\nunmarked_a = 2.08\n\
             unmarked_b = 18.5\nunmarked_div = 140\nmin_tempo = 0.2\nmax_tempo = 2\n",
        )
        .unwrap();

        let config = IntonationRhythm::load(dir.path()).unwrap();
        assert_eq!(config.rhythm_min_tempo, 0.2);
        assert_eq!(config.time_offset, -40.0);

        // Two parameter sets; the random path can reach both.
        let mut rng = create_rng(7);
        let mut seen_second = false;
        for _ in 0..64 {
            let params = config.parameters(ToneGroupKind::Statement, true, &mut rng);
            if params.notional_pitch == -1.0 {
                seen_second = true;
            }
        }
        assert!(seen_second);
    }
}
