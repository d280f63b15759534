//! Pho1 input format.
//!
//! An alternate phonetic input: one phoneme per line as
//! `PHONEME DURATION_MS [POS FREQ]*`, where `POS` is a percentage within
//! the phoneme and `FREQ` a pitch target in Hz. A phoneme-map table is
//! applied first and may split one phoneme into two, halving the duration
//! and distributing the intonation points around the 50% boundary.

use std::collections::HashMap;
use std::path::Path;

use artic_model::{posture_symbol, ConfigFile, EntityKind, ModelError};

use crate::error::{ControlError, ControlResult};
use crate::event_list::EventList;

const PHO1_CONFIG_FILE: &str = "pho1.config";
const COMMENT_CHAR: char = ';';
const PHONEME_SEPARATOR: char = '_';

/// Reference frequency for pitch 0 (A3).
const PITCH_BASE_FREQUENCY: f64 = 220.0;

/// Converts a frequency in Hz to semitones relative to the pitch origin.
pub fn pitch_semitones(frequency: f64) -> f64 {
    12.0 * (frequency / PITCH_BASE_FREQUENCY).log2()
}

#[derive(Debug, Clone, Copy)]
struct Pho1IntonationPoint {
    /// Percent position within the phoneme.
    position: f32,
    /// Target frequency in Hz.
    frequency: f32,
}

#[derive(Debug, Clone, Default)]
struct Pho1Data {
    phoneme: String,
    duration: f32,
    intonation_points: Vec<Pho1IntonationPoint>,
    posture_index: usize,
}

/// Parser for pho1 input.
#[derive(Debug, Default)]
pub struct Pho1Parser {
    phoneme_map: HashMap<String, String>,
}

impl Pho1Parser {
    /// Creates a parser with an empty phoneme map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser, loading the phoneme map named by `pho1.config`
    /// in the given directory.
    pub fn with_config(dir: impl AsRef<Path>) -> ControlResult<Self> {
        let dir = dir.as_ref();
        let config = ConfigFile::load(dir.join(PHO1_CONFIG_FILE))?;
        let map_file = dir.join(config.value_str("phoneme_map_file")?);

        let display = map_file.display().to_string();
        let text = std::fs::read_to_string(&map_file).map_err(|e| {
            ModelError::config(display.clone(), format!("could not read: {e}"))
        })?;

        let mut phoneme_map = HashMap::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(from), Some(to)) = (fields.next(), fields.next()) else {
                return Err(ModelError::config(
                    display.clone(),
                    format!("line {}: expected PHONEME REPLACEMENT", line_number + 1),
                )
                .into());
            };
            phoneme_map.insert(from.to_string(), to.to_string());
        }
        Ok(Self { phoneme_map })
    }

    /// Parses pho1 text, building the posture stream and intonation
    /// points of the event list. `mean_pitch` is subtracted from every
    /// converted pitch target; `global_tempo` becomes the rule tempo of
    /// every posture.
    ///
    /// The caller runs `generate_event_list` before this method attaches
    /// the intonation points, so the parse is split: [`fill`] first, then
    /// [`add_intonation`].
    ///
    /// [`fill`]: Self::fill
    /// [`add_intonation`]: Self::add_intonation
    pub fn parse(
        &self,
        input: &str,
        list: &mut EventList<'_>,
        mean_pitch: f64,
        global_tempo: f64,
    ) -> ControlResult<()> {
        let mut data = self.fill(input, list, global_tempo)?;
        list.generate_event_list()?;
        self.add_intonation(&mut data, list, mean_pitch);
        Ok(())
    }

    fn fill(
        &self,
        input: &str,
        list: &mut EventList<'_>,
        global_tempo: f64,
    ) -> ControlResult<Vec<Pho1Data>> {
        let mut data = self.load_input(input)?;
        self.replace_phonemes(&mut data);
        self.fill_posture_list(&mut data, list, global_tempo)?;
        Ok(data)
    }

    fn load_input(&self, input: &str) -> ControlResult<Vec<Pho1Data>> {
        let mut data = Vec::new();
        for (line_index, line) in input.lines().enumerate() {
            let line_number = line_index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_CHAR) {
                continue;
            }

            let mut fields = line.split_whitespace();
            let phoneme = fields
                .next()
                .ok_or_else(|| ControlError::pho1(line_number, "could not get the phoneme"))?
                .to_string();
            let duration: f32 = fields
                .next()
                .and_then(|field| field.parse().ok())
                .ok_or_else(|| ControlError::pho1(line_number, "could not get the duration"))?;

            let mut intonation_points = Vec::new();
            while let Some(field) = fields.next() {
                let position: f32 = field.parse().map_err(|_| {
                    ControlError::pho1(line_number, "could not get the intonation position")
                })?;
                let frequency: f32 = fields
                    .next()
                    .and_then(|field| field.parse().ok())
                    .ok_or_else(|| {
                        ControlError::pho1(line_number, "could not get the intonation frequency")
                    })?;
                intonation_points.push(Pho1IntonationPoint {
                    position,
                    frequency,
                });
            }

            data.push(Pho1Data {
                phoneme,
                duration,
                intonation_points,
                posture_index: 0,
            });
        }
        Ok(data)
    }

    fn replace_phonemes(&self, data: &mut Vec<Pho1Data>) {
        let mut index = 0;
        while index < data.len() {
            let Some(replacement) = self.phoneme_map.get(&data[index].phoneme) else {
                index += 1;
                continue;
            };

            match replacement.split_once(PHONEME_SEPARATOR) {
                None => {
                    data[index].phoneme = replacement.clone();
                    index += 1;
                }
                Some((first, second)) => {
                    // Split into two phonemes of half the duration; the
                    // intonation points are divided at the 50% boundary.
                    let first = first.to_string();
                    let second = second.to_string();

                    let entry = &mut data[index];
                    entry.phoneme = second;
                    entry.duration *= 0.5;
                    let duration = entry.duration;
                    let points = std::mem::take(&mut entry.intonation_points);

                    let mut first_data = Pho1Data {
                        phoneme: first,
                        duration,
                        ..Pho1Data::default()
                    };
                    for mut point in points {
                        if point.position <= 50.0 {
                            point.position *= 2.0;
                            first_data.intonation_points.push(point);
                        } else {
                            point.position = (point.position - 50.0) * 2.0;
                            data[index].intonation_points.push(point);
                        }
                    }
                    data.insert(index, first_data);
                    index += 2;
                }
            }
        }
    }

    fn fill_posture_list(
        &self,
        data: &mut [Pho1Data],
        list: &mut EventList<'_>,
        global_tempo: f64,
    ) -> ControlResult<()> {
        let model = list.model();
        for entry in data.iter_mut() {
            let posture_id = model.find_posture(&entry.phoneme).ok_or_else(|| {
                ControlError::Model(ModelError::lookup(EntityKind::Posture, &entry.phoneme))
            })?;
            let posture = model.posture(posture_id)?;

            // The duration symbol is not used for timing; the effective
            // posture duration is qssa + qssb + transition.
            let posture_duration = posture.symbol_target(posture_symbol::QSSA)?
                + posture.symbol_target(posture_symbol::QSSB)?
                + posture.symbol_target(posture_symbol::TRANSITION)?;

            entry.posture_index = list.new_posture_with(posture_id, false);
            list.set_current_posture_tempo(f64::from(posture_duration) / f64::from(entry.duration));
            list.set_current_posture_rule_tempo(global_tempo);
        }
        Ok(())
    }

    fn add_intonation(&self, data: &mut [Pho1Data], list: &mut EventList<'_>, mean_pitch: f64) {
        for entry in data.iter() {
            for point in &entry.intonation_points {
                list.add_posture_intonation_point(
                    entry.posture_index,
                    f64::from(point.position) / 100.0,
                    pitch_semitones(f64::from(point.frequency)) - mean_pitch,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_semitones() {
        assert!((pitch_semitones(220.0)).abs() < 1e-9);
        assert!((pitch_semitones(440.0) - 12.0).abs() < 1e-9);
        assert!((pitch_semitones(110.0) + 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_input() {
        let parser = Pho1Parser::new();
        let data = parser
            .load_input("; comment\naa 120 50 220\nnn 80\n")
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].phoneme, "aa");
        assert_eq!(data[0].duration, 120.0);
        assert_eq!(data[0].intonation_points.len(), 1);
        assert_eq!(data[1].intonation_points.len(), 0);
    }

    #[test]
    fn test_load_input_errors() {
        let parser = Pho1Parser::new();
        assert!(parser.load_input("aa\n").is_err());
        assert!(parser.load_input("aa 120 50\n").is_err());
    }

    #[test]
    fn test_phoneme_split() {
        let mut parser = Pho1Parser::new();
        parser
            .phoneme_map
            .insert("x".to_string(), "a_b".to_string());
        let mut data = parser
            .load_input("x 100 25 200 75 240\n")
            .unwrap();
        parser.replace_phonemes(&mut data);

        assert_eq!(data.len(), 2);
        assert_eq!(data[0].phoneme, "a");
        assert_eq!(data[1].phoneme, "b");
        assert_eq!(data[0].duration, 50.0);
        assert_eq!(data[1].duration, 50.0);
        // 25% of the whole becomes 50% of the first half.
        assert_eq!(data[0].intonation_points[0].position, 50.0);
        // 75% of the whole becomes 50% of the second half.
        assert_eq!(data[1].intonation_points[0].position, 50.0);
    }

    #[test]
    fn test_phoneme_simple_replacement() {
        let mut parser = Pho1Parser::new();
        parser
            .phoneme_map
            .insert("x".to_string(), "aa".to_string());
        let mut data = parser.load_input("x 100\n").unwrap();
        parser.replace_phonemes(&mut data);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].phoneme, "aa");
        assert_eq!(data[0].duration, 100.0);
    }
}
