//! Macro-intonation: pitch contour points and their interpolation.
//!
//! For each tone group, one intonation point is placed on a vocoid posture
//! of every pretonic foot, and two on the tonic foot (the rise at its
//! start and the full movement at its end). The points are then connected
//! by cubic (smooth mode) or linear segments whose coefficients are
//! attached to marker events for the frame generator.

use artic_model::{EntityKind, ModelError};
use rand::Rng;
use rand_pcg::Pcg32;
use tracing::debug;

use crate::config::ControlConfig;
use crate::error::ControlResult;
use crate::event_list::{EventList, InterpolationData};
use crate::intonation_rhythm::{IntonationRhythm, ToneGroupKind};

/// Name of the category identifying vowel-like postures.
pub const VOCOID_CATEGORY: &str = "vocoid";

/// One pitch-contour point, anchored to an applied rule's beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntonationPoint {
    /// Index of the applied rule the point belongs to.
    pub rule_index: usize,
    /// Offset from the rule's beat time, in ms.
    pub offset_time: f64,
    /// Pitch value in semitones.
    pub semitone: f64,
    /// Slope used by smooth interpolation.
    pub slope: f64,
}

impl EventList<'_> {
    /// Absolute time of an intonation point: the owning rule's beat plus
    /// the point's offset.
    pub fn intonation_point_time(&self, point: &IntonationPoint) -> f64 {
        self.beat_at_rule(point.rule_index) + point.offset_time
    }

    /// Adds an intonation point, keeping the list ordered by absolute
    /// time. The semitone value is scaled by `factor`.
    pub fn add_intonation_point(
        &mut self,
        semitone: f64,
        offset_time: f64,
        slope: f64,
        rule_index: usize,
        factor: f64,
    ) {
        if rule_index > self.current_rule {
            return;
        }
        let point = IntonationPoint {
            rule_index,
            offset_time,
            semitone: semitone * factor,
            slope,
        };
        let time = self.intonation_point_time(&point);
        let position = self
            .intonation_points
            .iter()
            .position(|existing| time < self.intonation_point_time(existing))
            .unwrap_or(self.intonation_points.len());
        self.intonation_points.insert(position, point);
    }

    /// Attaches an intonation point to the rule that consumed a posture.
    ///
    /// `position` is a fraction (0..1) of the owning rule's duration,
    /// measured from the posture onset. Used by the pho1 input path.
    pub fn add_posture_intonation_point(
        &mut self,
        posture_index: usize,
        position: f64,
        semitone: f64,
    ) {
        let rule_index = self.rule_index_containing(posture_index, 0);
        let Some(rule) = self.rule_data(rule_index) else {
            return;
        };
        let onset = self
            .posture_data_at(posture_index)
            .map_or(0.0, |data| data.onset);
        let offset_time = onset - rule.beat + position * rule.duration;
        self.add_intonation_point(semitone, offset_time, 0.0, rule_index, 1.0);
    }

    fn rule_index_containing(&self, posture_index: usize, from: usize) -> usize {
        for rule_index in from..self.current_rule {
            let data = &self.rule_data[rule_index];
            if posture_index >= data.first_posture && posture_index <= data.last_posture {
                return rule_index;
            }
        }
        from
    }

    /// Builds the intonation points for all tone groups.
    ///
    /// With macro intonation enabled, the interpolation coefficients are
    /// prepared afterwards.
    pub fn apply_intonation(
        &mut self,
        rhythm: &IntonationRhythm,
        config: &ControlConfig,
        rng: &mut Pcg32,
    ) -> ControlResult<()> {
        if self.events.is_empty() {
            return Ok(());
        }
        self.set_full_time_scale();
        self.intonation_points.clear();

        let model = self.model();
        let vocoid = model
            .find_category(VOCOID_CATEGORY)
            .ok_or_else(|| ModelError::lookup(EntityKind::Category, VOCOID_CATEGORY))?;

        let random = config.random_intonation;
        let factor = config.intonation_factor;
        let mut offset_time = 0.0;
        let mut last_parameters = None;
        let mut rule_index = 0;

        for tone_group_index in 0..self.current_tone_group {
            let group = self.tone_groups[tone_group_index].clone();
            let start_time = self.posture_data[self.feet[group.start_foot].start].onset;
            let end_time = self.posture_data[self.feet[group.end_foot].end].onset;

            let parameters = rhythm.parameters(group.kind, random, rng);
            last_parameters = Some(parameters);
            let notional = f64::from(parameters.notional_pitch);
            let pretonic_range = f64::from(parameters.pretonic_pitch_range);
            let pretonic_delta = if end_time > start_time {
                pretonic_range / (end_time - start_time)
            } else {
                0.0
            };

            for foot_index in group.start_foot..=group.end_foot {
                let foot = self.feet[foot_index].clone();

                // Anchor on the first vocoid of the foot, falling back to
                // the foot start when the foot has none.
                let mut posture_index = foot.start;
                loop {
                    let is_vocoid = self.posture_data[posture_index]
                        .posture
                        .and_then(|id| model.posture(id).ok())
                        .is_some_and(|posture| posture.is_member_of(vocoid));
                    if is_vocoid {
                        break;
                    }
                    posture_index += 1;
                    if posture_index > foot.end {
                        posture_index = foot.start;
                        break;
                    }
                }

                if !foot.marked {
                    rule_index = self.rule_index_containing(posture_index, 0);
                    let (random_semitone, slope) = if random {
                        let perturbation = f64::from(parameters.pretonic_perturbation_range);
                        let semitone = rng.gen::<f64>() * perturbation - perturbation / 2.0;
                        let slope = rng.gen::<f64>()
                            * f64::from(rhythm.pretonic_slope_random_factor)
                            + f64::from(rhythm.pretonic_base_slope_random);
                        (semitone, slope)
                    } else {
                        (0.0, f64::from(rhythm.pretonic_base_slope))
                    };
                    let onset = self.posture_data[posture_index].onset;
                    let semitone = (onset - start_time) * pretonic_delta + notional + random_semitone;
                    self.add_intonation_point(semitone, offset_time, slope, rule_index, factor);
                } else {
                    // Tonic foot: the rise at the start, the full movement
                    // at the end.
                    let mut slope = if group.kind == ToneGroupKind::Continuation {
                        f64::from(rhythm.tonic_continuation_base_slope)
                    } else {
                        f64::from(rhythm.tonic_base_slope)
                    };
                    rule_index = self.rule_index_containing(posture_index, 0);
                    let random_semitone = if random {
                        let perturbation = f64::from(parameters.tonic_perturbation_range);
                        let semitone = rng.gen::<f64>() * perturbation - perturbation / 2.0;
                        slope += rng.gen::<f64>() * f64::from(rhythm.tonic_slope_random_factor);
                        semitone
                    } else {
                        slope += f64::from(rhythm.tonic_slope_offset);
                        0.0
                    };
                    let semitone = pretonic_range + notional + random_semitone;
                    self.add_intonation_point(semitone, offset_time, slope, rule_index, factor);

                    rule_index = self.rule_index_containing(foot.end, rule_index);
                    let tonic_semitone =
                        pretonic_range + notional + f64::from(parameters.tonic_pitch_range);
                    self.add_intonation_point(tonic_semitone, 0.0, 0.0, rule_index, factor);
                }
                offset_time = f64::from(rhythm.time_offset);
            }
        }

        if let Some(parameters) = last_parameters {
            let semitone = f64::from(parameters.pretonic_pitch_range)
                + f64::from(parameters.notional_pitch)
                + f64::from(parameters.tonic_pitch_range);
            let last_rule = self.current_rule.saturating_sub(1);
            self.add_intonation_point(semitone, 0.0, 0.0, last_rule, factor);
        }
        debug!(points = self.intonation_points.len(), "intonation applied");

        if config.macro_intonation {
            self.prepare_macro_intonation_interpolation(config.smooth_intonation);
        }
        Ok(())
    }

    /// Inserts marker events at every intonation point and attaches the
    /// interpolation coefficients for the span starting at each point.
    ///
    /// In smooth mode a cubic is fit between successive points using their
    /// slopes; otherwise the segment is the straight line through both
    /// points. The resulting curve is continuous at every point, and in
    /// smooth mode the slopes make it C1-continuous.
    pub fn prepare_macro_intonation_interpolation(&mut self, smooth: bool) {
        self.set_full_time_scale();
        if self.intonation_points.is_empty() {
            return;
        }

        let first_time = self.intonation_point_time(&self.intonation_points[0]);
        let Some(mut current_event) = self.insert_marker(first_time) else {
            return;
        };

        for point_index in 0..self.intonation_points.len() - 1 {
            let point1 = self.intonation_points[point_index];
            let point2 = self.intonation_points[point_index + 1];
            let time2 = self.intonation_point_time(&point2);
            // Points are time-ordered, so this insertion never shifts
            // `current_event`.
            let Some(next_event) = self.insert_marker(time2) else {
                break;
            };

            let x1 = f64::from(self.events[current_event].time);
            let y1 = point1.semitone;
            let x2 = f64::from(self.events[next_event].time);
            let y2 = point2.semitone;
            let dx = x2 - x1;

            let interpolation = if smooth {
                let m1 = point1.slope;
                let m2 = point2.slope;
                let x12 = x1 * x1;
                let x13 = x12 * x1;
                let x22 = x2 * x2;
                let x23 = x22 * x2;
                let coef = 1.0 / (dx * dx * dx);

                let d = (-(y2 * x13) + 3.0 * y2 * x12 * x2 + m2 * x13 * x2 + m1 * x12 * x22
                    - m2 * x12 * x22
                    - 3.0 * x1 * y1 * x22
                    - m1 * x1 * x23
                    + y1 * x23)
                    * coef;
                let c = (-(m2 * x13) - 6.0 * y2 * x1 * x2 - 2.0 * m1 * x12 * x2 - m2 * x12 * x2
                    + 6.0 * x1 * y1 * x2
                    + m1 * x1 * x22
                    + 2.0 * m2 * x1 * x22
                    + m1 * x23)
                    * coef;
                let b = (3.0 * y2 * x1 + m1 * x12 + 2.0 * m2 * x12 - 3.0 * x1 * y1 + 3.0 * x2 * y2
                    + m1 * x1 * x2
                    - m2 * x1 * x2
                    - 3.0 * y1 * x2
                    - 2.0 * m1 * x22
                    - m2 * x22)
                    * coef;
                let a = (-2.0 * y2 - m1 * x1 - m2 * x1 + 2.0 * y1 + m1 * x2 + m2 * x2) * coef;
                InterpolationData { a, b, c, d }
            } else {
                let coef = (y2 - y1) / dx;
                InterpolationData {
                    a: coef,
                    b: y1 - x1 * coef,
                    c: 0.0,
                    d: 0.0,
                }
            };

            self.events[current_event].interpolation = Some(interpolation);
            current_event = next_event;
        }
    }

    /// Removes all interpolation data from the timeline.
    pub fn clear_macro_intonation(&mut self) {
        for event in &mut self.events {
            event.interpolation = None;
        }
    }
}
