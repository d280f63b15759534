//! Rule matching and application.
//!
//! Advances a 2-4 posture window over the stream, finds the first matching
//! rule, and expands its transition profiles into timeline events. The
//! rhythm pass runs first, so the adjusted posture tempos feed the rule
//! timing equations through the `tempo1..4` formula symbols.

use artic_model::{
    FormulaSymbolValues, ModelResult, PointOrSlope, Rule, RuleExpressionData, SlopeRatio,
    TransitionPoint,
};
use tracing::{debug, trace};

use crate::error::{ControlError, ControlResult};
use crate::event_list::{EventList, RuleData};
use crate::intonation_rhythm::IntonationRhythm;

impl EventList<'_> {
    /// Applies the rhythm model: per-foot tempo from the foot size and the
    /// marked flag, folded into every posture tempo and clamped.
    pub fn apply_rhythm(&mut self, rhythm: &IntonationRhythm, global_tempo: f64) {
        for index in 0..self.current_foot {
            let (start, end, marked) = {
                let foot = &self.feet[index];
                (foot.start, foot.end, foot.marked)
            };
            let rus = (end - start + 1) as f64;
            let adjustment = if marked {
                (rhythm.rhythm_marked_b - rhythm.rhythm_marked_a * rus) / rhythm.rhythm_marked_div
            } else {
                (rhythm.rhythm_unmarked_b - rhythm.rhythm_unmarked_a * rus)
                    / rhythm.rhythm_unmarked_div
            };
            self.feet[index].tempo -= adjustment;
            let foot_tempo = global_tempo * self.feet[index].tempo;

            for posture_index in start..=end {
                let tempo = (self.posture_data[posture_index].tempo * foot_tempo)
                    .clamp(rhythm.rhythm_min_tempo, rhythm.rhythm_max_tempo);
                self.posture_data[posture_index].tempo = tempo;
            }
            trace!(foot = index, rus, foot_tempo, "rhythm applied");
        }
    }

    /// Scans the posture stream, matching and applying rules until the
    /// stream is consumed.
    pub fn generate_event_list(&mut self) -> ControlResult<()> {
        let model = self.model();
        let num_parameters = model.parameters().len();
        let mut minima = Vec::with_capacity(num_parameters);
        let mut maxima = Vec::with_capacity(num_parameters);
        for parameter in model.parameters() {
            minima.push(f64::from(parameter.minimum()));
            maxima.push(f64::from(parameter.maximum()));
        }

        let mut base = 0;
        while base < self.current_posture {
            let mut window: Vec<RuleExpressionData<'_>> = Vec::with_capacity(4);
            for offset in 0..4 {
                let index = base + offset;
                let posture = if index <= self.current_posture {
                    self.posture_data[index].posture
                } else {
                    None
                };
                match posture {
                    Some(id) => window.push(RuleExpressionData {
                        posture: model.posture(id)?,
                        tempo: self.posture_data[index].tempo,
                        marked: self.posture_data[index].marked,
                    }),
                    None => break,
                }
            }
            if window.len() < 2 {
                break;
            }

            let (rule_index, rule) = model
                .find_first_matching_rule(&window)
                .ok_or(ControlError::NoMatchingRule {
                    posture_index: base,
                })?;
            debug!(rule = rule_index + 1, base, "rule matched");

            self.rule_data[self.current_rule].number = rule_index + 1;
            self.apply_rule(rule_index, rule, &window, base, &minima, &maxima)?;

            base += rule.number_of_expressions() - 1;
        }
        Ok(())
    }

    fn apply_rule(
        &mut self,
        rule_index: usize,
        rule: &Rule,
        window: &[RuleExpressionData<'_>],
        base: usize,
        minima: &[f64],
        maxima: &[f64],
    ) -> ControlResult<()> {
        let model = self.model();
        let rule_number = rule_index + 1;
        let (symbols, table) = rule.evaluate_expression_symbols(window, model)?;

        let time_multiplier = 1.0 / self.posture_data[base].rule_tempo;
        let n = rule.number_of_expressions();
        let scaled_duration = symbols.duration * time_multiplier;
        self.set_duration(scaled_duration as i32);

        let beat = symbols.beat * time_multiplier + f64::from(self.zero_ref);
        self.rule_data[self.current_rule] = RuleData {
            number: self.rule_data[self.current_rule].number,
            first_posture: base,
            last_posture: base + (n - 1),
            beat,
            duration: scaled_duration,
            mark1: symbols.mark1 * time_multiplier,
            mark2: symbols.mark2 * time_multiplier,
            mark3: symbols.mark3 * time_multiplier,
        };
        self.current_rule += 1;
        self.rule_data.push(RuleData::default());

        // Posture onsets and rule-boundary sentinels: a tetraphone marks
        // mark2 and mark1, a triphone mark1, every rule its start.
        let onset = f64::from(self.zero_ref) + symbols.beat;
        if n == 4 && window.len() == 4 {
            self.posture_data[base + 3].onset = onset;
            self.insert_rule_boundary(symbols.mark2 * time_multiplier);
        }
        if n >= 3 && window.len() >= 3 {
            self.posture_data[base + 2].onset = onset;
            self.insert_rule_boundary(symbols.mark1 * time_multiplier);
        }
        self.posture_data[base + 1].onset = onset;
        self.insert_rule_boundary(0.0);

        let num_parameters = model.parameters().len();
        for parameter_index in 0..num_parameters {
            let mut targets = [0.0f64; 4];
            for (slot, data) in window.iter().take(4).enumerate() {
                targets[slot] = f64::from(data.posture.parameter_target(parameter_index)?);
            }

            let constant = targets[1..n].iter().all(|&target| target == targets[0]);
            self.insert_event(0.0, parameter_index, targets[0], false);
            if constant {
                continue;
            }

            let mut phase = 2usize;
            let mut delta = targets[1] - targets[0];
            let mut last_value = targets[0];

            let transition = model.transition(rule.param_profile(parameter_index)?)?;
            for item in transition.items() {
                match item {
                    PointOrSlope::SlopeRatio(slope_ratio) => {
                        let first = slope_ratio.points.first().ok_or_else(|| {
                            ControlError::InconsistentTransition {
                                rule_number,
                                message: format!("empty slope ratio in {}", transition.name()),
                            }
                        })?;
                        if first.transition_type.phase() != phase {
                            phase = first.transition_type.phase();
                            targets[phase - 2] = last_value;
                            delta = targets[phase - 1] - last_value;
                        }
                        last_value = self.create_slope_ratio_events(
                            slope_ratio,
                            targets[phase - 2],
                            delta,
                            minima[parameter_index],
                            maxima[parameter_index],
                            parameter_index,
                            time_multiplier,
                            &table,
                        )?;
                    }
                    PointOrSlope::Point(point) => {
                        if point.transition_type.phase() != phase {
                            phase = point.transition_type.phase();
                            targets[phase - 2] = last_value;
                            delta = targets[phase - 1] - last_value;
                        }
                        let time = point_time(point, model, &table)?;
                        let value = (targets[phase - 2]
                            + (f64::from(point.value) / 100.0) * delta)
                            .clamp(minima[parameter_index], maxima[parameter_index]);
                        if !point.is_phantom {
                            self.insert_event(time * time_multiplier, parameter_index, value, false);
                        }
                        last_value = value;
                    }
                }
            }
        }

        // Special profiles: additive offsets, deliberately unclamped.
        for parameter_index in 0..num_parameters {
            let Some(id) = rule.special_profile(parameter_index)? else {
                continue;
            };
            let transition = model.special_transition(id)?;
            for item in transition.items() {
                match item {
                    PointOrSlope::Point(point) => {
                        let time = point_time(point, model, &table)?;
                        let value = (f64::from(point.value) / 100.0)
                            * (maxima[parameter_index] - minima[parameter_index]);
                        self.insert_event(time * time_multiplier, parameter_index, value, true);
                    }
                    PointOrSlope::SlopeRatio(_) => {
                        return Err(ControlError::InconsistentTransition {
                            rule_number,
                            message: format!(
                                "special transition {} contains a slope ratio",
                                transition.name()
                            ),
                        });
                    }
                }
            }
        }

        let new_zero = self.zero_ref + scaled_duration as i32;
        self.set_zero_ref(new_zero);
        self.insert_rule_boundary(0.0);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn create_slope_ratio_events(
        &mut self,
        slope_ratio: &SlopeRatio,
        baseline: f64,
        parameter_delta: f64,
        minimum: f64,
        maximum: f64,
        parameter_index: usize,
        time_multiplier: f64,
        table: &FormulaSymbolValues,
    ) -> ControlResult<f64> {
        let model = self.model();

        let times: Vec<f64> = slope_ratio
            .points
            .iter()
            .map(|point| point_time(point, model, table))
            .collect::<ModelResult<_>>()?;

        let start_value = f64::from(slope_ratio.points[0].value);
        let end_value = f64::from(slope_ratio.points[slope_ratio.points.len() - 1].value);
        let delta = end_value - start_value;
        let total_time = times[times.len() - 1] - times[0];
        let total_units = f64::from(slope_ratio.total_slope_units());

        // Each segment owns the share of the value delta given by its
        // normalised slope weighted by its share of the total time.
        let num_slopes = slope_ratio.slopes.len();
        let mut interior_deltas = vec![0.0; num_slopes.saturating_sub(1)];
        let mut sum = 0.0;
        for segment in 0..num_slopes {
            let normalised = f64::from(slope_ratio.slopes[segment]) / total_units;
            let interval = times[segment + 1] - times[segment];
            let contribution = normalised * (interval / total_time) * delta;
            sum += contribution;
            if segment < interior_deltas.len() {
                interior_deltas[segment] = contribution;
            }
        }
        let factor = delta / sum;

        let mut running = start_value;
        let mut value = 0.0;
        for (index, point) in slope_ratio.points.iter().enumerate() {
            let point_value = if index >= 1 && index + 1 < slope_ratio.points.len() {
                running += interior_deltas[index - 1] * factor;
                running
            } else {
                f64::from(point.value)
            };
            value = (baseline + (point_value / 100.0) * parameter_delta).clamp(minimum, maximum);
            if !point.is_phantom {
                self.insert_event(times[index] * time_multiplier, parameter_index, value, false);
            }
        }
        Ok(value)
    }
}

fn point_time(
    point: &TransitionPoint,
    model: &artic_model::Model,
    table: &FormulaSymbolValues,
) -> ModelResult<f64> {
    point.time_ms(table, |id, symbols| model.eval_equation(id, symbols))
}
