//! Frame generation: resampling the sparse timeline at the control rate.
//!
//! One frame (a vector of parameter values in model order) is produced per
//! control period by piecewise-linear interpolation between target events,
//! with special offsets added on top. The pitch parameter additionally
//! receives the macro-intonation curve, optional drift, and the mean
//! pitch bias; it is deliberately not clamped here.

use std::io::Write;

use crate::config::ControlConfig;
use crate::drift::DriftGenerator;
use crate::error::ControlResult;
use crate::event_list::{EventList, PITCH_PARAMETER};

impl EventList<'_> {
    /// Renders the timeline into parameter frames.
    ///
    /// The generator stops when the cursor reaches the last event; an
    /// empty or single-event timeline yields no frames.
    pub fn generate_output(
        &self,
        config: &ControlConfig,
        mut drift: Option<&mut DriftGenerator>,
    ) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();
        let events = self.events();
        if events.len() < 2 {
            return frames;
        }

        let num_parameters = self.model().parameters().len();
        let period = config.control_period_ms();

        // Normal values occupy [0, n); special offsets [n, 2n).
        let mut values = vec![0.0f64; 2 * num_parameters];
        let mut deltas = vec![0.0f64; 2 * num_parameters];
        for index in 0..num_parameters {
            values[index] = events[0].value(index, false).unwrap_or(0.0);
            let next = events[1..]
                .iter()
                .find_map(|event| event.value(index, false).map(|value| (value, event.time)));
            deltas[index] = match next {
                Some((value, time)) if time > 0 => {
                    (value - values[index]) / f64::from(time) * period
                }
                _ => 0.0,
            };
        }

        // Macro intonation starts on a straight line from the initial
        // pitch to the first interpolated point.
        let (mut pa, mut pb, mut pc, mut pd) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        if config.macro_intonation {
            let first = events
                .iter()
                .find_map(|event| event.interpolation.map(|data| (f64::from(event.time), data)));
            if let Some((x2, data)) = first {
                let y1 = config.initial_pitch;
                if config.smooth_intonation {
                    let y2 = x2 * (x2 * (x2 * data.a + data.b) + data.c) + data.d;
                    pc = (y2 - y1) / x2;
                    pd = y1;
                } else {
                    let y2 = x2 * data.a + data.b;
                    pa = (y2 - y1) / x2;
                    pb = y1;
                }
            }
        }

        let mut target_index = 1;
        let mut current_time = 0.0f64;
        let mut next_time = f64::from(events[1].time);
        while target_index < events.len() {
            let mut frame = Vec::with_capacity(num_parameters);
            for index in 0..num_parameters {
                frame.push((values[index] + values[index + num_parameters]) as f32);
            }

            if !config.micro_intonation {
                frame[PITCH_PARAMETER] = 0.0;
            }
            if config.intonation_drift {
                if let Some(generator) = drift.as_mut() {
                    frame[PITCH_PARAMETER] += generator.drift() as f32;
                }
            }
            if config.macro_intonation {
                let x = current_time;
                let intonation = if config.smooth_intonation {
                    x * (x * (x * pa + pb) + pc) + pd
                } else {
                    x * pa + pb
                };
                frame[PITCH_PARAMETER] += intonation as f32;
            }
            frame[PITCH_PARAMETER] += config.pitch_mean as f32;

            frames.push(frame);

            for index in 0..2 * num_parameters {
                if deltas[index] != 0.0 {
                    values[index] += deltas[index];
                }
            }
            current_time += period;

            if current_time >= next_time {
                target_index += 1;
                if target_index == events.len() {
                    break;
                }
                next_time = f64::from(events[target_index].time);

                for index in 0..2 * num_parameters {
                    let (parameter_index, special) = if index < num_parameters {
                        (index, false)
                    } else {
                        (index - num_parameters, true)
                    };
                    if events[target_index - 1].value(parameter_index, special).is_none() {
                        continue;
                    }
                    let next = events[target_index..].iter().find_map(|event| {
                        event
                            .value(parameter_index, special)
                            .map(|value| (value, event.time))
                    });
                    deltas[index] = match next {
                        Some((value, time)) => {
                            (value - values[index]) / (f64::from(time) - current_time) * period
                        }
                        None => 0.0,
                    };
                }

                if config.macro_intonation {
                    if let Some(data) = events[target_index - 1].interpolation {
                        pa = data.a;
                        pb = data.b;
                        if config.smooth_intonation {
                            pc = data.c;
                            pd = data.d;
                        }
                    }
                }
            }
        }

        frames
    }
}

/// Writes frames as text: one frame per line, values space-separated, dot
/// decimal separator.
pub fn write_frames(frames: &[Vec<f32>], writer: &mut impl Write) -> ControlResult<()> {
    for frame in frames {
        let mut first = true;
        for value in frame {
            if first {
                first = false;
            } else {
                write!(writer, " ")?;
            }
            write!(writer, "{value}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
