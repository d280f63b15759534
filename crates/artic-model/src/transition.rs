//! Transition profiles.
//!
//! A transition describes how one parameter evolves through a rule window
//! as an ordered sequence of points, optionally grouped into slope ratios.
//! Point values are percentages of the inter-posture target delta; point
//! times are either free constants in milliseconds or references to named
//! equations.

use crate::equation::EquationId;
use crate::error::{ModelError, ModelResult};
use crate::formula::FormulaSymbolValues;

/// Handle of a [`Transition`] in the model arena.
///
/// Parameter profiles and special profiles live in separate arenas; the
/// `special` flag on the handle's transition tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub usize);

/// The posture span of a transition or the posture pair of a point.
///
/// The numeric value is the phase number used by the rule engine: phase 2
/// lies between postures 1 and 2, phase 3 between postures 2 and 3, phase 4
/// between postures 3 and 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TransitionType {
    Diphone = 2,
    Triphone = 3,
    Tetraphone = 4,
}

impl TransitionType {
    /// Resolves a type from its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "diphone" => Some(TransitionType::Diphone),
            "triphone" => Some(TransitionType::Triphone),
            "tetraphone" => Some(TransitionType::Tetraphone),
            _ => None,
        }
    }

    /// Returns the configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            TransitionType::Diphone => "diphone",
            TransitionType::Triphone => "triphone",
            TransitionType::Tetraphone => "tetraphone",
        }
    }

    /// Returns the phase number (2, 3, or 4).
    pub fn phase(&self) -> usize {
        *self as usize
    }

    /// Resolves a type from the number of postures in a rule window.
    pub fn from_posture_count(count: usize) -> Option<Self> {
        match count {
            2 => Some(TransitionType::Diphone),
            3 => Some(TransitionType::Triphone),
            4 => Some(TransitionType::Tetraphone),
            _ => None,
        }
    }
}

/// How a transition point's time is determined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointTime {
    /// A constant time in milliseconds.
    Free(f32),
    /// The time is the value of a named equation, in milliseconds.
    Expression(EquationId),
}

/// One point of a transition profile.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPoint {
    /// Which posture pair the point falls in.
    pub transition_type: TransitionType,
    /// Value in percent of the inter-posture target delta.
    pub value: f32,
    /// Time of the point.
    pub time: PointTime,
    /// A phantom point is never emitted as an event but still anchors
    /// interpolation.
    pub is_phantom: bool,
}

impl TransitionPoint {
    /// Creates a point with a free time.
    pub fn free(transition_type: TransitionType, value: f32, time_ms: f32) -> Self {
        Self {
            transition_type,
            value,
            time: PointTime::Free(time_ms),
            is_phantom: false,
        }
    }

    /// Creates a point whose time comes from an equation.
    pub fn with_expression(transition_type: TransitionType, value: f32, equation: EquationId) -> Self {
        Self {
            transition_type,
            value,
            time: PointTime::Expression(equation),
            is_phantom: false,
        }
    }

    /// Computes the point time in milliseconds.
    ///
    /// `eval_equation` resolves an equation handle against the current
    /// formula symbol table; the model supplies it.
    pub fn time_ms<F>(&self, symbols: &FormulaSymbolValues, eval_equation: F) -> ModelResult<f64>
    where
        F: FnOnce(EquationId, &FormulaSymbolValues) -> ModelResult<f32>,
    {
        match self.time {
            PointTime::Free(time) => Ok(f64::from(time)),
            PointTime::Expression(id) => Ok(f64::from(eval_equation(id, symbols)?)),
        }
    }
}

/// A slope-ratio group: interior point values are derived so that the
/// per-segment value deltas are in the ratio of the slope weights.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeRatio {
    /// At least two points; the first and last anchor the group.
    pub points: Vec<TransitionPoint>,
    /// One raw slope weight per segment (`points.len() - 1` entries).
    pub slopes: Vec<f32>,
}

impl SlopeRatio {
    /// Returns the sum of the slope weights.
    pub fn total_slope_units(&self) -> f32 {
        self.slopes.iter().sum()
    }

    /// Checks the structural invariants of the group.
    pub fn validate(&self) -> Result<(), String> {
        if self.points.len() < 2 {
            return Err(format!(
                "slope ratio needs at least 2 points, has {}",
                self.points.len()
            ));
        }
        if self.slopes.len() != self.points.len() - 1 {
            return Err(format!(
                "slope ratio with {} points needs {} slopes, has {}",
                self.points.len(),
                self.points.len() - 1,
                self.slopes.len()
            ));
        }
        if self.slopes.iter().all(|&s| s == 0.0) {
            return Err("slope ratio has all-zero slopes".into());
        }
        Ok(())
    }
}

/// One element of a transition profile.
#[derive(Debug, Clone, PartialEq)]
pub enum PointOrSlope {
    Point(TransitionPoint),
    SlopeRatio(SlopeRatio),
}

/// A named transition profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    name: String,
    transition_type: TransitionType,
    special: bool,
    items: Vec<PointOrSlope>,
    comment: Option<String>,
}

impl Transition {
    /// Creates an empty transition profile.
    pub fn new(name: impl Into<String>, transition_type: TransitionType, special: bool) -> Self {
        Self {
            name: name.into(),
            transition_type,
            special,
            items: Vec::new(),
            comment: None,
        }
    }

    /// Returns the transition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the transition type.
    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    /// Returns true for special profiles (additive, unclamped offsets).
    pub fn is_special(&self) -> bool {
        self.special
    }

    /// Returns the ordered point-or-slope sequence.
    pub fn items(&self) -> &[PointOrSlope] {
        &self.items
    }

    /// Appends a point or slope-ratio group.
    pub fn push(&mut self, item: PointOrSlope) {
        self.items.push(item);
    }

    /// Returns the optional comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Sets the comment.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    /// Checks the structural invariants of the profile.
    ///
    /// Special profiles may not contain slope ratios; slope-ratio groups
    /// must satisfy [`SlopeRatio::validate`].
    pub fn validate(&self) -> Result<(), ModelError> {
        for item in &self.items {
            match item {
                PointOrSlope::Point(_) => {}
                PointOrSlope::SlopeRatio(slope_ratio) => {
                    if self.special {
                        return Err(ModelError::config(
                            self.name.clone(),
                            "special transition contains a slope ratio",
                        ));
                    }
                    slope_ratio.validate().map_err(|message| {
                        ModelError::config(self.name.clone(), message)
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// A named group of transitions, preserved for configuration round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionGroup {
    /// Group name.
    pub name: String,
    /// Handles of the transitions in the group, in declaration order.
    pub transitions: Vec<TransitionId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_type_phase_numbers() {
        assert_eq!(TransitionType::Diphone.phase(), 2);
        assert_eq!(TransitionType::Triphone.phase(), 3);
        assert_eq!(TransitionType::Tetraphone.phase(), 4);
        assert_eq!(TransitionType::from_name("triphone"), Some(TransitionType::Triphone));
        assert_eq!(TransitionType::from_name("nonsense"), None);
    }

    #[test]
    fn test_slope_ratio_validation() {
        let point = |value| TransitionPoint::free(TransitionType::Diphone, value, 0.0);

        let good = SlopeRatio {
            points: vec![point(0.0), point(50.0), point(100.0)],
            slopes: vec![1.0, 3.0],
        };
        assert!(good.validate().is_ok());

        let wrong_count = SlopeRatio {
            points: vec![point(0.0), point(100.0)],
            slopes: vec![1.0, 2.0],
        };
        assert!(wrong_count.validate().is_err());

        let all_zero = SlopeRatio {
            points: vec![point(0.0), point(100.0)],
            slopes: vec![0.0],
        };
        assert!(all_zero.validate().is_err());
    }

    #[test]
    fn test_free_point_time() {
        let point = TransitionPoint::free(TransitionType::Diphone, 100.0, 80.0);
        let time = point
            .time_ms(&FormulaSymbolValues::new(), |_, _| unreachable!())
            .unwrap();
        assert_eq!(time, 80.0);
    }
}
