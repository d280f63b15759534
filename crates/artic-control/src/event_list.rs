//! The event timeline and its posture-stream bookkeeping.
//!
//! The phonetic-string parser feeds postures, feet, and tone groups into
//! an [`EventList`]; the rule engine then materialises rule applications
//! into a sparse, time-ordered list of parameter events which the frame
//! generator resamples at the control rate.

use artic_model::{Model, PostureId};

use crate::intonation::IntonationPoint;
use crate::intonation_rhythm::ToneGroupKind;

/// Parameter index of the pitch parameter, by convention the first
/// parameter of the model.
pub const PITCH_PARAMETER: usize = 0;

/// Event times are quantised to this grid (250 Hz control rate).
pub const TIME_QUANTIZATION_MS: i32 = 4;

/// Bookkeeping for one posture in the stream.
#[derive(Debug, Clone)]
pub struct PostureData {
    /// The posture, once one has been assigned to this stream slot.
    pub posture: Option<PostureId>,
    /// Per-posture tempo (input markup, then rhythm-adjusted).
    pub tempo: f64,
    /// Tempo applied to the rule that consumes this posture as its base.
    pub rule_tempo: f64,
    /// Onset time in ms, set when a rule consumes the posture.
    pub onset: f64,
    /// Syllable boundary flag.
    pub syllable: bool,
    /// Stress mark flag.
    pub marked: bool,
}

impl Default for PostureData {
    fn default() -> Self {
        Self {
            posture: None,
            tempo: 1.0,
            rule_tempo: 1.0,
            onset: 0.0,
            syllable: false,
            marked: false,
        }
    }
}

/// A contiguous run of postures sharing a tempo; the rhythmic beat unit.
#[derive(Debug, Clone)]
pub struct Foot {
    /// Index of the first posture of the foot.
    pub start: usize,
    /// Index of the last posture of the foot (set when the foot is
    /// closed).
    pub end: usize,
    /// Foot tempo.
    pub tempo: f64,
    /// Tonic (stressed) foot flag.
    pub marked: bool,
    /// Last foot in its tone group.
    pub last: bool,
}

impl Default for Foot {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            tempo: 1.0,
            marked: false,
            last: false,
        }
    }
}

/// A contiguous run of feet under one intonation contour.
#[derive(Debug, Clone)]
pub struct ToneGroupData {
    /// Index of the first foot.
    pub start_foot: usize,
    /// Index of the last complete foot (set when the group is closed).
    pub end_foot: usize,
    /// Contour type.
    pub kind: ToneGroupKind,
}

impl Default for ToneGroupData {
    fn default() -> Self {
        Self {
            start_foot: 0,
            end_foot: 0,
            kind: ToneGroupKind::Statement,
        }
    }
}

/// Bookkeeping for one applied rule.
#[derive(Debug, Clone, Default)]
pub struct RuleData {
    /// 1-based rule number in the model's rule list.
    pub number: usize,
    /// Index of the first posture of the window.
    pub first_posture: usize,
    /// Index of the last posture of the window.
    pub last_posture: usize,
    /// Absolute beat time in ms.
    pub beat: f64,
    /// Scaled rule duration in ms.
    pub duration: f64,
    pub mark1: f64,
    pub mark2: f64,
    pub mark3: f64,
}

/// Cubic (or linear) interpolation coefficients attached to an event by
/// the macro-intonation pass. The pitch at time `t` is
/// `((a*t + b)*t + c)*t + d`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InterpolationData {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// One record of the sparse timeline.
#[derive(Debug, Clone)]
pub struct Event {
    /// Quantised absolute time in ms.
    pub time: i32,
    /// Rule-boundary sentinel flag.
    pub rule_boundary: bool,
    /// Per-parameter target values.
    pub parameters: Vec<Option<f64>>,
    /// Per-parameter additive special offsets.
    pub special_parameters: Vec<Option<f64>>,
    /// Macro-intonation coefficients for the span starting at this event.
    pub interpolation: Option<InterpolationData>,
}

impl Event {
    fn new(num_parameters: usize, time: i32) -> Self {
        Self {
            time,
            rule_boundary: false,
            parameters: vec![None; num_parameters],
            special_parameters: vec![None; num_parameters],
            interpolation: None,
        }
    }

    /// Reads a parameter or special value.
    pub fn value(&self, parameter_index: usize, special: bool) -> Option<f64> {
        if special {
            self.special_parameters.get(parameter_index).copied().flatten()
        } else {
            self.parameters.get(parameter_index).copied().flatten()
        }
    }
}

/// The event timeline of one synthesis run.
///
/// Holds the posture stream (with foot and tone-group structure), the
/// applied-rule records, the intonation points, and the sparse event
/// list itself. The model is read-only for the lifetime of the run.
#[derive(Debug)]
pub struct EventList<'a> {
    model: &'a Model,

    pub(crate) zero_ref: i32,
    pub(crate) zero_index: usize,
    pub(crate) duration: i32,

    pub(crate) posture_data: Vec<PostureData>,
    pub(crate) current_posture: usize,

    pub(crate) feet: Vec<Foot>,
    pub(crate) current_foot: usize,

    pub(crate) tone_groups: Vec<ToneGroupData>,
    pub(crate) current_tone_group: usize,

    pub(crate) rule_data: Vec<RuleData>,
    pub(crate) current_rule: usize,

    pub(crate) intonation_points: Vec<IntonationPoint>,
    pub(crate) events: Vec<Event>,
}

impl<'a> EventList<'a> {
    /// Creates an empty timeline over a model.
    pub fn new(model: &'a Model) -> Self {
        let mut list = Self {
            model,
            zero_ref: 0,
            zero_index: 0,
            duration: 0,
            posture_data: Vec::new(),
            current_posture: 0,
            feet: Vec::new(),
            current_foot: 0,
            tone_groups: Vec::new(),
            current_tone_group: 0,
            rule_data: Vec::new(),
            current_rule: 0,
            intonation_points: Vec::new(),
            events: Vec::with_capacity(128),
        };
        list.reset();
        list
    }

    /// Clears all state for a new utterance.
    pub fn reset(&mut self) {
        self.zero_ref = 0;
        self.zero_index = 0;
        self.duration = 0;
        self.posture_data.clear();
        self.posture_data.push(PostureData::default());
        self.current_posture = 0;
        self.feet.clear();
        self.feet.push(Foot::default());
        self.current_foot = 0;
        self.tone_groups.clear();
        self.tone_groups.push(ToneGroupData::default());
        self.current_tone_group = 0;
        self.rule_data.clear();
        self.rule_data.push(RuleData::default());
        self.current_rule = 0;
        self.intonation_points.clear();
        self.events.clear();
    }

    /// The model this timeline is bound to.
    pub fn model(&self) -> &'a Model {
        self.model
    }

    /// The sparse event list.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The intonation points, ordered by absolute time.
    pub fn intonation_points(&self) -> &[IntonationPoint] {
        &self.intonation_points
    }

    /// Number of rules applied so far.
    pub fn number_of_rules(&self) -> usize {
        self.current_rule
    }

    /// Returns the bookkeeping record of an applied rule.
    pub fn rule_data(&self, rule_index: usize) -> Option<&RuleData> {
        if rule_index < self.current_rule {
            self.rule_data.get(rule_index)
        } else {
            None
        }
    }

    /// Absolute beat time of an applied rule, or 0 for an out-of-range
    /// index.
    pub fn beat_at_rule(&self, rule_index: usize) -> f64 {
        self.rule_data(rule_index).map_or(0.0, |data| data.beat)
    }

    /// Returns the posture stream entry at an index.
    pub fn posture_data_at(&self, index: usize) -> Option<&PostureData> {
        if index <= self.current_posture {
            self.posture_data.get(index)
        } else {
            None
        }
    }

    /// Number of occupied posture slots.
    pub fn posture_count(&self) -> usize {
        if self
            .posture_data
            .get(self.current_posture)
            .is_some_and(|data| data.posture.is_some())
        {
            self.current_posture + 1
        } else {
            self.current_posture
        }
    }

    //-----------------------------------------------------------------
    // Posture stream construction.

    fn advance_posture_slot(&mut self) {
        if self.posture_data[self.current_posture].posture.is_some() {
            self.posture_data.push(PostureData::default());
            self.current_posture += 1;
        }
        self.posture_data[self.current_posture].tempo = 1.0;
    }

    /// Appends a posture to the stream. Returns the posture's stream
    /// index.
    pub fn new_posture_with(&mut self, posture: PostureId, marked: bool) -> usize {
        self.advance_posture_slot();
        let data = &mut self.posture_data[self.current_posture];
        data.rule_tempo = 1.0;
        data.posture = Some(posture);
        data.marked = marked;
        self.current_posture
    }

    /// Replaces the most recently added posture.
    pub fn replace_current_posture(&mut self, posture: PostureId) {
        let index = if self.posture_data[self.current_posture].posture.is_some() {
            self.current_posture
        } else if self.current_posture > 0 {
            self.current_posture - 1
        } else {
            return;
        };
        self.posture_data[index].posture = Some(posture);
    }

    /// Sets the tempo of the current posture.
    pub fn set_current_posture_tempo(&mut self, tempo: f64) {
        self.posture_data[self.current_posture].tempo = tempo;
    }

    /// Sets the rule tempo of the current posture.
    pub fn set_current_posture_rule_tempo(&mut self, tempo: f64) {
        self.posture_data[self.current_posture].rule_tempo = tempo;
    }

    /// Marks a syllable boundary on the current posture.
    pub fn set_current_posture_syllable(&mut self) {
        self.posture_data[self.current_posture].syllable = true;
    }

    /// Closes the current foot and starts a new one.
    pub fn new_foot(&mut self) {
        if self.current_posture == 0 {
            return;
        }
        self.feet[self.current_foot].end = self.current_posture;
        self.current_foot += 1;
        self.advance_posture_slot();

        self.feet.push(Foot {
            start: self.current_posture,
            ..Foot::default()
        });
    }

    /// Marks the current foot as the tonic foot.
    pub fn set_current_foot_marked(&mut self) {
        self.feet[self.current_foot].marked = true;
    }

    /// Marks the current foot as the last in its tone group.
    pub fn set_current_foot_last(&mut self) {
        self.feet[self.current_foot].last = true;
    }

    /// Sets the tempo of the current foot.
    pub fn set_current_foot_tempo(&mut self, tempo: f64) {
        self.feet[self.current_foot].tempo = tempo;
    }

    /// Closes the current tone group and starts a new one.
    pub fn new_tone_group(&mut self) {
        if self.current_foot == 0 {
            return;
        }
        self.tone_groups[self.current_tone_group].end_foot = self.current_foot;
        self.current_tone_group += 1;
        self.new_foot();

        self.tone_groups.push(ToneGroupData {
            start_foot: self.current_foot,
            ..ToneGroupData::default()
        });
    }

    /// Sets the contour type of the current tone group.
    pub fn set_current_tone_group_kind(&mut self, kind: ToneGroupKind) {
        self.tone_groups[self.current_tone_group].kind = kind;
    }

    //-----------------------------------------------------------------
    // Event insertion.

    /// Sets the timeline duration cap; later events are dropped.
    pub(crate) fn set_duration(&mut self, duration: i32) {
        self.duration = duration;
    }

    /// Moves the zero reference to an absolute time.
    pub(crate) fn set_zero_ref(&mut self, value: i32) {
        self.zero_ref = value;
        self.zero_index = 0;
        for index in (0..self.events.len()).rev() {
            if self.events[index].time < value {
                self.zero_index = index;
                return;
            }
        }
    }

    /// Opens the whole timeline for insertion (used by the intonation
    /// pass).
    pub(crate) fn set_full_time_scale(&mut self) {
        self.zero_ref = 0;
        self.zero_index = 0;
        self.duration = self.events.last().map_or(0, |event| event.time) + 100;
    }

    fn insert_at(&mut self, time: i32) -> usize {
        // Events usually arrive in non-decreasing time: search backwards
        // from the end, stopping at the zero index.
        let mut index = self.events.len();
        while index > self.zero_index {
            let existing = self.events[index - 1].time;
            if existing == time {
                return index - 1;
            }
            if existing < time {
                break;
            }
            index -= 1;
        }
        let num_parameters = self.model.parameters().len();
        self.events.insert(index, Event::new(num_parameters, time));
        index
    }

    /// Inserts (or merges) a parameter event at `time` ms relative to the
    /// zero reference. Returns the event index, or `None` if the time is
    /// outside the open span of the timeline.
    pub(crate) fn insert_event(
        &mut self,
        time: f64,
        parameter_index: usize,
        value: f64,
        special: bool,
    ) -> Option<usize> {
        let index = self.insert_marker(time)?;
        let event = &mut self.events[index];
        let slot = if special {
            &mut event.special_parameters[parameter_index]
        } else {
            &mut event.parameters[parameter_index]
        };
        *slot = Some(value);
        Some(index)
    }

    /// Inserts (or finds) a pure time-marker event. Returns the event
    /// index, or `None` if the time is outside the open span.
    pub(crate) fn insert_marker(&mut self, time: f64) -> Option<usize> {
        if time < 0.0 || time > f64::from(self.duration + TIME_QUANTIZATION_MS) {
            return None;
        }
        let absolute = self.zero_ref + time as i32;
        let quantized = (absolute >> 2) << 2;
        Some(self.insert_at(quantized))
    }

    /// Inserts a rule-boundary sentinel.
    pub(crate) fn insert_rule_boundary(&mut self, time: f64) {
        if let Some(index) = self.insert_marker(time) {
            self.events[index].rule_boundary = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artic_model::{Model, Parameter};

    fn two_param_model() -> Model {
        let mut model = Model::new();
        model
            .add_parameter(Parameter::new("microInt", -10.0, 10.0, 0.0))
            .unwrap();
        model
            .add_parameter(Parameter::new("glotVol", 0.0, 60.0, 0.0))
            .unwrap();
        model
    }

    #[test]
    fn test_insert_event_quantises_and_orders() {
        let model = two_param_model();
        let mut list = EventList::new(&model);
        list.set_duration(1000);

        list.insert_event(0.0, 0, 1.0, false);
        list.insert_event(101.0, 0, 2.0, false);
        list.insert_event(50.0, 1, 3.0, false);

        let times: Vec<i32> = list.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 48, 100]);
        assert_eq!(list.events()[1].value(1, false), Some(3.0));
        assert_eq!(list.events()[2].value(0, false), Some(2.0));
    }

    #[test]
    fn test_insert_event_merges_same_time() {
        let model = two_param_model();
        let mut list = EventList::new(&model);
        list.set_duration(1000);

        list.insert_event(100.0, 0, 1.0, false);
        list.insert_event(102.0, 1, 2.0, false); // same 4 ms slot
        assert_eq!(list.events().len(), 1);
        assert_eq!(list.events()[0].value(0, false), Some(1.0));
        assert_eq!(list.events()[0].value(1, false), Some(2.0));
    }

    #[test]
    fn test_insert_event_rejects_out_of_span() {
        let model = two_param_model();
        let mut list = EventList::new(&model);
        list.set_duration(100);
        assert!(list.insert_event(-1.0, 0, 0.0, false).is_none());
        assert!(list.insert_event(200.0, 0, 0.0, false).is_none());
        assert!(list.insert_event(100.0, 0, 0.0, false).is_some());
    }

    #[test]
    fn test_special_values_are_separate() {
        let model = two_param_model();
        let mut list = EventList::new(&model);
        list.set_duration(100);
        list.insert_event(0.0, 0, 1.0, false);
        list.insert_event(0.0, 0, 0.5, true);
        let event = &list.events()[0];
        assert_eq!(event.value(0, false), Some(1.0));
        assert_eq!(event.value(0, true), Some(0.5));
    }

    #[test]
    fn test_event_times_non_decreasing_after_mixed_inserts() {
        let model = two_param_model();
        let mut list = EventList::new(&model);
        list.set_duration(4000);
        for time in [0.0, 400.0, 100.0, 700.0, 300.0, 300.0, 650.0] {
            list.insert_event(time, 0, time, false);
        }
        let times: Vec<i32> = list.events().iter().map(|e| e.time).collect();
        let mut sorted = times.clone();
        sorted.sort_unstable();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_stream_structure() {
        let mut model = two_param_model();
        let aa = model.add_posture("aa").unwrap();
        let bb = model.add_posture("bb").unwrap();
        let mut list = EventList::new(&model);

        list.new_posture_with(aa, false);
        list.new_posture_with(bb, false);
        list.set_current_posture_tempo(0.8);
        list.new_foot();
        list.set_current_foot_marked();
        list.new_posture_with(aa, true);
        list.new_tone_group();

        assert_eq!(list.posture_count(), 3);
        assert!(list.posture_data_at(0).unwrap().posture.is_some());
        assert_eq!(list.posture_data_at(1).unwrap().tempo, 0.8);
        assert!(list.posture_data_at(2).unwrap().marked);
        assert_eq!(list.feet[0].end, 1);
        assert_eq!(list.feet[1].start, 2);
        assert!(list.feet[1].marked);
        assert_eq!(list.tone_groups[0].end_foot, 1);
        assert_eq!(list.tone_groups[1].start_foot, 2);
    }
}
