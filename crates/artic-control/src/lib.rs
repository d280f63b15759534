//! Articulatory speech synthesis controller.
//!
//! This crate turns a marked phonetic string into a time-sampled stream
//! of vocal-tract parameter frames, driven by the rule model of
//! [`artic_model`]:
//!
//! 1. The phonetic-string parser builds a posture stream with foot and
//!    tone-group structure.
//! 2. The rhythm pass derives per-foot tempos and folds them into the
//!    posture tempos.
//! 3. The rule engine slides a 2-4 posture window over the stream,
//!    applying the first matching rule and expanding its transition
//!    profiles into sparse timeline events.
//! 4. The intonation pass lays a pitch contour over the timeline
//!    (cubic or linear interpolation between tone-group points), with
//!    optional per-sample drift.
//! 5. The frame generator resamples the timeline at the control rate
//!    (250 Hz by default).
//!
//! # Determinism
//!
//! All randomness flows through PCG32 generators derived from a caller
//! seed. Given the same model, configuration, input, and seed, the frame
//! output is identical across runs.
//!
//! # Crate structure
//!
//! - [`controller`] - the pipeline owner ([`Controller`])
//! - [`event_list`] - posture stream bookkeeping and the event timeline
//! - [`phonetic_parser`] / [`pho1`] - the two input formats
//! - [`intonation`] / [`intonation_rhythm`] / [`drift`] - pitch contour
//! - [`frame`] - the control-rate frame renderer

pub mod apply;
pub mod config;
pub mod controller;
pub mod drift;
pub mod error;
pub mod event_list;
pub mod frame;
pub mod intonation;
pub mod intonation_rhythm;
pub mod pho1;
pub mod phonetic_parser;
pub mod rng;

pub use config::ControlConfig;
pub use controller::Controller;
pub use drift::DriftGenerator;
pub use error::{ControlError, ControlResult};
pub use event_list::{
    Event, EventList, Foot, InterpolationData, PostureData, RuleData, ToneGroupData,
    PITCH_PARAMETER,
};
pub use frame::write_frames;
pub use intonation::IntonationPoint;
pub use intonation_rhythm::{IntonationParameters, IntonationRhythm, ToneGroupKind};
pub use pho1::Pho1Parser;
pub use phonetic_parser::PhoneticStringParser;

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use artic_model::{
        Category, Equation, Model, Parameter, PointOrSlope, Rule, SlopeRatio, Symbol, Transition,
        TransitionPoint, TransitionType,
    };
    use pretty_assertions::assert_eq;

    const SYMBOLS: [&str; 8] = [
        "duration",
        "transition",
        "qssa",
        "qssb",
        "mkdDuration",
        "mkdTransition",
        "mkdQssa",
        "mkdQssb",
    ];

    /// Builds a small but complete model: three parameters, a handful of
    /// postures, a vowel-vowel rule with a slope-ratio profile, and a
    /// catch-all diphone rule.
    fn build_test_model() -> Model {
        let mut model = Model::new();
        model.add_category(Category::new("phone")).unwrap();
        model.add_category(Category::new("vocoid")).unwrap();

        model
            .add_parameter(Parameter::new("microInt", -10.0, 10.0, 0.0))
            .unwrap();
        model
            .add_parameter(Parameter::new("glotVol", 0.0, 60.0, 0.0))
            .unwrap();
        model
            .add_parameter(Parameter::new("r1", 0.0, 100.0, 0.0))
            .unwrap();

        for name in SYMBOLS {
            model.add_symbol(Symbol::new(name, 0.0, 1000.0, 0.0)).unwrap();
        }

        // name, glotVol, r1, timing symbols (transition, qssa, qssb)
        let postures: [(&str, f32, f32, f32); 7] = [
            ("^", 0.0, 0.0, 0.0),
            ("#", 0.0, 0.0, 0.0),
            ("aa", 10.0, 0.0, 60.0),
            ("ii", 60.0, 100.0, 60.0),
            ("nn", 30.0, 50.0, 60.0),
            ("aa'", 10.0, 0.0, 60.0),
            ("ii'", 60.0, 100.0, 60.0),
        ];
        let phone = model.find_category("phone").unwrap();
        let vocoid = model.find_category("vocoid").unwrap();
        for (name, glot_vol, r1, transition) in postures {
            let id = model.add_posture(name).unwrap();
            let posture = model.posture_mut(id).unwrap();
            posture.add_category(phone);
            posture.set_parameter_target(1, glot_vol).unwrap();
            posture.set_parameter_target(2, r1).unwrap();
            if transition > 0.0 {
                // transition + qssa + qssb = 100 ms
                for index in [1, 5] {
                    posture.set_symbol_target(index, transition).unwrap();
                }
                for index in [2, 3, 6, 7] {
                    posture.set_symbol_target(index, 20.0).unwrap();
                }
            }
            if name.starts_with("aa") || name.starts_with("ii") {
                model.posture_mut(id).unwrap().add_category(vocoid);
            }
        }

        let group = model.add_equation_group("defaults");
        let rd = model
            .add_equation(group, Equation::new("rdDefault", "transition1 + qssa1 + qssb1").unwrap())
            .unwrap();
        let beat = model
            .add_equation(group, Equation::new("beatDefault", "rd / 3.0").unwrap())
            .unwrap();

        let transitions = model.add_transition_group("defaults");
        let mut ramp = Transition::new("ramp", TransitionType::Diphone, false);
        ramp.push(PointOrSlope::Point(TransitionPoint::with_expression(
            TransitionType::Diphone,
            100.0,
            rd,
        )));
        let ramp = model.add_transition(transitions, ramp).unwrap();

        let mut curve = Transition::new("curve", TransitionType::Diphone, false);
        curve.push(PointOrSlope::SlopeRatio(SlopeRatio {
            points: vec![
                TransitionPoint::free(TransitionType::Diphone, 0.0, 0.0),
                TransitionPoint::free(TransitionType::Diphone, 50.0, 50.0),
                TransitionPoint::free(TransitionType::Diphone, 100.0, 100.0),
            ],
            slopes: vec![1.0, 3.0],
        }));
        let curve = model.add_transition(transitions, curve).unwrap();

        let vowel_vowel = {
            let texts = vec![
                "(and phone vocoid)".to_string(),
                "(and phone vocoid)".to_string(),
            ];
            let nodes = model.parse_boolean_expressions(&texts).unwrap();
            let mut rule = Rule::new(texts, nodes, vec![ramp, ramp, curve]);
            rule.symbol_equations_mut().duration = Some(rd);
            rule.symbol_equations_mut().beat = Some(beat);
            rule
        };
        let catch_all = {
            let texts = vec!["phone".to_string(), "phone".to_string()];
            let nodes = model.parse_boolean_expressions(&texts).unwrap();
            let mut rule = Rule::new(texts, nodes, vec![ramp, ramp, ramp]);
            rule.symbol_equations_mut().duration = Some(rd);
            rule.symbol_equations_mut().beat = Some(beat);
            rule
        };
        model.add_rule(vowel_vowel);
        model.add_rule(catch_all);

        model.validate().unwrap();
        model
    }

    fn quiet_config() -> ControlConfig {
        ControlConfig {
            macro_intonation: false,
            smooth_intonation: false,
            intonation_drift: false,
            random_intonation: false,
            ..ControlConfig::default()
        }
    }

    fn controller(config: ControlConfig) -> Controller {
        Controller::new(build_test_model(), config, IntonationRhythm::built_in())
    }

    #[test]
    fn test_empty_utterance_produces_no_frames() {
        let controller = controller(quiet_config());
        let frames = controller.synthesize_phonetic_string("", 0).unwrap();
        // The synthetic wrap (^ # ^) has zero-length rules only.
        assert_eq!(frames.len(), 0);
    }

    #[test]
    fn test_single_diphone_rises_over_100_ms() {
        let controller = controller(quiet_config());
        let frames = controller.synthesize_phonetic_string("aa ii", 0).unwrap();

        // aa -> ii (100 ms) plus ii -> # (100 ms); 250 Hz gives 50 frames.
        assert_eq!(frames.len(), 50);

        // glotVol ramps 10 -> 60 over the first 25 frames.
        for (index, frame) in frames.iter().take(26).enumerate() {
            let expected = 10.0 + 50.0 * (index as f32) / 25.0;
            assert!(
                (frame[1] - expected).abs() < 1e-3,
                "frame {index}: glotVol {} != {expected}",
                frame[1]
            );
        }
    }

    #[test]
    fn test_constant_targets_produce_constant_frames() {
        // A model where every posture carries the same targets: the frame
        // stream must be flat (intonation and drift are off).
        let mut model = Model::new();
        model.add_category(Category::new("phone")).unwrap();
        model.add_category(Category::new("vocoid")).unwrap();
        model
            .add_parameter(Parameter::new("microInt", -10.0, 10.0, 0.0))
            .unwrap();
        model
            .add_parameter(Parameter::new("glotVol", 0.0, 60.0, 0.0))
            .unwrap();
        for name in SYMBOLS {
            model.add_symbol(Symbol::new(name, 0.0, 1000.0, 0.0)).unwrap();
        }
        let phone = model.find_category("phone").unwrap();
        for name in ["^", "#", "aa"] {
            let id = model.add_posture(name).unwrap();
            let posture = model.posture_mut(id).unwrap();
            posture.add_category(phone);
            posture.set_parameter_target(0, 5.0).unwrap();
            posture.set_parameter_target(1, 42.0).unwrap();
            posture.set_symbol_target(1, 60.0).unwrap();
            posture.set_symbol_target(2, 20.0).unwrap();
            posture.set_symbol_target(3, 20.0).unwrap();
        }
        let group = model.add_equation_group("defaults");
        let rd = model
            .add_equation(group, Equation::new("rdDefault", "transition1 + qssa1 + qssb1").unwrap())
            .unwrap();
        let transitions = model.add_transition_group("defaults");
        let mut ramp = Transition::new("ramp", TransitionType::Diphone, false);
        ramp.push(PointOrSlope::Point(TransitionPoint::with_expression(
            TransitionType::Diphone,
            100.0,
            rd,
        )));
        let ramp = model.add_transition(transitions, ramp).unwrap();
        let texts = vec!["phone".to_string(), "phone".to_string()];
        let nodes = model.parse_boolean_expressions(&texts).unwrap();
        let mut rule = Rule::new(texts, nodes, vec![ramp, ramp]);
        rule.symbol_equations_mut().duration = Some(rd);
        model.add_rule(rule);
        model.validate().unwrap();

        let controller = Controller::new(model, quiet_config(), IntonationRhythm::built_in());
        let frames = controller.synthesize_phonetic_string("aa", 0).unwrap();
        assert!(!frames.is_empty());
        for frame in &frames {
            assert_eq!(frame[0], 5.0);
            assert_eq!(frame[1], 42.0);
        }
    }

    #[test]
    fn test_rule_selection_prefers_first_match() {
        let model = build_test_model();
        let parser = PhoneticStringParser::new();

        // Two vowels: the vowel-vowel rule (number 1) wins.
        let mut list = EventList::new(&model);
        parser.parse("aa ii", &mut list).unwrap();
        list.generate_event_list().unwrap();
        let numbers: Vec<usize> = (0..list.number_of_rules())
            .map(|index| list.rule_data(index).unwrap().number)
            .collect();
        assert_eq!(numbers, vec![2, 1, 2, 2]);

        // Vowel then consonant: only the catch-all (number 2) matches.
        let mut list = EventList::new(&model);
        parser.parse("aa nn", &mut list).unwrap();
        list.generate_event_list().unwrap();
        let numbers: Vec<usize> = (0..list.number_of_rules())
            .map(|index| list.rule_data(index).unwrap().number)
            .collect();
        assert_eq!(numbers, vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_rule_windows_tile_the_stream() {
        let model = build_test_model();
        let parser = PhoneticStringParser::new();
        let mut list = EventList::new(&model);
        parser.parse("aa ii nn ii aa", &mut list).unwrap();
        list.generate_event_list().unwrap();

        let mut previous_last = 0;
        for index in 0..list.number_of_rules() {
            let data = list.rule_data(index).unwrap();
            if index > 0 {
                assert_eq!(data.first_posture, previous_last);
            }
            previous_last = data.last_posture;
        }
        assert_eq!(previous_last, list.posture_count() - 1);
    }

    #[test]
    fn test_slope_ratio_interior_point() {
        let model = build_test_model();
        let parser = PhoneticStringParser::new();
        let mut list = EventList::new(&model);
        parser.parse("aa ii", &mut list).unwrap();
        list.generate_event_list().unwrap();

        // The vowel-vowel rule expands r1 (0 -> 100) through the
        // slope-ratio profile: with slopes [1, 3] the first segment owns
        // a quarter of the value delta.
        let event = list
            .events()
            .iter()
            .find(|event| event.time == 48)
            .expect("interior slope-ratio event");
        assert_eq!(event.value(2, false), Some(25.0));
    }

    #[test]
    fn test_rhythm_clamps_minimum_tempo() {
        let model = build_test_model();
        let rhythm = IntonationRhythm::built_in();
        let aa = model.find_posture("aa").unwrap();
        let ii = model.find_posture("ii").unwrap();

        let mut list = EventList::new(&model);
        list.new_posture_with(aa, false);
        list.new_posture_with(ii, false);
        list.new_foot();
        list.set_current_foot_marked();
        list.set_current_foot_tempo(0.01);
        list.new_posture_with(aa, false);
        list.new_foot();

        list.apply_rhythm(&rhythm, 1.0);
        // Marked foot with one posture: 0.01 - (117.7 - 19.36)/180 goes
        // negative and must clamp to the minimum.
        assert_eq!(list.posture_data_at(2).unwrap().tempo, rhythm.rhythm_min_tempo);
    }

    #[test]
    fn test_question_tone_group_final_point() {
        let model = build_test_model();
        let rhythm = IntonationRhythm::built_in();
        let parser = PhoneticStringParser::new();
        let config = ControlConfig {
            random_intonation: false,
            ..ControlConfig::default()
        };

        let mut list = EventList::new(&model);
        parser.parse("/2 aa /l /* ii //", &mut list).unwrap();
        list.apply_rhythm(&rhythm, config.global_tempo);
        list.generate_event_list().unwrap();
        let mut rng = rng::create_component_rng(0, "intonation");
        list.apply_intonation(&rhythm, &config, &mut rng).unwrap();

        let params = rhythm.parameters(ToneGroupKind::Question, false, &mut rng);
        let expected = f64::from(
            params.notional_pitch + params.pretonic_pitch_range + params.tonic_pitch_range,
        );
        let last = list.intonation_points().last().expect("intonation points");
        assert!((last.semitone - expected).abs() < 1e-9);
    }

    #[test]
    fn test_macro_interpolation_is_continuous() {
        let model = build_test_model();
        let rhythm = IntonationRhythm::built_in();
        let parser = PhoneticStringParser::new();
        let config = ControlConfig::default(); // smooth intonation on

        let mut list = EventList::new(&model);
        parser
            .parse("aa ii nn /_ ii nn ii /_ aa ii //", &mut list)
            .unwrap();
        list.apply_rhythm(&rhythm, config.global_tempo);
        list.generate_event_list().unwrap();
        let mut rng = rng::create_component_rng(3, "intonation");
        list.apply_intonation(&rhythm, &config, &mut rng).unwrap();

        // Successive interpolated spans must agree in value and slope at
        // their shared knot.
        let spans: Vec<(f64, event_list::InterpolationData)> = list
            .events()
            .iter()
            .filter_map(|event| event.interpolation.map(|data| (f64::from(event.time), data)))
            .collect();
        assert!(spans.len() >= 2);
        for pair in spans.windows(2) {
            let (_, d1) = pair[0];
            let (x, d2) = pair[1];
            let value1 = x * (x * (x * d1.a + d1.b) + d1.c) + d1.d;
            let value2 = x * (x * (x * d2.a + d2.b) + d2.c) + d2.d;
            assert!(
                (value1 - value2).abs() < 1e-3,
                "value discontinuity at {x}: {value1} vs {value2}"
            );
            let slope1 = 3.0 * d1.a * x * x + 2.0 * d1.b * x + d1.c;
            let slope2 = 3.0 * d2.a * x * x + 2.0 * d2.b * x + d2.c;
            assert!(
                (slope1 - slope2).abs() < 1e-3,
                "slope discontinuity at {x}: {slope1} vs {slope2}"
            );
        }
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let config = ControlConfig {
            random_intonation: true,
            ..ControlConfig::default()
        };
        let controller = controller(config);

        let frames1 = controller
            .synthesize_phonetic_string("aa /_ ii /l /* aa //", 42)
            .unwrap();
        let frames2 = controller
            .synthesize_phonetic_string("aa /_ ii /l /* aa //", 42)
            .unwrap();
        assert_eq!(frames1, frames2);

        let frames3 = controller
            .synthesize_phonetic_string("aa /_ ii /l /* aa //", 43)
            .unwrap();
        assert_ne!(frames1, frames3);
    }

    #[test]
    fn test_unknown_posture_is_an_error() {
        let controller = controller(quiet_config());
        let result = controller.synthesize_phonetic_string("aa zz", 0);
        assert!(matches!(
            result,
            Err(ControlError::PhoneticString { .. })
        ));
    }

    #[test]
    fn test_unknown_escape_is_an_error() {
        let controller = controller(quiet_config());
        let result = controller.synthesize_phonetic_string("aa /x ii", 0);
        assert!(matches!(
            result,
            Err(ControlError::PhoneticString { .. })
        ));
    }

    #[test]
    fn test_no_matching_rule_is_fatal() {
        // A model whose only rule never matches anything.
        let mut model = Model::new();
        model.add_category(Category::new("phone")).unwrap();
        model
            .add_parameter(Parameter::new("microInt", -10.0, 10.0, 0.0))
            .unwrap();
        for name in SYMBOLS {
            model.add_symbol(Symbol::new(name, 0.0, 1000.0, 0.0)).unwrap();
        }
        let phone = model.find_category("phone").unwrap();
        for name in ["^", "#", "aa", "ii"] {
            let id = model.add_posture(name).unwrap();
            model.posture_mut(id).unwrap().add_category(phone);
        }
        let transitions = model.add_transition_group("defaults");
        let mut ramp = Transition::new("ramp", TransitionType::Diphone, false);
        ramp.push(PointOrSlope::Point(TransitionPoint::free(
            TransitionType::Diphone,
            100.0,
            100.0,
        )));
        let ramp = model.add_transition(transitions, ramp).unwrap();
        let texts = vec!["(and phone (not phone))".to_string(), "phone".to_string()];
        let nodes = model.parse_boolean_expressions(&texts).unwrap();
        model.add_rule(Rule::new(texts, nodes, vec![ramp]));
        model.validate().unwrap();

        let controller = Controller::new(model, quiet_config(), IntonationRhythm::built_in());
        let result = controller.synthesize_phonetic_string("aa ii", 0);
        assert!(matches!(result, Err(ControlError::NoMatchingRule { .. })));
    }

    #[test]
    fn test_pho1_synthesis_produces_frames() {
        let controller = controller(quiet_config());
        let frames = controller
            .synthesize_pho1("^ 50\naa 120 50 220\nii 100\n# 50\n")
            .unwrap();
        assert!(!frames.is_empty());
    }

    #[test]
    fn test_write_frames_round_numbers() {
        let controller = controller(quiet_config());
        let mut output = Vec::new();
        controller
            .synthesize_to_writer("aa ii", 0, &mut output)
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 50);
        let first: Vec<&str> = text.lines().next().unwrap().split(' ').collect();
        assert_eq!(first.len(), 3);
    }
}
