//! Articulatory speech synthesis data model.
//!
//! This crate holds the data model of a rule-driven articulatory speech
//! synthesizer: postures (static articulatory targets), the categories that
//! classify them, vocal-tract parameter and metadata symbol definitions,
//! named equations over a fixed formula-symbol vocabulary, transition
//! profiles, and the ordered rule list that maps posture windows to
//! parameter trajectories.
//!
//! # Handles
//!
//! The [`Model`] is an arena: it owns every entity, and cross-references
//! use small handles ([`CategoryId`], [`EquationId`], [`TransitionId`])
//! that are stable for the lifetime of a loaded model. Serialized
//! configuration references entities by name; names are resolved to
//! handles at load time.
//!
//! # Crate structure
//!
//! - [`model`] - the arena and name lookups
//! - [`formula`] - equation formula parser and evaluator
//! - [`boolean`] - rule boolean-expression parser and evaluator
//! - [`config`] - voice-pack configuration (XML model file, key/value
//!   files, pack index)

pub mod boolean;
pub mod category;
pub mod config;
pub mod equation;
pub mod error;
pub mod formula;
pub mod model;
pub mod param;
pub mod posture;
pub mod rule;
pub mod transition;

pub use boolean::{BooleanNode, RuleExpressionData};
pub use category::{Category, CategoryId};
pub use config::{load_model_xml, save_model_xml, ConfigFile, VoicePackIndex};
pub use equation::{Equation, EquationGroup, EquationId};
pub use error::{EntityKind, ModelError, ModelResult};
pub use formula::{FormulaSymbol, FormulaSymbolValues, NUM_FORMULA_SYMBOLS};
pub use model::Model;
pub use param::{posture_symbol, Parameter, Symbol};
pub use posture::{Posture, PostureId};
pub use rule::{ExpressionSymbolEquations, Rule, RuleSymbols};
pub use transition::{
    PointOrSlope, PointTime, SlopeRatio, Transition, TransitionGroup, TransitionId,
    TransitionPoint, TransitionType,
};

#[cfg(test)]
mod round_trip_tests {
    use super::*;
    use crate::config::{model_to_xml, parse_model_xml};
    use pretty_assertions::assert_eq;

    fn build_model() -> Model {
        let mut model = Model::new();
        model.add_category(Category::new("phone")).unwrap();
        let mut vocoid = Category::new("vocoid");
        vocoid.set_comment(Some("vowel-like postures".into()));
        model.add_category(vocoid).unwrap();

        model
            .add_parameter(Parameter::new("microInt", -10.0, 10.0, 0.0))
            .unwrap();
        model
            .add_parameter(Parameter::new("glotVol", 0.0, 60.0, 0.0))
            .unwrap();

        for (name, max, default) in [
            ("duration", 1000.0, 100.0),
            ("transition", 1000.0, 30.0),
            ("qssa", 1000.0, 20.0),
            ("qssb", 1000.0, 20.0),
            ("mkdDuration", 1000.0, 100.0),
            ("mkdTransition", 1000.0, 30.0),
            ("mkdQssa", 1000.0, 20.0),
            ("mkdQssb", 1000.0, 20.0),
        ] {
            model.add_symbol(Symbol::new(name, 0.0, max, default)).unwrap();
        }

        for name in ["^", "#", "aa", "ii"] {
            let id = model.add_posture(name).unwrap();
            let phone = model.find_category("phone").unwrap();
            model.posture_mut(id).unwrap().add_category(phone);
            for index in 0..2 {
                model
                    .posture_mut(id)
                    .unwrap()
                    .set_parameter_target(index, index as f32 + 1.5)
                    .unwrap();
            }
            for index in 0..8 {
                model
                    .posture_mut(id)
                    .unwrap()
                    .set_symbol_target(index, index as f32 * 10.0)
                    .unwrap();
            }
        }
        let vocoid = model.find_category("vocoid").unwrap();
        for name in ["aa", "ii"] {
            let id = model.find_posture(name).unwrap();
            model.posture_mut(id).unwrap().add_category(vocoid);
        }

        let group = model.add_equation_group("defaults");
        let duration = model
            .add_equation(group, Equation::new("diphoneDefault", "transition1 + qssa1 + qssb1").unwrap())
            .unwrap();
        let beat = model
            .add_equation(group, Equation::new("defaultBeat", "rd / 3.0").unwrap())
            .unwrap();

        let transitions = model.add_transition_group("defaults");
        let mut ramp = Transition::new("ramp", TransitionType::Diphone, false);
        ramp.push(PointOrSlope::Point(TransitionPoint::free(
            TransitionType::Diphone,
            0.0,
            0.0,
        )));
        ramp.push(PointOrSlope::Point(TransitionPoint::with_expression(
            TransitionType::Diphone,
            100.0,
            duration,
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
        model.add_transition(transitions, curve).unwrap();

        let specials = model.add_special_transition_group("specials");
        let mut bump = Transition::new("bump", TransitionType::Diphone, true);
        bump.push(PointOrSlope::Point(TransitionPoint::free(
            TransitionType::Diphone,
            40.0,
            25.0,
        )));
        let bump = model.add_special_transition(specials, bump).unwrap();

        let texts = vec!["phone".to_string(), "(or phone vocoid)".to_string()];
        let nodes = model.parse_boolean_expressions(&texts).unwrap();
        let mut rule = Rule::new(texts, nodes, vec![ramp, ramp]);
        rule.set_special_profile(1, Some(bump)).unwrap();
        rule.symbol_equations_mut().duration = Some(duration);
        rule.symbol_equations_mut().beat = Some(beat);
        rule.set_comment(Some("general fallback".into()));
        model.add_rule(rule);

        model.validate().unwrap();
        model
    }

    #[test]
    fn test_xml_round_trip() {
        let model = build_model();
        let xml = model_to_xml(&model).unwrap();
        let reloaded = parse_model_xml("round-trip", &xml).unwrap();
        reloaded.validate().unwrap();

        assert_eq!(model.categories().len(), reloaded.categories().len());
        assert_eq!(model.parameters(), reloaded.parameters());
        assert_eq!(model.symbols(), reloaded.symbols());
        assert_eq!(model.postures(), reloaded.postures());
        assert_eq!(model.equation_groups(), reloaded.equation_groups());
        assert_eq!(model.transition_groups(), reloaded.transition_groups());
        assert_eq!(
            model.special_transition_groups(),
            reloaded.special_transition_groups()
        );
        assert_eq!(model.rules(), reloaded.rules());

        // Serializing the reloaded model reproduces the same document.
        let xml2 = model_to_xml(&reloaded).unwrap();
        assert_eq!(xml, xml2);
    }

    #[test]
    fn test_save_and_load_file() {
        let model = build_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artic_model.xml");
        save_model_xml(&model, &path).unwrap();
        let reloaded = load_model_xml(&path).unwrap();
        assert_eq!(model.rules().len(), reloaded.rules().len());
        assert_eq!(model.postures(), reloaded.postures());
    }
}
