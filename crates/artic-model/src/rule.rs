//! Rules: posture-window patterns and their parameter profiles.

use crate::boolean::{BooleanNode, RuleExpressionData};
use crate::equation::EquationId;
use crate::error::{EntityKind, ModelError, ModelResult};
use crate::formula::{FormulaSymbol, FormulaSymbolValues};
use crate::model::Model;
use crate::param::posture_symbol;
use crate::transition::{TransitionId, TransitionType};

const TRANSITION_SYMBOLS: [FormulaSymbol; 4] = [
    FormulaSymbol::Transition1,
    FormulaSymbol::Transition2,
    FormulaSymbol::Transition3,
    FormulaSymbol::Transition4,
];
const QSSA_SYMBOLS: [FormulaSymbol; 4] = [
    FormulaSymbol::Qssa1,
    FormulaSymbol::Qssa2,
    FormulaSymbol::Qssa3,
    FormulaSymbol::Qssa4,
];
const QSSB_SYMBOLS: [FormulaSymbol; 4] = [
    FormulaSymbol::Qssb1,
    FormulaSymbol::Qssb2,
    FormulaSymbol::Qssb3,
    FormulaSymbol::Qssb4,
];
const TEMPO_SYMBOLS: [FormulaSymbol; 4] = [
    FormulaSymbol::Tempo1,
    FormulaSymbol::Tempo2,
    FormulaSymbol::Tempo3,
    FormulaSymbol::Tempo4,
];

/// The optional equations that produce a rule's timing symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionSymbolEquations {
    /// Rule duration (`rd`), in milliseconds.
    pub duration: Option<EquationId>,
    /// Beat location relative to the rule start.
    pub beat: Option<EquationId>,
    pub mark1: Option<EquationId>,
    pub mark2: Option<EquationId>,
    pub mark3: Option<EquationId>,
}

/// The evaluated timing symbols of an applied rule.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuleSymbols {
    /// Rule duration in milliseconds.
    pub duration: f64,
    /// Beat time relative to the rule start, in milliseconds.
    pub beat: f64,
    pub mark1: f64,
    pub mark2: f64,
    pub mark3: f64,
}

/// A rule: 2-4 boolean expressions plus one transition profile per
/// parameter and optional special profiles and timing equations.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    boolean_expressions: Vec<String>,
    nodes: Vec<BooleanNode>,
    param_profiles: Vec<TransitionId>,
    special_profiles: Vec<Option<TransitionId>>,
    symbol_equations: ExpressionSymbolEquations,
    comment: Option<String>,
}

impl Rule {
    /// Creates a rule.
    ///
    /// `boolean_expressions` is the source text of the patterns, `nodes`
    /// the parsed trees (one per expression), `param_profiles` one
    /// transition handle per model parameter.
    pub fn new(
        boolean_expressions: Vec<String>,
        nodes: Vec<BooleanNode>,
        param_profiles: Vec<TransitionId>,
    ) -> Self {
        let num_parameters = param_profiles.len();
        Self {
            boolean_expressions,
            nodes,
            param_profiles,
            special_profiles: vec![None; num_parameters],
            symbol_equations: ExpressionSymbolEquations::default(),
            comment: None,
        }
    }

    /// Returns the number of boolean expressions (2-4 in a valid model).
    pub fn number_of_expressions(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the rule type derived from the expression count.
    pub fn rule_type(&self) -> Option<TransitionType> {
        TransitionType::from_posture_count(self.nodes.len())
    }

    /// Returns the source text of the boolean expressions.
    pub fn boolean_expressions(&self) -> &[String] {
        &self.boolean_expressions
    }

    /// Returns the parameter-profile transition for a parameter index.
    pub fn param_profile(&self, parameter_index: usize) -> ModelResult<TransitionId> {
        self.param_profiles
            .get(parameter_index)
            .copied()
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::Parameter,
                index: parameter_index,
            })
    }

    /// Returns the special-profile transition for a parameter index, if any.
    pub fn special_profile(&self, parameter_index: usize) -> ModelResult<Option<TransitionId>> {
        self.special_profiles
            .get(parameter_index)
            .copied()
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::Parameter,
                index: parameter_index,
            })
    }

    /// Sets the special-profile transition for a parameter index.
    pub fn set_special_profile(
        &mut self,
        parameter_index: usize,
        transition: Option<TransitionId>,
    ) -> ModelResult<()> {
        match self.special_profiles.get_mut(parameter_index) {
            Some(slot) => {
                *slot = transition;
                Ok(())
            }
            None => Err(ModelError::InvalidIndex {
                kind: EntityKind::Parameter,
                index: parameter_index,
            }),
        }
    }

    /// Returns the timing-symbol equations.
    pub fn symbol_equations(&self) -> &ExpressionSymbolEquations {
        &self.symbol_equations
    }

    /// Returns the timing-symbol equations mutably.
    pub fn symbol_equations_mut(&mut self) -> &mut ExpressionSymbolEquations {
        &mut self.symbol_equations
    }

    /// Returns the optional comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Sets the comment.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    /// Evaluates all boolean expressions against a posture window.
    ///
    /// The rule matches when it has no more expressions than window
    /// postures and every expression accepts its posture.
    pub fn matches(&self, window: &[RuleExpressionData<'_>]) -> bool {
        if self.nodes.len() > window.len() {
            return false;
        }
        self.nodes
            .iter()
            .zip(window.iter())
            .all(|(node, data)| node.eval(data))
    }

    /// Evaluates the rule's timing equations for a matched window.
    ///
    /// The formula symbol table is seeded from the window postures'
    /// transition/qssa/qssb symbol targets (marked variants for marked
    /// postures) and tempos. Equations are evaluated duration first, so
    /// later equations can reference `rd`, `beat`, and earlier marks.
    /// Absent equations leave their symbol at zero, except the duration,
    /// which falls back to the first posture's transition + qssa + qssb.
    ///
    /// Returns the timing symbols together with the final symbol table;
    /// transition point time-expressions are evaluated against that table.
    pub fn evaluate_expression_symbols(
        &self,
        window: &[RuleExpressionData<'_>],
        model: &Model,
    ) -> ModelResult<(RuleSymbols, FormulaSymbolValues)> {
        let mut symbols = FormulaSymbolValues::new();

        for (i, data) in window.iter().take(4).enumerate() {
            let (transition, qssa, qssb) = posture_timing_symbols(data)?;
            symbols.set(TRANSITION_SYMBOLS[i], transition);
            symbols.set(QSSA_SYMBOLS[i], qssa);
            symbols.set(QSSB_SYMBOLS[i], qssb);
            symbols.set(TEMPO_SYMBOLS[i], data.tempo as f32);
        }

        match self.symbol_equations.duration {
            Some(id) => {
                let value = model.eval_equation(id, &symbols)?;
                symbols.set(FormulaSymbol::Rd, value);
            }
            None => {
                if let Some(data) = window.first() {
                    let (transition, qssa, qssb) = posture_timing_symbols(data)?;
                    symbols.set(FormulaSymbol::Rd, transition + qssa + qssb);
                }
            }
        }
        for (equation, symbol) in [
            (self.symbol_equations.beat, FormulaSymbol::Beat),
            (self.symbol_equations.mark1, FormulaSymbol::Mark1),
            (self.symbol_equations.mark2, FormulaSymbol::Mark2),
            (self.symbol_equations.mark3, FormulaSymbol::Mark3),
        ] {
            if let Some(id) = equation {
                let value = model.eval_equation(id, &symbols)?;
                symbols.set(symbol, value);
            }
        }

        let rule_symbols = RuleSymbols {
            duration: f64::from(symbols.get(FormulaSymbol::Rd)),
            beat: f64::from(symbols.get(FormulaSymbol::Beat)),
            mark1: f64::from(symbols.get(FormulaSymbol::Mark1)),
            mark2: f64::from(symbols.get(FormulaSymbol::Mark2)),
            mark3: f64::from(symbols.get(FormulaSymbol::Mark3)),
        };
        Ok((rule_symbols, symbols))
    }

    /// Validates the rule against the model.
    pub fn validate(&self, model: &Model) -> Result<(), String> {
        let count = self.nodes.len();
        if !(2..=4).contains(&count) {
            return Err(format!("rule has {count} boolean expressions, expected 2-4"));
        }
        if self.param_profiles.len() != model.parameters().len() {
            return Err(format!(
                "rule has {} parameter profiles, model has {} parameters",
                self.param_profiles.len(),
                model.parameters().len()
            ));
        }
        for &id in &self.param_profiles {
            let transition = model
                .transition(id)
                .map_err(|_| format!("missing parameter transition {}", id.0))?;
            if transition.transition_type().phase() > count {
                return Err(format!(
                    "transition {} spans {} postures but the rule matches {}",
                    transition.name(),
                    transition.transition_type().phase(),
                    count
                ));
            }
        }
        for id in self.special_profiles.iter().flatten() {
            model
                .special_transition(*id)
                .map_err(|_| format!("missing special transition {}", id.0))?;
        }
        for id in [
            self.symbol_equations.duration,
            self.symbol_equations.beat,
            self.symbol_equations.mark1,
            self.symbol_equations.mark2,
            self.symbol_equations.mark3,
        ]
        .into_iter()
        .flatten()
        {
            model
                .equation(id)
                .map_err(|_| format!("missing equation {}", id.0))?;
        }
        Ok(())
    }
}

fn posture_timing_symbols(data: &RuleExpressionData<'_>) -> ModelResult<(f32, f32, f32)> {
    let (transition, qssa, qssb) = if data.marked {
        (
            posture_symbol::MARKED_TRANSITION,
            posture_symbol::MARKED_QSSA,
            posture_symbol::MARKED_QSSB,
        )
    } else {
        (
            posture_symbol::TRANSITION,
            posture_symbol::QSSA,
            posture_symbol::QSSB,
        )
    };
    Ok((
        data.posture.symbol_target(transition)?,
        data.posture.symbol_target(qssa)?,
        data.posture.symbol_target(qssb)?,
    ))
}
