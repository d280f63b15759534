//! The articulatory model: arena storage and name lookups.

use tracing::debug;

use crate::boolean::{parse_boolean, BooleanNode, RuleExpressionData};
use crate::category::{Category, CategoryId};
use crate::equation::{Equation, EquationGroup, EquationId};
use crate::error::{EntityKind, ModelError, ModelResult};
use crate::formula::{FormulaSymbol, FormulaSymbolValues};
use crate::param::{Parameter, Symbol};
use crate::posture::{Posture, PostureId};
use crate::rule::Rule;
use crate::transition::{Transition, TransitionGroup, TransitionId, TransitionType};

/// The articulatory model.
///
/// The model exclusively owns all entities; cross-references between
/// entities use arena handles (`CategoryId`, `EquationId`, `TransitionId`)
/// that stay stable for the lifetime of a loaded model. Name lookups are
/// only used at load time and at the API boundary.
#[derive(Debug, Default, Clone)]
pub struct Model {
    categories: Vec<Category>,
    parameters: Vec<Parameter>,
    symbols: Vec<Symbol>,
    postures: Vec<Posture>,
    equations: Vec<Equation>,
    equation_groups: Vec<EquationGroup>,
    transitions: Vec<Transition>,
    transition_groups: Vec<TransitionGroup>,
    special_transitions: Vec<Transition>,
    special_transition_groups: Vec<TransitionGroup>,
    rules: Vec<Rule>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    //-----------------------------------------------------------------
    // Categories.

    /// Adds a declared category. Fails on a duplicate name.
    pub fn add_category(&mut self, category: Category) -> ModelResult<CategoryId> {
        if self.find_category(category.name()).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate category: {}", category.name()),
            ));
        }
        self.categories.push(category);
        Ok(CategoryId(self.categories.len() - 1))
    }

    /// Returns a category by handle.
    pub fn category(&self, id: CategoryId) -> ModelResult<&Category> {
        self.categories.get(id.0).ok_or(ModelError::InvalidIndex {
            kind: EntityKind::Category,
            index: id.0,
        })
    }

    /// Finds a declared (non-native) category by name.
    pub fn find_category(&self, name: &str) -> Option<CategoryId> {
        self.categories
            .iter()
            .position(|c| !c.is_native() && c.name() == name)
            .map(CategoryId)
    }

    /// All categories, including the native per-posture ones.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Resolves a rule-expression terminal name.
    ///
    /// A posture name resolves to the posture's native category (matching
    /// only that posture); any other name resolves to a declared category.
    pub fn resolve_terminal(&self, name: &str) -> Option<CategoryId> {
        if let Some(posture) = self.find_posture(name) {
            return Some(self.postures[posture.0].native_category());
        }
        self.find_category(name)
    }

    //-----------------------------------------------------------------
    // Parameters and symbols.

    /// Adds a parameter definition. Parameters must be added before
    /// postures, since posture target vectors are sized at creation.
    pub fn add_parameter(&mut self, parameter: Parameter) -> ModelResult<usize> {
        if !self.postures.is_empty() {
            return Err(ModelError::config(
                "model",
                "parameters must be declared before postures",
            ));
        }
        if self.find_parameter(parameter.name()).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate parameter: {}", parameter.name()),
            ));
        }
        self.parameters.push(parameter);
        Ok(self.parameters.len() - 1)
    }

    /// Returns the ordered parameter list.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns a parameter by index.
    pub fn parameter(&self, index: usize) -> ModelResult<&Parameter> {
        self.parameters.get(index).ok_or(ModelError::InvalidIndex {
            kind: EntityKind::Parameter,
            index,
        })
    }

    /// Finds a parameter index by name.
    pub fn find_parameter(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name() == name)
    }

    /// Adds a symbol definition. Symbols must be added before postures.
    pub fn add_symbol(&mut self, symbol: Symbol) -> ModelResult<usize> {
        if !self.postures.is_empty() {
            return Err(ModelError::config(
                "model",
                "symbols must be declared before postures",
            ));
        }
        if self.find_symbol(symbol.name()).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate symbol: {}", symbol.name()),
            ));
        }
        self.symbols.push(symbol);
        Ok(self.symbols.len() - 1)
    }

    /// Returns the ordered symbol list.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Finds a symbol index by name.
    pub fn find_symbol(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s.name() == name)
    }

    //-----------------------------------------------------------------
    // Postures.

    /// Adds a posture, creating its native category. Fails on a duplicate
    /// name.
    pub fn add_posture(&mut self, name: impl Into<String>) -> ModelResult<PostureId> {
        let name = name.into();
        if self.find_posture(&name).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate posture: {name}"),
            ));
        }
        self.categories.push(Category::native(name.clone()));
        let native = CategoryId(self.categories.len() - 1);
        self.postures.push(Posture::new(
            name,
            native,
            self.parameters.len(),
            self.symbols.len(),
        ));
        Ok(PostureId(self.postures.len() - 1))
    }

    /// Returns a posture by handle.
    pub fn posture(&self, id: PostureId) -> ModelResult<&Posture> {
        self.postures.get(id.0).ok_or(ModelError::InvalidIndex {
            kind: EntityKind::Posture,
            index: id.0,
        })
    }

    /// Returns a posture mutably by handle.
    pub fn posture_mut(&mut self, id: PostureId) -> ModelResult<&mut Posture> {
        self.postures.get_mut(id.0).ok_or(ModelError::InvalidIndex {
            kind: EntityKind::Posture,
            index: id.0,
        })
    }

    /// Finds a posture by name.
    pub fn find_posture(&self, name: &str) -> Option<PostureId> {
        self.postures
            .iter()
            .position(|p| p.name() == name)
            .map(PostureId)
    }

    /// All postures, in declaration order.
    pub fn postures(&self) -> &[Posture] {
        &self.postures
    }

    //-----------------------------------------------------------------
    // Equations.

    /// Adds an equation group and returns its index.
    pub fn add_equation_group(&mut self, name: impl Into<String>) -> usize {
        self.equation_groups.push(EquationGroup {
            name: name.into(),
            equations: Vec::new(),
        });
        self.equation_groups.len() - 1
    }

    /// Adds an equation to a group. Equation names are unique across
    /// groups.
    pub fn add_equation(&mut self, group_index: usize, equation: Equation) -> ModelResult<EquationId> {
        if self.find_equation(equation.name()).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate equation: {}", equation.name()),
            ));
        }
        let group = self
            .equation_groups
            .get_mut(group_index)
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::Equation,
                index: group_index,
            })?;
        self.equations.push(equation);
        let id = EquationId(self.equations.len() - 1);
        group.equations.push(id);
        Ok(id)
    }

    /// Returns an equation by handle.
    pub fn equation(&self, id: EquationId) -> ModelResult<&Equation> {
        self.equations.get(id.0).ok_or(ModelError::InvalidIndex {
            kind: EntityKind::Equation,
            index: id.0,
        })
    }

    /// Finds an equation by name.
    pub fn find_equation(&self, name: &str) -> Option<EquationId> {
        self.equations
            .iter()
            .position(|e| e.name() == name)
            .map(EquationId)
    }

    /// Evaluates an equation by handle against a symbol table.
    pub fn eval_equation(&self, id: EquationId, symbols: &FormulaSymbolValues) -> ModelResult<f32> {
        Ok(self.equation(id)?.eval(symbols))
    }

    /// The equation groups, in declaration order.
    pub fn equation_groups(&self) -> &[EquationGroup] {
        &self.equation_groups
    }

    //-----------------------------------------------------------------
    // Transitions.

    /// Adds a transition group and returns its index.
    pub fn add_transition_group(&mut self, name: impl Into<String>) -> usize {
        self.transition_groups.push(TransitionGroup {
            name: name.into(),
            transitions: Vec::new(),
        });
        self.transition_groups.len() - 1
    }

    /// Adds a (non-special) transition to a group.
    pub fn add_transition(
        &mut self,
        group_index: usize,
        transition: Transition,
    ) -> ModelResult<TransitionId> {
        if transition.is_special() {
            return Err(ModelError::config(
                "model",
                format!("transition {} is special", transition.name()),
            ));
        }
        if self.find_transition(transition.name()).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate transition: {}", transition.name()),
            ));
        }
        let group = self
            .transition_groups
            .get_mut(group_index)
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::Transition,
                index: group_index,
            })?;
        self.transitions.push(transition);
        let id = TransitionId(self.transitions.len() - 1);
        group.transitions.push(id);
        Ok(id)
    }

    /// Returns a transition by handle.
    pub fn transition(&self, id: TransitionId) -> ModelResult<&Transition> {
        self.transitions.get(id.0).ok_or(ModelError::InvalidIndex {
            kind: EntityKind::Transition,
            index: id.0,
        })
    }

    /// Finds a transition by name.
    pub fn find_transition(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter()
            .position(|t| t.name() == name)
            .map(TransitionId)
    }

    /// The transition groups, in declaration order.
    pub fn transition_groups(&self) -> &[TransitionGroup] {
        &self.transition_groups
    }

    //-----------------------------------------------------------------
    // Special transitions.

    /// Adds a special-transition group and returns its index.
    pub fn add_special_transition_group(&mut self, name: impl Into<String>) -> usize {
        self.special_transition_groups.push(TransitionGroup {
            name: name.into(),
            transitions: Vec::new(),
        });
        self.special_transition_groups.len() - 1
    }

    /// Adds a special transition to a group.
    pub fn add_special_transition(
        &mut self,
        group_index: usize,
        transition: Transition,
    ) -> ModelResult<TransitionId> {
        if !transition.is_special() {
            return Err(ModelError::config(
                "model",
                format!("transition {} is not special", transition.name()),
            ));
        }
        if self.find_special_transition(transition.name()).is_some() {
            return Err(ModelError::config(
                "model",
                format!("duplicate special transition: {}", transition.name()),
            ));
        }
        let group = self
            .special_transition_groups
            .get_mut(group_index)
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::SpecialTransition,
                index: group_index,
            })?;
        self.special_transitions.push(transition);
        let id = TransitionId(self.special_transitions.len() - 1);
        group.transitions.push(id);
        Ok(id)
    }

    /// Returns a special transition by handle.
    pub fn special_transition(&self, id: TransitionId) -> ModelResult<&Transition> {
        self.special_transitions
            .get(id.0)
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::SpecialTransition,
                index: id.0,
            })
    }

    /// Finds a special transition by name.
    pub fn find_special_transition(&self, name: &str) -> Option<TransitionId> {
        self.special_transitions
            .iter()
            .position(|t| t.name() == name)
            .map(TransitionId)
    }

    /// The special-transition groups, in declaration order.
    pub fn special_transition_groups(&self) -> &[TransitionGroup] {
        &self.special_transition_groups
    }

    //-----------------------------------------------------------------
    // Rules.

    /// Appends a rule to the ordered rule list.
    pub fn add_rule(&mut self, rule: Rule) -> usize {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    /// The ordered rule list.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns a rule by index.
    pub fn rule(&self, index: usize) -> ModelResult<&Rule> {
        // Rules have no dedicated entity kind; index errors surface as
        // invalid-model errors with the 1-based number.
        self.rules
            .get(index)
            .ok_or_else(|| ModelError::invalid_model(index + 1, "rule index out of range"))
    }

    /// Parses the boolean expressions of a rule against this model's
    /// categories and postures.
    pub fn parse_boolean_expressions(&self, texts: &[String]) -> ModelResult<Vec<BooleanNode>> {
        texts
            .iter()
            .map(|text| parse_boolean(text, |name| self.resolve_terminal(name)))
            .collect()
    }

    /// Finds the first rule whose boolean expressions all match the given
    /// posture window. Returns the rule index and the rule.
    pub fn find_first_matching_rule(
        &self,
        window: &[RuleExpressionData<'_>],
    ) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(window))
    }

    //-----------------------------------------------------------------
    // Formula symbol defaults and validation.

    /// Returns the default formula symbol values used to preview equations
    /// without a live rule context.
    pub fn default_formula_symbols(transition_type: TransitionType) -> FormulaSymbolValues {
        let mut symbols = FormulaSymbolValues::new();
        for position in 1..=4 {
            if let (Some(t), Some(a), Some(b), Some(tempo)) = (
                FormulaSymbol::transition(position),
                FormulaSymbol::qssa(position),
                FormulaSymbol::qssb(position),
                FormulaSymbol::tempo(position),
            ) {
                symbols.set(t, 33.3333);
                symbols.set(a, 33.3333);
                symbols.set(b, 33.3333);
                symbols.set(tempo, 1.0);
            }
        }
        symbols.set(FormulaSymbol::Beat, 33.0);
        symbols.set(FormulaSymbol::Mark1, 100.0);
        match transition_type {
            TransitionType::Diphone => {
                symbols.set(FormulaSymbol::Rd, 100.0);
            }
            TransitionType::Triphone => {
                symbols.set(FormulaSymbol::Rd, 200.0);
                symbols.set(FormulaSymbol::Mark2, 200.0);
            }
            TransitionType::Tetraphone => {
                symbols.set(FormulaSymbol::Rd, 300.0);
                symbols.set(FormulaSymbol::Mark2, 200.0);
                symbols.set(FormulaSymbol::Mark3, 300.0);
            }
        }
        symbols
    }

    /// Validates the model: rule references, transition shapes.
    pub fn validate(&self) -> ModelResult<()> {
        for transition in self.transitions.iter().chain(&self.special_transitions) {
            transition.validate()?;
        }
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate(self)
                .map_err(|message| ModelError::invalid_model(index + 1, message))?;
        }
        debug!(
            categories = self.categories.len(),
            parameters = self.parameters.len(),
            postures = self.postures.len(),
            equations = self.equations.len(),
            transitions = self.transitions.len(),
            rules = self.rules.len(),
            "model validated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionPoint;

    fn sample_model() -> Model {
        let mut model = Model::new();
        model.add_category(Category::new("phone")).unwrap();
        model.add_category(Category::new("vocoid")).unwrap();
        model
            .add_parameter(Parameter::new("microInt", -10.0, 10.0, 0.0))
            .unwrap();
        model
            .add_parameter(Parameter::new("r1", 0.0, 3.0, 0.8))
            .unwrap();
        for name in ["duration", "transition", "qssa", "qssb"] {
            model.add_symbol(Symbol::new(name, 0.0, 1000.0, 0.0)).unwrap();
        }
        let aa = model.add_posture("aa").unwrap();
        let phone = model.find_category("phone").unwrap();
        model.posture_mut(aa).unwrap().add_category(phone);
        model
    }

    #[test]
    fn test_posture_native_category() {
        let model = sample_model();
        let aa = model.find_posture("aa").unwrap();
        let native = model.posture(aa).unwrap().native_category();
        assert!(model.category(native).unwrap().is_native());
        assert_eq!(model.category(native).unwrap().name(), "aa");
        // Native categories are not found by plain category lookup.
        assert!(model.find_category("aa").is_none());
        // But posture names resolve as rule terminals.
        assert_eq!(model.resolve_terminal("aa"), Some(native));
        assert_eq!(model.resolve_terminal("phone"), model.find_category("phone"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut model = sample_model();
        assert!(model.add_category(Category::new("phone")).is_err());
        assert!(model.add_posture("aa").is_err());
    }

    #[test]
    fn test_parameters_frozen_after_postures() {
        let mut model = sample_model();
        assert!(model
            .add_parameter(Parameter::new("late", 0.0, 1.0, 0.0))
            .is_err());
    }

    #[test]
    fn test_equation_names_unique_across_groups() {
        let mut model = Model::new();
        let g1 = model.add_equation_group("one");
        let g2 = model.add_equation_group("two");
        model
            .add_equation(g1, Equation::new("dur", "100").unwrap())
            .unwrap();
        assert!(model
            .add_equation(g2, Equation::new("dur", "200").unwrap())
            .is_err());
    }

    #[test]
    fn test_default_formula_symbols() {
        let symbols = Model::default_formula_symbols(TransitionType::Triphone);
        assert_eq!(symbols.get(FormulaSymbol::Rd), 200.0);
        assert_eq!(symbols.get(FormulaSymbol::Mark2), 200.0);
        assert_eq!(symbols.get(FormulaSymbol::Mark3), 0.0);
        assert_eq!(symbols.get(FormulaSymbol::Tempo3), 1.0);
    }

    #[test]
    fn test_find_first_matching_rule_order() {
        let mut model = sample_model();
        let group = model.add_transition_group("defaults");
        let mut null = Transition::new("null", TransitionType::Diphone, false);
        null.push(crate::transition::PointOrSlope::Point(TransitionPoint::free(
            TransitionType::Diphone,
            0.0,
            0.0,
        )));
        let null = model.add_transition(group, null).unwrap();

        let specific = {
            let texts = vec!["aa".to_string(), "aa".to_string()];
            let nodes = model.parse_boolean_expressions(&texts).unwrap();
            Rule::new(texts, nodes, vec![null, null])
        };
        let general = {
            let texts = vec!["phone".to_string(), "phone".to_string()];
            let nodes = model.parse_boolean_expressions(&texts).unwrap();
            Rule::new(texts, nodes, vec![null, null])
        };
        model.add_rule(specific);
        model.add_rule(general);

        let aa = model.find_posture("aa").unwrap();
        let posture = model.posture(aa).unwrap();
        let window = vec![
            RuleExpressionData {
                posture,
                tempo: 1.0,
                marked: false,
            };
            2
        ];
        let (index, _) = model.find_first_matching_rule(&window).unwrap();
        assert_eq!(index, 0);
    }
}
