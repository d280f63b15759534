//! Named formula equations.

use crate::error::ModelResult;
use crate::formula::{parse_formula, FormulaNode, FormulaSymbolValues};

/// Handle of an [`Equation`] in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquationId(pub usize);

/// A named, parsed formula.
///
/// Equation names are unique across all groups; transitions and rules
/// reference equations by handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    name: String,
    formula: String,
    root: FormulaNode,
    comment: Option<String>,
}

impl Equation {
    /// Creates an equation, parsing the formula text.
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> ModelResult<Self> {
        let formula = formula.into();
        let root = parse_formula(&formula)?;
        Ok(Self {
            name: name.into(),
            formula,
            root,
            comment: None,
        })
    }

    /// Returns the equation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the formula source text.
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Replaces the formula, reparsing it.
    pub fn set_formula(&mut self, formula: impl Into<String>) -> ModelResult<()> {
        let formula = formula.into();
        self.root = parse_formula(&formula)?;
        self.formula = formula;
        Ok(())
    }

    /// Evaluates the formula against a symbol table.
    pub fn eval(&self, symbols: &FormulaSymbolValues) -> f32 {
        self.root.eval(symbols)
    }

    /// Returns the optional comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Sets the comment.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }
}

/// A named group of equations, preserved for configuration round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationGroup {
    /// Group name.
    pub name: String,
    /// Handles of the equations in the group, in declaration order.
    pub equations: Vec<EquationId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FormulaSymbol;

    #[test]
    fn test_equation_eval() {
        let mut symbols = FormulaSymbolValues::new();
        symbols.set(FormulaSymbol::Rd, 120.0);
        let equation = Equation::new("beat-mid", "rd / 2.0").unwrap();
        assert_eq!(equation.eval(&symbols), 60.0);
    }

    #[test]
    fn test_set_formula_reparses() {
        let mut equation = Equation::new("x", "1").unwrap();
        equation.set_formula("2 * 3").unwrap();
        assert_eq!(equation.eval(&FormulaSymbolValues::new()), 6.0);
        assert!(equation.set_formula("2 *").is_err());
    }
}
