//! Postures: static articulatory targets.

use crate::category::CategoryId;
use crate::error::{EntityKind, ModelError, ModelResult};

/// Handle of a posture in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostureId(pub usize);

/// A static articulatory target.
///
/// A posture holds one target value per model parameter, one target value
/// per model symbol, and the set of categories it belongs to. The first
/// category is always the posture's own native category.
#[derive(Debug, Clone, PartialEq)]
pub struct Posture {
    name: String,
    categories: Vec<CategoryId>,
    parameter_targets: Vec<f32>,
    symbol_targets: Vec<f32>,
    comment: Option<String>,
}

impl Posture {
    /// Creates a posture with all targets set to zero.
    ///
    /// `native_category` must be the handle of the implicit category named
    /// after the posture.
    pub fn new(
        name: impl Into<String>,
        native_category: CategoryId,
        num_parameters: usize,
        num_symbols: usize,
    ) -> Self {
        Self {
            name: name.into(),
            categories: vec![native_category],
            parameter_targets: vec![0.0; num_parameters],
            symbol_targets: vec![0.0; num_symbols],
            comment: None,
        }
    }

    /// Returns the posture name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the handle of the posture's native category.
    pub fn native_category(&self) -> CategoryId {
        self.categories[0]
    }

    /// Returns the categories the posture belongs to.
    pub fn categories(&self) -> &[CategoryId] {
        &self.categories
    }

    /// Adds the posture to a category. Duplicates are ignored.
    pub fn add_category(&mut self, category: CategoryId) {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
    }

    /// Returns true if the posture is a member of the category.
    pub fn is_member_of(&self, category: CategoryId) -> bool {
        self.categories.contains(&category)
    }

    /// Returns the target value for a parameter index.
    pub fn parameter_target(&self, parameter_index: usize) -> ModelResult<f32> {
        self.parameter_targets
            .get(parameter_index)
            .copied()
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::Parameter,
                index: parameter_index,
            })
    }

    /// Sets the target value for a parameter index.
    pub fn set_parameter_target(&mut self, parameter_index: usize, target: f32) -> ModelResult<()> {
        match self.parameter_targets.get_mut(parameter_index) {
            Some(slot) => {
                *slot = target;
                Ok(())
            }
            None => Err(ModelError::InvalidIndex {
                kind: EntityKind::Parameter,
                index: parameter_index,
            }),
        }
    }

    /// Returns the target value for a symbol index.
    pub fn symbol_target(&self, symbol_index: usize) -> ModelResult<f32> {
        self.symbol_targets
            .get(symbol_index)
            .copied()
            .ok_or(ModelError::InvalidIndex {
                kind: EntityKind::Symbol,
                index: symbol_index,
            })
    }

    /// Sets the target value for a symbol index.
    pub fn set_symbol_target(&mut self, symbol_index: usize, target: f32) -> ModelResult<()> {
        match self.symbol_targets.get_mut(symbol_index) {
            Some(slot) => {
                *slot = target;
                Ok(())
            }
            None => Err(ModelError::InvalidIndex {
                kind: EntityKind::Symbol,
                index: symbol_index,
            }),
        }
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
