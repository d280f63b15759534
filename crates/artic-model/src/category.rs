//! Posture categories.

/// Handle of a [`Category`] in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub usize);

/// A named equivalence class of postures.
///
/// Categories are referenced by rule boolean expressions. A category with
/// the `native` flag set was created implicitly from a posture name and
/// matches only that posture.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    name: String,
    native: bool,
    comment: Option<String>,
}

impl Category {
    /// Creates a category declared in the model configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: false,
            comment: None,
        }
    }

    /// Creates the implicit category carrying a posture's own name.
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: true,
            comment: None,
        }
    }

    /// Returns the category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the category was implicitly created from a posture name.
    pub fn is_native(&self) -> bool {
        self.native
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
