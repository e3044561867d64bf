//! Error kinds surfaced by core operations

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by group, pose and assembly operations.
///
/// None of these escape the operator runner: they are turned into a fading
/// on-screen label and a report, and the document is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Illegal selection: {0}")]
    IllegalSelection(String),
    #[error("Linked data cannot be modified: {0}")]
    LinkedAsset(String),
    #[error("Matrix is not invertible: {0}")]
    InvertibleMatrix(String),
    #[error("Pose validation failed: {0}")]
    PoseValidation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Missing integration: {0}")]
    ExternalDependency(String),
}

impl CoreError {
    pub fn illegal_selection(msg: impl Into<String>) -> Self {
        Self::IllegalSelection(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Short label shown in the viewport when an operator aborts
    pub fn label(&self) -> &'static str {
        match self {
            Self::IllegalSelection(_) => "IllegalSelection",
            Self::LinkedAsset(_) => "LinkedAsset",
            Self::InvertibleMatrix(_) => "InvertibleMatrix",
            Self::PoseValidation(_) => "PoseValidation",
            Self::NotFound(_) => "NotFound",
            Self::ExternalDependency(_) => "ExternalDependency",
        }
    }

    /// Whether the condition is reported as a warning instead of an error
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ExternalDependency(_) | Self::PoseValidation(_))
    }
}
