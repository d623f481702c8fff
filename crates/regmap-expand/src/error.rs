//! Expansion errors.

use regmap_core::{ExprError, ParamError};

/// Errors from expression resolution or tree expansion. All abort the
/// current instance.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("module '{module}': bounds do not resolve to non-negative integers")]
    ModuleBounds { module: String },

    #[error("module '{module}': register count does not resolve to a non-negative integer")]
    RegisterCount { module: String },

    #[error("module '{module}': repeat count does not resolve to a non-negative integer")]
    RepeatCount { module: String },

    #[error("module '{module}' register '{register}' field '{field}': bit bounds do not resolve to non-negative integers")]
    FieldBounds {
        module: String,
        register: String,
        field: String,
    },

    #[error("module '{module}' register '{register}' field '{field}': missing bit bounds")]
    MissingFieldBounds {
        module: String,
        register: String,
        field: String,
    },

    #[error("module '{module}': {source}")]
    Expr {
        module: String,
        #[source]
        source: ExprError,
    },
}

pub type Result<T> = std::result::Result<T, ExpandError>;
