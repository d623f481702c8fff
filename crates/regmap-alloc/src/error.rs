//! Allocation errors.

use regmap_core::{ExprError, ParamError};

/// Errors from address allocation. All abort the current instance;
/// explicit-bound overlaps are warnings, not errors.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("section {section}: base address '{expr}' does not resolve")]
    BaseAddress { section: String, expr: String },

    #[error("module '{module}': bounds do not resolve")]
    UnresolvedBounds { module: String },

    #[error("module '{module}': register count does not resolve")]
    UnresolvedCount { module: String },

    #[error("module '{module}': invalid register count {count}")]
    InvalidRegisterCount { module: String, count: u32 },

    #[error("submodule '{module}': base module '{base}' not present in the tree")]
    MissingBaseModule { module: String, base: String },

    #[error("module '{module}' is in the submodule map but not in the tree")]
    ModuleNotFound { module: String },

    #[error("module '{module}': {source}")]
    Expr {
        module: String,
        #[source]
        source: ExprError,
    },
}

pub type Result<T> = std::result::Result<T, AllocError>;
