//! Submodule and repeat expansion for the regmap pipeline.
//!
//! Takes a parsed, symbolic config tree and produces the expanded snapshot
//! the address allocator consumes: expressions resolved, repeat templates
//! cloned, `NOEXPREGS` flags propagated, and register totals aggregated
//! bottom-up, together with the parent-first submodule map.

mod error;
mod expand;
mod resolve;

pub use error::{ExpandError, Result};
pub use expand::{expand_tree, Expansion};
pub use resolve::resolve_tree;
