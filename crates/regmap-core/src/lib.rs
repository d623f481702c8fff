//! Core data model and expression resolution for the regmap compiler.
//!
//! This crate defines the typed config tree produced by the parser and
//! consumed by the expansion and allocation stages, plus the symbolic
//! expression machinery (radix literals, parameter substitution, restricted
//! arithmetic) everything downstream shares.

pub mod expr;
pub mod model;
pub mod names;
pub mod params;

pub use expr::{resolve_expression, ExprError, Resolution};
pub use model::{
    build_submodule_map, ConfigTree, FieldBounds, FieldEntry, ModuleBounds, ModuleEntry,
    ModuleMetadata, ModuleSection, ModuleSectionId, ParameterEntry, ParameterSection,
    ParameterSectionId, Permissions, RegisterEntry, RepeatSpec, SubmoduleMap, SubmoduleMapEntry,
};
pub use names::SUBMODULE_SEPARATOR;
pub use params::{
    build_parameter_table, substitute_path_placeholders, ParamError, ParameterTable,
};
