//! Per-instance pipeline orchestration: parse, expand, allocate.
//!
//! Instances are mutually independent; each run owns its tree, parameter
//! table, and occupancy masks, so one instance's fatal error never
//! corrupts another's output.

use anyhow::Context;

use regmap_alloc::{assign_addresses, AllocatorConfig};
use regmap_core::{ConfigTree, SubmoduleMap};
use regmap_expand::expand_tree;
use regmap_parser::parse_file;

use crate::discover::InstanceDir;

/// A fully compiled configuration instance.
#[derive(Debug, Clone)]
pub struct CompiledInstance {
    pub name: String,
    pub tree: ConfigTree,
    pub submodule_map: SubmoduleMap,
    pub warnings: Vec<String>,
}

/// Run the full pipeline for one instance.
pub fn compile_instance(instance: &InstanceDir) -> anyhow::Result<CompiledInstance> {
    let parsed = parse_file(&instance.config_path)
        .with_context(|| format!("parsing '{}'", instance.config_path.display()))?;
    let expansion =
        expand_tree(&parsed).with_context(|| format!("expanding instance '{}'", instance.name))?;
    let allocation = assign_addresses(
        &expansion.tree,
        &expansion.submodule_map,
        &AllocatorConfig::default(),
    )
    .with_context(|| format!("allocating addresses for instance '{}'", instance.name))?;
    Ok(CompiledInstance {
        name: instance.name.clone(),
        tree: allocation.tree,
        submodule_map: expansion.submodule_map,
        warnings: allocation.warnings,
    })
}

/// The instance's `Code_Folder` config parameter, if declared.
pub fn code_folder(tree: &ConfigTree) -> Option<&str> {
    tree.config_parameters
        .get("Code_Folder")
        .map(|entry| entry.value.as_str())
}
