//! Repeat cloning, flag propagation, and register aggregation.
//!
//! The expansion contract: resolve every expression, clone repeated module
//! subtrees, and hand back the mutated tree together with a parent-first
//! submodule map. Cloning reads only a pre-clone snapshot of each
//! template's subtree, so previously inserted clones are never re-cloned
//! and running expansion twice is a no-op.

use std::collections::HashMap;

use regmap_core::model::{
    build_submodule_map, ConfigTree, ModuleEntry, ModuleSectionId, RepeatSpec, SubmoduleMap,
};
use regmap_core::names;

use crate::error::{ExpandError, Result};
use crate::resolve::resolve_tree;

/// The expanded tree plus its parent-first submodule map.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub tree: ConfigTree,
    pub submodule_map: SubmoduleMap,
}

/// Run the full expansion stage on a parsed tree.
pub fn expand_tree(tree: &ConfigTree) -> Result<Expansion> {
    let mut tree = resolve_tree(tree)?;
    propagate_no_expand(&mut tree);
    clone_repeats(&mut tree)?;
    let submodule_map = build_submodule_map(&tree).parent_first();
    aggregate_register_counts(&mut tree, &submodule_map);
    Ok(Expansion {
        tree,
        submodule_map,
    })
}

/// A module flagged `NOEXPREGS` (on the declaration or on its `Repeat:`)
/// propagates the flag to every module in the same section whose qualified
/// name is prefixed by its own name: its entire subtree, including
/// not-yet-cloned repeat templates.
fn propagate_no_expand(tree: &mut ConfigTree) {
    for id in ModuleSectionId::ALL {
        let section = tree.module_section_mut(id);
        let sources: Vec<String> = section
            .iter()
            .filter(|(_, module)| {
                module.metadata.no_expand_regs
                    || module
                        .repeat
                        .as_ref()
                        .is_some_and(|repeat| repeat.no_expand_regs)
            })
            .map(|(name, _)| name.to_string())
            .collect();
        for source in sources {
            for (name, module) in section.iter_mut() {
                if name.starts_with(&source) {
                    module.metadata.no_expand_regs = true;
                }
            }
        }
    }
}

/// Whether `name` belongs to the subtree rooted at `template`, excluding
/// clones of the template itself (`template_<digits>...`).
fn in_template_subtree(name: &str, template: &str) -> bool {
    let Some(rest) = name.strip_prefix(template) else {
        return false;
    };
    if rest.is_empty() || rest.starts_with(names::SUBMODULE_SEPARATOR) {
        return true;
    }
    // `template_3` or `template_3::...` is a clone, not subtree content;
    // any other continuation is a different identifier sharing a prefix.
    false
}

fn clone_repeats(tree: &mut ConfigTree) -> Result<()> {
    for id in ModuleSectionId::ALL {
        let section = tree.module_section_mut(id);

        let mut repeats: Vec<(String, u32)> = Vec::new();
        for (name, module) in section.iter() {
            if module.metadata.repeat_instance {
                continue;
            }
            let Some(repeat) = &module.repeat else { continue };
            let count: u32 =
                repeat
                    .value
                    .parse()
                    .map_err(|_| ExpandError::RepeatCount {
                        module: name.to_string(),
                    })?;
            if count == 0 {
                continue;
            }
            repeats.push((name.to_string(), count));
        }
        // Deepest templates clone before their ancestors, grouped by the
        // top-level base name.
        repeats.sort_by(|a, b| {
            names::base_segment(&a.0)
                .cmp(names::base_segment(&b.0))
                .then_with(|| names::depth(&b.0).cmp(&names::depth(&a.0)))
        });

        for (template, count) in repeats {
            let snapshot: Vec<(String, ModuleEntry)> = section
                .iter()
                .filter(|(name, _)| in_template_subtree(name, &template))
                .map(|(name, module)| (name.to_string(), module.clone()))
                .collect();
            for instance in 1..=count {
                let suffix = format!("_{instance}");
                let group: Vec<(String, ModuleEntry)> = snapshot
                    .iter()
                    .map(|(name, original)| {
                        let clone_name = names::insert_after(name, &template, &suffix);
                        let mut clone = original.clone();
                        clone.metadata.repeat_instance = true;
                        let repeat_of =
                            names::strip_repeat_suffix(names::last_segment(name)).to_string();
                        match &mut clone.repeat {
                            Some(spec) => spec.repeat_of = Some(repeat_of),
                            None => {
                                clone.repeat = Some(RepeatSpec {
                                    value: "0".to_string(),
                                    no_expand_regs: false,
                                    repeat_of: Some(repeat_of),
                                })
                            }
                        }
                        if let Some(parent) = &clone.submodule_of {
                            clone.submodule_of =
                                Some(names::insert_after(parent, &template, &suffix));
                        }
                        (clone_name, clone)
                    })
                    .collect();
                section.insert_group_after_prefix(&template, group);
            }
        }
    }
    Ok(())
}

/// Fill `registers` (native + descendants) and `subregisters` (descendants
/// only) for every module that participates in a submodule relationship.
fn aggregate_register_counts(tree: &mut ConfigTree, map: &SubmoduleMap) {
    let mut native: HashMap<String, u32> = HashMap::new();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for entry in &map.entries {
        native.insert(entry.module_name.clone(), entry.register_count);
        children
            .entry(entry.module_parent.clone())
            .or_default()
            .push(entry.module_name.clone());
    }
    for entry in &map.entries {
        if !native.contains_key(&entry.base_module) {
            let count = tree
                .module_section(entry.section)
                .get(&entry.base_module)
                .and_then(|module| module.declared_register_count())
                .unwrap_or(0);
            native.insert(entry.base_module.clone(), count);
        }
    }

    fn total(
        name: &str,
        native: &HashMap<String, u32>,
        children: &HashMap<String, Vec<String>>,
    ) -> u32 {
        let own = native.get(name).copied().unwrap_or(0);
        let descendants: u32 = children
            .get(name)
            .map(|list| list.iter().map(|child| total(child, native, children)).sum())
            .unwrap_or(0);
        own + descendants
    }

    for entry in &map.entries {
        for name in [&entry.module_name, &entry.base_module] {
            let all = total(name, &native, &children);
            let own = native.get(name.as_str()).copied().unwrap_or(0);
            if let Some(module) = tree.module_section_mut(entry.section).get_mut(name) {
                module.registers = Some(all);
                module.subregisters = Some(all - own);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regmap_parser::parse_str;

    fn expand(text: &str) -> Expansion {
        expand_tree(&parse_str(text, None).unwrap()).unwrap()
    }

    const DMA_WITH_CHANNELS: &str = "\
USER_PARAMETERS:
CHANNELS : 2
USER_MODULES:
Dma : TRUE : AUTO : 1
    SUBMODULE:
        Ch : TRUE : AUTO : 3
            SUBMODULE:
                Csr : TRUE : AUTO : 1
        Ctl : TRUE : AUTO : 2
Uart : TRUE : AUTO : 4
";

    #[test]
    fn submodule_map_is_parent_first() {
        let expansion = expand(DMA_WITH_CHANNELS);
        let order: Vec<&str> = expansion
            .submodule_map
            .entries
            .iter()
            .map(|e| e.module_name.as_str())
            .collect();
        assert_eq!(order, ["Dma::Ch", "Dma::Ch::Csr", "Dma::Ctl"]);
        let ch = &expansion.submodule_map.entries[0];
        assert_eq!(ch.base_module, "Dma");
        assert_eq!(ch.module_parent, "Dma");
        assert_eq!(ch.register_count, 3);
    }

    #[test]
    fn register_totals_aggregate_through_the_tree() {
        let expansion = expand(DMA_WITH_CHANNELS);
        let modules = &expansion.tree.user_modules;

        // Dma: 1 native + (3 + 1) + 2 descendants.
        let dma = modules.get("Dma").unwrap();
        assert_eq!(dma.registers, Some(7));
        assert_eq!(dma.subregisters, Some(6));

        let ch = modules.get("Dma::Ch").unwrap();
        assert_eq!(ch.registers, Some(4));
        assert_eq!(ch.subregisters, Some(1));

        let csr = modules.get("Dma::Ch::Csr").unwrap();
        assert_eq!(csr.registers, Some(1));
        assert_eq!(csr.subregisters, Some(0));

        // Modules outside any submodule relationship are untouched.
        let uart = modules.get("Uart").unwrap();
        assert_eq!(uart.registers, None);
    }

    const REPEATED_PORT: &str = "\
USER_PARAMETERS:
PORTS : 3
USER_MODULES:
Port : TRUE : AUTO : 2
    Repeat: PORTS
    SUBMODULE:
        Fifo : TRUE : AUTO : 1
Uart : TRUE : AUTO : 1
";

    #[test]
    fn repeat_produces_suffixed_contiguous_clones() {
        let expansion = expand(REPEATED_PORT);
        let names = expansion.tree.user_modules.names();
        assert_eq!(
            names,
            [
                "Port",
                "Port::Fifo",
                "Port_1",
                "Port_1::Fifo",
                "Port_2",
                "Port_2::Fifo",
                "Port_3",
                "Port_3::Fifo",
                "Uart"
            ]
        );

        let clone = expansion.tree.user_modules.get("Port_2").unwrap();
        assert!(clone.metadata.repeat_instance);
        assert_eq!(
            clone.repeat.as_ref().unwrap().repeat_of.as_deref(),
            Some("Port")
        );

        let fifo = expansion.tree.user_modules.get("Port_2::Fifo").unwrap();
        assert!(fifo.metadata.repeat_instance);
        assert_eq!(fifo.submodule_of.as_deref(), Some("Port_2"));
        assert_eq!(
            fifo.repeat.as_ref().unwrap().repeat_of.as_deref(),
            Some("Fifo")
        );

        // The template itself is untouched.
        let port = expansion.tree.user_modules.get("Port").unwrap();
        assert!(!port.metadata.repeat_instance);
    }

    #[test]
    fn clone_groups_join_the_submodule_map() {
        let expansion = expand(REPEATED_PORT);
        let fifo_parents: Vec<&str> = expansion
            .submodule_map
            .entries
            .iter()
            .map(|e| e.module_parent.as_str())
            .collect();
        assert_eq!(fifo_parents, ["Port", "Port_1", "Port_2", "Port_3"]);
        for base in ["Port_1", "Port_2", "Port_3"] {
            let module = expansion.tree.user_modules.get(base).unwrap();
            assert_eq!(module.registers, Some(3));
            assert_eq!(module.subregisters, Some(1));
        }
    }

    #[test]
    fn expansion_is_idempotent() {
        let first = expand(REPEATED_PORT);
        let second = expand_tree(&first.tree).unwrap();
        assert_eq!(
            first.tree.user_modules.names(),
            second.tree.user_modules.names()
        );
        assert_eq!(first.submodule_map, second.submodule_map);
    }

    #[test]
    fn nested_repeats_clone_deepest_first() {
        let expansion = expand(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 1\n\
             \x20   Repeat: 2\n\
             \x20   SUBMODULE:\n\
             \x20       Ch : TRUE : AUTO : 1\n\
             \x20           Repeat: 2\n",
        );
        let names = expansion.tree.user_modules.names();
        // Channel clones exist inside the original and inside every DMA clone.
        assert_eq!(
            names,
            [
                "Dma",
                "Dma::Ch",
                "Dma::Ch_1",
                "Dma::Ch_2",
                "Dma_1",
                "Dma_1::Ch",
                "Dma_1::Ch_1",
                "Dma_1::Ch_2",
                "Dma_2",
                "Dma_2::Ch",
                "Dma_2::Ch_1",
                "Dma_2::Ch_2",
            ]
        );
        // Each DMA instance spans its own registers plus three channels.
        let dma = expansion.tree.user_modules.get("Dma_2").unwrap();
        assert_eq!(dma.registers, Some(4));
        assert_eq!(dma.subregisters, Some(3));
    }

    #[test]
    fn no_expand_flag_covers_the_subtree() {
        let expansion = expand(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 1 : NOEXPREGS\n\
             \x20   SUBMODULE:\n\
             \x20       Ch : TRUE : AUTO : 1\n\
             Uart : TRUE : AUTO : 1\n",
        );
        let modules = &expansion.tree.user_modules;
        assert!(modules.get("Dma").unwrap().metadata.no_expand_regs);
        assert!(modules.get("Dma::Ch").unwrap().metadata.no_expand_regs);
        assert!(!modules.get("Uart").unwrap().metadata.no_expand_regs);
        assert!(expansion.submodule_map.entries[0].base_no_expand_regs);
    }

    #[test]
    fn repeat_flag_propagates_like_module_flag() {
        let expansion = expand(
            "USER_MODULES:\n\
             Port : TRUE : AUTO : 1\n\
             \x20   Repeat: 1 : NOEXPREGS\n\
             \x20   SUBMODULE:\n\
             \x20       Fifo : TRUE : AUTO : 1\n",
        );
        let modules = &expansion.tree.user_modules;
        assert!(modules.get("Port").unwrap().metadata.no_expand_regs);
        assert!(modules.get("Port::Fifo").unwrap().metadata.no_expand_regs);
        assert!(modules.get("Port_1::Fifo").unwrap().metadata.no_expand_regs);
    }

    #[test]
    fn shared_name_prefix_is_not_subtree_membership() {
        assert!(in_template_subtree("Dma", "Dma"));
        assert!(in_template_subtree("Dma::Ch", "Dma"));
        assert!(in_template_subtree("Dma::Ch_1", "Dma"));
        assert!(!in_template_subtree("Dma_1", "Dma"));
        assert!(!in_template_subtree("Dma_1::Ch", "Dma"));
        assert!(!in_template_subtree("Dmax", "Dma"));
    }
}
