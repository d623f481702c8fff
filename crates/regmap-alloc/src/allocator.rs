//! Address assignment.
//!
//! Two passes over an expanded tree. The top-level pass walks each module
//! section: explicit bounds are resolved and registered first (collisions
//! warn, the modules keep their declared ranges), then every enabled auto
//! module takes the first aligned gap free in both the section-local and
//! the cross-section global mask. The submodule pass then walks the
//! parent-first submodule map, packing each base module's descendants into
//! the space reserved beneath it: a module's recorded end bound extends
//! past its own registers by its descendants' span, while only the raw
//! native interval joins the local mask so siblings pack contiguously.

use regmap_core::expr::{resolve_expression, Resolution};
use regmap_core::model::{ConfigTree, ModuleBounds, ModuleSectionId, SubmoduleMap};
use regmap_core::params::{build_parameter_table, ParameterTable};

use crate::error::{AllocError, Result};
use crate::mask::{align_up, find_free, OccupancyMask};

/// Allocator tuning: address granularity and bytes per register.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    pub alignment: u64,
    pub reg_width_bytes: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            alignment: 4,
            reg_width_bytes: 4,
        }
    }
}

/// A fully address-resolved tree plus non-fatal findings.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub tree: ConfigTree,
    /// Overlap and skip warnings, in discovery order.
    pub warnings: Vec<String>,
}

/// Assign a contiguous, non-overlapping byte range to every enabled module.
pub fn assign_addresses(
    tree: &ConfigTree,
    submodule_map: &SubmoduleMap,
    config: &AllocatorConfig,
) -> Result<Allocation> {
    let table = build_parameter_table(tree)?;
    let mut tree = tree.clone();
    let mut warnings = Vec::new();
    let mut global = OccupancyMask::new();

    for id in ModuleSectionId::ALL {
        allocate_section(&mut tree, id, &table, config, &mut global, &mut warnings)?;
    }
    allocate_submodules(&mut tree, submodule_map, &table, config, &mut warnings)?;

    Ok(Allocation { tree, warnings })
}

fn allocate_section(
    tree: &mut ConfigTree,
    id: ModuleSectionId,
    table: &ParameterTable,
    config: &AllocatorConfig,
    global: &mut OccupancyMask,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let base = match tree.module_section(id).base_address.clone() {
        Some(expr) => match resolve_expression(&expr, table) {
            Ok(Resolution::Value(value)) if value >= 0 => value as u64,
            Ok(_) => {
                return Err(AllocError::BaseAddress {
                    section: id.header().to_string(),
                    expr,
                })
            }
            Err(source) => {
                return Err(AllocError::Expr {
                    module: id.header().to_string(),
                    source,
                })
            }
        },
        None => 0,
    };
    let mut section_ptr = align_up(base, config.alignment);
    let mut local = OccupancyMask::new();
    let names = tree.module_section(id).names();

    // Explicitly-bounded modules claim their declared ranges first.
    for name in &names {
        let module = tree
            .module_section_mut(id)
            .get_mut(name)
            .expect("section names are current");
        if module.submodule_of.is_some() {
            continue;
        }
        let interval = match &module.bounds {
            ModuleBounds::Explicit { start, end } => {
                let start = resolve_address(start, table, name)?;
                let end = resolve_address(end, table, name)?;
                module.bounds = ModuleBounds::Resolved { start, end };
                Some((start, end))
            }
            ModuleBounds::Resolved { start, end } => Some((*start, *end)),
            _ => None,
        };
        if let Some((start, end)) = interval {
            if let Some((got_start, got_end)) =
                local.conflict(start, end).or_else(|| global.conflict(start, end))
            {
                warnings.push(format!(
                    "module '{name}': declared range 0x{start:X}..0x{end:X} overlaps assigned range 0x{got_start:X}..0x{got_end:X}"
                ));
            }
            local.add(start, end);
            global.add(start, end);
        }
    }

    // Auto modules take the first free gap at or past the section pointer.
    for name in &names {
        let module = tree
            .module_section(id)
            .get(name)
            .expect("section names are current");
        if module.submodule_of.is_some() || !module.enabled {
            continue;
        }
        let declared = match &module.bounds {
            ModuleBounds::AutoLiteral { count } => *count,
            ModuleBounds::AutoInferred => module.regs.len() as u32,
            ModuleBounds::AutoExpr { count } => match resolve_expression(count, table) {
                Ok(Resolution::Value(value)) if value >= 0 => {
                    u32::try_from(value).map_err(|_| AllocError::UnresolvedCount {
                        module: name.clone(),
                    })?
                }
                Ok(_) => {
                    return Err(AllocError::UnresolvedCount {
                        module: name.clone(),
                    })
                }
                Err(source) => {
                    return Err(AllocError::Expr {
                        module: name.clone(),
                        source,
                    })
                }
            },
            ModuleBounds::Explicit { .. } | ModuleBounds::Resolved { .. } => continue,
        };
        // Expansion stores the subtree total here; it supersedes the
        // module's own declared count so descendants get room too.
        let count = module.registers.unwrap_or(declared);
        if count == 0 {
            return Err(AllocError::InvalidRegisterCount {
                module: name.clone(),
                count,
            });
        }

        let size = count as u64 * config.reg_width_bytes;
        let start = find_free(size, section_ptr, config.alignment, &[&local, global]);
        let end = start + (count as u64 - 1) * config.reg_width_bytes;
        tree.module_section_mut(id)
            .get_mut(name)
            .expect("section names are current")
            .bounds = ModuleBounds::Resolved { start, end };
        local.add(start, end);
        global.add(start, end);
        section_ptr = end + 1;
    }

    // The base address is bookkeeping; it does not survive allocation.
    tree.module_section_mut(id).base_address = None;
    Ok(())
}

fn allocate_submodules(
    tree: &mut ConfigTree,
    submodule_map: &SubmoduleMap,
    table: &ParameterTable,
    config: &AllocatorConfig,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let rw = config.reg_width_bytes;
    let mut current_base: Option<(ModuleSectionId, String)> = None;
    let mut local = OccupancyMask::new();
    let mut region_start = 0u64;
    let mut base_placed = false;

    for entry in &submodule_map.entries {
        let key = (entry.section, entry.base_module.clone());
        if current_base.as_ref() != Some(&key) {
            current_base = Some(key);
            local = OccupancyMask::new();
            let base = tree
                .module_section(entry.section)
                .get(&entry.base_module)
                .ok_or_else(|| AllocError::MissingBaseModule {
                    module: entry.module_name.clone(),
                    base: entry.base_module.clone(),
                })?;
            match base.bounds.resolved() {
                Some((base_start, _)) => {
                    base_placed = true;
                    let native = base.native_register_count().unwrap_or(0) as u64;
                    region_start = base_start + native * rw;
                }
                None => {
                    base_placed = false;
                    warnings.push(format!(
                        "base module '{}' has no assigned range; skipping its submodules",
                        entry.base_module
                    ));
                }
            }
        }
        if !base_placed {
            continue;
        }

        let module = tree
            .module_section_mut(entry.section)
            .get_mut(&entry.module_name)
            .ok_or_else(|| AllocError::ModuleNotFound {
                module: entry.module_name.clone(),
            })?;

        // Explicitly-placed submodules keep their declared interval; it
        // still blocks the space for their siblings.
        if let ModuleBounds::Explicit { start, end } = module.bounds.clone() {
            let start = resolve_address(&start, table, &entry.module_name)?;
            let end = resolve_address(&end, table, &entry.module_name)?;
            module.bounds = ModuleBounds::Resolved { start, end };
        }
        if let Some((start, end)) = module.bounds.resolved() {
            local.add(start, end);
            continue;
        }
        if !module.enabled {
            continue;
        }

        let native = entry.register_count as u64;
        let descendants = module.subregisters.unwrap_or(0) as u64;
        if native == 0 && descendants == 0 {
            return Err(AllocError::InvalidRegisterCount {
                module: entry.module_name.clone(),
                count: 0,
            });
        }

        let probe = if native > 0 { native * rw } else { descendants * rw };
        let start = find_free(probe, region_start, config.alignment, &[&local]);
        let end = if native > 0 {
            start + (native - 1) * rw + descendants * rw
        } else {
            start + (descendants - 1) * rw
        };
        module.bounds = ModuleBounds::Resolved { start, end };
        if native > 0 {
            // Only the native span blocks siblings; the extension beneath
            // it is claimed by this module's own descendants next.
            local.add(start, start + (native - 1) * rw);
        }
    }
    Ok(())
}

fn resolve_address(expr: &str, table: &ParameterTable, module: &str) -> Result<u64> {
    match resolve_expression(expr, table) {
        Ok(Resolution::Value(value)) if value >= 0 => Ok(value as u64),
        Ok(_) => Err(AllocError::UnresolvedBounds {
            module: module.to_string(),
        }),
        Err(source) => Err(AllocError::Expr {
            module: module.to_string(),
            source,
        }),
    }
}
