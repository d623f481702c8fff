//! ASCII register-map report.
//!
//! Walks the resolved tree section by section and prints every enabled,
//! placed module with its range, native register count, and per-register
//! metadata. Submodules appear as their own entries; a module's listed
//! registers exclude the space reserved for its descendants.

use std::fmt::Write as _;

use regmap_core::{ModuleEntry, ModuleSectionId};

use crate::pipeline::CompiledInstance;

/// Bytes per register in the rendered addresses.
const REG_WIDTH_BYTES: u64 = 4;

/// Render the register map for one compiled instance.
pub fn render_register_map(instance: &CompiledInstance, user_only: bool) -> String {
    let mut out = String::new();
    out.push_str("Register Address Map\n");
    out.push_str("====================\n\n");
    let _ = writeln!(out, "Instance: {}", instance.name);

    let sections: &[ModuleSectionId] = if user_only {
        &[ModuleSectionId::User]
    } else {
        &ModuleSectionId::ALL
    };

    for &section_id in sections {
        let _ = write!(out, "\n    Section: {}\n", section_id.header());
        for (module_name, module) in instance.tree.module_section(section_id).iter() {
            if !module.enabled {
                continue;
            }
            let Some((start, end)) = module.bounds.resolved() else {
                let _ = writeln!(out, "    Warning: {module_name} has no assigned range");
                continue;
            };
            render_module(&mut out, module_name, module, start, end);
        }
    }
    out
}

fn render_module(out: &mut String, module_name: &str, module: &ModuleEntry, start: u64, end: u64) {
    let span_count = (end.saturating_sub(start)) / REG_WIDTH_BYTES + 1;
    let native_count = span_count.saturating_sub(module.subregisters.unwrap_or(0) as u64);
    let display_name = module.metadata.name.as_deref().unwrap_or(module_name);

    out.push('\n');
    let _ = writeln!(out, "        -> Module: {display_name} ({module_name})");
    let _ = writeln!(out, "            - Bounds: 'h{start:04X} to 'h{end:04X}");
    let _ = writeln!(out, "            - Register Count: {native_count}");
    if module.metadata.no_expand_regs {
        let _ = writeln!(out, "            - Registers: opaque block");
    }
    if let Some(description) = &module.metadata.description {
        let _ = writeln!(out, "            - Description: {description}");
    }
    if module.metadata.no_expand_regs {
        return;
    }

    for index in 0..native_count {
        let address = start + index * REG_WIDTH_BYTES;
        let key = format!("Reg{index}");
        let register = module.reg(&key);
        let reg_name = register
            .and_then(|r| r.name.as_deref())
            .unwrap_or(key.as_str());

        out.push('\n');
        let _ = writeln!(out, "            -> {key}: {reg_name}");
        let _ = writeln!(out, "                - Address: 'h{address:04X}");
        if let Some(register) = register {
            if let Some(description) = &register.description {
                let _ = writeln!(out, "                - Description: {description}");
            }
            if let Some(permissions) = register.permissions {
                let _ = writeln!(out, "                - Permissions: {permissions}");
            }
            for (field_key, field) in &register.fields {
                let field_name = field.name.as_deref().unwrap_or(field_key.as_str());
                if let Some(width) = field.bounds.width() {
                    let _ = writeln!(
                        out,
                        "                - Field {field_name}: {width} bit(s)"
                    );
                }
            }
        }
    }
}
