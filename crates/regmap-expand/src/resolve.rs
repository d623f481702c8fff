//! Expression resolution over a whole tree.
//!
//! Produces a resolved snapshot: parameter values become decimal text,
//! explicit module bounds become concrete intervals, repeat counts and
//! auto register counts become integers, and field bit bounds become
//! resolved positions. The input tree is never mutated.

use regmap_core::expr::{resolve_expression, Resolution};
use regmap_core::model::{ConfigTree, FieldBounds, ModuleBounds, ModuleSectionId, ParameterSectionId};
use regmap_core::params::{build_parameter_table, ParameterTable};

use crate::error::{ExpandError, Result};

/// Resolve every expression-valued piece of `tree` against its own
/// parameter table, returning a new snapshot.
pub fn resolve_tree(tree: &ConfigTree) -> Result<ConfigTree> {
    let table = build_parameter_table(tree)?;
    let mut out = tree.clone();

    for id in [ParameterSectionId::Builtin, ParameterSectionId::User] {
        for (name, entry) in out.parameter_section_mut(id).iter_mut() {
            let value = require_value(&entry.value, &table, name)?;
            entry.value = value.to_string();
        }
    }

    for id in ModuleSectionId::ALL {
        for (name, module) in out.module_section_mut(id).iter_mut() {
            module.bounds = match std::mem::replace(&mut module.bounds, ModuleBounds::AutoInferred)
            {
                ModuleBounds::Explicit { start, end } => {
                    let start = non_negative(&start, &table, name)
                        .map_err(|_| ExpandError::ModuleBounds {
                            module: name.to_string(),
                        })?;
                    let end = non_negative(&end, &table, name).map_err(|_| {
                        ExpandError::ModuleBounds {
                            module: name.to_string(),
                        }
                    })?;
                    ModuleBounds::Resolved { start, end }
                }
                ModuleBounds::AutoExpr { count } => {
                    let count =
                        non_negative(&count, &table, name).map_err(|_| ExpandError::RegisterCount {
                            module: name.to_string(),
                        })?;
                    let count = u32::try_from(count).map_err(|_| ExpandError::RegisterCount {
                        module: name.to_string(),
                    })?;
                    ModuleBounds::AutoLiteral { count }
                }
                ModuleBounds::AutoInferred => ModuleBounds::AutoLiteral {
                    count: module.regs.len() as u32,
                },
                other => other,
            };

            if let Some(repeat) = &mut module.repeat {
                let count = non_negative(&repeat.value, &table, name).map_err(|_| {
                    ExpandError::RepeatCount {
                        module: name.to_string(),
                    }
                })?;
                repeat.value = count.to_string();
            }

            for (reg_name, register) in &mut module.regs {
                for (field_name, field) in &mut register.fields {
                    field.bounds = match std::mem::replace(&mut field.bounds, FieldBounds::Pending)
                    {
                        FieldBounds::Symbolic { hi, lo } => {
                            let err = || ExpandError::FieldBounds {
                                module: name.to_string(),
                                register: reg_name.clone(),
                                field: field_name.clone(),
                            };
                            let hi = non_negative(&hi, &table, name).map_err(|_| err())?;
                            let lo = non_negative(&lo, &table, name).map_err(|_| err())?;
                            let hi = u32::try_from(hi).map_err(|_| err())?;
                            let lo = u32::try_from(lo).map_err(|_| err())?;
                            FieldBounds::Resolved { hi, lo }
                        }
                        FieldBounds::Pending => {
                            return Err(ExpandError::MissingFieldBounds {
                                module: name.to_string(),
                                register: reg_name.clone(),
                                field: field_name.clone(),
                            })
                        }
                        resolved => resolved,
                    };
                }
            }
        }
    }

    Ok(out)
}

fn require_value(expr: &str, table: &ParameterTable, module: &str) -> Result<i64> {
    match resolve_expression(expr, table) {
        Ok(Resolution::Value(value)) => Ok(value),
        Ok(Resolution::Unresolved) => Err(ExpandError::RegisterCount {
            module: module.to_string(),
        }),
        Err(source) => Err(ExpandError::Expr {
            module: module.to_string(),
            source,
        }),
    }
}

fn non_negative(expr: &str, table: &ParameterTable, module: &str) -> Result<u64> {
    let value = require_value(expr, table, module)?;
    u64::try_from(value).map_err(|_| ExpandError::RegisterCount {
        module: module.to_string(),
    })
}
