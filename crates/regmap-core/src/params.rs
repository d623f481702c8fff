//! Parameter table construction and path-placeholder substitution.
//!
//! Parameters may reference other parameters, so the table is built by
//! fixed-point iteration: each pass resolves every expression it can
//! against the values accumulated so far and stops once a pass makes no
//! progress. Anything still unresolved at that point is cyclic or refers
//! to an undefined name, which is fatal.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::expr::{self, ExprError, Resolution};
use crate::model::{ConfigTree, ParameterSectionId};

/// Errors from parameter-table construction or placeholder substitution.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("unresolved parameters after fixed point (cyclic or undefined): {names}")]
    UnresolvedParameters { names: String },

    #[error("parameter '{name}': {source}")]
    Expr {
        name: String,
        #[source]
        source: ExprError,
    },

    #[error("CONFIG_PARAMETERS missing or malformed for key '{key}'")]
    MissingPlaceholderKey { key: String },
}

/// A fully resolved name-to-integer mapping.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    values: HashMap<String, i64>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameter names ordered longest-first for substitution.
    pub fn names_longest_first(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names
    }
}

/// Build the complete parameter table for a tree.
///
/// Seeds an empty table, then repeatedly attempts every still-unresolved
/// parameter from `BUILTIN_PARAMETERS` and `USER_PARAMETERS` until a pass
/// makes no progress. A later section's entry shadows an earlier one with
/// the same name.
pub fn build_parameter_table(tree: &ConfigTree) -> Result<ParameterTable, ParamError> {
    let mut pending: Vec<(String, String)> = Vec::new();
    for section_id in [ParameterSectionId::Builtin, ParameterSectionId::User] {
        for (name, entry) in tree.parameter_section(section_id).iter() {
            match pending.iter_mut().find(|(n, _)| n == name) {
                Some((_, value)) => *value = entry.value.clone(),
                None => pending.push((name.to_string(), entry.value.clone())),
            }
        }
    }

    let mut table = ParameterTable::new();
    loop {
        let mut progress = false;
        let mut still_pending = Vec::with_capacity(pending.len());
        for (name, value) in pending {
            match expr::resolve_expression(&value, &table) {
                Ok(Resolution::Value(resolved)) => {
                    table.insert(name, resolved);
                    progress = true;
                }
                Ok(Resolution::Unresolved) => still_pending.push((name, value)),
                Err(source) => return Err(ParamError::Expr { name, source }),
            }
        }
        pending = still_pending;
        if pending.is_empty() || !progress {
            break;
        }
    }

    if !pending.is_empty() {
        let names = pending
            .iter()
            .map(|(name, value)| format!("{name} = '{value}'"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ParamError::UnresolvedParameters { names });
    }
    Ok(table)
}

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern"));

/// Substitute `{KEY}` placeholders in a templated string (an include path,
/// typically) using the `CONFIG_PARAMETERS` section specifically. A missing
/// key is fatal.
pub fn substitute_path_placeholders(input: &str, tree: &ConfigTree) -> Result<String, ParamError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for captures in PLACEHOLDER.captures_iter(input) {
        let whole = captures.get(0).expect("capture 0 always present");
        let key = &captures[1];
        let entry = tree
            .config_parameters
            .get(key)
            .ok_or_else(|| ParamError::MissingPlaceholderKey {
                key: key.to_string(),
            })?;
        out.push_str(&input[last..whole.start()]);
        out.push_str(&entry.value);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}
