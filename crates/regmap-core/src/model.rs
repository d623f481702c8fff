//! The typed config-tree model.
//!
//! A configuration instance parses into a [`ConfigTree`]: three parameter
//! sections and two module sections. Entry order inside a section is
//! semantically significant (it is the tie-break for traversal and for
//! downstream emission), so sections are insertion-ordered pair lists
//! rather than hash maps, with positional insertion for expansion.
//!
//! Module bounds are an exhaustive enum over the declaration shapes
//! (explicit interval, auto-sized by expression, by literal, or by counting
//! declared registers) plus the fully resolved form the allocator writes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::names::{self, SUBMODULE_SEPARATOR};

/// Identifies one of the three parameter sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterSectionId {
    Builtin,
    User,
    Config,
}

impl ParameterSectionId {
    /// All parameter sections in file order.
    pub const ALL: [ParameterSectionId; 3] = [
        ParameterSectionId::Builtin,
        ParameterSectionId::User,
        ParameterSectionId::Config,
    ];

    /// The section-header keyword for this section.
    pub fn header(&self) -> &'static str {
        match self {
            ParameterSectionId::Builtin => "BUILTIN_PARAMETERS",
            ParameterSectionId::User => "USER_PARAMETERS",
            ParameterSectionId::Config => "CONFIG_PARAMETERS",
        }
    }
}

/// Identifies one of the two module sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleSectionId {
    Builtin,
    User,
}

impl ModuleSectionId {
    /// All module sections in file order.
    pub const ALL: [ModuleSectionId; 2] = [ModuleSectionId::Builtin, ModuleSectionId::User];

    /// The section-header keyword for this section.
    pub fn header(&self) -> &'static str {
        match self {
            ModuleSectionId::Builtin => "BUILTIN_MODULES",
            ModuleSectionId::User => "USER_MODULES",
        }
    }
}

impl fmt::Display for ModuleSectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// A single parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterEntry {
    /// Expression text (or, after resolution, decimal text).
    pub value: String,
    /// Optional `hi:lo` bit-width annotation, kept verbatim.
    pub bit_width: Option<String>,
}

impl ParameterEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            bit_width: None,
        }
    }

    pub fn with_bit_width(value: impl Into<String>, bit_width: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            bit_width: Some(bit_width.into()),
        }
    }
}

/// An insertion-ordered parameter section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSection {
    entries: Vec<(String, ParameterEntry)>,
}

impl ParameterSection {
    /// Insert or replace an entry. Replacement keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, entry: ParameterEntry) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((name, entry)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterEntry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ParameterEntry)> {
        self.entries.iter_mut().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a module's address range is specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleBounds {
    /// `{start, end}` expressions, not yet resolved.
    Explicit { start: String, end: String },
    /// `AUTO : {expr}`: register count given as an expression.
    AutoExpr { count: String },
    /// `AUTO : <int>`: register count given as a literal.
    AutoLiteral { count: u32 },
    /// Bare `AUTO`: register count inferred from declared registers.
    AutoInferred,
    /// A concrete end-inclusive byte interval.
    Resolved { start: u64, end: u64 },
}

impl ModuleBounds {
    /// Whether the address range still needs to be assigned by the allocator.
    pub fn is_auto(&self) -> bool {
        matches!(
            self,
            ModuleBounds::AutoExpr { .. } | ModuleBounds::AutoLiteral { .. } | ModuleBounds::AutoInferred
        )
    }

    /// The resolved interval, if any.
    pub fn resolved(&self) -> Option<(u64, u64)> {
        match self {
            ModuleBounds::Resolved { start, end } => Some((*start, *end)),
            _ => None,
        }
    }

    /// The resolved interval rendered as hex-text literals for the handoff.
    pub fn hex_text(&self) -> Option<(String, String)> {
        self.resolved()
            .map(|(start, end)| (format!("'h{start:X}"), format!("'h{end:X}")))
    }
}

/// Free-text metadata attached to a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `NOEXPREGS`: downstream consumers treat the register block as opaque.
    pub no_expand_regs: bool,
    /// Set on clones produced by repeat expansion.
    pub repeat_instance: bool,
    /// Path of the metadata include file this module was populated from.
    pub module_filepath: Option<PathBuf>,
}

/// A `Repeat:` declaration on a module template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatSpec {
    /// Repeat-count expression (decimal text once resolved).
    pub value: String,
    /// `NOEXPREGS` carried on the repeat declaration itself.
    pub no_expand_regs: bool,
    /// For clones: the un-suffixed name of the template this was cloned from.
    pub repeat_of: Option<String>,
}

/// Register access permissions, canonicalized to `R`, `W`, or `R/W`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permissions {
    Read,
    Write,
    ReadWrite,
}

impl Permissions {
    /// Parse a permissions token. Accepts (case-insensitive) `r`/`read`,
    /// `w`/`write`, `rw`/`read/write`/`write/read`.
    pub fn parse(text: &str) -> Option<Permissions> {
        match text.trim().to_ascii_lowercase().as_str() {
            "r" | "read" => Some(Permissions::Read),
            "w" | "write" => Some(Permissions::Write),
            "rw" | "read/write" | "write/read" => Some(Permissions::ReadWrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permissions::Read => "R",
            Permissions::Write => "W",
            Permissions::ReadWrite => "R/W",
        }
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bit bounds of a field, `[hi:lo]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldBounds {
    /// Declared field with no `Bounds:` line seen yet.
    Pending,
    /// Unresolved bound expressions.
    Symbolic { hi: String, lo: String },
    /// Resolved bit positions.
    Resolved { hi: u32, lo: u32 },
}

impl FieldBounds {
    /// Field width in bits, once resolved.
    pub fn width(&self) -> Option<u32> {
        match self {
            FieldBounds::Resolved { hi, lo } => Some(hi.abs_diff(*lo) + 1),
            _ => None,
        }
    }
}

/// A bit field inside a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: Option<String>,
    pub bounds: FieldBounds,
    pub description: Option<String>,
}

impl FieldEntry {
    pub fn new() -> Self {
        Self {
            name: None,
            bounds: FieldBounds::Pending,
            description: None,
        }
    }
}

impl Default for FieldEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// A register declaration (`RegN:`) and its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Permissions>,
    /// Insertion-ordered `FieldN` entries.
    pub fields: Vec<(String, FieldEntry)>,
}

impl RegisterEntry {
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldEntry> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn push_field(&mut self, name: impl Into<String>, field: FieldEntry) {
        self.fields.push((name.into(), field));
    }
}

/// A module: an addressable block of registers or a container of submodules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// `TRUE`/`FALSE` flag from the declaration line.
    pub enabled: bool,
    pub bounds: ModuleBounds,
    pub metadata: ModuleMetadata,
    /// Insertion-ordered `RegN` entries.
    pub regs: Vec<(String, RegisterEntry)>,
    pub repeat: Option<RepeatSpec>,
    /// Qualified name of the immediate parent, for nested modules.
    pub submodule_of: Option<String>,
    /// Total register span including descendants (set by expansion).
    pub registers: Option<u32>,
    /// Portion of `registers` occupied by descendants only.
    pub subregisters: Option<u32>,
}

impl ModuleEntry {
    pub fn new(enabled: bool, bounds: ModuleBounds) -> Self {
        Self {
            enabled,
            bounds,
            metadata: ModuleMetadata::default(),
            regs: Vec::new(),
            repeat: None,
            submodule_of: None,
            registers: None,
            subregisters: None,
        }
    }

    pub fn reg(&self, name: &str) -> Option<&RegisterEntry> {
        self.regs.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn reg_mut(&mut self, name: &str) -> Option<&mut RegisterEntry> {
        self.regs
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    pub fn has_reg(&self, name: &str) -> bool {
        self.regs.iter().any(|(n, _)| n == name)
    }

    pub fn push_reg(&mut self, name: impl Into<String>, reg: RegisterEntry) {
        self.regs.push((name.into(), reg));
    }

    /// The module's own declared register count: the auto count for auto
    /// modules (inferred from declared registers for bare `AUTO`), zero for
    /// explicitly-bounded modules.
    pub fn declared_register_count(&self) -> Option<u32> {
        match &self.bounds {
            ModuleBounds::AutoLiteral { count } => Some(*count),
            ModuleBounds::AutoInferred => Some(self.regs.len() as u32),
            ModuleBounds::AutoExpr { .. } => None,
            ModuleBounds::Explicit { .. } | ModuleBounds::Resolved { .. } => Some(0),
        }
    }

    /// Registers belonging to the module itself, descendants excluded.
    pub fn native_register_count(&self) -> Option<u32> {
        match (self.registers, self.subregisters) {
            (Some(total), Some(subs)) => Some(total.saturating_sub(subs)),
            _ => self.declared_register_count(),
        }
    }
}

/// An insertion-ordered module section with an optional base address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSection {
    /// Base-address expression from the section header, if any. Removed by
    /// the allocator once consumed.
    pub base_address: Option<String>,
    entries: Vec<(String, ModuleEntry)>,
}

impl ModuleSection {
    /// Insert or replace a module. Replacement keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, module: ModuleEntry) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = module,
            None => self.entries.push((name, module)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModuleEntry> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleEntry)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ModuleEntry)> {
        self.entries.iter_mut().map(|(n, m)| (n.as_str(), m))
    }

    /// Entry names in declaration order (owned, for iterate-while-mutating).
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert `group` immediately after the last entry whose name starts
    /// with `prefix`, preserving the group's internal order. Appends at the
    /// end if no entry matches. A group member whose name already exists
    /// replaces that entry in place instead of duplicating it.
    pub fn insert_group_after_prefix(&mut self, prefix: &str, group: Vec<(String, ModuleEntry)>) {
        let mut insert_at = self
            .entries
            .iter()
            .rposition(|(n, _)| n.starts_with(prefix))
            .map(|idx| idx + 1)
            .unwrap_or(self.entries.len());
        for (name, module) in group {
            match self.entries.iter().position(|(n, _)| *n == name) {
                Some(existing) => self.entries[existing].1 = module,
                None => {
                    self.entries.insert(insert_at, (name, module));
                    insert_at += 1;
                }
            }
        }
    }
}

/// A full configuration instance: every section, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    pub builtin_parameters: ParameterSection,
    pub user_parameters: ParameterSection,
    pub config_parameters: ParameterSection,
    pub builtin_modules: ModuleSection,
    pub user_modules: ModuleSection,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter_section(&self, id: ParameterSectionId) -> &ParameterSection {
        match id {
            ParameterSectionId::Builtin => &self.builtin_parameters,
            ParameterSectionId::User => &self.user_parameters,
            ParameterSectionId::Config => &self.config_parameters,
        }
    }

    pub fn parameter_section_mut(&mut self, id: ParameterSectionId) -> &mut ParameterSection {
        match id {
            ParameterSectionId::Builtin => &mut self.builtin_parameters,
            ParameterSectionId::User => &mut self.user_parameters,
            ParameterSectionId::Config => &mut self.config_parameters,
        }
    }

    pub fn module_section(&self, id: ModuleSectionId) -> &ModuleSection {
        match id {
            ModuleSectionId::Builtin => &self.builtin_modules,
            ModuleSectionId::User => &self.user_modules,
        }
    }

    pub fn module_section_mut(&mut self, id: ModuleSectionId) -> &mut ModuleSection {
        match id {
            ModuleSectionId::Builtin => &mut self.builtin_modules,
            ModuleSectionId::User => &mut self.user_modules,
        }
    }
}

/// One parent/child relationship record in the submodule map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleMapEntry {
    /// Top-level ancestor of this submodule.
    pub base_module: String,
    pub section: ModuleSectionId,
    /// The submodule's own qualified name.
    pub module_name: String,
    /// Qualified name of the immediate parent.
    pub module_parent: String,
    /// The submodule's native register count.
    pub register_count: u32,
    /// Declaration order within the tree.
    pub id_count: usize,
    /// The separator used inside qualified names.
    pub separator: String,
    /// Whether the base module suppresses register expansion downstream.
    pub base_no_expand_regs: bool,
}

/// The authoritative record of parent/child module relationships.
///
/// Rebuilt from the tree after every expansion mutation. [`Self::parent_first`]
/// produces the traversal order every later stage relies on: a parent always
/// precedes its children, and siblings appear in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleMap {
    pub entries: Vec<SubmoduleMapEntry>,
}

impl SubmoduleMap {
    pub fn new(entries: Vec<SubmoduleMapEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries for which `module` is the immediate parent, in declaration order.
    pub fn children_of(&self, module: &str) -> Vec<&SubmoduleMapEntry> {
        let mut children: Vec<&SubmoduleMapEntry> = self
            .entries
            .iter()
            .filter(|e| e.module_parent == module)
            .collect();
        children.sort_by_key(|e| e.id_count);
        children
    }

    /// Reorder into parent-first traversal order.
    ///
    /// Roots are entries whose parent is not itself a submodule anywhere in
    /// the map (their parent is a base module). Each root is emitted before
    /// its children, depth-first, with siblings in declaration order.
    pub fn parent_first(&self) -> SubmoduleMap {
        let mut roots: Vec<&SubmoduleMapEntry> = self
            .entries
            .iter()
            .filter(|e| !self.entries.iter().any(|c| c.module_name == e.module_parent))
            .collect();
        roots.sort_by_key(|e| e.id_count);

        let mut ordered = Vec::with_capacity(self.entries.len());
        for root in roots {
            self.emit_subtree(root, &mut ordered);
        }
        SubmoduleMap { entries: ordered }
    }

    fn emit_subtree(&self, entry: &SubmoduleMapEntry, out: &mut Vec<SubmoduleMapEntry>) {
        out.push(entry.clone());
        for child in self.children_of(&entry.module_name) {
            self.emit_subtree(child, out);
        }
    }
}

/// Build the submodule map for a tree in declaration order.
pub fn build_submodule_map(tree: &ConfigTree) -> SubmoduleMap {
    let mut entries = Vec::new();
    let mut id_count = 0;
    for section_id in ModuleSectionId::ALL {
        let section = tree.module_section(section_id);
        for (name, module) in section.iter() {
            if module.submodule_of.is_none() {
                continue;
            }
            let base = names::base_segment(name).to_string();
            let parent = names::parent_path(name).unwrap_or(name).to_string();
            let base_no_expand_regs = section
                .get(&base)
                .map(|m| m.metadata.no_expand_regs)
                .unwrap_or(false);
            entries.push(SubmoduleMapEntry {
                base_module: base,
                section: section_id,
                module_name: name.to_string(),
                module_parent: parent,
                register_count: module.declared_register_count().unwrap_or(0),
                id_count,
                separator: SUBMODULE_SEPARATOR.to_string(),
                base_no_expand_regs,
            });
            id_count += 1;
        }
    }
    SubmoduleMap::new(entries)
}
