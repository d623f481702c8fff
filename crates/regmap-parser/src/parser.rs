//! The line-oriented configuration parser.
//!
//! A single forward pass over physical lines. Indentation is normalized
//! (tabs expanded, leading space truncated to whole indent units) before
//! any indentation-sensitive decision. All parse state lives in the
//! [`Parser`] struct and is threaded through one line-processing loop:
//! current section/module/register/field, a pending multi-line
//! continuation, the module stack that anchors `SUBMODULE:` blocks, and
//! the include search path.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use regmap_core::model::{
    ConfigTree, FieldBounds, FieldEntry, ModuleBounds, ModuleEntry, ModuleSectionId,
    ParameterEntry, ParameterSectionId, Permissions, RegisterEntry, RepeatSpec,
};
use regmap_core::names::SUBMODULE_SEPARATOR;
use regmap_core::params::substitute_path_placeholders;

use crate::error::{ParseError, Result};
use crate::include::{resolve_include_path, scrape_metadata_block};
use crate::rules::{self, DeclBounds, SectionHeader};

/// Columns per indentation unit. Tabs expand to the next multiple of this.
pub const INDENT_UNIT: usize = 4;

/// Parse a configuration file from disk. Include directives resolve
/// relative to the file's directory.
pub fn parse_file(path: &Path) -> Result<ConfigTree> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text, path.parent())
}

/// Parse configuration text. `base_dir` is the fallback directory for
/// include resolution; without one, includes resolve against the process
/// working directory.
pub fn parse_str(text: &str, base_dir: Option<&Path>) -> Result<ConfigTree> {
    let mut buffer: VecDeque<Line> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| Line {
            text: line.to_string(),
            number: idx + 1,
        })
        .collect();

    let mut parser = Parser::new(base_dir.map(Path::to_path_buf));
    while let Some(line) = buffer.pop_front() {
        parser.process(line, &mut buffer)?;
    }
    parser.finish()
}

/// One physical line with its diagnostic line number. Lines spliced from
/// an include file carry the number of the directive that pulled them in.
struct Line {
    text: String,
    number: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentSection {
    Parameters(ParameterSectionId),
    Modules(ModuleSectionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKey {
    Name,
    Description,
}

/// An in-flight multi-line continuation (`\`-terminated value lines).
struct Pending {
    key: MetaKey,
    text: String,
}

/// An open `SUBMODULE:` block: children declared inside attach to `parent`.
struct SubmoduleBlock {
    parent: String,
    indent: usize,
}

struct Parser {
    tree: ConfigTree,
    section: Option<CurrentSection>,
    current_module: Option<String>,
    current_register: Option<String>,
    current_field: Option<String>,
    pending: Option<Pending>,
    /// Declared modules with the indent level they were declared at.
    module_stack: Vec<(String, usize)>,
    submodule_stack: Vec<SubmoduleBlock>,
    /// Set after a `SUBMODULE:` header; the next significant line must be a
    /// module declaration.
    expect_submodule_module: bool,
    include_dirs: Vec<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl Parser {
    fn new(base_dir: Option<PathBuf>) -> Self {
        Self {
            tree: ConfigTree::new(),
            section: None,
            current_module: None,
            current_register: None,
            current_field: None,
            pending: None,
            module_stack: Vec::new(),
            submodule_stack: Vec::new(),
            expect_submodule_module: false,
            include_dirs: Vec::new(),
            base_dir,
        }
    }

    fn process(&mut self, line: Line, buffer: &mut VecDeque<Line>) -> Result<()> {
        let expanded = expand_tabs(&line.text, INDENT_UNIT);
        let trimmed = expanded.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        if self.pending.is_some() {
            return self.continue_pending(trimmed);
        }

        let leading = expanded.len() - expanded.trim_start().len();
        let indent = leading / INDENT_UNIT;
        self.dispatch(line.number, indent, trimmed, buffer)
    }

    fn finish(mut self) -> Result<ConfigTree> {
        if self.pending.is_some() {
            self.finalize_pending();
        }
        Ok(self.tree)
    }

    fn dispatch(
        &mut self,
        number: usize,
        indent: usize,
        text: &str,
        buffer: &mut VecDeque<Line>,
    ) -> Result<()> {
        if let Some((header, remainder)) = rules::match_section(text) {
            return self.start_section(number, indent, header, remainder);
        }

        let Some(section) = self.section else {
            return Err(ParseError::OutsideSection {
                line: number,
                text: text.to_string(),
            });
        };

        match section {
            CurrentSection::Parameters(id) => self.parameter_line(number, id, text),
            CurrentSection::Modules(id) => self.module_line(number, indent, id, text, buffer),
        }
    }

    fn start_section(
        &mut self,
        number: usize,
        indent: usize,
        header: SectionHeader,
        remainder: String,
    ) -> Result<()> {
        if self.expect_submodule_module {
            return Err(ParseError::SubmoduleBlockNotModule {
                line: number,
                text: remainder,
            });
        }
        match header {
            SectionHeader::Submodule => {
                if !remainder.is_empty() {
                    return Err(ParseError::UnrecognizedLine {
                        line: number,
                        text: format!("SUBMODULE: {remainder}"),
                    });
                }
                self.open_submodule_block(number, indent)
            }
            SectionHeader::Parameters(id) => {
                if !remainder.is_empty() {
                    return Err(ParseError::BaseAddressOnParameterSection {
                        line: number,
                        section: id.header().to_string(),
                    });
                }
                self.reset_module_state();
                self.section = Some(CurrentSection::Parameters(id));
                Ok(())
            }
            SectionHeader::Modules(id) => {
                self.reset_module_state();
                self.section = Some(CurrentSection::Modules(id));
                if !remainder.is_empty() {
                    self.tree.module_section_mut(id).base_address = Some(remainder);
                }
                Ok(())
            }
        }
    }

    fn reset_module_state(&mut self) {
        self.current_module = None;
        self.current_register = None;
        self.current_field = None;
        self.module_stack.clear();
        self.submodule_stack.clear();
    }

    fn open_submodule_block(&mut self, number: usize, indent: usize) -> Result<()> {
        // Blocks whose scope this header leaves are closed first.
        self.submodule_stack.retain(|block| block.indent < indent);
        while matches!(self.module_stack.last(), Some((_, lvl)) if *lvl >= indent) {
            self.module_stack.pop();
        }
        let Some((anchor, anchor_indent)) = self.module_stack.last().cloned() else {
            return Err(ParseError::SubmoduleWithoutAnchor { line: number });
        };
        if indent > anchor_indent + 1 {
            return Err(ParseError::IndentationJump {
                line: number,
                found: indent,
                anchor: anchor_indent,
            });
        }
        self.submodule_stack.push(SubmoduleBlock {
            parent: anchor,
            indent,
        });
        self.expect_submodule_module = true;
        Ok(())
    }

    fn parameter_line(&mut self, number: usize, id: ParameterSectionId, text: &str) -> Result<()> {
        let Some(decl) = rules::match_parameter(text) else {
            return Err(ParseError::UnrecognizedLine {
                line: number,
                text: text.to_string(),
            });
        };
        let entry = match decl.bit_width {
            Some(width) => ParameterEntry::with_bit_width(decl.value, width),
            None => ParameterEntry::new(decl.value),
        };
        self.tree.parameter_section_mut(id).insert(decl.name, entry);
        Ok(())
    }

    fn module_line(
        &mut self,
        number: usize,
        indent: usize,
        id: ModuleSectionId,
        text: &str,
        buffer: &mut VecDeque<Line>,
    ) -> Result<()> {
        if let Some(decl) = rules::match_module(text) {
            let decl = decl.map_err(|bounds| ParseError::MalformedBounds {
                line: number,
                text: bounds,
            })?;
            return self.declare_module(number, indent, id, decl);
        }
        if self.expect_submodule_module {
            return Err(ParseError::SubmoduleBlockNotModule {
                line: number,
                text: text.to_string(),
            });
        }
        if let Some(path) = rules::match_include(text) {
            return self.handle_include(number, indent, id, &path, buffer);
        }
        if let Some(name) = rules::match_register(text) {
            return self.declare_register(number, id, name);
        }
        if let Some(name) = rules::match_field(text) {
            return self.declare_field(number, id, name);
        }
        if let Some((hi, lo)) = rules::match_bounds(text) {
            return self.set_field_bounds(number, id, hi, lo);
        }
        if let Some(value) = rules::match_name(text) {
            return self.attach_metadata(number, id, MetaKey::Name, value, text);
        }
        if let Some(value) = rules::match_description(text) {
            return self.attach_metadata(number, id, MetaKey::Description, value, text);
        }
        if let Some(value) = rules::match_permissions(text) {
            return self.set_permissions(number, id, &value);
        }
        if let Some((value, no_expand)) = rules::match_repeat(text) {
            return self.set_repeat(number, id, value, no_expand);
        }
        Err(ParseError::UnrecognizedLine {
            line: number,
            text: text.to_string(),
        })
    }

    fn declare_module(
        &mut self,
        number: usize,
        indent: usize,
        id: ModuleSectionId,
        decl: rules::ModuleDecl,
    ) -> Result<()> {
        let expected = std::mem::take(&mut self.expect_submodule_module);
        if expected {
            let block = self
                .submodule_stack
                .last()
                .expect("submodule expectation implies an open block");
            if indent <= block.indent {
                return Err(ParseError::SubmoduleNotIndented { line: number });
            }
        }
        self.submodule_stack.retain(|block| block.indent < indent);

        let (qualified, parent) = match self.submodule_stack.last() {
            Some(block) => (
                format!("{}{}{}", block.parent, SUBMODULE_SEPARATOR, decl.name),
                Some(block.parent.clone()),
            ),
            None => (decl.name.clone(), None),
        };

        let bounds = match decl.bounds {
            DeclBounds::Explicit { start, end } => ModuleBounds::Explicit { start, end },
            DeclBounds::AutoExpr { count } => ModuleBounds::AutoExpr { count },
            DeclBounds::AutoLiteral { count } => ModuleBounds::AutoLiteral { count },
            DeclBounds::AutoInferred => ModuleBounds::AutoInferred,
        };
        let mut module = ModuleEntry::new(decl.enabled, bounds);
        module.metadata.no_expand_regs = decl.no_expand_regs;
        module.submodule_of = parent;
        self.tree
            .module_section_mut(id)
            .insert(qualified.clone(), module);

        while matches!(self.module_stack.last(), Some((_, lvl)) if *lvl >= indent) {
            self.module_stack.pop();
        }
        self.module_stack.push((qualified.clone(), indent));
        self.current_module = Some(qualified);
        self.current_register = None;
        self.current_field = None;
        Ok(())
    }

    fn declare_register(&mut self, number: usize, id: ModuleSectionId, name: String) -> Result<()> {
        let module = self
            .current_module_mut(id)
            .ok_or(ParseError::RegisterOutsideModule {
                line: number,
                name: name.clone(),
            })?;
        if module.has_reg(&name) {
            return Err(ParseError::RegisterRedefined { line: number, name });
        }
        module.push_reg(name.clone(), RegisterEntry::default());
        self.current_register = Some(name);
        self.current_field = None;
        Ok(())
    }

    fn declare_field(&mut self, number: usize, id: ModuleSectionId, name: String) -> Result<()> {
        let Some(register) = self.current_register_mut(id) else {
            return Err(ParseError::FieldOutsideRegister { line: number, name });
        };
        if register.has_field(&name) {
            return Err(ParseError::FieldRedefined { line: number, name });
        }
        register.push_field(name.clone(), FieldEntry::new());
        self.current_field = Some(name);
        Ok(())
    }

    fn set_field_bounds(
        &mut self,
        number: usize,
        id: ModuleSectionId,
        hi: String,
        lo: String,
    ) -> Result<()> {
        let Some(field) = self.current_field_mut(id) else {
            return Err(ParseError::BoundsOutsideField { line: number });
        };
        field.bounds = FieldBounds::Symbolic { hi, lo };
        Ok(())
    }

    fn attach_metadata(
        &mut self,
        number: usize,
        id: ModuleSectionId,
        key: MetaKey,
        value: String,
        text: &str,
    ) -> Result<()> {
        if self.current_module_mut(id).is_none() {
            return Err(ParseError::MetadataOutsideModule {
                line: number,
                text: text.to_string(),
            });
        }
        if let Some(stripped) = value.strip_suffix('\\') {
            self.pending = Some(Pending {
                key,
                text: stripped.trim_end().to_string(),
            });
            return Ok(());
        }
        self.store_metadata(key, value);
        Ok(())
    }

    fn continue_pending(&mut self, trimmed: &str) -> Result<()> {
        let pending = self.pending.as_mut().expect("continuation in flight");
        match trimmed.strip_suffix('\\') {
            Some(more) => {
                pending.text.push(' ');
                pending.text.push_str(more.trim_end());
            }
            None => {
                pending.text.push(' ');
                pending.text.push_str(trimmed);
                self.finalize_pending();
            }
        }
        Ok(())
    }

    fn finalize_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.store_metadata(pending.key, pending.text.trim().to_string());
        }
    }

    /// Attach a `Name:`/`Description:` value to the innermost open entity.
    /// Only the first value seen for a given slot is kept; later ones (from
    /// metadata splicing, typically) are dropped rather than overwritten.
    fn store_metadata(&mut self, key: MetaKey, value: String) {
        let Some(CurrentSection::Modules(id)) = self.section else {
            return;
        };
        if self.current_field.is_some() {
            if let Some(field) = self.current_field_mut(id) {
                let slot = match key {
                    MetaKey::Name => &mut field.name,
                    MetaKey::Description => &mut field.description,
                };
                slot.get_or_insert(value);
            }
            return;
        }
        if self.current_register.is_some() {
            if let Some(register) = self.current_register_mut(id) {
                let slot = match key {
                    MetaKey::Name => &mut register.name,
                    MetaKey::Description => &mut register.description,
                };
                slot.get_or_insert(value);
            }
            return;
        }
        if let Some(module) = self.current_module_mut(id) {
            let slot = match key {
                MetaKey::Name => &mut module.metadata.name,
                MetaKey::Description => &mut module.metadata.description,
            };
            slot.get_or_insert(value);
        }
    }

    fn set_permissions(&mut self, number: usize, id: ModuleSectionId, value: &str) -> Result<()> {
        let parsed = Permissions::parse(value).ok_or_else(|| ParseError::UnknownPermission {
            line: number,
            value: value.to_string(),
        })?;
        let Some(register) = self.current_register_mut(id) else {
            return Err(ParseError::PermissionsOutsideRegister { line: number });
        };
        register.permissions = Some(parsed);
        Ok(())
    }

    fn set_repeat(
        &mut self,
        number: usize,
        id: ModuleSectionId,
        value: String,
        no_expand_regs: bool,
    ) -> Result<()> {
        let name = self
            .current_module
            .clone()
            .ok_or(ParseError::RepeatOutsideModule { line: number })?;
        let module = self
            .current_module_mut(id)
            .ok_or(ParseError::RepeatOutsideModule { line: number })?;
        if !module.regs.is_empty()
            || module.metadata.name.is_some()
            || module.metadata.description.is_some()
        {
            return Err(ParseError::RepeatAfterContent {
                line: number,
                module: name,
            });
        }
        module.repeat = Some(RepeatSpec {
            value,
            no_expand_regs,
            repeat_of: None,
        });
        Ok(())
    }

    fn handle_include(
        &mut self,
        number: usize,
        indent: usize,
        id: ModuleSectionId,
        raw_path: &str,
        buffer: &mut VecDeque<Line>,
    ) -> Result<()> {
        let module_name = self
            .current_module
            .clone()
            .ok_or(ParseError::IncludeOutsideModule { line: number })?;
        let (has_name, has_description) = {
            let module = self
                .tree
                .module_section(id)
                .get(&module_name)
                .ok_or(ParseError::IncludeOutsideModule { line: number })?;
            if !module.regs.is_empty() {
                return Err(ParseError::IncludeAfterRegisters {
                    line: number,
                    module: module_name,
                });
            }
            (
                module.metadata.name.is_some(),
                module.metadata.description.is_some(),
            )
        };

        let substituted = substitute_path_placeholders(raw_path, &self.tree).map_err(|source| {
            ParseError::Placeholder {
                line: number,
                source,
            }
        })?;
        let base_dir = self
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let resolved = resolve_include_path(&base_dir, &self.include_dirs, &substituted)
            .ok_or_else(|| ParseError::IncludeNotFound {
                line: number,
                path: PathBuf::from(&substituted),
            })?;

        let block = scrape_metadata_block(&resolved, has_name, has_description)?;

        if let Some(module) = self.tree.module_section_mut(id).get_mut(&module_name) {
            module.metadata.module_filepath = Some(resolved.clone());
        }
        if let Some(parent) = resolved.parent() {
            let parent = parent.to_path_buf();
            if !self.include_dirs.contains(&parent) {
                self.include_dirs.push(parent);
            }
        }

        let prefix = " ".repeat(indent * INDENT_UNIT);
        for text in block.iter().rev() {
            buffer.push_front(Line {
                text: format!("{prefix}{text}"),
                number,
            });
        }
        Ok(())
    }

    fn current_module_mut(&mut self, id: ModuleSectionId) -> Option<&mut ModuleEntry> {
        let name = self.current_module.as_deref()?;
        self.tree.module_section_mut(id).get_mut(name)
    }

    fn current_register_mut(&mut self, id: ModuleSectionId) -> Option<&mut RegisterEntry> {
        let register = self.current_register.clone()?;
        self.current_module_mut(id)?.reg_mut(&register)
    }

    fn current_field_mut(&mut self, id: ModuleSectionId) -> Option<&mut FieldEntry> {
        let field = self.current_field.clone()?;
        self.current_register_mut(id)?.field_mut(&field)
    }
}

/// Expand tabs to spaces with tab stops every `unit` columns.
fn expand_tabs(line: &str, unit: usize) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + unit);
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = unit - (column % unit);
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use regmap_core::model::{FieldBounds, ModuleBounds, Permissions};

    fn parse(text: &str) -> ConfigTree {
        parse_str(text, None).unwrap()
    }

    fn parse_err(text: &str) -> ParseError {
        parse_str(text, None).unwrap_err()
    }

    #[test]
    fn sections_parameters_and_base_address() {
        let tree = parse(
            "# instance config\n\
             BUILTIN_PARAMETERS:\n\
             WIDTH : 32\n\
             BASE : 16'h4000 : {31:0}\n\
             USER_MODULES: BASE+16\n",
        );
        assert_eq!(tree.builtin_parameters.get("WIDTH").unwrap().value, "32");
        let base = tree.builtin_parameters.get("BASE").unwrap();
        assert_eq!(base.value, "16'h4000");
        assert_eq!(base.bit_width.as_deref(), Some("31:0"));
        assert_eq!(tree.user_modules.base_address.as_deref(), Some("BASE+16"));
    }

    #[test]
    fn module_shapes_and_registers() {
        let tree = parse(
            "USER_MODULES:\n\
             Uart : TRUE : {16'h0, 16'hC}\n\
             \x20   Name: UART\n\
             \x20   Reg0:\n\
             \x20       Name: Data\n\
             \x20       Permissions: RW\n\
             \x20   Reg1:\n\
             \x20       Permissions: read\n\
             Timer : TRUE : AUTO : {N*2} : NOEXPREGS\n\
             Gpio : FALSE : AUTO : 4\n\
             Spi : TRUE : AUTO\n\
             \x20   Reg0:\n\
             \x20   Reg1:\n\
             \x20   Reg2:\n",
        );
        let uart = tree.user_modules.get("Uart").unwrap();
        assert!(uart.enabled);
        assert_eq!(uart.metadata.name.as_deref(), Some("UART"));
        assert_eq!(uart.regs.len(), 2);
        assert_eq!(
            uart.reg("Reg0").unwrap().permissions,
            Some(Permissions::ReadWrite)
        );
        assert_eq!(uart.reg("Reg1").unwrap().permissions, Some(Permissions::Read));

        let timer = tree.user_modules.get("Timer").unwrap();
        assert_eq!(timer.bounds, ModuleBounds::AutoExpr { count: "N*2".into() });
        assert!(timer.metadata.no_expand_regs);

        let gpio = tree.user_modules.get("Gpio").unwrap();
        assert!(!gpio.enabled);
        assert_eq!(gpio.bounds, ModuleBounds::AutoLiteral { count: 4 });

        // Bare AUTO infers its count from the declared registers.
        let spi = tree.user_modules.get("Spi").unwrap();
        assert_eq!(spi.bounds, ModuleBounds::AutoInferred);
        assert_eq!(spi.declared_register_count(), Some(3));
    }

    #[test]
    fn fields_and_bit_bounds() {
        let tree = parse(
            "USER_MODULES:\n\
             Adc : TRUE : AUTO : 1\n\
             \x20   Reg0:\n\
             \x20       Name: Control\n\
             \x20       Field0:\n\
             \x20           Name: Enable\n\
             \x20           Bounds: [0:0]\n\
             \x20       Field1:\n\
             \x20           Name: Gain\n\
             \x20           Bounds: [WIDTH-1:1]\n\
             \x20           Description: Gain select\n",
        );
        let reg = tree.user_modules.get("Adc").unwrap().reg("Reg0").unwrap();
        assert_eq!(reg.name.as_deref(), Some("Control"));
        assert_eq!(reg.fields.len(), 2);
        let gain = reg.field("Field1").unwrap();
        assert_eq!(gain.name.as_deref(), Some("Gain"));
        assert_eq!(
            gain.bounds,
            FieldBounds::Symbolic {
                hi: "WIDTH-1".into(),
                lo: "1".into()
            }
        );
        assert_eq!(gain.description.as_deref(), Some("Gain select"));
    }

    #[test]
    fn description_continuation_lines() {
        let tree = parse(
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   Description: first part \\\n\
             \x20       second part \\\n\
             \x20       third part\n\
             \x20   Reg0:\n",
        );
        let uart = tree.user_modules.get("Uart").unwrap();
        assert_eq!(
            uart.metadata.description.as_deref(),
            Some("first part second part third part")
        );
    }

    #[test]
    fn first_name_wins_for_registers() {
        let tree = parse(
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   Reg0:\n\
             \x20       Name: Original\n\
             \x20       Name: Shadowed\n",
        );
        let reg = tree.user_modules.get("Uart").unwrap().reg("Reg0").unwrap();
        assert_eq!(reg.name.as_deref(), Some("Original"));
    }

    #[test]
    fn repeat_with_flag() {
        let tree = parse(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 2\n\
             \x20   Repeat: CHANNELS : NOEXPREGS\n\
             \x20   Name: DMA engine\n",
        );
        let repeat = tree.user_modules.get("Dma").unwrap().repeat.clone().unwrap();
        assert_eq!(repeat.value, "CHANNELS");
        assert!(repeat.no_expand_regs);
        assert!(repeat.repeat_of.is_none());
    }

    #[test]
    fn repeat_after_content_is_fatal() {
        let err = parse_err(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 2\n\
             \x20   Name: DMA engine\n\
             \x20   Repeat: 4\n",
        );
        assert!(matches!(err, ParseError::RepeatAfterContent { line: 4, .. }));
    }

    #[test]
    fn submodule_blocks_build_qualified_names() {
        let tree = parse(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 2\n\
             \x20   SUBMODULE:\n\
             \x20       Ch : TRUE : AUTO : 3\n\
             \x20           SUBMODULE:\n\
             \x20               Csr : TRUE : AUTO : 1\n\
             \x20       Ctl : TRUE : AUTO : 1\n\
             Uart : TRUE : AUTO : 1\n",
        );
        let names = tree.user_modules.names();
        assert_eq!(names, ["Dma", "Dma::Ch", "Dma::Ch::Csr", "Dma::Ctl", "Uart"]);
        assert_eq!(
            tree.user_modules.get("Dma::Ch").unwrap().submodule_of.as_deref(),
            Some("Dma")
        );
        assert_eq!(
            tree.user_modules
                .get("Dma::Ch::Csr")
                .unwrap()
                .submodule_of
                .as_deref(),
            Some("Dma::Ch")
        );
        assert!(tree.user_modules.get("Uart").unwrap().submodule_of.is_none());
    }

    #[test]
    fn submodule_indent_jump_is_fatal() {
        let err = parse_err(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 2\n\
             \x20       SUBMODULE:\n\
             \x20           Ch : TRUE : AUTO : 1\n",
        );
        assert!(matches!(
            err,
            ParseError::IndentationJump {
                line: 3,
                found: 2,
                anchor: 0
            }
        ));
    }

    #[test]
    fn submodule_block_requires_module_declaration() {
        let err = parse_err(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 2\n\
             \x20   SUBMODULE:\n\
             \x20       Name: not a module\n",
        );
        assert!(matches!(err, ParseError::SubmoduleBlockNotModule { .. }));
    }

    #[test]
    fn tabs_count_as_indentation() {
        let tree = parse(
            "USER_MODULES:\n\
             Dma : TRUE : AUTO : 2\n\
             \tSUBMODULE:\n\
             \t\tCh : TRUE : AUTO : 1\n",
        );
        assert!(tree.user_modules.contains("Dma::Ch"));
    }

    #[test]
    fn unrecognized_line_is_fatal_with_line_number() {
        let err = parse_err(
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   bogus stray token\n",
        );
        match err {
            ParseError::UnrecognizedLine { line, text } => {
                assert_eq!(line, 3);
                assert_eq!(text, "bogus stray token");
            }
            other => panic!("expected UnrecognizedLine, got {other:?}"),
        }
    }

    #[test]
    fn register_redefinition_is_fatal() {
        let err = parse_err(
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 2\n\
             \x20   Reg0:\n\
             \x20   Reg0:\n",
        );
        assert!(matches!(err, ParseError::RegisterRedefined { line: 4, .. }));
    }

    #[test]
    fn unknown_permission_is_fatal() {
        let err = parse_err(
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   Reg0:\n\
             \x20       Permissions: rx\n",
        );
        match err {
            ParseError::UnknownPermission { line, value } => {
                assert_eq!(line, 4);
                assert_eq!(value, "rx");
            }
            other => panic!("expected UnknownPermission, got {other:?}"),
        }
    }

    #[test]
    fn content_before_any_section_is_fatal() {
        let err = parse_err("Uart : TRUE : AUTO : 1\n");
        assert!(matches!(err, ParseError::OutsideSection { line: 1, .. }));
    }

    #[test]
    fn include_splices_metadata_block() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("uart.txt"),
            "@ModuleMetadataBegin\n\
             Name: UART controller\n\
             Description: Serial port\n\
             Reg0:\n\
             Name: Data\n\
             Permissions: RW\n\
             @ModuleMetadataEnd\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("regmap.cfg"),
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   ModuleFile: uart.txt\n",
        )
        .unwrap();

        let tree = parse_file(&dir.path().join("regmap.cfg")).unwrap();
        let uart = tree.user_modules.get("Uart").unwrap();
        assert_eq!(uart.metadata.name.as_deref(), Some("UART controller"));
        assert_eq!(uart.metadata.description.as_deref(), Some("Serial port"));
        assert_eq!(
            uart.metadata.module_filepath.as_deref(),
            Some(dir.path().join("uart.txt").as_path())
        );
        let reg = uart.reg("Reg0").unwrap();
        assert_eq!(reg.name.as_deref(), Some("Data"));
        assert_eq!(reg.permissions, Some(Permissions::ReadWrite));
    }

    #[test]
    fn include_respects_existing_module_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("uart.txt"),
            "@ModuleMetadataBegin\n\
             Name: Included name\n\
             Reg0:\n\
             Name: Data\n\
             @ModuleMetadataEnd\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("regmap.cfg"),
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   Name: Inline name\n\
             \x20   ModuleFile: uart.txt\n",
        )
        .unwrap();

        let tree = parse_file(&dir.path().join("regmap.cfg")).unwrap();
        let uart = tree.user_modules.get("Uart").unwrap();
        assert_eq!(uart.metadata.name.as_deref(), Some("Inline name"));
        assert_eq!(uart.reg("Reg0").unwrap().name.as_deref(), Some("Data"));
    }

    #[test]
    fn include_path_placeholders_use_config_parameters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("modules")).unwrap();
        std::fs::write(
            dir.path().join("modules/uart.txt"),
            "@ModuleMetadataBegin\nName: UART controller\n@ModuleMetadataEnd\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("regmap.cfg"),
            "CONFIG_PARAMETERS:\n\
             Module_Folder : modules\n\
             USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   ModuleFile: {Module_Folder}/uart.txt\n",
        )
        .unwrap();

        let tree = parse_file(&dir.path().join("regmap.cfg")).unwrap();
        let uart = tree.user_modules.get("Uart").unwrap();
        assert_eq!(uart.metadata.name.as_deref(), Some("UART controller"));
    }

    #[test]
    fn include_after_registers_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uart.txt"), "@ModuleMetadataBegin\n@ModuleMetadataEnd\n")
            .unwrap();
        std::fs::write(
            dir.path().join("regmap.cfg"),
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   Reg0:\n\
             \x20   ModuleFile: uart.txt\n",
        )
        .unwrap();

        let err = parse_file(&dir.path().join("regmap.cfg")).unwrap_err();
        assert!(matches!(err, ParseError::IncludeAfterRegisters { line: 4, .. }));
    }

    #[test]
    fn missing_include_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("regmap.cfg"),
            "USER_MODULES:\n\
             Uart : TRUE : AUTO : 1\n\
             \x20   ModuleFile: nowhere.txt\n",
        )
        .unwrap();
        let err = parse_file(&dir.path().join("regmap.cfg")).unwrap_err();
        match err {
            ParseError::IncludeNotFound { line, path } => {
                assert_eq!(line, 3);
                assert_eq!(path, PathBuf::from("nowhere.txt"));
            }
            other => panic!("expected IncludeNotFound, got {other:?}"),
        }
    }
}
