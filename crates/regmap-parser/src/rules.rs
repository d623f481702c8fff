//! Line-shape rules.
//!
//! Each rule is a matcher over one trimmed, indentation-normalized line.
//! The parser tries them in a fixed order against its current state; the
//! first match wins, and a line that matches nothing is a syntax error.

use once_cell::sync::Lazy;
use regex::Regex;

use regmap_core::{ModuleSectionId, ParameterSectionId};

/// The `SUBMODULE:` block-introducer keyword.
pub const SUBMODULE_KEYWORD: &str = "SUBMODULE";

/// Identity of a `NAME:` section header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionHeader {
    Parameters(ParameterSectionId),
    Modules(ModuleSectionId),
    Submodule,
}

/// A parameter declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub value: String,
    pub bit_width: Option<String>,
}

/// Bounds portion of a module declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclBounds {
    Explicit { start: String, end: String },
    AutoExpr { count: String },
    AutoLiteral { count: u32 },
    AutoInferred,
}

/// A module declaration line in any of its four shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub name: String,
    pub enabled: bool,
    pub bounds: DeclBounds,
    pub no_expand_regs: bool,
}

static SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s*:\s*(.*)$").expect("section"));

static PARAMETER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\w+)\s*:\s*("[^"]*"|[^\s:]+)\s*,?(?:\s*:\s*\{(\d+:\d+)\})?\s*$"#)
        .expect("parameter")
});

static MODULE_AUTO_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s*:\s*(TRUE|FALSE)\s*:\s*AUTO\s*:\s*\{(.+?)\}\s*(:\s*NOEXPREGS\s*)?$")
        .expect("module auto expr")
});

static MODULE_AUTO_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s*:\s*(TRUE|FALSE)\s*:\s*AUTO\s*:\s*(\d+)\s*(:\s*NOEXPREGS\s*)?$")
        .expect("module auto literal")
});

static MODULE_AUTO_BARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s*:\s*(TRUE|FALSE)\s*:\s*AUTO\s*(:\s*NOEXPREGS\s*)?$")
        .expect("module auto bare")
});

static MODULE_EXPLICIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s*:\s*(TRUE|FALSE)\s*:\s*\{([^}]+)\}\s*(:\s*NOEXPREGS\s*)?$")
        .expect("module explicit")
});

static INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ModuleFile\s*:\s*(.+?)\s*$").expect("include"));

static REGISTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(Reg\d+)\s*:\s*$").expect("register"));

static FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(Field\d+)\s*:\s*$").expect("field"));

static BOUNDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Bounds\s*:\s*\[([^:\]]+):([^\]]+)\]\s*$").expect("bounds"));

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Name\s*:\s*(.+)$").expect("name"));

static DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Description\s*:\s*(.+)$").expect("description"));

static PERMISSIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Permissions\s*:\s*(.+?)\s*$").expect("permissions"));

static REPEAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Repeat\s*:\s*([^:]+?)\s*(:\s*NOEXPREGS\s*)?$").expect("repeat")
});

/// Match a section header with a known name. Returns the header and the
/// rest of the line (a base-address expression, possibly empty).
pub fn match_section(text: &str) -> Option<(SectionHeader, String)> {
    let captures = SECTION.captures(text)?;
    let name = &captures[1];
    let remainder = captures[2].trim().to_string();
    let header = match name {
        "BUILTIN_PARAMETERS" => SectionHeader::Parameters(ParameterSectionId::Builtin),
        "USER_PARAMETERS" => SectionHeader::Parameters(ParameterSectionId::User),
        "CONFIG_PARAMETERS" => SectionHeader::Parameters(ParameterSectionId::Config),
        "BUILTIN_MODULES" => SectionHeader::Modules(ModuleSectionId::Builtin),
        "USER_MODULES" => SectionHeader::Modules(ModuleSectionId::User),
        SUBMODULE_KEYWORD => SectionHeader::Submodule,
        _ => return None,
    };
    Some((header, remainder))
}

/// Match a parameter declaration. Quoted values keep their content with the
/// quotes stripped; a trailing comma on the value is dropped.
pub fn match_parameter(text: &str) -> Option<ParamDecl> {
    let captures = PARAMETER.captures(text)?;
    let raw = captures[2].trim_end_matches(',');
    let value = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string();
    Some(ParamDecl {
        name: captures[1].to_string(),
        value,
        bit_width: captures.get(3).map(|m| m.as_str().to_string()),
    })
}

/// Match a module declaration in any of its four shapes. Returns `Err` with
/// the bounds text when the explicit shape does not have exactly two
/// comma-separated elements.
pub fn match_module(text: &str) -> Option<Result<ModuleDecl, String>> {
    if let Some(captures) = MODULE_AUTO_EXPR.captures(text) {
        return Some(Ok(ModuleDecl {
            name: captures[1].to_string(),
            enabled: &captures[2] == "TRUE",
            bounds: DeclBounds::AutoExpr {
                count: captures[3].trim().to_string(),
            },
            no_expand_regs: captures.get(4).is_some(),
        }));
    }
    if let Some(captures) = MODULE_AUTO_LITERAL.captures(text) {
        let count: u32 = match captures[3].parse() {
            Ok(count) => count,
            Err(_) => return Some(Err(captures[3].to_string())),
        };
        return Some(Ok(ModuleDecl {
            name: captures[1].to_string(),
            enabled: &captures[2] == "TRUE",
            bounds: DeclBounds::AutoLiteral { count },
            no_expand_regs: captures.get(4).is_some(),
        }));
    }
    if let Some(captures) = MODULE_AUTO_BARE.captures(text) {
        return Some(Ok(ModuleDecl {
            name: captures[1].to_string(),
            enabled: &captures[2] == "TRUE",
            bounds: DeclBounds::AutoInferred,
            no_expand_regs: captures.get(3).is_some(),
        }));
    }
    if let Some(captures) = MODULE_EXPLICIT.captures(text) {
        let parts: Vec<&str> = captures[3].split(',').collect();
        if parts.len() != 2 {
            return Some(Err(captures[3].to_string()));
        }
        return Some(Ok(ModuleDecl {
            name: captures[1].to_string(),
            enabled: &captures[2] == "TRUE",
            bounds: DeclBounds::Explicit {
                start: parts[0].trim().to_string(),
                end: parts[1].trim().to_string(),
            },
            no_expand_regs: captures.get(4).is_some(),
        }));
    }
    None
}

pub fn match_include(text: &str) -> Option<String> {
    INCLUDE.captures(text).map(|c| c[1].to_string())
}

pub fn match_register(text: &str) -> Option<String> {
    REGISTER.captures(text).map(|c| c[1].to_string())
}

/// Whether a line is register-shaped, for include-splice filtering.
pub fn is_register_line(text: &str) -> bool {
    REGISTER.is_match(text.trim())
}

pub fn match_field(text: &str) -> Option<String> {
    FIELD.captures(text).map(|c| c[1].to_string())
}

pub fn match_bounds(text: &str) -> Option<(String, String)> {
    BOUNDS
        .captures(text)
        .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
}

pub fn match_name(text: &str) -> Option<String> {
    NAME.captures(text).map(|c| c[1].trim_end().to_string())
}

/// Whether a line is name-shaped, for include-splice filtering.
pub fn is_name_line(text: &str) -> bool {
    NAME.is_match(text.trim())
}

pub fn match_description(text: &str) -> Option<String> {
    DESCRIPTION.captures(text).map(|c| c[1].trim_end().to_string())
}

/// Whether a line is description-shaped, for include-splice filtering.
pub fn is_description_line(text: &str) -> bool {
    DESCRIPTION.is_match(text.trim())
}

pub fn match_permissions(text: &str) -> Option<String> {
    PERMISSIONS.captures(text).map(|c| c[1].to_string())
}

/// Match a `Repeat: <expr>` line; the flag marks a trailing `NOEXPREGS`.
pub fn match_repeat(text: &str) -> Option<(String, bool)> {
    REPEAT
        .captures(text)
        .map(|c| (c[1].trim().to_string(), c.get(2).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_headers_are_known_names_only() {
        let (header, rest) = match_section("USER_MODULES: 16'h4000").unwrap();
        assert_eq!(header, SectionHeader::Modules(ModuleSectionId::User));
        assert_eq!(rest, "16'h4000");

        let (header, rest) = match_section("SUBMODULE:").unwrap();
        assert_eq!(header, SectionHeader::Submodule);
        assert!(rest.is_empty());

        // Not a known section name; must fall through to other rules.
        assert!(match_section("Name: control block").is_none());
    }

    #[test]
    fn parameter_shapes() {
        let p = match_parameter("WIDTH : 32").unwrap();
        assert_eq!((p.name.as_str(), p.value.as_str()), ("WIDTH", "32"));
        assert!(p.bit_width.is_none());

        let p = match_parameter("BASE : 16'h4000 : {31:0}").unwrap();
        assert_eq!(p.value, "16'h4000");
        assert_eq!(p.bit_width.as_deref(), Some("31:0"));

        let p = match_parameter(r#"Code_Folder : "my firmware""#).unwrap();
        assert_eq!(p.value, "my firmware");

        let p = match_parameter("COUNT : 8,").unwrap();
        assert_eq!(p.value, "8");

        assert!(match_parameter("WIDTH : a b").is_none());
    }

    #[test]
    fn module_declaration_shapes() {
        let m = match_module("Uart : TRUE : {16'h0, 16'hC}").unwrap().unwrap();
        assert_eq!(m.name, "Uart");
        assert!(m.enabled);
        assert_eq!(
            m.bounds,
            DeclBounds::Explicit {
                start: "16'h0".into(),
                end: "16'hC".into()
            }
        );
        assert!(!m.no_expand_regs);

        let m = match_module("Timer : FALSE : AUTO : {N*2}").unwrap().unwrap();
        assert!(!m.enabled);
        assert_eq!(m.bounds, DeclBounds::AutoExpr { count: "N*2".into() });

        let m = match_module("Gpio : TRUE : AUTO : 4 : NOEXPREGS").unwrap().unwrap();
        assert_eq!(m.bounds, DeclBounds::AutoLiteral { count: 4 });
        assert!(m.no_expand_regs);

        let m = match_module("Spi : TRUE : AUTO").unwrap().unwrap();
        assert_eq!(m.bounds, DeclBounds::AutoInferred);

        assert!(match_module("Uart : MAYBE : {0, 4}").is_none());
        assert!(match_module("Uart : TRUE : {0, 4, 8}").unwrap().is_err());
    }

    #[test]
    fn body_line_shapes() {
        assert_eq!(match_register("Reg0:").as_deref(), Some("Reg0"));
        assert_eq!(match_register("Reg12 :").as_deref(), Some("Reg12"));
        assert!(match_register("Reg0: extra").is_none());

        assert_eq!(match_field("Field3:").as_deref(), Some("Field3"));
        assert_eq!(
            match_bounds("Bounds : [WIDTH-1:0]"),
            Some(("WIDTH-1".to_string(), "0".to_string()))
        );
        assert_eq!(match_name("Name: Control register").as_deref(), Some("Control register"));
        assert_eq!(match_permissions("Permissions : RW").as_deref(), Some("RW"));

        assert_eq!(match_repeat("Repeat: N+1"), Some(("N+1".to_string(), false)));
        assert_eq!(
            match_repeat("Repeat: 4 : NOEXPREGS"),
            Some(("4".to_string(), true))
        );

        assert_eq!(
            match_include("ModuleFile: {Code_Folder}/uart.txt").as_deref(),
            Some("{Code_Folder}/uart.txt")
        );
    }
}
