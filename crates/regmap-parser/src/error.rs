//! Parse errors, each carrying the offending line number.

use std::path::PathBuf;

use regmap_core::ParamError;

/// Errors raised while parsing a configuration file. All are fatal for the
/// instance being parsed; there is no recovery path for malformed input.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unrecognized line: '{text}'")]
    UnrecognizedLine { line: usize, text: String },

    #[error("line {line}: '{text}' appears before any section header")]
    OutsideSection { line: usize, text: String },

    #[error("line {line}: base address is not valid on section {section}")]
    BaseAddressOnParameterSection { line: usize, section: String },

    #[error("line {line}: module bounds must be exactly {{start, end}}: '{text}'")]
    MalformedBounds { line: usize, text: String },

    #[error("line {line}: register '{name}' redefined")]
    RegisterRedefined { line: usize, name: String },

    #[error("line {line}: field '{name}' redefined")]
    FieldRedefined { line: usize, name: String },

    #[error("line {line}: register '{name}' declared outside a module")]
    RegisterOutsideModule { line: usize, name: String },

    #[error("line {line}: field '{name}' declared outside a register")]
    FieldOutsideRegister { line: usize, name: String },

    #[error("line {line}: bit bounds declared outside a field")]
    BoundsOutsideField { line: usize },

    #[error("line {line}: '{text}' has no enclosing module")]
    MetadataOutsideModule { line: usize, text: String },

    #[error("line {line}: permissions declared outside a register")]
    PermissionsOutsideRegister { line: usize },

    #[error("line {line}: unknown permission string '{value}'")]
    UnknownPermission { line: usize, value: String },

    #[error("line {line}: repeat declared outside a module")]
    RepeatOutsideModule { line: usize },

    #[error(
        "line {line}: repeat on module '{module}' must come before its registers, name, and description"
    )]
    RepeatAfterContent { line: usize, module: String },

    #[error("line {line}: submodule block has no enclosing module to attach to")]
    SubmoduleWithoutAnchor { line: usize },

    #[error("line {line}: submodule block skips an indentation level (indent {found}, anchor at {anchor})")]
    IndentationJump {
        line: usize,
        found: usize,
        anchor: usize,
    },

    #[error("line {line}: submodule block must start with a module declaration: '{text}'")]
    SubmoduleBlockNotModule { line: usize, text: String },

    #[error("line {line}: submodule declaration must be indented past its block header")]
    SubmoduleNotIndented { line: usize },

    #[error("line {line}: module include requires an open module")]
    IncludeOutsideModule { line: usize },

    #[error("line {line}: module '{module}' already has registers; include not allowed")]
    IncludeAfterRegisters { line: usize, module: String },

    #[error("line {line}: include file '{path}' not found on the search path")]
    IncludeNotFound { line: usize, path: PathBuf },

    #[error("line {line}: {source}")]
    Placeholder {
        line: usize,
        #[source]
        source: ParamError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
