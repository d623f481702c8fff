//! Line-oriented parser for regmap configuration files.
//!
//! Turns the raw text of one configuration instance into a symbolic
//! [`regmap_core::ConfigTree`]. Bounds, counts, and field widths stay as
//! expression text; resolution and expansion happen downstream. Every
//! error carries the offending line's number and text; there is no
//! silent-skip path for unrecognized input.

mod error;
mod include;
mod parser;
mod rules;

pub use error::{ParseError, Result};
pub use include::{METADATA_BEGIN, METADATA_END};
pub use parser::{parse_file, parse_str, INDENT_UNIT};
