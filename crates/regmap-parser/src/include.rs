//! Module-metadata include files.
//!
//! A `ModuleFile:` directive points at an external file carrying a
//! delimited block of the same `Name:`/`Description:`/`RegN:`-shaped lines
//! a module body uses. The block is scraped and spliced into the remaining
//! line buffer at the directive's position, so its lines parse as if they
//! had been written inline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::rules;

/// Start marker of the metadata block inside an include file.
pub const METADATA_BEGIN: &str = "@ModuleMetadataBegin";
/// End marker of the metadata block inside an include file.
pub const METADATA_END: &str = "@ModuleMetadataEnd";

/// Resolve an include path against the accumulated search directories,
/// falling back to the including file's own directory.
pub fn resolve_include_path(
    base_dir: &Path,
    search_dirs: &[PathBuf],
    include_path: &str,
) -> Option<PathBuf> {
    for dir in search_dirs {
        let candidate = dir.join(include_path);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    let fallback = base_dir.join(include_path);
    fallback.exists().then_some(fallback)
}

/// Read the delimited metadata block from an include file.
///
/// `has_name`/`has_description` suppress `Name:`/`Description:` lines the
/// including module already carries, but only up to the first
/// register-shaped line, so register-level metadata is never filtered out.
pub fn scrape_metadata_block(
    path: &Path,
    has_name: bool,
    has_description: bool,
) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;

    let mut inside_block = false;
    let mut block = Vec::new();
    for line in content.lines() {
        if line.contains(METADATA_BEGIN) {
            inside_block = true;
            continue;
        }
        if line.contains(METADATA_END) {
            break;
        }
        if inside_block {
            block.push(line.to_string());
        }
    }

    let mut inside_register = false;
    let mut filtered = Vec::with_capacity(block.len());
    for line in block {
        if rules::is_register_line(&line) {
            inside_register = true;
        }
        if !inside_register {
            if has_name && rules::is_name_line(&line) {
                continue;
            }
            if has_description && rules::is_description_line(&line) {
                continue;
            }
        }
        filtered.push(line);
    }
    Ok(filtered)
}
