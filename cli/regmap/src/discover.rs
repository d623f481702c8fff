//! Configuration-instance discovery.
//!
//! A configs directory holds one subdirectory per instance; an instance is
//! any subdirectory containing an accepted config file name. Plain files
//! and directories without a config file are ignored.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

/// Accepted config file names, tried in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["regmap.cfg", "regmap.txt"];

/// One discovered configuration instance.
#[derive(Debug, Clone)]
pub struct InstanceDir {
    pub name: String,
    pub config_path: PathBuf,
}

/// Enumerate instance directories under `configs_dir`, sorted by name.
pub fn discover_instances(configs_dir: &Path) -> anyhow::Result<Vec<InstanceDir>> {
    if !configs_dir.is_dir() {
        bail!("configs directory '{}' does not exist", configs_dir.display());
    }
    let mut instances = Vec::new();
    let entries = std::fs::read_dir(configs_dir)
        .with_context(|| format!("reading '{}'", configs_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(config_path) = CONFIG_FILE_NAMES
            .iter()
            .map(|file| path.join(file))
            .find(|candidate| candidate.is_file())
        {
            instances.push(InstanceDir {
                name: name.to_string(),
                config_path,
            });
        }
    }
    instances.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(instances)
}
