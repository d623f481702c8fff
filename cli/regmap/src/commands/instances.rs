//! `regmap instances`: list discovered configuration instances.

use std::path::Path;

use anyhow::bail;

use crate::discover::discover_instances;
use crate::pipeline::{code_folder, compile_instance};

pub fn run(configs_dir: &Path) -> anyhow::Result<()> {
    let instances = discover_instances(configs_dir)?;
    if instances.is_empty() {
        bail!(
            "no configuration instances found under '{}'",
            configs_dir.display()
        );
    }
    for instance in &instances {
        let file = instance
            .config_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match compile_instance(instance) {
            Ok(compiled) => match code_folder(&compiled.tree) {
                Some(folder) => {
                    println!("{}  ({file})  code folder: {folder}", instance.name)
                }
                None => println!("{}  ({file})", instance.name),
            },
            Err(_) => println!("{}  ({file})  [does not compile]", instance.name),
        }
    }
    Ok(())
}
