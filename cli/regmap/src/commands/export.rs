//! `regmap export`: serialize the resolved model as JSON.

use std::path::Path;

use anyhow::bail;
use serde_json::json;

use crate::discover::discover_instances;
use crate::pipeline::compile_instance;

pub fn run(configs_dir: &Path, only_instance: Option<&str>) -> anyhow::Result<()> {
    let mut instances = discover_instances(configs_dir)?;
    if let Some(name) = only_instance {
        instances.retain(|instance| instance.name == name);
        if instances.is_empty() {
            bail!("instance '{name}' not found under '{}'", configs_dir.display());
        }
    } else if instances.is_empty() {
        bail!(
            "no configuration instances found under '{}'",
            configs_dir.display()
        );
    }

    let mut export = serde_json::Map::new();
    for instance in &instances {
        let compiled = compile_instance(instance)?;
        export.insert(
            compiled.name.clone(),
            json!({
                "tree": serde_json::to_value(&compiled.tree)?,
                "submodule_map": serde_json::to_value(&compiled.submodule_map)?,
            }),
        );
    }
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}
