//! `regmap map`: print (and optionally save) the resolved register map.

use std::path::Path;

use anyhow::{bail, Context};

use crate::discover::discover_instances;
use crate::pipeline::compile_instance;
use crate::report::render_register_map;

pub fn run(configs_dir: &Path, user_only: bool, save: bool) -> anyhow::Result<()> {
    let instances = discover_instances(configs_dir)?;
    if instances.is_empty() {
        bail!(
            "no configuration instances found under '{}'",
            configs_dir.display()
        );
    }
    for instance in &instances {
        let compiled = compile_instance(instance)?;
        for warning in &compiled.warnings {
            eprintln!("warning: {warning}");
        }
        let report = render_register_map(&compiled, user_only);
        println!("{report}");
        if save {
            let out_path = instance
                .config_path
                .parent()
                .unwrap_or(configs_dir)
                .join(format!("{}_registers.txt", instance.name));
            std::fs::write(&out_path, &report)
                .with_context(|| format!("writing '{}'", out_path.display()))?;
            println!("Register map saved to: {}", out_path.display());
        }
    }
    Ok(())
}
