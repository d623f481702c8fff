//! `regmap check`: compile every instance and report problems.

use std::path::Path;

use anyhow::bail;

use crate::discover::discover_instances;
use crate::pipeline::compile_instance;

pub fn run(configs_dir: &Path) -> anyhow::Result<()> {
    let instances = discover_instances(configs_dir)?;
    if instances.is_empty() {
        bail!(
            "no configuration instances found under '{}'",
            configs_dir.display()
        );
    }

    let mut failures = 0;
    for instance in &instances {
        match compile_instance(instance) {
            Ok(compiled) => {
                println!("{}: ok", instance.name);
                for warning in &compiled.warnings {
                    println!("  warning: {warning}");
                }
            }
            Err(error) => {
                failures += 1;
                eprintln!("{}: {error:#}", instance.name);
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} instance(s) failed", instances.len());
    }
    Ok(())
}
