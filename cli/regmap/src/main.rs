//! regmap CLI: compile register-map configuration instances.

mod commands;
mod discover;
mod pipeline;
mod report;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "regmap", version, about = "Register-map configuration compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configuration instances found under a configs directory
    Instances {
        /// Directory holding one subdirectory per instance
        #[arg(default_value = ".")]
        configs_dir: PathBuf,
    },
    /// Compile every instance and report errors and warnings
    Check {
        /// Directory holding one subdirectory per instance
        #[arg(default_value = ".")]
        configs_dir: PathBuf,
    },
    /// Print the resolved register address map
    Map {
        /// Directory holding one subdirectory per instance
        #[arg(default_value = ".")]
        configs_dir: PathBuf,
        /// Restrict the report to the user-modules section
        #[arg(long)]
        user_only: bool,
        /// Also write <instance>_registers.txt into each instance directory
        #[arg(long)]
        save: bool,
    },
    /// Export the resolved model as JSON
    Export {
        /// Directory holding one subdirectory per instance
        #[arg(default_value = ".")]
        configs_dir: PathBuf,
        /// Restrict the export to a single instance
        #[arg(long)]
        instance: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Instances { configs_dir } => commands::instances::run(&configs_dir),
        Commands::Check { configs_dir } => commands::check::run(&configs_dir),
        Commands::Map {
            configs_dir,
            user_only,
            save,
        } => commands::map::run(&configs_dir, user_only, save),
        Commands::Export {
            configs_dir,
            instance,
        } => commands::export::run(&configs_dir, instance.as_deref()),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::path::Path;

    use regmap_core::ModuleSectionId;

    use crate::discover::discover_instances;
    use crate::pipeline::{code_folder, compile_instance};
    use crate::report::render_register_map;

    fn write_instance(configs_dir: &Path, name: &str, config: &str) {
        let dir = configs_dir.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("regmap.cfg"), config).unwrap();
    }

    const SOC_CONFIG: &str = "\
# Minimal SoC register map
USER_PARAMETERS:
PORTS : 2
ROM_BASE : 16'h1000

CONFIG_PARAMETERS:
Code_Folder : firmware

BUILTIN_MODULES:
Rom : TRUE : {ROM_BASE, ROM_BASE+12}

USER_MODULES:
Ctrl : TRUE : AUTO : 2
    Name: System control
    SUBMODULE:
        Irq : TRUE : AUTO : 2
        Pwr : TRUE : AUTO : 1
Port : TRUE : AUTO : 1
    Repeat: PORTS
Uart : TRUE : AUTO
    Name: UART
    Reg0:
        Name: Data
        Permissions: RW
    Reg1:
        Name: Status
        Permissions: R
";

    #[test]
    fn discovery_skips_files_and_configless_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(dir.path(), "cpu1", SOC_CONFIG);
        std::fs::create_dir(dir.path().join("no-config")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), "not an instance").unwrap();

        let instances = discover_instances(dir.path()).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "cpu1");
        assert!(instances[0].config_path.ends_with("regmap.cfg"));
    }

    #[test]
    fn full_pipeline_resolves_every_bound() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(dir.path(), "cpu1", SOC_CONFIG);
        let instances = discover_instances(dir.path()).unwrap();
        let compiled = compile_instance(&instances[0]).unwrap();

        assert_eq!(code_folder(&compiled.tree), Some("firmware"));

        let rom = compiled
            .tree
            .module_section(ModuleSectionId::Builtin)
            .get("Rom")
            .unwrap();
        assert_eq!(rom.bounds.resolved(), Some((0x1000, 0x100C)));

        // Ctrl: 2 native + 3 descendant registers, placed clear of the ROM.
        let modules = compiled.tree.module_section(ModuleSectionId::User);
        let ctrl = modules.get("Ctrl").unwrap();
        assert_eq!(ctrl.bounds.resolved(), Some((0, 16)));
        assert_eq!(ctrl.registers, Some(5));
        assert_eq!(ctrl.subregisters, Some(3));
        assert_eq!(modules.get("Ctrl::Irq").unwrap().bounds.resolved(), Some((8, 12)));
        assert_eq!(modules.get("Ctrl::Pwr").unwrap().bounds.resolved(), Some((16, 16)));

        // Repeat clones follow the template contiguously.
        assert_eq!(modules.get("Port").unwrap().bounds.resolved(), Some((20, 20)));
        assert_eq!(modules.get("Port_1").unwrap().bounds.resolved(), Some((24, 24)));
        assert_eq!(modules.get("Port_2").unwrap().bounds.resolved(), Some((28, 28)));

        // Inferred count: two declared registers.
        assert_eq!(modules.get("Uart").unwrap().bounds.resolved(), Some((32, 36)));
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn report_places_submodules_inside_parent_span() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(dir.path(), "cpu1", SOC_CONFIG);
        let instances = discover_instances(dir.path()).unwrap();
        let compiled = compile_instance(&instances[0]).unwrap();

        let report = render_register_map(&compiled, false);
        assert!(report.contains("Instance: cpu1"));
        assert!(report.contains("Section: BUILTIN_MODULES"));
        assert!(report.contains("-> Module: System control (Ctrl)"));
        assert!(report.contains("- Bounds: 'h0000 to 'h0010"));
        assert!(report.contains("(Ctrl::Irq)"));
        assert!(report.contains("- Bounds: 'h0008 to 'h000C"));
        assert!(report.contains("-> Reg0: Data"));
        assert!(report.contains("- Permissions: R/W"));

        let user_only = render_register_map(&compiled, true);
        assert!(!user_only.contains("BUILTIN_MODULES"));
        assert!(user_only.contains("USER_MODULES"));
    }

    #[test]
    fn map_save_writes_register_file() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(dir.path(), "cpu1", SOC_CONFIG);
        commands::map::run(dir.path(), false, true).unwrap();
        let saved = dir.path().join("cpu1/cpu1_registers.txt");
        assert!(saved.is_file());
        let content = std::fs::read_to_string(saved).unwrap();
        assert!(content.contains("Register Address Map"));
    }

    #[test]
    fn check_reports_each_instance_independently() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(dir.path(), "good", SOC_CONFIG);
        write_instance(dir.path(), "bad", "USER_MODULES:\nstray nonsense line\n");

        // One failing instance fails the run as a whole...
        let err = commands::check::run(dir.path()).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));

        // ...but the good instance still compiles on its own.
        let instances = discover_instances(dir.path()).unwrap();
        let good = instances.iter().find(|i| i.name == "good").unwrap();
        assert!(compile_instance(good).is_ok());
    }

    #[test]
    fn export_contains_no_symbolic_bounds() {
        let dir = tempfile::tempdir().unwrap();
        write_instance(dir.path(), "cpu1", SOC_CONFIG);
        let instances = discover_instances(dir.path()).unwrap();
        let compiled = compile_instance(&instances[0]).unwrap();

        let json = serde_json::to_string(&compiled.tree).unwrap();
        assert!(!json.contains("Explicit"));
        assert!(!json.contains("Symbolic"));
        assert!(json.contains("Resolved"));

        let map_json = serde_json::to_string(&compiled.submodule_map).unwrap();
        assert!(map_json.contains("Ctrl::Irq"));
    }

    #[test]
    fn instances_command_requires_at_least_one() {
        let dir = tempfile::tempdir().unwrap();
        let err = commands::instances::run(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no configuration instances"));
    }
}
