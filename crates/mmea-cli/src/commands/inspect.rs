use crate::cli::InspectArgs;
use crate::config::AppConfig;
use crate::error::Result;
use mmea::molecular::{StructuralUnit, UnitRole};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn run(args: InspectArgs, config: &AppConfig) -> Result<()> {
    let role = UnitRole::from(args.role);
    info!("Loading {} file(s) as {} units...", args.files.len(), role);
    let units = StructuralUnit::load_many_with(&args.files, role, config.resolver())?;

    for (path, unit) in args.files.iter().zip(&units) {
        println!("{}", path.display());
        print_unit(path, unit);
    }

    let distinct = units.iter().map(Arc::as_ptr).collect::<HashSet<_>>().len();
    if distinct < units.len() {
        println!(
            "{} file(s) resolved to {} distinct unit(s).",
            units.len(),
            distinct
        );
    }
    Ok(())
}

fn print_unit(path: &Path, unit: &StructuralUnit) {
    let group = unit.functional_group().map_or_else(
        || "none".to_string(),
        |g| format!("{} ({} -> {})", g.name(), g.target(), g.heavy()),
    );
    println!("  role:          {}", unit.role());
    println!("  group:         {group}");
    println!(
        "  atoms:         {} ({} bonds)",
        unit.raw_structure().atom_count(),
        unit.raw_structure().bond_count()
    );
    println!("  connectivity:  {}", unit.connectivity());
    println!("  bonder ids:    {:?}", unit.bonder_ids());
    println!("  canonical:     {}", unit.raw_canonical());
    println!("  heavy file:    {}", unit.heavy_file().display());
    if unit.source() != path {
        println!("  interned from: {}", unit.source().display());
    }
    for warning in unit.warnings() {
        println!("  warning:       {warning}");
    }
}
