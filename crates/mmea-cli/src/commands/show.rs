use crate::cli::ShowArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use mmea::molecular::{Cage, CageRecord};
use tracing::info;

pub fn run(args: ShowArgs, config: &AppConfig) -> Result<()> {
    info!("Restoring cage from record {:?}", &args.record);
    let text = std::fs::read_to_string(&args.record)?;
    let record = CageRecord::from_json(&text).map_err(|e| CliError::FileParsing {
        path: args.record.clone(),
        source: e.into(),
    })?;
    let cage = Cage::from_record_with(record, config.resolver())?;
    print_cage(&cage);
    Ok(())
}

/// Prints a short human readable summary of an assembled cage.
pub(crate) fn print_cage(cage: &Cage) {
    let Some(key) = cage.key() else {
        println!("  {cage}");
        return;
    };
    println!("  topology:      {}", key.topology);
    println!("  building block: {}", key.building_block);
    println!("  linker:        {}", key.linker);
    if let Some(heavy) = cage.heavy_structure() {
        println!(
            "  atoms:         {} ({} bonds)",
            heavy.atom_count(),
            heavy.bond_count()
        );
    }
    println!("  bonds made:    {}", cage.bonds_made());
    if let Some(counter) = cage.bb_counter() {
        for (unit, count) in counter {
            println!("  x{count:<3}          {unit}");
        }
    }
    match cage.fitness() {
        Some(fitness) => println!("  fitness:       {fitness:.4}"),
        None => println!("  fitness:       unscored"),
    }
    if let Some(path) = cage.pristine_file() {
        println!("  pristine file: {}", path.display());
    }
    if let Some(path) = cage.heavy_file() {
        println!("  heavy file:    {}", path.display());
    }
}
