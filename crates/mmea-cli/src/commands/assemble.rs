use crate::cli::AssembleArgs;
use crate::commands::show::print_cage;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use anyhow::Context;
use mmea::molecular::Cage;
use std::fs;
use tracing::info;

pub fn run(args: AssembleArgs, config: &AppConfig) -> Result<()> {
    let assembly = config.assembly_config(&args)?;
    info!(
        "Assembling {} cage from {:?} and {:?}",
        args.topology, &args.building_block, &args.linker
    );

    let cage = Cage::build_with(
        &args.building_block,
        &args.linker,
        args.topology,
        &args.output,
        config.resolver(),
        &assembly,
    )?;

    println!("Cage assembled.");
    print_cage(&cage);
    if !assembly.write_structures {
        println!("Structure files were not written (disabled by configuration).");
    }

    if let Some(record_path) = &args.record {
        info!("Writing cage record to {:?}", record_path);
        let json = cage.to_json()?;
        fs::write(record_path, json)
            .with_context(|| format!("writing cage record to '{}'", record_path.display()))
            .map_err(CliError::Other)?;
        println!("Record written to: {}", record_path.display());
    }

    Ok(())
}
