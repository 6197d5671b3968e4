use clap::{Args, Parser, Subcommand, ValueEnum};
use mmea::engine::topology::TopologyKind;
use mmea::molecular::UnitRole;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "MMEA Contributors",
    version,
    about = "MMEA CLI - Inspect structural units, assemble cages and manage functional group data.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to a TOML configuration file (functional group registry, assembly settings)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set the number of threads for parallel loading.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load molecule files as structural units and report their functional groups and bonders.
    Inspect(InspectArgs),
    /// Assemble a cage from a building block and a linker.
    Assemble(AssembleArgs),
    /// Restore a cage from a saved JSON record and report it.
    Show(ShowArgs),
    /// List the functional groups and double-bond rules of the active registry.
    Groups,
}

/// Which side of a cage a unit is loaded for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    BuildingBlock,
    Linker,
}

impl From<RoleArg> for UnitRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::BuildingBlock => UnitRole::BuildingBlock,
            RoleArg::Linker => UnitRole::Linker,
        }
    }
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Molfiles to load. The functional group is taken from each file's path.
    #[arg(required = true, num_args = 1.., value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Role the units are loaded for.
    #[arg(short, long, value_enum, default_value_t = RoleArg::BuildingBlock)]
    pub role: RoleArg,
}

/// Arguments for the `assemble` subcommand.
#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Molfile of the building block (three bonders).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub building_block: PathBuf,

    /// Molfile of the linker (two bonders).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub linker: PathBuf,

    /// Cage topology, e.g. 'FourPlusSix' or '8+12'.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub topology: TopologyKind,

    /// Path for the pristine cage molfile. The heavy form is written next to it.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Also save the cage as a JSON record.
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,

    /// Override `assembly.topology-scale` from the config file.
    #[arg(short = 's', long, value_name = "FLOAT")]
    pub topology_scale: Option<f64>,

    /// Skip writing the cage molfiles, overriding the config file.
    #[arg(long)]
    pub no_write: bool,
}

/// Arguments for the `show` subcommand.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// JSON record written by `assemble --record`.
    #[arg(required = true, value_name = "PATH")]
    pub record: PathBuf,
}
