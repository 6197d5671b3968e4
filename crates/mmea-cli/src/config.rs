use crate::cli::AssembleArgs;
use crate::error::{CliError, Result};
use mmea::core::groups::{FunctionalGroupRegistry, GroupResolver};
use mmea::engine::config::AssemblyConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(deny_unknown_fields)]
struct PartialAssemblyConfig {
    #[serde(rename = "topology-scale")]
    topology_scale: Option<f64>,
    #[serde(rename = "write-structures")]
    write_structures: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    registry: Option<PathBuf>,
    assembly: Option<PartialAssemblyConfig>,
}

/// Settings gathered from the optional TOML configuration file.
///
/// ```toml
/// registry = "groups.toml"   # relative to the config file
///
/// [assembly]
/// topology-scale = 1.2
/// write-structures = true
/// ```
#[derive(Debug, Default)]
pub struct AppConfig {
    registry: Option<FunctionalGroupRegistry>,
    assembly: PartialAssemblyConfig,
}

impl AppConfig {
    /// Reads the configuration at `path`, or returns the defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No configuration file given; using defaults.");
            return Ok(Self::default());
        };

        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let partial: PartialAppConfig =
            toml::from_str(&content).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })?;

        let registry = match partial.registry {
            Some(registry_path) => {
                let resolved = match path.parent() {
                    Some(base) if registry_path.is_relative() => base.join(registry_path),
                    _ => registry_path,
                };
                info!("Loading functional group registry from {:?}", resolved);
                Some(FunctionalGroupRegistry::load(&resolved)?)
            }
            None => None,
        };

        Ok(Self {
            registry,
            assembly: partial.assembly.unwrap_or_default(),
        })
    }

    /// The registry named in the config file, or the embedded default.
    pub fn registry(&self) -> &FunctionalGroupRegistry {
        match &self.registry {
            Some(registry) => registry,
            None => FunctionalGroupRegistry::default_registry(),
        }
    }

    pub fn resolver(&self) -> &dyn GroupResolver {
        self.registry()
    }

    /// Merges command line overrides over file values over library defaults.
    pub fn assembly_config(&self, args: &AssembleArgs) -> Result<AssemblyConfig> {
        let mut builder = AssemblyConfig::builder();
        if let Some(scale) = args.topology_scale.or(self.assembly.topology_scale) {
            builder = builder.topology_scale(scale);
        }
        if args.no_write {
            builder = builder.write_structures(false);
        } else if let Some(write) = self.assembly.write_structures {
            builder = builder.write_structures(write);
        }
        Ok(builder.build()?)
    }
}
