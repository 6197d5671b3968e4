use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Settings for building cages from structural units.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    /// Multiplier on the vertex to edge-midpoint distance of the topology.
    pub topology_scale: f64,
    /// Whether the pristine and heavy cage structures are written to disk.
    pub write_structures: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            topology_scale: 1.0,
            write_structures: true,
        }
    }
}

impl AssemblyConfig {
    pub fn builder() -> AssemblyConfigBuilder {
        AssemblyConfigBuilder::new()
    }
}

#[derive(Default)]
pub struct AssemblyConfigBuilder {
    topology_scale: Option<f64>,
    write_structures: Option<bool>,
}

impl AssemblyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology_scale(mut self, scale: f64) -> Self {
        self.topology_scale = Some(scale);
        self
    }
    pub fn write_structures(mut self, write: bool) -> Self {
        self.write_structures = Some(write);
        self
    }

    pub fn build(self) -> Result<AssemblyConfig, ConfigError> {
        let defaults = AssemblyConfig::default();
        let topology_scale = self.topology_scale.unwrap_or(defaults.topology_scale);
        if !topology_scale.is_finite() || topology_scale <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "topology_scale",
                reason: format!("expected a positive finite number, got {topology_scale}"),
            });
        }
        Ok(AssemblyConfig {
            topology_scale,
            write_structures: self.write_structures.unwrap_or(defaults.write_structures),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_uses_defaults_for_unset_parameters() {
        let config = AssemblyConfig::builder().build().unwrap();
        assert_eq!(config, AssemblyConfig::default());
        assert_eq!(config.topology_scale, 1.0);
        assert!(config.write_structures);
    }

    #[test]
    fn builder_applies_overrides() {
        let config = AssemblyConfig::builder()
            .topology_scale(1.5)
            .write_structures(false)
            .build()
            .unwrap();
        assert_eq!(config.topology_scale, 1.5);
        assert!(!config.write_structures);
    }

    #[test]
    fn builder_rejects_non_positive_scale() {
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = AssemblyConfig::builder()
                .topology_scale(scale)
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidParameter {
                    name: "topology_scale",
                    ..
                }
            ));
        }
    }
}
