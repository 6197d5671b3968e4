//! Functional group registry.
//!
//! The registry is an ordered table of functional groups (name, substructure
//! pattern, target element, heavy placeholder element) plus the heavy element
//! pairs that are joined by double bonds. The default table is embedded in the
//! library and parsed on first use; custom tables can be loaded from TOML.

pub mod registry;

pub use registry::{
    FunctionalGroupInfo, FunctionalGroupRegistry, GroupKey, GroupResolution, GroupResolver,
    RegistryError,
};

/// Looks up `identifier` in the default registry. See
/// [`FunctionalGroupRegistry::find_group_for_identifier`].
pub fn find_group_for_identifier(identifier: &str) -> Option<&'static FunctionalGroupInfo> {
    FunctionalGroupRegistry::default_registry().find_group_for_identifier(identifier)
}
