//! Chemistry primitives needed by functional group detection and identity.
//!
//! - [`smarts`] parses the pattern language used by the functional group registry
//! - [`substructure`] finds pattern occurrences in a [`Structure`](crate::core::models::structure::Structure)
//! - [`canonical`] produces the canonical string used as structural identity

pub mod canonical;
pub mod smarts;
pub mod substructure;
