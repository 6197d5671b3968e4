//! # Molecular Module
//!
//! The public API of the library: interned structural units, the cages
//! assembled from them, and the JSON record that persists a cage.
//!
//! - [`unit`] - [`StructuralUnit`]: functional group detection and heavy substitution
//! - [`cage`] - [`Cage`]: composition of a building block, a linker and a topology
//! - [`record`] - [`CageRecord`]: persisted cages and their restoration

pub mod cage;
pub mod record;
pub mod unit;

pub use cage::{Cage, CageKey, CageState};
pub use record::{AtomRecord, CageRecord, StructureRecord, UnitRecord};
pub use unit::{StructuralUnit, UnitKey, UnitRole};
