//! # MMEA Core Library
//!
//! Building blocks for cage assembly in a molecular evolutionary search:
//! functional group detection, heavy-atom substitution, and cached identity
//! for structural units and the cages assembled from them.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless value types (`Structure`, `Element`),
//!   molfile I/O, the chemistry toolkit (SMARTS-subset patterns, substructure search,
//!   canonical strings) and the functional group registry.
//!
//! - **[`engine`]: The Machinery.** The weak intern tables that give equal construction
//!   arguments one shared object, assembly configuration, error types, and the
//!   polyhedral topologies that place and bond units.
//!
//! - **[`molecular`]: The Public API.** [`StructuralUnit`](molecular::StructuralUnit) and
//!   [`Cage`](molecular::Cage), plus the JSON record that persists a cage and restores it
//!   through the cache.

pub mod core;
pub mod engine;
pub mod molecular;
