//! # Core Module
//!
//! This module provides the stateless foundation of the library: molecular
//! value types, file I/O, the chemistry toolkit, and the functional group
//! registry.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Elements, atoms, bonds, and structures
//! - **File I/O** ([`io`]) - MDL molfile reading (V2000/V3000) and V3000 writing
//! - **Chemistry** ([`chem`]) - SMARTS-subset patterns, substructure search, canonical strings
//! - **Functional Groups** ([`groups`]) - The registry of substitutable groups and bonding rules
//! - **Utilities** ([`utils`]) - Geometry helpers and derived file naming
//!
//! Nothing in this module holds process-wide mutable state; caching and
//! assembly live in [`crate::engine`].

pub mod chem;
pub mod groups;
pub mod io;
pub mod models;
pub mod utils;
