//! # Core Models Module
//!
//! This module contains the value types used to represent molecular structures
//! throughout the library.
//!
//! ## Key Components
//!
//! - [`element`] - Periodic table entries (H through Rn) addressed by symbol or number
//! - [`atom`] - Individual atoms with element, formal charge, isotope, and coordinates
//! - [`topology`] - Bonds and bond orders
//! - [`structure`] - An ordered, bonded collection of atoms with value semantics
//! - [`builder`] - Serial-keyed construction used by the file readers
//!
//! ## Usage
//!
//! ```ignore
//! use mmea::core::models::{atom::Atom, element::Element, structure::Structure};
//! use mmea::core::models::topology::{Bond, BondOrder};
//!
//! let atoms = vec![
//!     Atom::new(Element::O, Point3::origin()),
//!     Atom::new(Element::H, Point3::new(0.96, 0.0, 0.0)),
//! ];
//! let water_fragment = Structure::from_parts(atoms, vec![Bond::new(0, 1, BondOrder::Single)])?;
//! ```

pub mod atom;
pub mod builder;
pub mod element;
pub mod structure;
pub mod topology;
