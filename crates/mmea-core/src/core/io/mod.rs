//! Provides input/output functionality for molecular file formats.
//!
//! Files are read and written through the [`traits::MolecularFile`] trait. The
//! only format implemented is the MDL molfile ([`molfile::MolFile`]), read in
//! both V2000 and V3000 flavours and always written as V3000.

pub mod molfile;
pub mod traits;
