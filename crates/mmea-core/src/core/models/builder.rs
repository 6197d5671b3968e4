use super::atom::Atom;
use super::structure::{Structure, StructureError};
use super::topology::BondOrder;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Duplicate atom serial: {0}")]
    DuplicateSerial(usize),
    #[error("Bond references unknown atom serial: {0}")]
    UnknownSerial(usize),
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Incrementally builds a [`Structure`] from records that address atoms by
/// file serial numbers rather than by position.
///
/// Atoms keep the order in which they were added; serials only resolve bonds.
#[derive(Debug, Default)]
pub struct StructureBuilder {
    structure: Structure,
    atom_serial_map: HashMap<usize, usize>,
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, serial: usize, atom: Atom) -> Result<&mut Self, BuildError> {
        if self.atom_serial_map.contains_key(&serial) {
            return Err(BuildError::DuplicateSerial(serial));
        }
        let index = self.structure.push_atom(atom);
        self.atom_serial_map.insert(serial, index);
        Ok(self)
    }

    pub fn add_bond(
        &mut self,
        serial1: usize,
        serial2: usize,
        order: BondOrder,
    ) -> Result<&mut Self, BuildError> {
        let idx1 = self.index_of(serial1)?;
        let idx2 = self.index_of(serial2)?;
        self.structure.add_bond(idx1, idx2, order)?;
        Ok(self)
    }

    pub fn atom_mut(&mut self, serial: usize) -> Result<&mut Atom, BuildError> {
        let index = self.index_of(serial)?;
        self.structure
            .atom_mut(index)
            .ok_or(BuildError::UnknownSerial(serial))
    }

    pub fn atom_count(&self) -> usize {
        self.structure.atom_count()
    }

    pub fn build(self) -> Structure {
        self.structure
    }

    fn index_of(&self, serial: usize) -> Result<usize, BuildError> {
        self.atom_serial_map
            .get(&serial)
            .copied()
            .ok_or(BuildError::UnknownSerial(serial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::element::Element;
    use nalgebra::Point3;

    #[test]
    fn bonds_resolve_through_serials() {
        let mut builder = StructureBuilder::new();
        builder
            .add_atom(10, Atom::new(Element::C, Point3::origin()))
            .unwrap()
            .add_atom(20, Atom::new(Element::O, Point3::new(1.2, 0.0, 0.0)))
            .unwrap()
            .add_bond(20, 10, BondOrder::Double)
            .unwrap();
        let structure = builder.build();

        assert_eq!(structure.atom_count(), 2);
        let bond = structure.bonds()[0];
        assert_eq!((bond.atom1, bond.atom2), (1, 0));
        assert_eq!(bond.order, BondOrder::Double);
    }

    #[test]
    fn duplicate_serial_is_rejected() {
        let mut builder = StructureBuilder::new();
        builder
            .add_atom(1, Atom::new(Element::C, Point3::origin()))
            .unwrap();
        let err = builder
            .add_atom(1, Atom::new(Element::N, Point3::origin()))
            .unwrap_err();
        assert_eq!(err, BuildError::DuplicateSerial(1));
    }

    #[test]
    fn unknown_serial_in_bond_is_rejected() {
        let mut builder = StructureBuilder::new();
        builder
            .add_atom(1, Atom::new(Element::C, Point3::origin()))
            .unwrap();
        let err = builder.add_bond(1, 2, BondOrder::Single).unwrap_err();
        assert_eq!(err, BuildError::UnknownSerial(2));
    }

    #[test]
    fn atom_mut_updates_existing_atom() {
        let mut builder = StructureBuilder::new();
        builder
            .add_atom(4, Atom::new(Element::N, Point3::origin()))
            .unwrap();
        builder.atom_mut(4).unwrap().charge = 1;
        assert_eq!(builder.build().atom(0).unwrap().charge, 1);
    }
}
