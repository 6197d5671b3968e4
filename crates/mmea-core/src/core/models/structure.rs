use super::atom::Atom;
use super::element::Element;
use super::topology::{Bond, BondOrder};
use crate::core::utils::geometry;
use nalgebra::{Isometry3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Bond references atom index {index}, but the structure has {atom_count} atoms")]
    AtomIndexOutOfRange { index: usize, atom_count: usize },
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Atoms {0} and {1} are already bonded")]
    DuplicateBond(usize, usize),
}

/// An ordered set of atoms with explicit bonds.
///
/// `Structure` is a plain value type: cloning produces an independent deep
/// copy and all geometric transforms return new structures. The order of
/// [`atoms`](Self::atoms) is the order of the source file, and the index of an
/// atom is its stable id.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
}

impl PartialEq for Structure {
    fn eq(&self, other: &Self) -> bool {
        self.atoms == other.atoms && self.bonds == other.bonds
    }
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a structure from atoms and bonds, validating every bond.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError`] if a bond points outside the atom list,
    /// bonds an atom to itself, or repeats an existing atom pair.
    pub fn from_parts(atoms: Vec<Atom>, bonds: Vec<Bond>) -> Result<Self, StructureError> {
        let mut structure = Self {
            adjacency: vec![Vec::new(); atoms.len()],
            atoms,
            bonds: Vec::with_capacity(bonds.len()),
        };
        for bond in bonds {
            structure.add_bond(bond.atom1, bond.atom2, bond.order)?;
        }
        Ok(structure)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub(crate) fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Indices of the atoms bonded to `index`, in bond insertion order.
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, index: usize) -> usize {
        self.neighbors(index).len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|bond| bond.contains(a) && bond.partner(a) == Some(b))
    }

    pub fn push_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> Result<(), StructureError> {
        let atom_count = self.atoms.len();
        for index in [a, b] {
            if index >= atom_count {
                return Err(StructureError::AtomIndexOutOfRange { index, atom_count });
            }
        }
        if a == b {
            return Err(StructureError::SelfBond(a));
        }
        if self.adjacency[a].contains(&b) {
            return Err(StructureError::DuplicateBond(a, b));
        }
        self.bonds.push(Bond::new(a, b, order));
        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
        Ok(())
    }

    /// Changes the element of one atom. Returns `false` if the index is out of range.
    pub fn set_element(&mut self, index: usize, element: Element) -> bool {
        match self.atoms.get_mut(index) {
            Some(atom) => {
                atom.element = element;
                true
            }
            None => false,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.atoms.iter().map(|atom| atom.position)
    }

    /// The unweighted mean of all atom positions, or `None` for an empty structure.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        geometry::centroid(self.positions())
    }

    /// Returns a copy of the structure with every atom moved by `offset`.
    pub fn translated(&self, offset: &Vector3<f64>) -> Structure {
        let mut moved = self.clone();
        for atom in &mut moved.atoms {
            atom.position += offset;
        }
        moved
    }

    /// Returns a copy of the structure with every position mapped through `isometry`.
    pub fn transformed(&self, isometry: &Isometry3<f64>) -> Structure {
        let mut moved = self.clone();
        for atom in &mut moved.atoms {
            atom.position = isometry * atom.position;
        }
        moved
    }

    /// Appends all atoms and bonds of `other`, returning the index offset of
    /// its first atom inside `self`.
    pub fn extend_from(&mut self, other: &Structure) -> usize {
        let offset = self.atoms.len();
        self.atoms.extend(other.atoms.iter().cloned());
        self.bonds.extend(other.bonds.iter().map(|b| b.offset(offset)));
        self.adjacency.extend(
            other
                .adjacency
                .iter()
                .map(|neighbors| neighbors.iter().map(|n| n + offset).collect()),
        );
        offset
    }

    /// Indices of all atoms whose element is `element`, ascending.
    pub fn indices_of(&self, element: Element) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, atom)| atom.element == element)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Structure {
        let atoms = vec![
            Atom::new(Element::O, Point3::new(0.0, 0.0, 0.0)),
            Atom::new(Element::H, Point3::new(0.96, 0.0, 0.0)),
            Atom::new(Element::H, Point3::new(-0.24, 0.93, 0.0)),
        ];
        let bonds = vec![
            Bond::new(0, 1, BondOrder::Single),
            Bond::new(0, 2, BondOrder::Single),
        ];
        Structure::from_parts(atoms, bonds).unwrap()
    }

    #[test]
    fn from_parts_builds_adjacency() {
        let s = water();
        assert_eq!(s.atom_count(), 3);
        assert_eq!(s.bond_count(), 2);
        assert_eq!(s.neighbors(0), &[1, 2]);
        assert_eq!(s.neighbors(1), &[0]);
        assert_eq!(s.degree(2), 1);
        assert!(s.neighbors(99).is_empty());
    }

    #[test]
    fn from_parts_rejects_invalid_bonds() {
        let atoms = vec![Atom::new(Element::C, Point3::origin())];
        let err = Structure::from_parts(atoms.clone(), vec![Bond::new(0, 1, BondOrder::Single)])
            .unwrap_err();
        assert_eq!(
            err,
            StructureError::AtomIndexOutOfRange {
                index: 1,
                atom_count: 1
            }
        );
        let err =
            Structure::from_parts(atoms, vec![Bond::new(0, 0, BondOrder::Single)]).unwrap_err();
        assert_eq!(err, StructureError::SelfBond(0));
    }

    #[test]
    fn add_bond_rejects_duplicates_in_either_direction() {
        let mut s = water();
        assert_eq!(
            s.add_bond(1, 0, BondOrder::Double),
            Err(StructureError::DuplicateBond(1, 0))
        );
    }

    #[test]
    fn bond_between_is_symmetric() {
        let s = water();
        assert!(s.bond_between(0, 2).is_some());
        assert!(s.bond_between(2, 0).is_some());
        assert!(s.bond_between(1, 2).is_none());
    }

    #[test]
    fn translated_leaves_original_untouched() {
        let s = water();
        let moved = s.translated(&Vector3::new(1.0, -2.0, 0.5));
        assert_eq!(s.atom(0).unwrap().position, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(moved.atom(0).unwrap().position, Point3::new(1.0, -2.0, 0.5));
        assert_eq!(moved.bonds(), s.bonds());
    }

    #[test]
    fn transformed_preserves_internal_distances() {
        use nalgebra::{Translation3, UnitQuaternion};
        let s = water();
        let iso = Isometry3::from_parts(
            Translation3::new(3.0, 0.0, -1.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.2),
        );
        let moved = s.transformed(&iso);
        let d = |st: &Structure, a: usize, b: usize| {
            (st.atom(a).unwrap().position - st.atom(b).unwrap().position).norm()
        };
        assert!((d(&s, 1, 2) - d(&moved, 1, 2)).abs() < 1e-9);
        assert!((moved.atom(0).unwrap().position - Point3::new(3.0, 0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn centroid_is_mean_position() {
        let s = water();
        let c = s.centroid().unwrap();
        assert!((c.x - 0.24).abs() < 1e-12);
        assert!((c.y - 0.31).abs() < 1e-12);
        assert!(Structure::new().centroid().is_none());
    }

    #[test]
    fn extend_from_offsets_bonds_and_adjacency() {
        let mut combined = water();
        let offset = combined.extend_from(&water());
        assert_eq!(offset, 3);
        assert_eq!(combined.atom_count(), 6);
        assert_eq!(combined.bonds()[2], Bond::new(3, 4, BondOrder::Single));
        assert_eq!(combined.neighbors(3), &[4, 5]);
    }

    #[test]
    fn set_element_and_indices_of() {
        let mut s = water();
        assert!(s.set_element(0, Element::S));
        assert!(!s.set_element(7, Element::S));
        assert_eq!(s.indices_of(Element::S), vec![0]);
        assert_eq!(s.indices_of(Element::H), vec![1, 2]);
    }
}
