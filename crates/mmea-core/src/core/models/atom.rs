use super::element::Element;
use nalgebra::Point3;

/// An atom of a molecular structure.
///
/// Atoms carry no identity of their own; the index of an atom inside its
/// [`Structure`](super::structure::Structure) is the stable id used for
/// functional group matching and heavy substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The chemical element of the atom.
    pub element: Element,
    /// The formal charge in elementary charge units.
    pub charge: i8,
    /// The isotope mass number, if one was specified.
    pub isotope: Option<u16>,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    /// Creates a neutral atom with no isotope label.
    pub fn new(element: Element, position: Point3<f64>) -> Self {
        Self {
            element,
            charge: 0,
            isotope: None,
            position,
        }
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_isotope(mut self, isotope: u16) -> Self {
        self.isotope = Some(isotope);
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == Element::H
    }
}
