use phf::{Map, phf_map};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static SYMBOLS: [&str; 86] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn",
];

static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8,
    "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15,
    "S" => 16, "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22,
    "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29,
    "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43,
    "Ru" => 44, "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50,
    "Sb" => 51, "Te" => 52, "I" => 53, "Xe" => 54, "Cs" => 55, "Ba" => 56, "La" => 57,
    "Ce" => 58, "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62, "Eu" => 63, "Gd" => 64,
    "Tb" => 65, "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70, "Lu" => 71,
    "Hf" => 72, "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78,
    "Au" => 79, "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85,
    "Rn" => 86,
};

/// A chemical element, identified by its atomic number.
///
/// Only elements 1 (H) through 86 (Rn) can be constructed, which covers every
/// organic element as well as the transition metals used as heavy placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElementError {
    #[error("Unknown element symbol '{0}'")]
    UnknownSymbol(String),
    #[error("Atomic number {0} is outside the supported range 1-86")]
    UnsupportedAtomicNumber(u8),
}

impl Element {
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const S: Element = Element(16);

    /// Creates an element from its atomic number.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::UnsupportedAtomicNumber`] for numbers outside 1-86.
    pub fn from_atomic_number(number: u8) -> Result<Self, ElementError> {
        if (1..=SYMBOLS.len() as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ElementError::UnsupportedAtomicNumber(number))
        }
    }

    /// Looks up an element by its case-sensitive symbol (e.g. `"Rh"`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        ATOMIC_NUMBERS.get(symbol).map(|&n| Self(n))
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[usize::from(self.0) - 1]
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s.trim()).ok_or_else(|| ElementError::UnknownSymbol(s.to_string()))
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbol = String::deserialize(deserializer)?;
        symbol.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_and_atomic_number_agree_for_every_element() {
        for number in 1..=86u8 {
            let element = Element::from_atomic_number(number).unwrap();
            assert_eq!(Element::from_symbol(element.symbol()), Some(element));
        }
    }

    #[test]
    fn heavy_placeholders_have_expected_numbers() {
        assert_eq!(Element::from_symbol("Y").unwrap().atomic_number(), 39);
        assert_eq!(Element::from_symbol("Nb").unwrap().atomic_number(), 41);
        assert_eq!(Element::from_symbol("Rh").unwrap().atomic_number(), 45);
        assert_eq!(Element::from_symbol("Ag").unwrap().atomic_number(), 47);
    }

    #[test]
    fn from_str_rejects_unknown_symbols() {
        assert_eq!(
            "Mb".parse::<Element>(),
            Err(ElementError::UnknownSymbol("Mb".to_string()))
        );
        assert!("rh".parse::<Element>().is_err());
    }

    #[test]
    fn out_of_range_atomic_numbers_are_rejected() {
        assert!(Element::from_atomic_number(0).is_err());
        assert!(Element::from_atomic_number(87).is_err());
    }

    #[test]
    fn serializes_as_symbol() {
        let json = serde_json::to_string(&Element::C).unwrap();
        assert_eq!(json, "\"C\"");
        let back: Element = serde_json::from_str("\"Rh\"").unwrap();
        assert_eq!(back.atomic_number(), 45);
    }
}
