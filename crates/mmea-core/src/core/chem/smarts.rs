//! Parsing of the SMARTS subset used for functional group patterns.
//!
//! Supported syntax:
//!
//! - organic-subset atoms `B C N O P S F Cl Br I` and aromatic `b c n o p s`
//! - bracket atoms with element symbols, isotopes, `#n`, `*`, `a`, `A`, `Dn`,
//!   `Hn`, charges, and the logical operators `!`, `&`, `,` and `;`
//! - bonds `-`, `=`, `#`, `:`, `~` (an omitted bond matches single or aromatic)
//! - branches, ring closures (`1`..`9`, `%nn`) and `.` separated fragments
//!
//! A bracket atom that starts with `H` (`[H]`, `[H+]`) is a hydrogen atom, not a
//! hydrogen count, so explicit hydrogens can be written into patterns.

use crate::core::models::element::Element;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid SMARTS at position {position}: {kind}")]
pub struct SmartsError {
    pub position: usize,
    pub kind: SmartsErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmartsErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("bond or branch without a preceding atom")]
    DanglingBond,
    #[error("unbalanced parentheses")]
    UnbalancedBranch,
    #[error("ring closure {0} is never closed")]
    UnclosedRing(u16),
    #[error("number is out of range")]
    NumberOutOfRange,
    #[error("pattern contains no atoms")]
    Empty,
}

/// A primitive test applied to a single target atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomPrimitive {
    AtomicNum(u8),
    Isotope(u16),
    Aromatic,
    Aliphatic,
    /// Number of explicit connections (`D2`).
    Degree(u8),
    /// Number of attached hydrogen atoms (`H1`). Hydrogens are always explicit
    /// in the structures this crate handles.
    HCount(u8),
    Charge(i8),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomExpr {
    Prim(AtomPrimitive),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondExpr {
    Single,
    Double,
    Triple,
    Aromatic,
    Any,
    /// An unwritten bond between two atoms.
    SingleOrAromatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBond {
    pub atom1: usize,
    pub atom2: usize,
    pub expr: BondExpr,
}

/// A parsed pattern, ready for substructure search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartsPattern {
    source: String,
    atoms: Vec<AtomExpr>,
    bonds: Vec<QueryBond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl SmartsPattern {
    fn new(source: &str, atoms: Vec<AtomExpr>, bonds: Vec<QueryBond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Self {
            source: source.to_string(),
            atoms,
            bonds,
            adjacency,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn atoms(&self) -> &[AtomExpr] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[QueryBond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// `(neighbor, bond index)` pairs of pattern atom `index`.
    pub fn neighbors(&self, index: usize) -> &[(usize, usize)] {
        &self.adjacency[index]
    }
}

impl fmt::Display for SmartsPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for SmartsPattern {
    type Err = SmartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_smarts(s)
    }
}

impl AtomExpr {
    /// Evaluates the expression against atom `index` of `structure`.
    pub fn matches(&self, structure: &Structure, index: usize) -> bool {
        match self {
            AtomExpr::Prim(prim) => prim.matches(structure, index),
            AtomExpr::And(terms) => terms.iter().all(|t| t.matches(structure, index)),
            AtomExpr::Or(terms) => terms.iter().any(|t| t.matches(structure, index)),
            AtomExpr::Not(inner) => !inner.matches(structure, index),
        }
    }
}

fn is_aromatic_atom(structure: &Structure, index: usize) -> bool {
    structure.neighbors(index).iter().any(|&n| {
        structure
            .bond_between(index, n)
            .is_some_and(|b| b.order == BondOrder::Aromatic)
    })
}

impl AtomPrimitive {
    fn matches(&self, structure: &Structure, index: usize) -> bool {
        let Some(atom) = structure.atom(index) else {
            return false;
        };
        match *self {
            AtomPrimitive::AtomicNum(n) => atom.element.atomic_number() == n,
            AtomPrimitive::Isotope(mass) => atom.isotope == Some(mass),
            AtomPrimitive::Aromatic => is_aromatic_atom(structure, index),
            AtomPrimitive::Aliphatic => !is_aromatic_atom(structure, index),
            AtomPrimitive::Degree(d) => structure.degree(index) == usize::from(d),
            AtomPrimitive::HCount(h) => {
                let count = structure
                    .neighbors(index)
                    .iter()
                    .filter(|&&n| structure.atom(n).is_some_and(|a| a.is_hydrogen()))
                    .count();
                count == usize::from(h)
            }
            AtomPrimitive::Charge(c) => atom.charge == c,
            AtomPrimitive::Wildcard => true,
        }
    }
}

impl BondExpr {
    pub fn matches(self, order: BondOrder) -> bool {
        match self {
            BondExpr::Single => order == BondOrder::Single,
            BondExpr::Double => order == BondOrder::Double,
            BondExpr::Triple => order == BondOrder::Triple,
            BondExpr::Aromatic => order == BondOrder::Aromatic,
            BondExpr::Any => true,
            BondExpr::SingleOrAromatic => {
                matches!(order, BondOrder::Single | BondOrder::Aromatic)
            }
        }
    }
}

/// Parses a SMARTS pattern.
///
/// # Errors
///
/// Returns [`SmartsError`] with the byte offset of the offending character.
pub fn parse_smarts(input: &str) -> Result<SmartsPattern, SmartsError> {
    let mut parser = SmartsParser::new(input);
    parser.parse()?;
    if parser.atoms.is_empty() {
        return Err(parser.error(SmartsErrorKind::Empty));
    }
    Ok(SmartsPattern::new(input, parser.atoms, parser.bonds))
}

struct SmartsParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<AtomExpr>,
    bonds: Vec<QueryBond>,
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondExpr>,
    ring_closures: BTreeMap<u16, (usize, Option<BondExpr>)>,
}

impl<'a> SmartsParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            ring_closures: BTreeMap::new(),
        }
    }

    fn error(&self, kind: SmartsErrorKind) -> SmartsError {
        SmartsError {
            position: self.pos,
            kind,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn expect_byte(&mut self) -> Result<u8, SmartsError> {
        self.advance()
            .ok_or_else(|| self.error(SmartsErrorKind::UnexpectedEnd))
    }

    fn set_bond(&mut self, expr: BondExpr) -> Result<(), SmartsError> {
        if self.prev_atom.is_none() {
            return Err(self.error(SmartsErrorKind::DanglingBond));
        }
        self.advance();
        self.pending_bond = Some(expr);
        Ok(())
    }

    fn parse(&mut self) -> Result<(), SmartsError> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    let prev = self
                        .prev_atom
                        .ok_or_else(|| self.error(SmartsErrorKind::DanglingBond))?;
                    self.advance();
                    self.stack.push(prev);
                }
                b')' => {
                    let prev = self
                        .stack
                        .pop()
                        .ok_or_else(|| self.error(SmartsErrorKind::UnbalancedBranch))?;
                    self.advance();
                    self.prev_atom = Some(prev);
                    self.pending_bond = None;
                }
                b'-' => self.set_bond(BondExpr::Single)?,
                b'=' => self.set_bond(BondExpr::Double)?,
                b'#' => self.set_bond(BondExpr::Triple)?,
                b':' => self.set_bond(BondExpr::Aromatic)?,
                b'~' => self.set_bond(BondExpr::Any)?,
                b'.' => {
                    self.advance();
                    self.prev_atom = None;
                    self.pending_bond = None;
                }
                b'%' => {
                    self.advance();
                    let hi = self.expect_digit()?;
                    let lo = self.expect_digit()?;
                    self.handle_ring_closure(u16::from(hi * 10 + lo))?;
                }
                b'0'..=b'9' => {
                    self.advance();
                    self.handle_ring_closure(u16::from(ch - b'0'))?;
                }
                b'[' => {
                    self.advance();
                    let expr = self.parse_bracket_atom()?;
                    self.push_atom(expr);
                }
                b'*' => {
                    self.advance();
                    self.push_atom(AtomExpr::Prim(AtomPrimitive::Wildcard));
                }
                _ => {
                    let expr = self.parse_organic_atom()?;
                    self.push_atom(expr);
                }
            }
        }

        if !self.stack.is_empty() {
            return Err(self.error(SmartsErrorKind::UnbalancedBranch));
        }
        if let Some((&ring, _)) = self.ring_closures.iter().next() {
            return Err(self.error(SmartsErrorKind::UnclosedRing(ring)));
        }
        if self.pending_bond.is_some() {
            return Err(self.error(SmartsErrorKind::UnexpectedEnd));
        }
        Ok(())
    }

    fn expect_digit(&mut self) -> Result<u8, SmartsError> {
        match self.expect_byte()? {
            d @ b'0'..=b'9' => Ok(d - b'0'),
            other => {
                self.pos -= 1;
                Err(self.error(SmartsErrorKind::UnexpectedChar(char::from(other))))
            }
        }
    }

    fn push_atom(&mut self, expr: AtomExpr) {
        let idx = self.atoms.len();
        self.atoms.push(expr);
        if let Some(prev) = self.prev_atom {
            let expr = self
                .pending_bond
                .take()
                .unwrap_or(BondExpr::SingleOrAromatic);
            self.bonds.push(QueryBond {
                atom1: prev,
                atom2: idx,
                expr,
            });
        }
        self.pending_bond = None;
        self.prev_atom = Some(idx);
    }

    fn handle_ring_closure(&mut self, ring: u16) -> Result<(), SmartsError> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.error(SmartsErrorKind::DanglingBond))?;
        let bond = self.pending_bond.take();
        match self.ring_closures.remove(&ring) {
            Some((opener, opening_bond)) => {
                let expr = bond
                    .or(opening_bond)
                    .unwrap_or(BondExpr::SingleOrAromatic);
                self.bonds.push(QueryBond {
                    atom1: opener,
                    atom2: current,
                    expr,
                });
            }
            None => {
                self.ring_closures.insert(ring, (current, bond));
            }
        }
        Ok(())
    }

    fn parse_organic_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        let ch = self.expect_byte()?;
        let (number, aromatic) = match ch {
            b'B' if self.peek() == Some(b'r') => {
                self.advance();
                (35, false)
            }
            b'C' if self.peek() == Some(b'l') => {
                self.advance();
                (17, false)
            }
            b'B' => (5, false),
            b'C' => (6, false),
            b'N' => (7, false),
            b'O' => (8, false),
            b'P' => (15, false),
            b'S' => (16, false),
            b'F' => (9, false),
            b'I' => (53, false),
            b'b' => (5, true),
            b'c' => (6, true),
            b'n' => (7, true),
            b'o' => (8, true),
            b'p' => (15, true),
            b's' => (16, true),
            other => {
                self.pos = start;
                return Err(self.error(SmartsErrorKind::UnexpectedChar(char::from(other))));
            }
        };
        Ok(element_expr(number, Some(aromatic)))
    }

    // Precedence, loosest first: ';' then ',' then '&' (or juxtaposition) then '!'.
    fn parse_bracket_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some(b'H') && !self.starts_two_letter_h() {
            self.advance();
            let mut terms = vec![AtomExpr::Prim(AtomPrimitive::AtomicNum(1))];
            if self.peek() != Some(b']') {
                terms.push(self.parse_low_and()?);
            }
            self.close_bracket()?;
            return Ok(collapse(terms, AtomExpr::And));
        }
        let expr = self.parse_low_and()?;
        self.close_bracket()?;
        Ok(expr)
    }

    /// True when the `H` under the cursor begins He, Hf, Hg, Ho or Hs.
    fn starts_two_letter_h(&self) -> bool {
        matches!(self.peek_at(1), Some(b'e' | b'f' | b'g' | b'o' | b's'))
    }

    fn close_bracket(&mut self) -> Result<(), SmartsError> {
        match self.expect_byte()? {
            b']' => Ok(()),
            other => {
                self.pos -= 1;
                Err(self.error(SmartsErrorKind::UnexpectedChar(char::from(other))))
            }
        }
    }

    fn parse_low_and(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut terms = vec![self.parse_or()?];
        while self.peek() == Some(b';') {
            self.advance();
            terms.push(self.parse_or()?);
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn parse_or(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut terms = vec![self.parse_high_and()?];
        while self.peek() == Some(b',') {
            self.advance();
            terms.push(self.parse_high_and()?);
        }
        Ok(collapse(terms, AtomExpr::Or))
    }

    fn parse_high_and(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut terms = vec![self.parse_not()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.advance();
                    terms.push(self.parse_not()?);
                }
                Some(b']' | b',' | b';') | None => break,
                Some(_) => terms.push(self.parse_not()?),
            }
        }
        Ok(collapse(terms, AtomExpr::And))
    }

    fn parse_not(&mut self) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some(b'!') {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(AtomExpr::Not(Box::new(inner)));
        }
        self.parse_primitive()
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|digits| digits.parse().ok())
    }

    fn parse_small_number(&mut self, default: u8) -> Result<u8, SmartsError> {
        match self.parse_number() {
            None => Ok(default),
            Some(n) => u8::try_from(n).map_err(|_| self.error(SmartsErrorKind::NumberOutOfRange)),
        }
    }

    fn parse_primitive(&mut self) -> Result<AtomExpr, SmartsError> {
        let ch = self
            .peek()
            .ok_or_else(|| self.error(SmartsErrorKind::UnexpectedEnd))?;
        let prim = match ch {
            b'0'..=b'9' => {
                let mass = self.parse_number().unwrap_or(0);
                let mass =
                    u16::try_from(mass).map_err(|_| self.error(SmartsErrorKind::NumberOutOfRange))?;
                AtomPrimitive::Isotope(mass)
            }
            b'#' => {
                self.advance();
                let n = self
                    .parse_number()
                    .ok_or_else(|| self.error(SmartsErrorKind::UnexpectedEnd))?;
                let n = u8::try_from(n).map_err(|_| self.error(SmartsErrorKind::NumberOutOfRange))?;
                AtomPrimitive::AtomicNum(n)
            }
            b'*' => {
                self.advance();
                AtomPrimitive::Wildcard
            }
            b'+' | b'-' => {
                self.advance();
                let sign: i8 = if ch == b'+' { 1 } else { -1 };
                let mut magnitude: i8 = 1;
                if let Some(n) = self.parse_number() {
                    magnitude = i8::try_from(n)
                        .map_err(|_| self.error(SmartsErrorKind::NumberOutOfRange))?;
                } else {
                    while self.peek() == Some(ch) {
                        self.advance();
                        magnitude += 1;
                    }
                }
                AtomPrimitive::Charge(sign * magnitude)
            }
            b'D' if self.peek_at(1) != Some(b'y') => {
                self.advance();
                AtomPrimitive::Degree(self.parse_small_number(1)?)
            }
            b'H' if !self.starts_two_letter_h() => {
                self.advance();
                AtomPrimitive::HCount(self.parse_small_number(1)?)
            }
            b'a' if !matches!(self.peek_at(1), Some(b's')) => {
                self.advance();
                AtomPrimitive::Aromatic
            }
            b'A' if !matches!(self.peek_at(1), Some(b'a'..=b'z')) => {
                self.advance();
                AtomPrimitive::Aliphatic
            }
            b'b' | b'c' | b'n' | b'o' | b'p' | b's' => {
                // "se" and "as" are aromatic selenium and arsenic.
                self.advance();
                let symbol = match (ch, self.peek()) {
                    (b's', Some(b'e')) => {
                        self.advance();
                        "Se"
                    }
                    (b'b', _) => "B",
                    (b'c', _) => "C",
                    (b'n', _) => "N",
                    (b'o', _) => "O",
                    (b'p', _) => "P",
                    _ => "S",
                };
                let element = Element::from_symbol(symbol)
                    .ok_or_else(|| self.error(SmartsErrorKind::UnknownElement(symbol.into())))?;
                return Ok(element_expr(element.atomic_number(), Some(true)));
            }
            b'A'..=b'Z' => {
                self.advance();
                let first = char::from(ch);
                let two_letter = self.peek().filter(u8::is_ascii_lowercase).and_then(|next| {
                    let symbol = format!("{}{}", first, char::from(next));
                    Element::from_symbol(&symbol)
                });
                let element = match two_letter {
                    Some(element) => {
                        self.advance();
                        element
                    }
                    None => Element::from_symbol(&first.to_string()).ok_or_else(|| {
                        self.error(SmartsErrorKind::UnknownElement(first.to_string()))
                    })?,
                };
                return Ok(element_expr(element.atomic_number(), None));
            }
            b'a'..=b'z' if ch == b'a' => {
                // "as": aromatic arsenic
                self.pos += 2;
                return Ok(element_expr(33, Some(true)));
            }
            other => return Err(self.error(SmartsErrorKind::UnexpectedChar(char::from(other)))),
        };
        Ok(AtomExpr::Prim(prim))
    }
}

fn element_expr(number: u8, aromatic: Option<bool>) -> AtomExpr {
    let element = AtomExpr::Prim(AtomPrimitive::AtomicNum(number));
    match aromatic {
        None => element,
        Some(true) => AtomExpr::And(vec![element, AtomExpr::Prim(AtomPrimitive::Aromatic)]),
        Some(false) => AtomExpr::And(vec![element, AtomExpr::Prim(AtomPrimitive::Aliphatic)]),
    }
}

fn collapse(mut terms: Vec<AtomExpr>, join: fn(Vec<AtomExpr>) -> AtomExpr) -> AtomExpr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}
