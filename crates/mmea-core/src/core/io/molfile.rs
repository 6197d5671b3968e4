use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::builder::{BuildError, StructureBuilder};
use crate::core::models::element::Element;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Header information carried by a molfile besides the connection table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MolfileMetadata {
    pub name: String,
    pub comment: String,
}

#[derive(Debug, Error)]
pub enum MolfileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: MolfileParseErrorKind,
    },
    #[error("Invalid connection table on line {line}: {source}")]
    Structure { line: usize, source: BuildError },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MolfileParseErrorKind {
    #[error("Invalid integer for {field} (value: '{value}')")]
    InvalidInt { field: &'static str, value: String },
    #[error("Invalid float for {field} (value: '{value}')")]
    InvalidFloat { field: &'static str, value: String },
    #[error("Unknown element symbol '{0}'")]
    UnknownElement(String),
    #[error("Unsupported bond type {0} (only 1-4 are supported)")]
    UnsupportedBondType(u8),
    #[error("Line is too short for a {record} record")]
    LineTooShort { record: &'static str },
    #[error("Malformed record: {0}")]
    Malformed(&'static str),
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_int<T: std::str::FromStr>(
    value: &str,
    field: &'static str,
    line: usize,
) -> Result<T, MolfileError> {
    value.parse().map_err(|_| MolfileError::Parse {
        line,
        kind: MolfileParseErrorKind::InvalidInt {
            field,
            value: value.to_string(),
        },
    })
}

fn parse_float(value: &str, field: &'static str, line: usize) -> Result<f64, MolfileError> {
    value.parse().map_err(|_| MolfileError::Parse {
        line,
        kind: MolfileParseErrorKind::InvalidFloat {
            field,
            value: value.to_string(),
        },
    })
}

fn parse_element(symbol: &str, line: usize) -> Result<Element, MolfileError> {
    Element::from_symbol(symbol).ok_or_else(|| MolfileError::Parse {
        line,
        kind: MolfileParseErrorKind::UnknownElement(symbol.to_string()),
    })
}

fn parse_bond_order(code: &str, line: usize) -> Result<BondOrder, MolfileError> {
    let code: u8 = parse_int(code, "bond type", line)?;
    BondOrder::from_molfile_code(code).ok_or(MolfileError::Parse {
        line,
        kind: MolfileParseErrorKind::UnsupportedBondType(code),
    })
}

fn structure_error(line: usize) -> impl Fn(BuildError) -> MolfileError {
    move |source| MolfileError::Structure { line, source }
}

/// MDL molfile reader and writer.
///
/// Both V2000 (fixed columns) and V3000 (`M  V30` records) connection tables
/// are read. Output is always V3000 and contains nothing that varies between
/// runs, so writing the same structure twice yields identical bytes.
pub struct MolFile;

impl MolecularFile for MolFile {
    type Metadata = MolfileMetadata;
    type Error = MolfileError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        if lines.len() < 4 {
            return Err(MolfileError::MissingRecord(
                "header block and counts line".to_string(),
            ));
        }

        let metadata = MolfileMetadata {
            name: lines[0].trim().to_string(),
            comment: lines[2].trim().to_string(),
        };
        let structure = if lines[3].contains("V3000") {
            read_v3000(&lines)?
        } else {
            read_v2000(&lines)?
        };
        Ok((structure, metadata))
    }

    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "{}", metadata.name)?;
        writeln!(writer, "  mmea          3D")?;
        writeln!(writer, "{}", metadata.comment)?;
        writeln!(writer, "  0  0  0     0  0            999 V3000")?;
        writeln!(writer, "M  V30 BEGIN CTAB")?;
        writeln!(
            writer,
            "M  V30 COUNTS {} {} 0 0 0",
            structure.atom_count(),
            structure.bond_count()
        )?;

        writeln!(writer, "M  V30 BEGIN ATOM")?;
        for (i, atom) in structure.atoms().iter().enumerate() {
            write!(
                writer,
                "M  V30 {} {} {:.4} {:.4} {:.4} 0",
                i + 1,
                atom.element.symbol(),
                atom.position.x,
                atom.position.y,
                atom.position.z
            )?;
            if atom.charge != 0 {
                write!(writer, " CHG={}", atom.charge)?;
            }
            if let Some(mass) = atom.isotope {
                write!(writer, " MASS={}", mass)?;
            }
            writeln!(writer)?;
        }
        writeln!(writer, "M  V30 END ATOM")?;

        if structure.bond_count() > 0 {
            writeln!(writer, "M  V30 BEGIN BOND")?;
            for (i, bond) in structure.bonds().iter().enumerate() {
                writeln!(
                    writer,
                    "M  V30 {} {} {} {}",
                    i + 1,
                    bond.order.molfile_code(),
                    bond.atom1 + 1,
                    bond.atom2 + 1
                )?;
            }
            writeln!(writer, "M  V30 END BOND")?;
        }

        writeln!(writer, "M  V30 END CTAB")?;
        writeln!(writer, "M  END")?;
        Ok(())
    }
}

fn read_v2000(lines: &[String]) -> Result<Structure, MolfileError> {
    let counts = &lines[3];
    let num_atoms: usize = parse_int(slice_and_trim(counts, 0, 3), "atom count", 4)?;
    let num_bonds: usize = parse_int(slice_and_trim(counts, 3, 6), "bond count", 4)?;

    let atom_start = 4;
    let bond_start = atom_start + num_atoms;
    if lines.len() < bond_start + num_bonds {
        return Err(MolfileError::Inconsistency(format!(
            "counts line declares {} atoms and {} bonds, but the file ends after line {}",
            num_atoms,
            num_bonds,
            lines.len()
        )));
    }

    let mut builder = StructureBuilder::new();
    for (offset, line) in lines[atom_start..bond_start].iter().enumerate() {
        let line_num = atom_start + offset + 1;
        if line.len() < 34 {
            return Err(MolfileError::Parse {
                line: line_num,
                kind: MolfileParseErrorKind::LineTooShort { record: "atom" },
            });
        }
        let position = Point3::new(
            parse_float(slice_and_trim(line, 0, 10), "x coordinate", line_num)?,
            parse_float(slice_and_trim(line, 10, 20), "y coordinate", line_num)?,
            parse_float(slice_and_trim(line, 20, 30), "z coordinate", line_num)?,
        );
        let element = parse_element(slice_and_trim(line, 31, 34), line_num)?;
        // Legacy charge column: 1=+3, 2=+2, 3=+1, 5=-1, 6=-2, 7=-3.
        let charge = match slice_and_trim(line, 36, 39) {
            "1" => 3,
            "2" => 2,
            "3" => 1,
            "5" => -1,
            "6" => -2,
            "7" => -3,
            _ => 0,
        };
        builder
            .add_atom(offset + 1, Atom::new(element, position).with_charge(charge))
            .map_err(structure_error(line_num))?;
    }

    for (offset, line) in lines[bond_start..bond_start + num_bonds].iter().enumerate() {
        let line_num = bond_start + offset + 1;
        if line.len() < 9 {
            return Err(MolfileError::Parse {
                line: line_num,
                kind: MolfileParseErrorKind::LineTooShort { record: "bond" },
            });
        }
        let a1: usize = parse_int(slice_and_trim(line, 0, 3), "bond atom 1", line_num)?;
        let a2: usize = parse_int(slice_and_trim(line, 3, 6), "bond atom 2", line_num)?;
        let order = parse_bond_order(slice_and_trim(line, 6, 9), line_num)?;
        builder
            .add_bond(a1, a2, order)
            .map_err(structure_error(line_num))?;
    }

    let mut charges_reset = false;
    for (offset, line) in lines[bond_start + num_bonds..].iter().enumerate() {
        let line_num = bond_start + num_bonds + offset + 1;
        if line.starts_with("M  END") {
            break;
        }
        let is_charge = line.starts_with("M  CHG");
        if !is_charge && !line.starts_with("M  ISO") {
            continue;
        }
        // Any CHG property line supersedes the legacy charge column for all atoms.
        if is_charge && !charges_reset {
            for serial in 1..=num_atoms {
                builder.atom_mut(serial).map_err(structure_error(line_num))?.charge = 0;
            }
            charges_reset = true;
        }
        for (serial, value) in property_pairs(line, line_num)? {
            let atom = builder.atom_mut(serial).map_err(structure_error(line_num))?;
            if is_charge {
                atom.charge = parse_int(value, "charge value", line_num)?;
            } else {
                atom.isotope = Some(parse_int(value, "isotope mass", line_num)?);
            }
        }
    }

    Ok(builder.build())
}

/// Splits `M  XXX  n aaa vvv ...` into `(atom serial, value)` pairs.
fn property_pairs(line: &str, line_num: usize) -> Result<Vec<(usize, &str)>, MolfileError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(MolfileError::Parse {
            line: line_num,
            kind: MolfileParseErrorKind::Malformed("property line without an entry count"),
        });
    }
    let count: usize = parse_int(parts[2], "property entry count", line_num)?;
    if parts.len() < 3 + 2 * count {
        return Err(MolfileError::Parse {
            line: line_num,
            kind: MolfileParseErrorKind::Malformed("property line has fewer entries than declared"),
        });
    }
    (0..count)
        .map(|i| {
            let serial = parse_int(parts[3 + 2 * i], "property atom index", line_num)?;
            Ok((serial, parts[4 + 2 * i]))
        })
        .collect()
}

/// Collects logical `M  V30` records, joining lines continued with a trailing `-`.
/// Each record keeps the line number where it starts.
fn v3000_records(lines: &[String]) -> Result<Vec<(usize, String)>, MolfileError> {
    let mut records = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (i, line) in lines.iter().enumerate().skip(4) {
        let line_num = i + 1;
        let line = line.trim_end();
        let Some(content) = line.strip_prefix("M  V30") else {
            if pending.is_none() && line.starts_with("M  END") {
                break;
            }
            continue;
        };
        let content = content.trim_start();
        let (start, mut text) = pending.take().unwrap_or((line_num, String::new()));
        match content.strip_suffix('-') {
            Some(head) => {
                text.push_str(head);
                pending = Some((start, text));
            }
            None => {
                text.push_str(content);
                records.push((start, text));
            }
        }
    }

    if let Some((start, _)) = pending {
        return Err(MolfileError::Parse {
            line: start,
            kind: MolfileParseErrorKind::Malformed("continuation line is never completed"),
        });
    }
    Ok(records)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum V3000Block {
    Outside,
    Atom,
    Bond,
    Other,
}

fn read_v3000(lines: &[String]) -> Result<Structure, MolfileError> {
    let mut builder = StructureBuilder::new();
    let mut counts: Option<(usize, usize)> = None;
    let mut block = V3000Block::Outside;
    let mut bonds_read = 0usize;

    for (line_num, record) in v3000_records(lines)? {
        let parts: Vec<&str> = record.split_whitespace().collect();
        match parts.as_slice() {
            ["BEGIN", "CTAB", ..] | ["END", "CTAB", ..] => {}
            ["COUNTS", atoms, bonds, ..] => {
                counts = Some((
                    parse_int(atoms, "atom count", line_num)?,
                    parse_int(bonds, "bond count", line_num)?,
                ));
            }
            ["BEGIN", "ATOM", ..] => block = V3000Block::Atom,
            ["BEGIN", "BOND", ..] => block = V3000Block::Bond,
            ["BEGIN", ..] => block = V3000Block::Other,
            ["END", ..] => block = V3000Block::Outside,
            _ => match block {
                V3000Block::Atom => {
                    let (serial, atom) = parse_v3000_atom(&parts, line_num)?;
                    builder
                        .add_atom(serial, atom)
                        .map_err(structure_error(line_num))?;
                }
                V3000Block::Bond => {
                    if parts.len() < 4 {
                        return Err(MolfileError::Parse {
                            line: line_num,
                            kind: MolfileParseErrorKind::LineTooShort { record: "bond" },
                        });
                    }
                    let order = parse_bond_order(parts[1], line_num)?;
                    let a1: usize = parse_int(parts[2], "bond atom 1", line_num)?;
                    let a2: usize = parse_int(parts[3], "bond atom 2", line_num)?;
                    builder
                        .add_bond(a1, a2, order)
                        .map_err(structure_error(line_num))?;
                    bonds_read += 1;
                }
                V3000Block::Outside | V3000Block::Other => {}
            },
        }
    }

    let (num_atoms, num_bonds) =
        counts.ok_or_else(|| MolfileError::MissingRecord("M  V30 COUNTS".to_string()))?;
    if builder.atom_count() != num_atoms || bonds_read != num_bonds {
        return Err(MolfileError::Inconsistency(format!(
            "COUNTS declares {} atoms and {} bonds, found {} atoms and {} bonds",
            num_atoms,
            num_bonds,
            builder.atom_count(),
            bonds_read
        )));
    }
    Ok(builder.build())
}

/// Parses `idx symbol x y z aamap [KEY=VALUE ...]`.
fn parse_v3000_atom(parts: &[&str], line_num: usize) -> Result<(usize, Atom), MolfileError> {
    if parts.len() < 6 {
        return Err(MolfileError::Parse {
            line: line_num,
            kind: MolfileParseErrorKind::LineTooShort { record: "atom" },
        });
    }
    let serial: usize = parse_int(parts[0], "atom index", line_num)?;
    let element = parse_element(parts[1], line_num)?;
    let position = Point3::new(
        parse_float(parts[2], "x coordinate", line_num)?,
        parse_float(parts[3], "y coordinate", line_num)?,
        parse_float(parts[4], "z coordinate", line_num)?,
    );

    let mut atom = Atom::new(element, position);
    for part in &parts[6..] {
        if let Some(value) = part.strip_prefix("CHG=") {
            atom.charge = parse_int(value, "CHG", line_num)?;
        } else if let Some(value) = part.strip_prefix("MASS=") {
            atom.isotope = Some(parse_int(value, "MASS", line_num)?);
        }
    }
    Ok((serial, atom))
}
