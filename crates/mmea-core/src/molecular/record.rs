//! JSON persistence of assembled cages.
//!
//! A [`CageRecord`] carries everything needed to rebuild a cage without
//! re-running its topology: both units (with their raw structures), the heavy
//! combined structure, and the search state. Loading a record whose key
//! matches a live cage returns that cage instead of a copy.

use super::cage::{Assembled, Cage, CageKey, CageState};
use super::unit::{StructuralUnit, UnitRole};
use crate::core::groups::{FunctionalGroupRegistry, GroupResolver};
use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::structure::{Structure, StructureError};
use crate::core::models::topology::Bond;
use crate::engine::error::RecordError;
use crate::engine::topology::{Assembly, TopologyKind};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub symbol: Element,
    pub position: [f64; 3],
    #[serde(default)]
    pub charge: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotope: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub atoms: Vec<AtomRecord>,
    #[serde(default)]
    pub bonds: Vec<Bond>,
}

impl From<&Structure> for StructureRecord {
    fn from(structure: &Structure) -> Self {
        Self {
            atoms: structure
                .atoms()
                .iter()
                .map(|atom| AtomRecord {
                    symbol: atom.element,
                    position: [atom.position.x, atom.position.y, atom.position.z],
                    charge: atom.charge,
                    isotope: atom.isotope,
                })
                .collect(),
            bonds: structure.bonds().to_vec(),
        }
    }
}

impl StructureRecord {
    /// # Errors
    ///
    /// Returns [`StructureError`] if a bond is invalid for the stored atoms.
    pub fn to_structure(&self) -> Result<Structure, StructureError> {
        let atoms = self
            .atoms
            .iter()
            .map(|record| Atom {
                element: record.symbol,
                charge: record.charge,
                isotope: record.isotope,
                position: Point3::from(record.position),
            })
            .collect();
        Structure::from_parts(atoms, self.bonds.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub role: UnitRole,
    pub source: PathBuf,
    pub functional_group: Option<String>,
    pub structure: StructureRecord,
}

impl From<&StructuralUnit> for UnitRecord {
    fn from(unit: &StructuralUnit) -> Self {
        Self {
            role: unit.role(),
            source: unit.source().to_path_buf(),
            functional_group: unit.functional_group().map(|g| g.name().to_string()),
            structure: unit.raw_structure().into(),
        }
    }
}

/// The persisted form of an assembled cage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CageRecord {
    pub fitness: Option<f64>,
    pub building_blocks: Vec<UnitRecord>,
    pub key: CageKey,
    #[serde(default)]
    pub optimized: bool,
    #[serde(default)]
    pub unscaled_fitness: BTreeMap<String, f64>,
    pub bonder_ids: Vec<usize>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub energy: BTreeMap<String, f64>,
    pub topology: TopologyKind,
    /// The combined heavy structure.
    pub structure: StructureRecord,
    pub bonds_made: usize,
    pub bb_counter: BTreeMap<String, usize>,
    #[serde(default)]
    pub progress_params: Option<Vec<f64>>,
    pub pristine_file: PathBuf,
    pub heavy_file: PathBuf,
}

impl Cage {
    /// Captures the cage and its current search state.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Placeholder`] for placeholder cages.
    pub fn to_record(&self) -> Result<CageRecord, RecordError> {
        let assembled = self.assembled().ok_or(RecordError::Placeholder)?;
        let state = self.state();
        Ok(CageRecord {
            fitness: state.fitness,
            building_blocks: vec![
                assembled.building_block.as_ref().into(),
                assembled.linker.as_ref().into(),
            ],
            key: assembled.key.clone(),
            optimized: state.optimized,
            unscaled_fitness: state.unscaled_fitness,
            bonder_ids: assembled.assembly.bonder_ids.clone(),
            failed: state.failed,
            energy: state.energy,
            topology: assembled.key.topology,
            structure: (&assembled.assembly.heavy).into(),
            bonds_made: assembled.assembly.bonds_made,
            bb_counter: assembled.assembly.unit_counts.clone(),
            progress_params: state.progress_params,
            pristine_file: assembled.pristine_file.clone(),
            heavy_file: assembled.heavy_file.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns [`RecordError::Placeholder`] for placeholder cages.
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(&self.to_record()?)?)
    }

    /// Parses a record (an object, or a list holding exactly one object) and
    /// restores it with the default registry.
    ///
    /// # Errors
    ///
    /// See [`from_record_with`](Self::from_record_with).
    pub fn from_json(text: &str) -> Result<Arc<Self>, RecordError> {
        Self::from_record(CageRecord::from_json(text)?)
    }

    /// # Errors
    ///
    /// See [`from_record_with`](Self::from_record_with).
    pub fn from_record(record: CageRecord) -> Result<Arc<Self>, RecordError> {
        Self::from_record_with(record, FunctionalGroupRegistry::default_registry())
    }

    /// Restores a cage from its record.
    ///
    /// Units are rebuilt through the unit cache and the key is recomputed
    /// from them. If a cage with that key is alive it is returned unchanged;
    /// otherwise a cage is created from the stored values as they are.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the record does not hold exactly one
    /// building block and one linker, names an unknown group, stores a key
    /// that differs from the recomputed one, or has bonder ids that do not
    /// address placeholder atoms of the stored structure.
    #[instrument(skip_all, name = "cage_from_record", fields(topology = %record.topology))]
    pub fn from_record_with(
        record: CageRecord,
        resolver: &dyn GroupResolver,
    ) -> Result<Arc<Self>, RecordError> {
        let building_block = restore_unit(&record, UnitRole::BuildingBlock, resolver)?;
        let linker = restore_unit(&record, UnitRole::Linker, resolver)?;

        let key = CageKey::new(&building_block, &linker, record.topology, resolver);
        if key != record.key {
            return Err(RecordError::KeyMismatch {
                stored: record.key.to_string(),
                computed: key.to_string(),
            });
        }

        let heavy = record.structure.to_structure()?;
        validate_bonder_ids(&record.bonder_ids, &heavy, resolver)?;

        Self::cache().get_or_try_insert_with(key.clone(), || {
            debug!("No live cage for record key; restoring stored values.");
            let state = CageState {
                fitness: record.fitness,
                unscaled_fitness: record.unscaled_fitness,
                optimized: record.optimized,
                failed: record.failed,
                energy: record.energy,
                progress_params: record.progress_params,
            };
            let assembly = Assembly::from_heavy(
                heavy,
                record.bonder_ids,
                record.bonds_made,
                record.bb_counter,
                resolver,
            );
            Ok::<_, RecordError>(Self::from_parts(
                Assembled {
                    building_block,
                    linker,
                    key,
                    assembly,
                    pristine_file: record.pristine_file,
                    heavy_file: record.heavy_file,
                },
                state,
            ))
        })
    }
}

impl CageRecord {
    /// Parses a record stored either as an object or as a list holding
    /// exactly one object.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Json`] for malformed input and
    /// [`RecordError::Composition`] for a list of any other length.
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(text)?;
        let value = match value {
            Value::Array(mut items) => {
                if items.len() != 1 {
                    return Err(RecordError::Composition(format!(
                        "expected a list with exactly one record, found {}",
                        items.len()
                    )));
                }
                items.remove(0)
            }
            other => other,
        };
        Ok(serde_json::from_value(value)?)
    }
}

fn restore_unit(
    record: &CageRecord,
    role: UnitRole,
    resolver: &dyn GroupResolver,
) -> Result<Arc<StructuralUnit>, RecordError> {
    let mut matching = record.building_blocks.iter().filter(|u| u.role == role);
    let (Some(unit), None) = (matching.next(), matching.next()) else {
        return Err(RecordError::Composition(format!(
            "expected exactly one {role} unit among {} building blocks",
            record.building_blocks.len()
        )));
    };

    let group = unit
        .functional_group
        .as_deref()
        .map(|name| {
            resolver
                .by_name(name)
                .ok_or_else(|| RecordError::UnknownGroup(name.to_string()))
        })
        .transpose()?;
    let structure = unit.structure.to_structure()?;
    Ok(StructuralUnit::from_structure(
        &unit.source,
        role,
        structure,
        group,
    ))
}

fn validate_bonder_ids(
    ids: &[usize],
    structure: &Structure,
    resolver: &dyn GroupResolver,
) -> Result<(), RecordError> {
    if !ids.windows(2).all(|w| w[0] < w[1]) {
        return Err(RecordError::InvalidBonderIds(
            "ids must be strictly ascending".to_string(),
        ));
    }
    for &id in ids {
        let atom = structure.atom(id).ok_or_else(|| {
            RecordError::InvalidBonderIds(format!(
                "id {id} is out of range for {} atoms",
                structure.atom_count()
            ))
        })?;
        if resolver.by_heavy(atom.element).is_none() {
            return Err(RecordError::InvalidBonderIds(format!(
                "atom {id} is {}, not a placeholder element",
                atom.element
            )));
        }
    }
    Ok(())
}
