use crate::core::chem::canonical::canonical_string;
use crate::core::chem::substructure::find_matches;
use crate::core::groups::{FunctionalGroupInfo, FunctionalGroupRegistry, GroupKey, GroupResolver};
use crate::core::io::molfile::{MolFile, MolfileMetadata};
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::max_distance_from;
use crate::core::utils::naming::heavy_file_name;
use crate::engine::cache::InternTable;
use crate::engine::error::{UnitError, UnitWarning};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

static UNIT_CACHE: OnceLock<InternTable<UnitKey, StructuralUnit>> = OnceLock::new();

/// The position a unit takes in a cage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    BuildingBlock,
    Linker,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BuildingBlock => "building_block",
            Self::Linker => "linker",
        })
    }
}

/// Identity of a [`StructuralUnit`]: two units with equal keys are the same unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub role: UnitRole,
    /// Definition of the matched functional group, if any.
    pub group: Option<GroupKey>,
    /// Canonical string of the raw structure.
    pub canonical: String,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.role,
            self.group.as_ref().map_or("-", |g| g.name.as_str()),
            self.canonical
        )
    }
}

/// A building block or linker molecule together with its heavy form.
///
/// The heavy form is a copy of the raw structure in which the target atom of
/// every functional group match carries the group's placeholder element
/// instead. Both forms are computed once, when the unit is constructed, and
/// never change afterward.
///
/// Units are interned: loading two sources whose raw structures have the same
/// canonical string (with the same role and functional group definition)
/// yields the same `Arc` for as long as one of them is alive.
#[derive(Debug)]
pub struct StructuralUnit {
    key: UnitKey,
    source: PathBuf,
    raw: Structure,
    functional_group: Option<Arc<FunctionalGroupInfo>>,
    heavy: Structure,
    heavy_canonical: String,
    heavy_file: PathBuf,
    bonder_ids: Vec<usize>,
    warnings: Vec<UnitWarning>,
}

impl PartialEq for StructuralUnit {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for StructuralUnit {}

impl Hash for StructuralUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for StructuralUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.source.display())
    }
}

/// Occurrences of `group`'s pattern in `raw`, one atom list per match.
fn locate(raw: &Structure, group: Option<&FunctionalGroupInfo>) -> Vec<Vec<usize>> {
    group
        .map(|g| find_matches(g.pattern(), raw))
        .unwrap_or_default()
}

impl StructuralUnit {
    /// The process-wide table of live units.
    pub fn cache() -> &'static InternTable<UnitKey, StructuralUnit> {
        UNIT_CACHE.get_or_init(InternTable::new)
    }

    /// Loads a unit using the default functional group registry.
    ///
    /// # Errors
    ///
    /// See [`load_with`](Self::load_with).
    pub fn load(source: impl AsRef<Path>, role: UnitRole) -> Result<Arc<Self>, UnitError> {
        Self::load_with(source, role, FunctionalGroupRegistry::default_registry())
    }

    /// Loads the molfile at `source` and returns the interned unit for it.
    ///
    /// The functional group is chosen by `resolver` from the source path.
    /// When a new unit is constructed, its heavy form is written next to the
    /// source as `<stem>_HEAVY_<group>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::Parse`] if the file cannot be read or parsed and
    /// [`UnitError::Io`] if the heavy form cannot be written.
    #[instrument(
        skip_all,
        name = "structural_unit_load",
        fields(source = %source.as_ref().display(), %role)
    )]
    pub fn load_with(
        source: impl AsRef<Path>,
        role: UnitRole,
        resolver: &dyn GroupResolver,
    ) -> Result<Arc<Self>, UnitError> {
        let source = source.as_ref();
        let source_id = source.to_string_lossy().into_owned();
        let (raw, _) = MolFile::read_from_path(source).map_err(|e| UnitError::Parse {
            source_id: source_id.clone(),
            source: e,
        })?;

        let resolution = resolver.resolve(&source_id);
        let mut warnings = Vec::new();
        match &resolution.chosen {
            Some(chosen) if !resolution.others.is_empty() => {
                warnings.push(UnitWarning::AmbiguousIdentifier {
                    source_id: source_id.clone(),
                    chosen: chosen.name().to_string(),
                    others: resolution.others.clone(),
                });
            }
            _ => {}
        }

        let key = UnitKey {
            role,
            group: resolution.chosen.as_deref().map(FunctionalGroupInfo::key),
            canonical: canonical_string(&raw),
        };
        Self::cache().get_or_try_insert_with(key.clone(), || {
            let unit = Self::construct(key, source, raw, resolution.chosen, warnings);
            unit.write_heavy_file()?;
            Ok(unit)
        })
    }

    /// Builds a unit from an already parsed structure. No heavy file is written.
    pub fn from_structure(
        source: impl AsRef<Path>,
        role: UnitRole,
        structure: Structure,
        group: Option<Arc<FunctionalGroupInfo>>,
    ) -> Arc<Self> {
        let key = UnitKey {
            role,
            group: group.as_deref().map(FunctionalGroupInfo::key),
            canonical: canonical_string(&structure),
        };
        let source = source.as_ref();
        let Ok(unit) = Self::cache().get_or_try_insert_with(key.clone(), || {
            Ok::<_, Infallible>(Self::construct(key, source, structure, group, Vec::new()))
        });
        unit
    }

    /// Loads several units in parallel. Sources with equal identity resolve
    /// to the same `Arc`.
    ///
    /// # Errors
    ///
    /// Returns the first [`UnitError`] encountered.
    pub fn load_many<P>(sources: &[P], role: UnitRole) -> Result<Vec<Arc<Self>>, UnitError>
    where
        P: AsRef<Path> + Sync,
    {
        Self::load_many_with(sources, role, FunctionalGroupRegistry::default_registry())
    }

    /// [`load_many`](Self::load_many) with an explicit resolver.
    ///
    /// # Errors
    ///
    /// Returns the first [`UnitError`] encountered.
    pub fn load_many_with<P>(
        sources: &[P],
        role: UnitRole,
        resolver: &dyn GroupResolver,
    ) -> Result<Vec<Arc<Self>>, UnitError>
    where
        P: AsRef<Path> + Sync,
    {
        sources
            .par_iter()
            .map(|source| Self::load_with(source, role, resolver))
            .collect()
    }

    fn construct(
        key: UnitKey,
        source: &Path,
        raw: Structure,
        functional_group: Option<Arc<FunctionalGroupInfo>>,
        mut warnings: Vec<UnitWarning>,
    ) -> Self {
        let source_id = source.to_string_lossy().into_owned();
        if functional_group.is_none() {
            warnings.push(UnitWarning::NoGroupMatched {
                source_id: source_id.clone(),
            });
        }
        for warning in &warnings {
            warn!("{}", warning);
        }

        let matches = locate(&raw, functional_group.as_deref());
        let (heavy, bonder_ids) = generate_heavy_form(&raw, functional_group.as_deref(), &matches);
        let heavy_canonical = canonical_string(&heavy);
        let group_token = functional_group.as_deref().map(FunctionalGroupInfo::file_token);
        let heavy_file = heavy_file_name(source, group_token.as_deref());

        info!(
            atoms = raw.atom_count(),
            group = functional_group.as_deref().map(FunctionalGroupInfo::name),
            matches = matches.len(),
            bonders = bonder_ids.len(),
            "Constructed structural unit."
        );

        Self {
            key,
            source: source.to_path_buf(),
            raw,
            functional_group,
            heavy,
            heavy_canonical,
            heavy_file,
            bonder_ids,
            warnings,
        }
    }

    fn write_heavy_file(&self) -> Result<(), UnitError> {
        let metadata = MolfileMetadata {
            name: self
                .heavy_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            comment: String::new(),
        };
        MolFile::write_to_path(&self.heavy, &metadata, &self.heavy_file).map_err(|e| {
            UnitError::Io {
                path: self.heavy_file.clone(),
                source: e,
            }
        })?;
        debug!(path = %self.heavy_file.display(), "Wrote heavy structure.");
        Ok(())
    }

    pub fn key(&self) -> &UnitKey {
        &self.key
    }

    pub fn role(&self) -> UnitRole {
        self.key.role
    }

    /// The path the unit was first loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn raw_structure(&self) -> &Structure {
        &self.raw
    }

    pub fn raw_canonical(&self) -> &str {
        &self.key.canonical
    }

    pub fn functional_group(&self) -> Option<&FunctionalGroupInfo> {
        self.functional_group.as_deref()
    }

    pub fn heavy_structure(&self) -> &Structure {
        &self.heavy
    }

    pub fn heavy_canonical(&self) -> &str {
        &self.heavy_canonical
    }

    /// Where the heavy form is (or would be) written.
    pub fn heavy_file(&self) -> &Path {
        &self.heavy_file
    }

    pub fn warnings(&self) -> &[UnitWarning] {
        &self.warnings
    }

    /// Every occurrence of the functional group pattern in the raw structure.
    ///
    /// Each inner list holds target atom indices in pattern atom order.
    /// Occurrences covering the same atoms are reported once. Empty when no
    /// group matched the source or the pattern does not occur.
    pub fn locate_functional_group_atoms(&self) -> Vec<Vec<usize>> {
        locate(&self.raw, self.functional_group.as_deref())
    }

    /// Ascending indices of the atoms that carry a placeholder element.
    pub fn bonder_ids(&self) -> &[usize] {
        &self.bonder_ids
    }

    /// How many connections the unit can make: one per substituted atom.
    pub fn connectivity(&self) -> usize {
        self.bonder_ids.len()
    }

    /// A copy of the heavy structure translated by `(dx, dy, dz)`.
    pub fn shift_heavy_coordinates(&self, dx: f64, dy: f64, dz: f64) -> Structure {
        self.heavy.translated(&Vector3::new(dx, dy, dz))
    }

    /// Positions of the heavy structure's atoms in index order.
    pub fn heavy_coordinates(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.heavy.positions()
    }

    /// Centroid of the heavy structure.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        self.heavy.centroid()
    }

    /// Largest distance from the centroid to any heavy atom.
    pub fn heavy_radius(&self) -> f64 {
        self.centroid()
            .map(|c| max_distance_from(self.heavy_coordinates(), &c))
            .unwrap_or(0.0)
    }
}

/// Replaces the target element of `group` by its heavy element at every
/// matched atom, returning the heavy structure and the replaced indices.
fn generate_heavy_form(
    raw: &Structure,
    group: Option<&FunctionalGroupInfo>,
    matches: &[Vec<usize>],
) -> (Structure, Vec<usize>) {
    let mut heavy = raw.clone();
    let Some(group) = group else {
        return (heavy, Vec::new());
    };

    let mut replaced: Vec<usize> = matches
        .iter()
        .flatten()
        .copied()
        .filter(|&i| raw.atom(i).is_some_and(|a| a.element == group.target()))
        .collect();
    replaced.sort_unstable();
    replaced.dedup();
    for &i in &replaced {
        heavy.set_element(i, group.heavy());
    }
    (heavy, replaced)
}
