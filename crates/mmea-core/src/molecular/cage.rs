use super::unit::{StructuralUnit, UnitKey, UnitRole};
use crate::core::groups::{FunctionalGroupRegistry, GroupResolver};
use crate::core::io::molfile::{MolFile, MolfileMetadata};
use crate::core::io::traits::MolecularFile;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondOrder;
use crate::core::utils::naming::heavy_file_name;
use crate::engine::cache::InternTable;
use crate::engine::config::AssemblyConfig;
use crate::engine::error::{AssemblyError, CageError, UnscoredComparisonError};
use crate::engine::topology::{Assembly, Component, TopologyKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument};

static CAGE_CACHE: OnceLock<InternTable<CageKey, Cage>> = OnceLock::new();

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Identity of an assembled [`Cage`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CageKey {
    pub building_block: UnitKey,
    pub linker: UnitKey,
    pub topology: TopologyKind,
    /// Order of the bonds made between building block and linker bonders.
    pub joining_order: BondOrder,
}

impl CageKey {
    pub(crate) fn new(
        building_block: &StructuralUnit,
        linker: &StructuralUnit,
        topology: TopologyKind,
        resolver: &dyn GroupResolver,
    ) -> Self {
        let joining_order = match (building_block.functional_group(), linker.functional_group()) {
            (Some(bb), Some(lk)) => resolver.bond_order(bb.heavy(), lk.heavy()),
            _ => BondOrder::default(),
        };
        Self {
            building_block: building_block.key().clone(),
            linker: linker.key().clone(),
            topology,
            joining_order,
        }
    }
}

impl fmt::Display for CageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.building_block, self.linker, self.topology, self.joining_order
        )
    }
}

/// Search state attached to a cage; changes over the cage's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CageState {
    pub fitness: Option<f64>,
    pub unscaled_fitness: BTreeMap<String, f64>,
    pub optimized: bool,
    pub failed: bool,
    pub energy: BTreeMap<String, f64>,
    pub progress_params: Option<Vec<f64>>,
}

/// The assembled output of a topology together with its provenance.
#[derive(Debug)]
pub(crate) struct Assembled {
    pub(crate) building_block: Arc<StructuralUnit>,
    pub(crate) linker: Arc<StructuralUnit>,
    pub(crate) key: CageKey,
    pub(crate) assembly: Assembly,
    pub(crate) pristine_file: PathBuf,
    pub(crate) heavy_file: PathBuf,
}

#[derive(Debug)]
pub(crate) enum Composition {
    Assembled(Box<Assembled>),
    /// Bare tokens, used to exercise composition and ordering without chemistry.
    Placeholder {
        building_block: String,
        linker: String,
        topology: String,
    },
}

/// A cage assembled from one building block, one linker and a topology.
///
/// Cages built from equal `(building block, linker, topology)` triples are
/// interned like structural units. Equality and ordering operators compare
/// only [`fitness`](Self::fitness); use [`same`](Self::same) to compare
/// composition and [`Arc::ptr_eq`] to compare identity.
#[derive(Debug)]
pub struct Cage {
    pub(crate) composition: Composition,
    pub(crate) state: RwLock<CageState>,
}

impl Cage {
    /// The process-wide table of live cages.
    pub fn cache() -> &'static InternTable<CageKey, Cage> {
        CAGE_CACHE.get_or_init(InternTable::new)
    }

    /// Builds a cage with the default registry and configuration.
    ///
    /// # Errors
    ///
    /// See [`build_with`](Self::build_with).
    pub fn build(
        building_block: impl AsRef<Path>,
        linker: impl AsRef<Path>,
        topology: TopologyKind,
        output: impl AsRef<Path>,
    ) -> Result<Arc<Self>, CageError> {
        Self::build_with(
            building_block,
            linker,
            topology,
            output,
            FunctionalGroupRegistry::default_registry(),
            &AssemblyConfig::default(),
        )
    }

    /// Loads both units and returns the interned cage for them.
    ///
    /// A new cage writes its pristine structure to `output` and its heavy
    /// structure to `<stem>_HEAVY.<ext>` when `config.write_structures` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CageError::Unit`] if a unit cannot be loaded and
    /// [`CageError::Assembly`] if the topology cannot place or bond them.
    #[instrument(skip_all, name = "cage_build", fields(%topology))]
    pub fn build_with(
        building_block: impl AsRef<Path>,
        linker: impl AsRef<Path>,
        topology: TopologyKind,
        output: impl AsRef<Path>,
        resolver: &dyn GroupResolver,
        config: &AssemblyConfig,
    ) -> Result<Arc<Self>, CageError> {
        let bb = StructuralUnit::load_with(building_block, UnitRole::BuildingBlock, resolver)?;
        let lk = StructuralUnit::load_with(linker, UnitRole::Linker, resolver)?;
        Ok(Self::assemble_with(bb, lk, topology, output, resolver, config)?)
    }

    /// Assembles already loaded units using the default registry's bond rules.
    ///
    /// # Errors
    ///
    /// See [`assemble_with`](Self::assemble_with).
    pub fn assemble(
        building_block: Arc<StructuralUnit>,
        linker: Arc<StructuralUnit>,
        topology: TopologyKind,
        output: impl AsRef<Path>,
        config: &AssemblyConfig,
    ) -> Result<Arc<Self>, AssemblyError> {
        Self::assemble_with(
            building_block,
            linker,
            topology,
            output,
            FunctionalGroupRegistry::default_registry(),
            config,
        )
    }

    /// Returns the live cage for these units, or runs the topology to build one.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] if the topology fails or an output file
    /// cannot be written. Nothing is cached in that case.
    pub fn assemble_with(
        building_block: Arc<StructuralUnit>,
        linker: Arc<StructuralUnit>,
        topology: TopologyKind,
        output: impl AsRef<Path>,
        resolver: &dyn GroupResolver,
        config: &AssemblyConfig,
    ) -> Result<Arc<Self>, AssemblyError> {
        let key = CageKey::new(&building_block, &linker, topology, resolver);
        let output = output.as_ref();

        Self::cache().get_or_try_insert_with(key.clone(), || {
            let bb_label = building_block.key().to_string();
            let lk_label = linker.key().to_string();
            let assembly = topology.build(
                Component {
                    label: &bb_label,
                    heavy: building_block.heavy_structure(),
                    bonders: building_block.bonder_ids(),
                },
                Component {
                    label: &lk_label,
                    heavy: linker.heavy_structure(),
                    bonders: linker.bonder_ids(),
                },
                resolver,
                config,
            )?;

            let pristine_file = output.to_path_buf();
            let heavy_file = heavy_file_name(output, None);
            if config.write_structures {
                write_structure(&assembly.pristine, &pristine_file)?;
                write_structure(&assembly.heavy, &heavy_file)?;
            }
            info!(
                atoms = assembly.heavy.atom_count(),
                bonds_made = assembly.bonds_made,
                "Assembled cage."
            );

            Ok(Self::from_parts(
                Assembled {
                    building_block,
                    linker,
                    key,
                    assembly,
                    pristine_file,
                    heavy_file,
                },
                CageState::default(),
            ))
        })
    }

    pub(crate) fn from_parts(assembled: Assembled, state: CageState) -> Self {
        Self {
            composition: Composition::Assembled(Box::new(assembled)),
            state: RwLock::new(state),
        }
    }

    /// A cage made of bare tokens. It loads nothing and is never cached.
    pub fn placeholder(building_block: &str, linker: &str, topology: &str) -> Self {
        Self {
            composition: Composition::Placeholder {
                building_block: building_block.to_string(),
                linker: linker.to_string(),
                topology: topology.to_string(),
            },
            state: RwLock::new(CageState::default()),
        }
    }

    /// A placeholder with random single-letter tokens and a random fitness in `[0, 1)`.
    pub fn random_placeholder<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut token = || {
            let index = rng.gen_range(0..TOKEN_ALPHABET.len());
            char::from(TOKEN_ALPHABET[index]).to_string()
        };
        let cage = Self::placeholder(&token(), &token(), &token());
        cage.set_fitness(Some(rng.gen_range(0.0..1.0)));
        cage
    }

    /// `true` if both cages have the same building block, linker and topology.
    pub fn same(&self, other: &Self) -> bool {
        match (&self.composition, &other.composition) {
            (Composition::Assembled(a), Composition::Assembled(b)) => a.key == b.key,
            (
                Composition::Placeholder {
                    building_block: bb_a,
                    linker: lk_a,
                    topology: top_a,
                },
                Composition::Placeholder {
                    building_block: bb_b,
                    linker: lk_b,
                    topology: top_b,
                },
            ) => bb_a == bb_b && lk_a == lk_b && top_a == top_b,
            _ => false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.composition, Composition::Placeholder { .. })
    }

    pub(crate) fn assembled(&self) -> Option<&Assembled> {
        match &self.composition {
            Composition::Assembled(assembled) => Some(assembled.as_ref()),
            Composition::Placeholder { .. } => None,
        }
    }

    /// The cache key; `None` for placeholders.
    pub fn key(&self) -> Option<&CageKey> {
        self.assembled().map(|a| &a.key)
    }

    pub fn topology(&self) -> Option<TopologyKind> {
        self.key().map(|k| k.topology)
    }

    pub fn building_block(&self) -> Option<&Arc<StructuralUnit>> {
        self.assembled().map(|a| &a.building_block)
    }

    pub fn linker(&self) -> Option<&Arc<StructuralUnit>> {
        self.assembled().map(|a| &a.linker)
    }

    /// The combined structure with placeholder elements.
    pub fn heavy_structure(&self) -> Option<&Structure> {
        self.assembled().map(|a| &a.assembly.heavy)
    }

    /// The combined structure with every placeholder restored to its target element.
    pub fn pristine_structure(&self) -> Option<&Structure> {
        self.assembled().map(|a| &a.assembly.pristine)
    }

    pub fn bonder_ids(&self) -> &[usize] {
        self.assembled()
            .map(|a| a.assembly.bonder_ids.as_slice())
            .unwrap_or_default()
    }

    pub fn bonds_made(&self) -> usize {
        self.assembled().map_or(0, |a| a.assembly.bonds_made)
    }

    /// How many copies of each unit the topology placed, keyed by unit identity.
    pub fn bb_counter(&self) -> Option<&BTreeMap<String, usize>> {
        self.assembled().map(|a| &a.assembly.unit_counts)
    }

    pub fn pristine_file(&self) -> Option<&Path> {
        self.assembled().map(|a| a.pristine_file.as_path())
    }

    pub fn heavy_file(&self) -> Option<&Path> {
        self.assembled().map(|a| a.heavy_file.as_path())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current search state.
    pub fn state(&self) -> CageState {
        self.read_state().clone()
    }

    /// Runs `update` with exclusive access to the search state.
    pub fn update_state<T>(&self, update: impl FnOnce(&mut CageState) -> T) -> T {
        update(&mut self.write_state())
    }

    pub fn fitness(&self) -> Option<f64> {
        self.read_state().fitness
    }

    pub fn set_fitness(&self, fitness: Option<f64>) {
        self.write_state().fitness = fitness;
    }

    /// Orders two cages by fitness.
    ///
    /// # Errors
    ///
    /// Returns [`UnscoredComparisonError`] if either fitness is unset or NaN.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, UnscoredComparisonError> {
        match (self.fitness(), other.fitness()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or(UnscoredComparisonError),
            _ => Err(UnscoredComparisonError),
        }
    }
}

fn write_structure(structure: &Structure, path: &Path) -> Result<(), AssemblyError> {
    let metadata = MolfileMetadata {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        comment: String::new(),
    };
    MolFile::write_to_path(structure, &metadata, path).map_err(|e| AssemblyError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), "Wrote cage structure.");
    Ok(())
}

impl PartialEq for Cage {
    fn eq(&self, other: &Self) -> bool {
        self.try_cmp(other) == Ok(Ordering::Equal)
    }
}

impl PartialOrd for Cage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for Cage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.composition {
            Composition::Assembled(a) => write!(f, "Cage({})", a.key),
            Composition::Placeholder {
                building_block,
                linker,
                topology,
            } => write!(f, "Cage({building_block}, {linker}, {topology})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scored(token: &str, fitness: f64) -> Cage {
        let cage = Cage::placeholder(token, token, token);
        cage.set_fitness(Some(fitness));
        cage
    }

    #[test]
    fn same_compares_all_three_components() {
        let a = Cage::placeholder("a", "b", "x");
        let b = Cage::placeholder("a", "a", "y");
        let c = Cage::placeholder("a", "a", "y");
        let d = Cage::placeholder("a", "b", "z");

        assert!(!a.same(&b));
        assert!(b.same(&c));
        assert!(c.same(&b));
        assert!(!d.same(&c));
        assert!(!a.same(&d));
    }

    #[test]
    fn comparison_operators_use_fitness() {
        let a = scored("a", 1.0);
        let b = scored("b", 1.0);
        let c = scored("c", 2.0);

        assert!(!(a < b));
        assert!(a <= b);
        assert!(a == b);
        assert!(c > b);
        assert!(c >= a);
        assert!(!a.same(&b));
    }

    #[test]
    fn unscored_cages_cannot_be_ordered() {
        let a = Cage::placeholder("a", "a", "a");
        let b = scored("b", 1.0);
        assert_eq!(a.try_cmp(&b), Err(UnscoredComparisonError));
        assert_eq!(b.try_cmp(&a), Err(UnscoredComparisonError));
        assert!(a.partial_cmp(&b).is_none());
        assert!(a != b);
        assert!(!(a < b) && !(a > b));
    }

    #[test]
    fn random_placeholder_uses_letters_and_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let cage = Cage::random_placeholder(&mut rng);
            let fitness = cage.fitness().unwrap();
            assert!((0.0..1.0).contains(&fitness));
            assert!(cage.is_placeholder());
            assert!(cage.key().is_none());
            let Composition::Placeholder {
                building_block,
                linker,
                ..
            } = &cage.composition
            else {
                panic!("expected a placeholder");
            };
            assert_eq!(building_block.len(), 1);
            assert!(linker.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn state_updates_are_visible() {
        let cage = Cage::placeholder("a", "b", "c");
        cage.update_state(|s| {
            s.optimized = true;
            s.energy.insert("uff".to_string(), -12.5);
        });
        let state = cage.state();
        assert!(state.optimized);
        assert_eq!(state.energy["uff"], -12.5);
        assert!(cage.bonder_ids().is_empty());
        assert_eq!(cage.bonds_made(), 0);
    }
}
