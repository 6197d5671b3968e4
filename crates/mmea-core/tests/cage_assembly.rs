mod common;

use common::{ALDEHYDE, AMINE, Workspace};
use mmea::core::groups::FunctionalGroupRegistry;
use mmea::core::io::molfile::MolFile;
use mmea::core::io::traits::MolecularFile;
use mmea::core::models::element::Element;
use mmea::core::models::topology::BondOrder;
use mmea::engine::config::AssemblyConfig;
use mmea::engine::error::{AssemblyError, CageError, RecordError};
use mmea::engine::topology::TopologyKind;
use mmea::molecular::Cage;
use serial_test::serial;
use std::sync::Arc;

fn build(ws: &Workspace, topology: TopologyKind, output: &str) -> Arc<Cage> {
    Cage::build(ws.path(AMINE), ws.path(ALDEHYDE), topology, ws.path(output)).unwrap()
}

fn placeholder_elements() -> [Element; 2] {
    [
        Element::from_symbol("Rh").unwrap(),
        Element::from_symbol("Y").unwrap(),
    ]
}

#[test]
#[serial]
fn four_plus_six_cage_is_fully_bonded() {
    let ws = Workspace::new();
    let cage = build(&ws, TopologyKind::FourPlusSix, "cage.mol");

    let heavy = cage.heavy_structure().unwrap();
    assert_eq!(heavy.atom_count(), 4 * 11 + 6 * 6);
    assert_eq!(heavy.bond_count(), 4 * 10 + 6 * 5 + 12);
    assert_eq!(cage.bonds_made(), 12);
    assert_eq!(cage.bonder_ids().len(), 24);

    let mut counts: Vec<usize> = cage.bb_counter().unwrap().values().copied().collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![4, 6]);

    let [rh, y] = placeholder_elements();
    assert_eq!(heavy.indices_of(rh).len(), 12);
    assert_eq!(heavy.indices_of(y).len(), 12);
    let pristine = cage.pristine_structure().unwrap();
    assert!(pristine.indices_of(rh).is_empty());
    assert!(pristine.indices_of(y).is_empty());
    assert_eq!(pristine.indices_of(Element::N).len(), 12);
}

#[test]
#[serial]
fn new_cage_writes_pristine_and_heavy_files() {
    let ws = Workspace::new();
    let cage = build(&ws, TopologyKind::FourPlusSix, "cage.mol");

    assert_eq!(cage.pristine_file(), Some(ws.path("cage.mol").as_path()));
    assert_eq!(cage.heavy_file(), Some(ws.path("cage_HEAVY.mol").as_path()));

    let (pristine, _) = MolFile::read_from_path(ws.path("cage.mol")).unwrap();
    let (heavy, _) = MolFile::read_from_path(ws.path("cage_HEAVY.mol")).unwrap();
    assert_eq!(pristine.atom_count(), 80);
    assert_eq!(heavy.bond_count(), cage.heavy_structure().unwrap().bond_count());
    let [rh, _] = placeholder_elements();
    assert!(pristine.indices_of(rh).is_empty());
    assert_eq!(heavy.indices_of(rh).len(), 12);
}

#[test]
#[serial]
fn disabled_output_writes_nothing() {
    let ws = Workspace::new();
    let config = AssemblyConfig::builder()
        .write_structures(false)
        .build()
        .unwrap();
    let cage = Cage::build_with(
        ws.path(AMINE),
        ws.path(ALDEHYDE),
        TopologyKind::FourPlusSix,
        ws.path("quiet.mol"),
        FunctionalGroupRegistry::default_registry(),
        &config,
    )
    .unwrap();
    assert_eq!(cage.bonds_made(), 12);
    assert!(!ws.path("quiet.mol").exists());
    assert!(!ws.path("quiet_HEAVY.mol").exists());
}

#[test]
#[serial]
fn equal_inputs_share_one_cage() {
    let ws = Workspace::new();
    let first = build(&ws, TopologyKind::FourPlusSix, "first.mol");
    let second = build(&ws, TopologyKind::FourPlusSix, "second.mol");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(!ws.path("second.mol").exists());

    let larger = build(&ws, TopologyKind::EightPlusTwelve, "larger.mol");
    assert!(!first.same(&larger));
    assert!(!Arc::ptr_eq(&first, &larger));
    assert_eq!(larger.bonds_made(), 24);
    assert!(Arc::ptr_eq(
        first.building_block().unwrap(),
        larger.building_block().unwrap()
    ));
}

#[test]
#[serial]
fn cages_order_by_fitness() {
    let ws = Workspace::new();
    let small = build(&ws, TopologyKind::FourPlusSix, "small.mol");
    let large = build(&ws, TopologyKind::EightPlusTwelve, "large.mol");
    assert!(small.partial_cmp(&large).is_none());

    small.set_fitness(Some(1.0));
    large.set_fitness(Some(2.5));
    assert!(*small < *large);
    large.set_fitness(Some(1.0));
    assert!(*small == *large);
    assert!(!small.same(&large));
}

#[test]
#[serial]
fn swapped_roles_fail_connectivity_check() {
    let ws = Workspace::new();
    let err = Cage::build(
        ws.path(ALDEHYDE),
        ws.path(AMINE),
        TopologyKind::FourPlusSix,
        ws.path("swapped.mol"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CageError::Assembly(AssemblyError::ConnectivityMismatch {
            expected: 3,
            found: 2,
            ..
        })
    ));
    assert!(!ws.path("swapped.mol").exists());
}

#[test]
#[serial]
fn record_of_live_cage_returns_that_cage() {
    let ws = Workspace::new();
    let cage = build(&ws, TopologyKind::FourPlusSix, "cage.mol");
    cage.set_fitness(Some(0.75));

    let json = cage.to_json().unwrap();
    let loaded = Cage::from_json(&json).unwrap();
    assert!(Arc::ptr_eq(&cage, &loaded));

    let as_list = Cage::from_json(&format!("[{json}]")).unwrap();
    assert!(Arc::ptr_eq(&cage, &as_list));
}

#[test]
#[serial]
fn record_restores_stored_values_without_rebuilding() {
    let ws = Workspace::new();
    let cage = build(&ws, TopologyKind::FourPlusSix, "cage.mol");
    cage.update_state(|state| {
        state.optimized = true;
        state.energy.insert("uff".to_string(), -42.5);
    });
    let json = cage.to_json().unwrap();
    let bonder_ids = cage.bonder_ids().to_vec();
    let bb_counter = cage.bb_counter().unwrap().clone();
    let key = cage.key().unwrap().clone();
    drop(cage);

    let restored = Cage::from_json(&json).unwrap();
    assert_eq!(restored.key(), Some(&key));
    assert_eq!(restored.bonds_made(), 12);
    assert_eq!(restored.bonder_ids(), bonder_ids.as_slice());
    assert_eq!(restored.bb_counter(), Some(&bb_counter));
    assert_eq!(restored.heavy_structure().unwrap().atom_count(), 80);
    assert_eq!(restored.pristine_file(), Some(ws.path("cage.mol").as_path()));

    let state = restored.state();
    assert_eq!(state.fitness, None);
    assert!(state.unscaled_fitness.is_empty());
    assert!(state.optimized);
    assert_eq!(state.energy.get("uff"), Some(&-42.5));

    let reassembled = Cage::assemble(
        Arc::clone(restored.building_block().unwrap()),
        Arc::clone(restored.linker().unwrap()),
        TopologyKind::FourPlusSix,
        ws.path("again.mol"),
        &AssemblyConfig::default(),
    )
    .unwrap();
    assert!(Arc::ptr_eq(&restored, &reassembled));
    assert!(!ws.path("again.mol").exists());
}

#[test]
#[serial]
fn record_with_wrong_key_is_rejected() {
    let ws = Workspace::new();
    let cage = build(&ws, TopologyKind::FourPlusSix, "cage.mol");
    let mut record = cage.to_record().unwrap();
    record.key.topology = TopologyKind::EightPlusTwelve;

    let err = Cage::from_record(record).unwrap_err();
    assert!(matches!(err, RecordError::KeyMismatch { .. }));
}

#[test]
#[serial]
fn record_with_bad_bonder_ids_is_rejected() {
    let ws = Workspace::new();
    let cage = build(&ws, TopologyKind::FourPlusSix, "cage.mol");

    let mut unsorted = cage.to_record().unwrap();
    unsorted.bonder_ids.reverse();
    assert!(matches!(
        Cage::from_record(unsorted),
        Err(RecordError::InvalidBonderIds(_))
    ));

    let mut wrong_atom = cage.to_record().unwrap();
    let carbon = wrong_atom
        .structure
        .atoms
        .iter()
        .position(|atom| atom.symbol == Element::C)
        .unwrap();
    wrong_atom.bonder_ids = vec![carbon];
    assert!(matches!(
        Cage::from_record(wrong_atom),
        Err(RecordError::InvalidBonderIds(_))
    ));

    assert!(matches!(
        Cage::from_json("[]"),
        Err(RecordError::Composition(_))
    ));
}

#[test]
#[serial]
fn cache_reset_builds_a_fresh_cage() {
    let ws = Workspace::new();
    let before = build(&ws, TopologyKind::FourPlusSix, "before.mol");

    let snapshot = Cage::cache().clear();
    let after = build(&ws, TopologyKind::FourPlusSix, "after.mol");
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(before.same(&after));
    assert!(ws.path("after.mol").exists());

    Cage::cache().restore(snapshot);
    let again = build(&ws, TopologyKind::FourPlusSix, "again.mol");
    assert!(Arc::ptr_eq(&before, &again));
}

#[test]
#[serial]
fn bond_rules_are_part_of_cage_identity() {
    let ws = Workspace::new();
    let no_double_bonds = FunctionalGroupRegistry::from_toml_str(
        r#"
[[group]]
name = "amine"
pattern = "[N]([H])[H]"
target = "N"
heavy = "Rh"

[[group]]
name = "aldehyde"
pattern = "C(=O)[H]"
target = "C"
heavy = "Y"
"#,
    )
    .unwrap();

    let standard = build(&ws, TopologyKind::FourPlusSix, "double.mol");
    let single = Cage::build_with(
        ws.path(AMINE),
        ws.path(ALDEHYDE),
        TopologyKind::FourPlusSix,
        ws.path("single.mol"),
        &no_double_bonds,
        &AssemblyConfig::default(),
    )
    .unwrap();

    assert!(Arc::ptr_eq(
        standard.building_block().unwrap(),
        single.building_block().unwrap()
    ));
    assert!(!Arc::ptr_eq(&standard, &single));
    assert!(!standard.same(&single));
    assert_eq!(standard.key().unwrap().joining_order, BondOrder::Double);
    assert_eq!(single.key().unwrap().joining_order, BondOrder::Single);

    let doubles = |cage: &Cage| {
        let heavy = cage.heavy_structure().unwrap();
        heavy
            .bonds()
            .iter()
            .filter(|b| b.order == BondOrder::Double)
            .count()
    };
    assert_eq!(doubles(&standard), 24);
    assert_eq!(doubles(&single), 12);
}
