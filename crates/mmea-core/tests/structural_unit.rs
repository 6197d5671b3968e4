mod common;

use common::{ALDEHYDE, AMINE, Workspace};
use mmea::core::groups::FunctionalGroupRegistry;
use mmea::core::io::molfile::MolFile;
use mmea::core::io::traits::MolecularFile;
use mmea::core::models::element::Element;
use mmea::core::models::structure::Structure;
use mmea::core::models::topology::Bond;
use mmea::engine::error::{UnitError, UnitWarning};
use mmea::molecular::{StructuralUnit, UnitRole};
use serial_test::serial;
use std::fs;
use std::sync::Arc;

fn rhodium() -> Element {
    Element::from_symbol("Rh").unwrap()
}

fn reversed(structure: &Structure) -> Structure {
    let n = structure.atom_count();
    let atoms = structure.atoms().iter().rev().cloned().collect();
    let bonds = structure
        .bonds()
        .iter()
        .map(|b| Bond::new(n - 1 - b.atom1, n - 1 - b.atom2, b.order))
        .collect();
    Structure::from_parts(atoms, bonds).unwrap()
}

#[test]
#[serial]
fn amine_building_block_gets_rhodium_placeholders() {
    let ws = Workspace::new();
    let unit = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();

    assert_eq!(unit.functional_group().unwrap().name(), "amine");
    assert_eq!(unit.connectivity(), 3);
    assert_eq!(unit.bonder_ids(), &[2, 3, 4]);
    assert!(unit.warnings().is_empty());

    let raw = unit.raw_structure();
    let heavy = unit.heavy_structure();
    assert_eq!(heavy.atom_count(), raw.atom_count());
    assert_eq!(heavy.bond_count(), raw.bond_count());
    assert_eq!(heavy.indices_of(rhodium()), vec![2, 3, 4]);
    assert_eq!(raw.indices_of(Element::N), vec![2, 3, 4]);
    assert!(raw.indices_of(rhodium()).is_empty());

    let expected = ws.path("amine/methanetriamine_HEAVY_amine.mol");
    assert_eq!(unit.heavy_file(), expected.as_path());
    let (written, _) = MolFile::read_from_path(&expected).unwrap();
    assert_eq!(&written, heavy);
}

#[test]
#[serial]
fn aldehyde_linker_gets_yttrium_placeholders() {
    let ws = Workspace::new();
    let unit = StructuralUnit::load(ws.path(ALDEHYDE), UnitRole::Linker).unwrap();

    assert_eq!(unit.functional_group().unwrap().name(), "aldehyde");
    assert_eq!(unit.connectivity(), 2);
    assert_eq!(unit.bonder_ids(), &[0, 1]);
    assert_eq!(
        unit.heavy_structure()
            .indices_of(Element::from_symbol("Y").unwrap()),
        vec![0, 1]
    );
    assert_eq!(unit.heavy_structure().indices_of(Element::O), vec![2, 3]);
    assert!(ws.path("aldehyde/glyoxal_HEAVY_aldehyde.mol").exists());
}

#[test]
#[serial]
fn heavy_file_is_rewritten_identically() {
    let ws = Workspace::new();
    let heavy_path = ws.path("amine/methanetriamine_HEAVY_amine.mol");

    let first = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    let first_bytes = fs::read(&heavy_path).unwrap();
    drop(first);

    fs::remove_file(&heavy_path).unwrap();
    let second = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    assert_eq!(fs::read(&heavy_path).unwrap(), first_bytes);
    assert_eq!(second.bonder_ids(), &[2, 3, 4]);
}

#[test]
#[serial]
fn equal_molecules_share_one_unit() {
    let ws = Workspace::new();
    let copy = ws.copy(AMINE, "amine/copy.mol");

    let (raw, _) = MolFile::read_from_path(ws.path(AMINE)).unwrap();
    let permuted = ws.path("amine/permuted.mol");
    MolFile::write_structure_to_path(&reversed(&raw), &permuted).unwrap();

    let original = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    let same_file = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    let from_copy = StructuralUnit::load(&copy, UnitRole::BuildingBlock).unwrap();
    let from_permuted = StructuralUnit::load(&permuted, UnitRole::BuildingBlock).unwrap();

    assert!(Arc::ptr_eq(&original, &same_file));
    assert!(Arc::ptr_eq(&original, &from_copy));
    assert!(Arc::ptr_eq(&original, &from_permuted));
    assert_eq!(from_permuted.source(), ws.path(AMINE).as_path());
    assert!(!ws.path("amine/permuted_HEAVY_amine.mol").exists());

    let as_linker = StructuralUnit::load(ws.path(AMINE), UnitRole::Linker).unwrap();
    assert!(!Arc::ptr_eq(&original, &as_linker));
    assert_eq!(original.heavy_canonical(), as_linker.heavy_canonical());
}

#[test]
#[serial]
fn load_many_interns_repeated_sources() {
    let ws = Workspace::new();
    let path = ws.path(ALDEHYDE);
    let sources = vec![path.clone(); 8];

    let units = StructuralUnit::load_many(&sources, UnitRole::Linker).unwrap();
    assert_eq!(units.len(), 8);
    assert!(units.iter().all(|u| Arc::ptr_eq(u, &units[0])));
    assert_eq!(StructuralUnit::cache().get(units[0].key()).as_ref(), Some(&units[0]));
}

#[test]
#[serial]
fn load_many_reports_the_failing_source() {
    let ws = Workspace::new();
    let sources = vec![ws.path(ALDEHYDE), ws.path("aldehyde/missing.mol")];
    let err = StructuralUnit::load_many(&sources, UnitRole::Linker).unwrap_err();
    match err {
        UnitError::Parse { source_id, .. } => assert!(source_id.ends_with("missing.mol")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
#[serial]
fn unmatched_source_keeps_raw_form() {
    let ws = Workspace::new();
    let plain = ws.copy(ALDEHYDE, "plain/glyoxal.mol");
    let unit = StructuralUnit::load(&plain, UnitRole::Linker).unwrap();

    assert!(unit.functional_group().is_none());
    assert_eq!(unit.connectivity(), 0);
    assert_eq!(unit.heavy_structure(), unit.raw_structure());
    assert_eq!(unit.heavy_canonical(), unit.raw_canonical());
    assert!(matches!(unit.warnings(), [UnitWarning::NoGroupMatched { .. }]));
    assert!(ws.path("plain/glyoxal_HEAVY.mol").exists());
}

#[test]
#[serial]
fn cache_reset_builds_a_fresh_unit() {
    let ws = Workspace::new();
    let before = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();

    let snapshot = StructuralUnit::cache().clear();
    let after = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before, after);

    StructuralUnit::cache().restore(snapshot);
    let restored = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    assert!(Arc::ptr_eq(&before, &restored));
}

#[test]
#[serial]
fn redefined_registry_builds_its_own_unit() {
    let ws = Workspace::new();
    let palladium_amines = FunctionalGroupRegistry::from_toml_str(
        r#"
[[group]]
name = "amine"
pattern = "[N]([H])[H]"
target = "N"
heavy = "Pd"
"#,
    )
    .unwrap();
    let pd = Element::from_symbol("Pd").unwrap();

    let standard = StructuralUnit::load(ws.path(AMINE), UnitRole::BuildingBlock).unwrap();
    let custom =
        StructuralUnit::load_with(ws.path(AMINE), UnitRole::BuildingBlock, &palladium_amines)
            .unwrap();
    assert!(!Arc::ptr_eq(&standard, &custom));
    assert_eq!(standard.heavy_structure().indices_of(rhodium()), vec![2, 3, 4]);
    assert_eq!(custom.heavy_structure().indices_of(pd), vec![2, 3, 4]);
    assert!(custom.heavy_structure().indices_of(rhodium()).is_empty());

    let again =
        StructuralUnit::load_with(ws.path(AMINE), UnitRole::BuildingBlock, &palladium_amines)
            .unwrap();
    assert!(Arc::ptr_eq(&custom, &again));
}
