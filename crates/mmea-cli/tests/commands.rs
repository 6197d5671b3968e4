use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn fixture(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../mmea-core/tests/data")
        .join(relative)
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for relative in ["amine/methanetriamine.mol", "aldehyde/glyoxal.mol"] {
        let target = dir.path().join(relative);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::copy(fixture(relative), target).unwrap();
    }
    dir
}

fn mmea(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mmea"))
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn groups_lists_the_default_registry() {
    let output = mmea(&["groups"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("amine"));
    assert!(text.contains("aldehyde"));
    assert!(text.contains("Rh = Y") || text.contains("Y = Rh"));
}

#[test]
fn inspect_reports_bonders_and_writes_heavy_file() {
    let dir = workspace();
    let amine = dir.path().join("amine/methanetriamine.mol");
    let output = mmea(&["inspect", amine.to_str().unwrap()]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("connectivity:  3"));
    assert!(text.contains("bonder ids:    [2, 3, 4]"));
    assert!(dir.path().join("amine/methanetriamine_HEAVY_amine.mol").exists());
}

#[test]
fn assemble_then_show_round_trips_the_record() {
    let dir = workspace();
    let output_path = dir.path().join("cage.mol");
    let record_path = dir.path().join("cage.json");
    let output = mmea(&[
        "assemble",
        "--building-block",
        dir.path().join("amine/methanetriamine.mol").to_str().unwrap(),
        "--linker",
        dir.path().join("aldehyde/glyoxal.mol").to_str().unwrap(),
        "--topology",
        "FourPlusSix",
        "--output",
        output_path.to_str().unwrap(),
        "--record",
        record_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("bonds made:    12"));
    assert!(output_path.exists());
    assert!(dir.path().join("cage_HEAVY.mol").exists());

    let shown = mmea(&["show", record_path.to_str().unwrap()]);
    assert!(shown.status.success(), "{}", String::from_utf8_lossy(&shown.stderr));
    let text = stdout(&shown);
    assert!(text.contains("topology:      FourPlusSix"));
    assert!(text.contains("bonds made:    12"));
    assert!(text.contains("fitness:       unscored"));
}

#[test]
fn unknown_topology_is_a_usage_error() {
    let output = mmea(&[
        "assemble", "-b", "bb.mol", "-l", "lk.mol", "-t", "2+3", "-o", "out.mol",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("2+3"));
}

#[test]
fn missing_input_fails_with_message() {
    let dir = workspace();
    let missing = dir.path().join("amine/absent.mol");
    let output = mmea(&["inspect", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.mol"));
}
