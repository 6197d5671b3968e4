#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const AMINE: &str = "amine/methanetriamine.mol";
pub const ALDEHYDE: &str = "aldehyde/glyoxal.mol";

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

/// A scratch directory holding copies of the fixture molfiles.
///
/// Units resolve their functional group from the source path, so every copy
/// keeps its group directory.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for fixture in [AMINE, ALDEHYDE] {
            copy_into(&data_dir().join(fixture), &dir.path().join(fixture));
        }
        Self { dir }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Copies a fixture to another relative location inside the workspace.
    pub fn copy(&self, fixture: &str, relative: &str) -> PathBuf {
        let target = self.path(relative);
        copy_into(&data_dir().join(fixture), &target);
        target
    }
}

fn copy_into(from: &Path, to: &Path) {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::copy(from, to).unwrap();
}
