//! Derived file names for persisted structures.

use std::path::{Path, PathBuf};

/// Inserts `HEAVY` (and the functional group token, if any) before the
/// extension of `source`: `mols/amine3.mol` becomes `mols/amine3_HEAVY_amine.mol`.
///
/// `group` is used as given; see
/// [`FunctionalGroupInfo::file_token`](crate::core::groups::FunctionalGroupInfo::file_token).
/// A source without an extension keeps none.
pub fn heavy_file_name(source: &Path, group: Option<&str>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}_HEAVY");
    if let Some(group) = group {
        name.push('_');
        name.push_str(group);
    }
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    source.with_file_name(name)
}
