//! Persisted layout (spec.md §6): `<stem>.mat` + `<stem>.ordering.json.gz`,
//! where `<stem>` is the given path with its extension stripped. `save`/
//! `load` are the only filesystem-touching functions in this crate;
//! everything else operates on in-memory bytes.

pub mod mat5;
pub mod ordering_manifest;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::BackgroundError;
use crate::flat::FlatBackground;
use mat5::NamedMatrices;

const MAT_SUFFIX: &str = ".mat";
const MANIFEST_SUFFIX: &str = ".ordering.json.gz";
const LEGACY_MANIFEST_SUFFIX: &str = ".index.json.gz";

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn invalid_data(msg: impl Into<String>) -> BackgroundError {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into()).into()
}

/// Dispatch on `path`'s extension the way `flat_background.py::write_to_file`/
/// `from_file` do: `.mat` is the one supported format, HDF5 is acknowledged
/// but unimplemented, anything else is outright unsupported.
fn validate_extension(path: &Path) -> Result<(), BackgroundError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mat") => Ok(()),
        Some(ext @ ("hdf" | "hdf5" | "h5")) => Err(BackgroundError::NotImplemented(format!("HDF5 background files ('.{ext}')"))),
        Some(ext) => Err(BackgroundError::UnsupportedFiletype(ext.to_string())),
        None => Err(BackgroundError::UnsupportedFiletype(String::new())),
    }
}

pub fn save(background: &FlatBackground, path: &Path) -> Result<(), BackgroundError> {
    validate_extension(path)?;
    let base = path.with_extension("");

    let matrices = NamedMatrices {
        af: background.af.clone(),
        ad: background.ad.clone(),
        bf: background.bf.clone(),
        a: background.a.clone(),
        b: background.b.clone(),
    };
    fs::write(with_suffix(&base, MAT_SUFFIX), mat5::write(&matrices))?;

    let manifest_bytes = ordering_manifest::write(&background.fg, &background.bg, &background.ex)?;
    fs::write(with_suffix(&base, MANIFEST_SUFFIX), manifest_bytes)?;
    Ok(())
}

/// Locate the ordering manifest, preferring the current suffix over the
/// legacy one (spec.md §6: "a legacy suffix `.index.json.gz` must also be
/// accepted on load").
fn manifest_path(base: &Path) -> PathBuf {
    let preferred = with_suffix(base, MANIFEST_SUFFIX);
    if preferred.exists() {
        preferred
    } else {
        with_suffix(base, LEGACY_MANIFEST_SUFFIX)
    }
}

pub fn load(path: &Path) -> Result<FlatBackground, BackgroundError> {
    validate_extension(path)?;
    let base = path.with_extension("");

    let mat_bytes = fs::read(with_suffix(&base, MAT_SUFFIX))?;
    let matrices = mat5::read(&mat_bytes)?;

    let manifest_bytes = fs::read(manifest_path(&base))?;
    let (fg, bg, ex) = ordering_manifest::read(&manifest_bytes)?;

    if fg.len() != matrices.af.ncols() || bg.len() != matrices.ad.nrows() || ex.len() != matrices.bf.nrows() {
        return Err(invalid_data("ordering manifest lengths do not match the persisted matrix dimensions"));
    }

    let mut fg_index = HashMap::new();
    for (i, t) in fg.iter().enumerate() {
        fg_index.insert((t.term_ref.clone(), t.flow_ref.clone()), i);
    }
    let mut bg_index = HashMap::new();
    for (i, t) in bg.iter().enumerate() {
        bg_index.insert((t.term_ref.clone(), t.flow_ref.clone()), i);
    }
    let mut ex_index = HashMap::new();
    for (i, t) in ex.iter().enumerate() {
        ex_index.insert((t.flow_ref.clone(), t.direction, t.term_ref.clone()), i);
    }

    Ok(FlatBackground::from_parts(fg, bg, ex, fg_index, bg_index, ex_index, matrices.af, matrices.ad, matrices.bf, matrices.a, matrices.b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_an_unrecognized_extension_on_save_and_load() {
        let path = Path::new("background.json");
        assert!(matches!(validate_extension(path), Err(BackgroundError::UnsupportedFiletype(ext)) if ext == "json"));
        assert!(matches!(load(path), Err(BackgroundError::UnsupportedFiletype(_))));
    }

    #[test]
    fn rejects_a_path_with_no_extension_at_all() {
        assert!(matches!(validate_extension(Path::new("background")), Err(BackgroundError::UnsupportedFiletype(ext)) if ext.is_empty()));
    }

    #[test]
    fn acknowledges_hdf5_as_not_implemented() {
        assert!(matches!(validate_extension(Path::new("background.hdf5")), Err(BackgroundError::NotImplemented(_))));
        assert!(matches!(load(Path::new("background.hdf5")), Err(BackgroundError::NotImplemented(_))));
    }

    #[test]
    fn mat_extension_passes_validation() {
        assert!(validate_extension(Path::new("background.mat")).is_ok());
    }
}
