pub mod config;
pub mod records;
pub mod replay;

use std::path::{Path, PathBuf};

use actrec_core::storage::data_dir;
use actrec_core::{Catalog, Result};

/// Load the catalog from `path`, or from `<data_dir>/catalog.toml`.
///
/// A missing default catalog is treated as empty.
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    if let Some(path) = path {
        return Ok(Catalog::load(path)?);
    }
    let default: PathBuf = data_dir()?.join("catalog.toml");
    if default.exists() {
        Ok(Catalog::load(&default)?)
    } else {
        Ok(Catalog::default())
    }
}
