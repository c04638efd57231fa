//! Static asset copying.

use std::fs;
use std::path::{Path, PathBuf};

use crate::site::SiteError;

/// Copy the static file `name` from `searchpath` to the same place under `outpath`.
///
/// Returns the destination path.
pub(crate) fn copy_static(
    searchpath: &Path,
    outpath: &Path,
    name: &str,
) -> Result<PathBuf, SiteError> {
    let source = searchpath.join(name);
    let dest = outpath.join(name);

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| SiteError::io(parent, e))?;
    }

    fs::copy(&source, &dest).map_err(|e| SiteError::io(&source, e))?;
    tracing::info!("Copying {} to {}", source.display(), dest.display());

    Ok(dest)
}
