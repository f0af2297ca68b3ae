use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::overlay::{relative_path, Overlay};

/// A shared build-logic file under an overlay's `eclass/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eclass {
    /// Path relative to the source root.
    pub path: String,
    /// File stem, e.g. `cros-workon`.
    pub name: String,
}

/// List `eclass/*.eclass` of an overlay, sorted by name.
pub fn collect_eclasses(source_root: &Path, overlay: &Overlay) -> Result<Vec<Eclass>> {
    let dir = overlay.dir(source_root).join("eclass");
    let pattern = format!(
        "{}/*.eclass",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|source| Error::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut eclasses = Vec::new();
    for path in paths {
        let path = path?;
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        debug!("Found eclass {} in {}", name, overlay.name);
        eclasses.push(Eclass {
            path: relative_path(source_root, &path),
            name,
        });
    }
    eclasses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(eclasses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayKind;
    use std::fs;

    #[test]
    fn collect_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("src/eclass-overlay/eclass");
        fs::create_dir_all(&dir).unwrap();
        for file in ["toolchain-funcs.eclass", "cros-workon.eclass", "README", "a.eclass.bak"] {
            fs::write(dir.join(file), "").unwrap();
        }
        let overlay = Overlay::new("src/eclass-overlay", "eclass-overlay", OverlayKind::Public);

        let eclasses = collect_eclasses(tmp.path(), &overlay).unwrap();
        let names: Vec<_> = eclasses.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["cros-workon", "toolchain-funcs"]);
        assert_eq!(eclasses[0].path, "src/eclass-overlay/eclass/cros-workon.eclass");
    }

    #[test]
    fn no_eclass_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let overlay = Overlay::new("overlay-oak", "oak", OverlayKind::Public);
        assert!(collect_eclasses(tmp.path(), &overlay).unwrap().is_empty());
    }
}
