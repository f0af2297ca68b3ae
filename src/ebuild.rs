use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cache::CacheEntry;
use crate::error::Result;
use crate::metadata::EbuildMetadata;
use crate::overlay::{read_optional, relative_path, Overlay};
use crate::package::PackageInfo;

/// A package recipe found in an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ebuild {
    /// Path relative to the source root.
    pub src_path: String,
    /// Identifier decoded from the file location.
    pub package: PackageInfo,
    /// Cached metadata; defaults until loaded.
    pub metadata: EbuildMetadata,
}

impl Ebuild {
    /// An ebuild with default metadata.
    pub fn new(src_path: impl Into<String>, package: PackageInfo) -> Self {
        Ebuild {
            src_path: src_path.into(),
            package,
            metadata: EbuildMetadata::default(),
        }
    }

    /// Location of the md5-cache record below the overlay directory.
    pub fn cache_path(&self, overlay_dir: &Path) -> std::path::PathBuf {
        overlay_dir
            .join("metadata/md5-cache")
            .join(&self.package.category)
            .join(self.package.pf())
    }

    /// Fill `metadata` from the overlay's md5-cache.
    ///
    /// A missing record leaves the defaults in place. An unreadable record
    /// is an error; a record that is not a cache file at all is logged and
    /// ignored.
    pub fn load_metadata(&mut self, overlay_dir: &Path) -> Result<()> {
        let path = self.cache_path(overlay_dir);
        let Some(text) = read_optional(&path)? else {
            debug!("No cache record for {}", self.package);
            return Ok(());
        };
        match CacheEntry::parse(&text) {
            Ok(entry) => self.metadata = entry.metadata,
            Err(e) => warn!("Ignoring cache record {}: {}", path.display(), e),
        }
        Ok(())
    }
}

/// Find every `*.ebuild` of an overlay, sorted by `category/pf`.
///
/// The identifier is read from `<category>/<name>/<pf>.ebuild`. Files
/// whose location does not decode are skipped with a warning.
pub fn collect_ebuilds(source_root: &Path, overlay: &Overlay) -> Result<Vec<Ebuild>> {
    let dir = overlay.dir(source_root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut ebuilds = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|s| s.to_str()) != Some("ebuild")
        {
            continue;
        }

        match package_from_path(path) {
            Some(package) => {
                debug!("Found ebuild {}", package);
                ebuilds.push(Ebuild::new(relative_path(source_root, path), package));
            }
            None => warn!("Skipping ebuild with unparseable name: {}", path.display()),
        }
    }

    ebuilds.sort_by_cached_key(|e| e.package.cpf());
    Ok(ebuilds)
}

fn package_from_path(path: &Path) -> Option<PackageInfo> {
    let stem = path.file_stem()?.to_str()?;
    let category = path.parent()?.parent()?.file_name()?.to_str()?;
    PackageInfo::parse(&format!("{category}/{stem}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayKind;
    use std::fs;

    fn touch(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn collect_sorted_by_cpf() {
        let tmp = tempfile::tempdir().unwrap();
        for rel in [
            "ov/sys-apps/util-linux/util-linux-2.38-r1.ebuild",
            "ov/app-misc/foo/foo-1.ebuild",
            "ov/app-misc/foo/foo-1-r4.ebuild",
            "ov/app-misc/foo/Manifest",
            "ov/app-misc/foo/files/foo.patch",
            "ov/app-misc/broken/broken.ebuild",
        ] {
            touch(tmp.path(), rel, "");
        }
        let overlay = Overlay::new("ov", "ov", OverlayKind::Public);

        let ebuilds = collect_ebuilds(tmp.path(), &overlay).unwrap();
        let cpfs: Vec<_> = ebuilds.iter().map(|e| e.package.cpf()).collect();
        assert_eq!(
            cpfs,
            [
                "app-misc/foo-1",
                "app-misc/foo-1-r4",
                "sys-apps/util-linux-2.38-r1"
            ]
        );
        assert_eq!(ebuilds[1].src_path, "ov/app-misc/foo/foo-1-r4.ebuild");
        assert_eq!(ebuilds[1].package.revision, 4);
    }

    #[test]
    fn metadata_loaded_from_cache() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "ov/dev-libs/bar/bar-2.0-r1.ebuild", "");
        touch(
            tmp.path(),
            "ov/metadata/md5-cache/dev-libs/bar-2.0-r1",
            "EAPI=7\nDESCRIPTION=Bar\nSLOT=0\nIUSE=+a -b\n_eclasses_=x\t1\n",
        );
        let overlay = Overlay::new("ov", "ov", OverlayKind::Public);
        let mut ebuilds = collect_ebuilds(tmp.path(), &overlay).unwrap();

        ebuilds[0].load_metadata(&overlay.dir(tmp.path())).unwrap();
        let m = &ebuilds[0].metadata;
        assert_eq!(m.eapi, 7);
        assert_eq!(m.description, "Bar");
        assert_eq!(m.iuse.len(), 2);
        assert_eq!(m.eclass_inherits, ["x"]);
    }

    #[test]
    fn explicit_r0_uses_its_own_cache_record() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "ov/app-misc/foo/foo-1-r0.ebuild", "");
        touch(
            tmp.path(),
            "ov/metadata/md5-cache/app-misc/foo-1-r0",
            "EAPI=7\nDESCRIPTION=Zero revision\n",
        );
        let overlay = Overlay::new("ov", "ov", OverlayKind::Public);
        let mut ebuilds = collect_ebuilds(tmp.path(), &overlay).unwrap();
        assert_eq!(ebuilds[0].package.cpf(), "app-misc/foo-1-r0");

        let dir = overlay.dir(tmp.path());
        assert_eq!(
            ebuilds[0].cache_path(&dir),
            dir.join("metadata/md5-cache/app-misc/foo-1-r0")
        );
        ebuilds[0].load_metadata(&dir).unwrap();
        assert_eq!(ebuilds[0].metadata.eapi, 7);
        assert_eq!(ebuilds[0].metadata.description, "Zero revision");
    }

    #[test]
    fn missing_cache_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "ov/dev-libs/bar/bar-2.0.ebuild", "");
        let overlay = Overlay::new("ov", "ov", OverlayKind::Public);
        let mut ebuilds = collect_ebuilds(tmp.path(), &overlay).unwrap();

        ebuilds[0].load_metadata(&overlay.dir(tmp.path())).unwrap();
        assert_eq!(ebuilds[0].metadata, EbuildMetadata::default());
    }
}
