use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::board::board_name_from_path;
use crate::config::ExplorerConfig;
use crate::ebuild::Ebuild;
use crate::eclass::Eclass;
use crate::error::{Error, Result};
use crate::profile::Profile;

/// Namespace an overlay was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// Matched one of the public overlay globs.
    Public,
    /// Matched one of the private overlay globs.
    Private,
}

/// A package repository directory.
///
/// `path` and `name` are fixed at discovery; profiles, ebuilds and eclasses
/// are filled in by later pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    /// Repository name.
    pub name: String,
    /// Public or private namespace.
    pub kind: OverlayKind,
    /// Profiles under `profiles/`, sorted by name.
    pub profiles: Vec<Profile>,
    /// Ebuilds, sorted by `category/pf`.
    pub ebuilds: Vec<Ebuild>,
    /// Eclasses under `eclass/`, sorted by name.
    pub eclasses: Vec<Eclass>,
}

impl Overlay {
    /// A freshly discovered overlay with nothing collected yet.
    pub fn new(path: impl Into<String>, name: impl Into<String>, kind: OverlayKind) -> Self {
        Overlay {
            path: path.into(),
            name: name.into(),
            kind,
            profiles: Vec::new(),
            ebuilds: Vec::new(),
            eclasses: Vec::new(),
        }
    }

    /// Absolute location of the overlay under `source_root`.
    pub fn dir(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.path)
    }

    /// Board this overlay belongs to, or an empty string.
    pub fn board(&self) -> String {
        board_name_from_path(&self.path)
    }

    /// Whether the overlay came from a private namespace.
    pub fn is_private(&self) -> bool {
        self.kind == OverlayKind::Private
    }
}

/// Find every overlay matched by the configured globs.
///
/// Overlays are returned sorted by relative path. A directory matched by
/// both namespaces is treated as private. Names are unique: an overlay
/// whose name is already taken by an earlier path gets a numeric suffix.
pub fn locate_overlays(config: &ExplorerConfig) -> Result<Vec<Overlay>> {
    let root = &config.source_root;
    if !root.is_dir() {
        return Err(Error::SourceRootMissing(root.clone()));
    }

    let mut found: BTreeMap<String, (PathBuf, OverlayKind)> = BTreeMap::new();
    let namespaces = [
        (&config.public_overlay_globs, OverlayKind::Public),
        (&config.private_overlay_globs, OverlayKind::Private),
    ];
    for (globs, kind) in namespaces {
        for pattern in globs {
            for dir in glob_dirs(root, pattern)? {
                let rel = relative_path(root, &dir);
                debug!("Found {:?} overlay {}", kind, rel);
                found.insert(rel, (dir, kind));
            }
        }
    }

    let mut taken = HashSet::new();
    let mut overlays = Vec::with_capacity(found.len());
    for (rel, (dir, kind)) in found {
        let name = repo_name(&dir)?.unwrap_or_else(|| fallback_name(&rel, kind));
        let name = unique_name(name, &taken);
        taken.insert(name.clone());
        overlays.push(Overlay::new(rel, name, kind));
    }

    info!("Located {} overlays under {}", overlays.len(), root.display());
    Ok(overlays)
}

fn glob_dirs(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern.trim_start_matches('/')
    );
    let paths = glob::glob(&full).map_err(|source| Error::Pattern {
        pattern: full.clone(),
        source,
    })?;

    let mut dirs = Vec::new();
    for path in paths {
        let path = path?;
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

/// `/`-separated path of `path` below `root`.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Repository name declared by the overlay itself.
///
/// `metadata/layout.conf` (`repo-name`) wins over `profiles/repo_name`.
fn repo_name(dir: &Path) -> Result<Option<String>> {
    if let Some(layout) = read_optional(&dir.join("metadata/layout.conf"))? {
        let name = layout.lines().find_map(|line| {
            let (key, value) = line.split_once('=')?;
            (key.trim() == "repo-name").then(|| value.trim().to_string())
        });
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            return Ok(Some(name));
        }
    }

    if let Some(text) = read_optional(&dir.join("profiles/repo_name"))? {
        let name = text.lines().next().unwrap_or_default().trim();
        if !name.is_empty() {
            return Ok(Some(name.to_string()));
        }
    }

    Ok(None)
}

/// Best-effort name for overlays that do not declare one.
fn fallback_name(rel: &str, kind: OverlayKind) -> String {
    let board = board_name_from_path(rel);
    if board.is_empty() {
        rel.rsplit('/').next().unwrap_or(rel).to_string()
    } else if kind == OverlayKind::Private {
        format!("{board}-private")
    } else {
        board
    }
}

fn unique_name(name: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&name) {
        return name;
    }
    let renamed = (2..)
        .map(|n| format!("{name}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_default();
    warn!("Overlay name {} already in use, using {}", name, renamed);
    renamed
}

/// Read a file, mapping "not found" to `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}
