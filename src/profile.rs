use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::overlay::{read_optional, Overlay};

/// A USE flag set by a profile's `make.defaults`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileUse {
    /// Flag name, without a `-` prefix.
    pub name: String,
    /// Final state after all assignments.
    pub enabled: bool,
}

/// A profile directory of an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// `<overlay-name>:<profile-name>`, unique within a run.
    pub id: String,
    /// Path relative to the overlay (`profiles/<name>`).
    pub path: String,
    /// Directory name below `profiles/`.
    pub name: String,
    /// Entries of the `parent` file in declaration order.
    pub parent_profiles: Vec<String>,
    /// Flags from `make.defaults`, sorted by name.
    pub use_flags: Vec<ProfileUse>,
}

impl Profile {
    /// A profile with no parents or flags resolved yet.
    pub fn new(overlay_name: &str, name: &str) -> Self {
        Profile {
            id: format!("{overlay_name}:{name}"),
            path: format!("profiles/{name}"),
            name: name.to_string(),
            parent_profiles: Vec::new(),
            use_flags: Vec::new(),
        }
    }

    /// Absolute directory of the profile.
    pub fn dir(&self, overlay_dir: &Path) -> std::path::PathBuf {
        overlay_dir.join(&self.path)
    }
}

/// List the immediate subdirectories of an overlay's `profiles/`.
///
/// The result is sorted by profile name. An overlay without a `profiles/`
/// directory has no profiles.
pub fn collect_profiles(source_root: &Path, overlay: &Overlay) -> Result<Vec<Profile>> {
    let profiles_dir = overlay.dir(source_root).join("profiles");
    let entries = match fs::read_dir(&profiles_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(&profiles_dir, e)),
    };

    let mut profiles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&profiles_dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        debug!("Found profile {}:{}", overlay.name, name);
        profiles.push(Profile::new(&overlay.name, &name));
    }
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(profiles)
}

/// Parse the contents of a profile `parent` file.
///
/// `#` starts a comment; blank lines are skipped. Declaration order is
/// kept because it decides the stacking order of the parents.
///
/// # Examples
///
/// ```
/// use portage_explorer::parse_parent_file;
///
/// let parents = parse_parent_file("oak-private:bar # comment\n# oak-private:baz\n ");
/// assert_eq!(parents, ["oak-private:bar"]);
/// ```
pub fn parse_parent_file(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the `parent` file of a profile, if any.
pub fn read_parent_profiles(profile_dir: &Path) -> Result<Vec<String>> {
    Ok(read_optional(&profile_dir.join("parent"))?
        .map(|text| parse_parent_file(&text))
        .unwrap_or_default())
}
