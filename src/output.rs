use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build_target::BuildTarget;
use crate::ebuild::Ebuild;
use crate::error::{Error, Result};
use crate::overlay::Overlay;
use crate::profile::{Profile, ProfileUse};

/// Everything discovered in one run.
///
/// Owns all overlays and build targets. A build target refers to its base
/// profile by id; use [`SpiderOutput::base_profile`] to reach the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiderOutput {
    /// Boards, sorted by name.
    pub build_targets: Vec<BuildTarget>,
    /// Overlays, sorted by path.
    pub overlays: Vec<Overlay>,
}

impl SpiderOutput {
    /// Overlay with the given repository name.
    pub fn overlay(&self, name: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.name == name)
    }

    /// Build target with the given board name.
    pub fn build_target(&self, name: &str) -> Option<&BuildTarget> {
        self.build_targets.iter().find(|t| t.name == name)
    }

    /// Profile with the given `overlay:name` id.
    pub fn profile(&self, id: &str) -> Option<&Profile> {
        let (overlay, _) = id.split_once(':')?;
        self.overlay(overlay)?.profiles.iter().find(|p| p.id == id)
    }

    /// The `base` profile linked to a board.
    pub fn base_profile(&self, board: &str) -> Option<&Profile> {
        let id = self.build_target(board)?.profile.as_deref()?;
        self.profile(id)
    }

    /// All versions of `category/name`, with the overlay providing each.
    pub fn find_ebuilds(&self, category: &str, name: &str) -> Vec<(&Overlay, &Ebuild)> {
        self.overlays
            .iter()
            .flat_map(|o| o.ebuilds.iter().map(move |e| (o, e)))
            .filter(|(_, e)| e.package.category == category && e.package.package_name == name)
            .collect()
    }

    /// Map one entry of a `parent` file to a profile id.
    ///
    /// `repo:path` entries are ids already. Relative entries resolve
    /// against the profile's own directory in its overlay. Returns `None`
    /// when the entry leaves `profiles/` or names no known profile.
    pub fn resolve_parent(&self, profile: &Profile, entry: &str) -> Option<String> {
        if entry.contains(':') {
            return self.profile(entry).map(|p| p.id.clone());
        }

        let (overlay, _) = profile.id.split_once(':')?;
        let mut parts: Vec<&str> = profile.path.split('/').collect();
        for part in entry.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop()?;
                }
                _ => parts.push(part),
            }
        }
        let name = match parts.split_first() {
            Some((&"profiles", rest)) if !rest.is_empty() => rest.join("/"),
            _ => return None,
        };
        let id = format!("{overlay}:{name}");
        self.profile(&id).map(|p| p.id.clone())
    }

    /// The full inheritance stack of a profile.
    ///
    /// Parents come first, each expanded recursively in declaration order,
    /// and the profile itself comes last. A profile reachable through
    /// several parents appears once, at its first position. Parents that do
    /// not resolve are skipped.
    pub fn profile_ancestry(&self, id: &str) -> Result<Vec<&Profile>> {
        let profile = self
            .profile(id)
            .ok_or_else(|| Error::UnknownProfile(id.to_string()))?;
        let mut stack = Vec::new();
        let mut done = HashSet::new();
        let mut out = Vec::new();
        self.visit(profile, &mut stack, &mut done, &mut out)?;
        Ok(out)
    }

    fn visit<'a>(
        &'a self,
        profile: &'a Profile,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        out: &mut Vec<&'a Profile>,
    ) -> Result<()> {
        if stack.contains(&profile.id) {
            return Err(Error::ProfileCycle(profile.id.clone()));
        }
        if done.contains(&profile.id) {
            return Ok(());
        }
        stack.push(profile.id.clone());
        for entry in &profile.parent_profiles {
            match self.resolve_parent(profile, entry).and_then(|id| self.profile(&id)) {
                Some(parent) => self.visit(parent, stack, done, out)?,
                None => debug!("{}: parent {} not found", profile.id, entry),
            }
        }
        stack.pop();
        done.insert(profile.id.clone());
        out.push(profile);
        Ok(())
    }

    /// USE flags after stacking the whole ancestry of a profile.
    ///
    /// Flags are applied from the farthest ancestor to the profile itself;
    /// a later setting of a flag overrides an earlier one.
    pub fn effective_use(&self, id: &str) -> Result<Vec<ProfileUse>> {
        let mut flags = BTreeMap::new();
        for profile in self.profile_ancestry(id)? {
            for flag in &profile.use_flags {
                flags.insert(flag.name.clone(), flag.enabled);
            }
        }
        Ok(flags
            .into_iter()
            .map(|(name, enabled)| ProfileUse { name, enabled })
            .collect())
    }
}
