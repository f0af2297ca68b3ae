use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::board::board_name_from_path;
use crate::config::PrivateBasePolicy;
use crate::error::{Error, Result};
use crate::overlay::Overlay;

/// A board the tree can be built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Board name.
    pub name: String,
    /// Id of the board's `base` profile, resolved against the overlays.
    pub profile: Option<String>,
}

impl BuildTarget {
    /// A board whose profile is not linked yet.
    pub fn new(name: impl Into<String>) -> Self {
        BuildTarget {
            name: name.into(),
            profile: None,
        }
    }
}

/// One build target per distinct board named by the overlay paths.
pub fn discover_build_targets<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<BuildTarget> {
    let boards: BTreeSet<String> = paths
        .into_iter()
        .map(board_name_from_path)
        .filter(|board| !board.is_empty())
        .collect();
    info!("Discovered {} build targets", boards.len());
    boards.into_iter().map(BuildTarget::new).collect()
}

/// Map each board to the id of its `base` profile.
///
/// Overlays are visited in order. The first public `base` profile of a
/// board is kept unless a private overlay provides one, which always
/// replaces it. Two private `base` profiles for one board are settled by
/// `policy`.
pub fn map_base_profiles(
    overlays: &[Overlay],
    policy: PrivateBasePolicy,
) -> Result<BTreeMap<String, String>> {
    // board -> (profile id, came from a private overlay)
    let mut mapping: BTreeMap<String, (String, bool)> = BTreeMap::new();

    for overlay in overlays {
        let board = overlay.board();
        if board.is_empty() {
            continue;
        }
        let Some(base) = overlay.profiles.iter().find(|p| p.name == "base") else {
            continue;
        };

        if overlay.is_private() {
            if let Some((first, true)) = mapping.get(&board) {
                if policy == PrivateBasePolicy::Reject {
                    return Err(Error::ConflictingBaseProfile {
                        board,
                        first: first.clone(),
                        second: base.id.clone(),
                    });
                }
            }
            debug!("Board {} uses private base profile {}", board, base.id);
            mapping.insert(board, (base.id.clone(), true));
        } else if !mapping.contains_key(&board) {
            debug!("Board {} uses base profile {}", board, base.id);
            mapping.insert(board, (base.id.clone(), false));
        }
    }

    Ok(mapping
        .into_iter()
        .map(|(board, (id, _))| (board, id))
        .collect())
}

/// Attach every build target to its mapped `base` profile.
///
/// A board without a mapping is a broken tree and fails the lookup.
pub fn link_base_profiles(
    targets: &mut [BuildTarget],
    base_profiles: &BTreeMap<String, String>,
) -> Result<()> {
    for target in targets {
        let id = base_profiles
            .get(&target.name)
            .ok_or_else(|| Error::MissingBaseProfile(target.name.clone()))?;
        target.profile = Some(id.clone());
    }
    Ok(())
}
