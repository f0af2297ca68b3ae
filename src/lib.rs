//! Read-only discovery of a Portage source tree.
//!
//! This crate walks the overlays of a ChromiumOS-style checkout and models
//! what it finds: boards and their base profiles, profile inheritance and
//! USE flags, eclasses, and ebuilds with their md5-cache metadata.
//!
//! # Overview
//!
//! The pipeline runs these stages in order, each building on the last:
//!
//! 1. boards, derived from overlay directory names
//! 2. overlays, located with the configured globs
//! 3. profiles below each overlay's `profiles/`
//! 4. eclasses below `eclass/`
//! 5. ebuilds, identified by `<category>/<name>/<pf>.ebuild`
//! 6. ebuild metadata from `metadata/md5-cache/`
//! 7. profile USE flags from `make.defaults`
//! 8. profile parents from `parent`
//!
//! Nothing is written to the tree and no global state is kept; all settings
//! travel in an [`ExplorerConfig`].
//!
//! # Examples
//!
//! ```no_run
//! use portage_explorer::{explore, ExplorerConfig};
//!
//! let output = explore(&ExplorerConfig::new("/mnt/host/source")).unwrap();
//! for target in &output.build_targets {
//!     let base = output.base_profile(&target.name).unwrap();
//!     println!("{}: {}", target.name, base.id);
//! }
//! ```

mod board;
mod build_target;
mod cache;
mod config;
mod ebuild;
mod eclass;
mod error;
mod explorer;
mod iuse;
mod metadata;
mod output;
mod overlay;
mod package;
mod profile;
mod shell;
mod use_flags;

// Re-export public types
pub use board::board_name_from_path;
pub use build_target::{
    discover_build_targets, link_base_profiles, map_base_profiles, BuildTarget,
};
pub use cache::{CacheEntry, CachedEclass, EclassFormat};
pub use config::{ExplorerConfig, MinusStarPolicy, PrivateBasePolicy};
pub use ebuild::{collect_ebuilds, Ebuild};
pub use eclass::{collect_eclasses, Eclass};
pub use error::{Error, Result};
pub use explorer::{explore, Explorer};
pub use iuse::EbuildUse;
pub use metadata::{DepClass, EbuildMetadata};
pub use output::SpiderOutput;
pub use overlay::{locate_overlays, Overlay, OverlayKind};
pub use package::PackageInfo;
pub use profile::{collect_profiles, parse_parent_file, read_parent_profiles, Profile, ProfileUse};
pub use shell::ShellEvaluator;
pub use use_flags::{
    profile_use_flags, resolve_use_tokens, resolve_use_tokens_with, NativeEvaluator, UseEvaluator,
};
