use portage_atom::{DepEntry, Slot};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::iuse::EbuildUse;

/// Dependency classes carried by the metadata cache.
///
/// See [PMS 8.1](https://projects.gentoo.org/pms/9/pms.html#dependency-classes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepClass {
    /// `DEPEND`
    Depend,
    /// `RDEPEND`
    Rdepend,
    /// `BDEPEND`
    Bdepend,
    /// `PDEPEND`
    Pdepend,
}

impl DepClass {
    /// All classes, in cache key order.
    pub const ALL: [DepClass; 4] = [
        DepClass::Depend,
        DepClass::Rdepend,
        DepClass::Bdepend,
        DepClass::Pdepend,
    ];

    /// The cache key naming this class.
    pub fn key(&self) -> &'static str {
        match self {
            DepClass::Depend => "DEPEND",
            DepClass::Rdepend => "RDEPEND",
            DepClass::Bdepend => "BDEPEND",
            DepClass::Pdepend => "PDEPEND",
        }
    }
}

/// Metadata of a single ebuild, read from its md5-cache record.
///
/// Every field defaults to empty (EAPI `0`) and stays that way when the
/// ebuild has no cache record. Values are kept verbatim apart from `IUSE`
/// and the inherited eclass list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbuildMetadata {
    /// EAPI version.
    pub eapi: u32,
    /// Package description.
    pub description: String,
    /// Homepage URL(s), space separated.
    pub homepage: String,
    /// License expression.
    pub license: String,
    /// Slot, optionally with `/subslot`.
    pub slot: String,
    /// Source URI expression.
    pub src_uri: String,
    /// RESTRICT expression.
    pub restrict: String,
    /// Build-time dependencies (`DEPEND`).
    pub depend: String,
    /// Runtime dependencies (`RDEPEND`).
    pub rdepend: String,
    /// Build-host dependencies (`BDEPEND`).
    pub bdepend: String,
    /// Post-merge dependencies (`PDEPEND`).
    pub pdepend: String,
    /// USE flags declared by the ebuild, sorted by name.
    pub iuse: Vec<EbuildUse>,
    /// Names of inherited eclasses, sorted.
    pub eclass_inherits: Vec<String>,
}

impl EbuildMetadata {
    /// Raw dependency string of one class.
    pub fn dependency_string(&self, class: DepClass) -> &str {
        match class {
            DepClass::Depend => &self.depend,
            DepClass::Rdepend => &self.rdepend,
            DepClass::Bdepend => &self.bdepend,
            DepClass::Pdepend => &self.pdepend,
        }
    }

    /// Parse one dependency class into a dependency tree.
    pub fn dependencies(&self, class: DepClass) -> Result<Vec<DepEntry>> {
        parse_dep_field(self.dependency_string(class))
    }

    /// Parse `SLOT` into slot and sub-slot. `None` when unset.
    pub fn slot_parts(&self) -> Option<Slot> {
        if self.slot.is_empty() {
            return None;
        }
        Some(match self.slot.split_once('/') {
            Some((slot, subslot)) => Slot::with_subslot(slot, subslot),
            None => Slot::new(&self.slot),
        })
    }
}

/// Parse a dependency field value into `Vec<DepEntry>`.
pub(crate) fn parse_dep_field(s: &str) -> Result<Vec<DepEntry>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    DepEntry::parse(s).map_err(|e| Error::DepError(format!("{e}")))
}
