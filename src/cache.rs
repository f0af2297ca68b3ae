use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::iuse::EbuildUse;
use crate::metadata::{parse_dep_field, DepClass, EbuildMetadata};

/// Layout of the `_eclasses_` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EclassFormat {
    /// md5-cache: `name\tdigest` pairs.
    Md5Cache,
    /// Older flat_hash/edb cache: `name\tpath\tdigest` triples.
    FlatHash,
}

/// One inherited eclass recorded in a cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEclass {
    /// Eclass name.
    pub name: String,
    /// Directory the eclass was loaded from (flat_hash only).
    pub path: Option<String>,
    /// Checksum or mtime of the eclass.
    pub digest: String,
}

/// A parsed metadata cache record.
///
/// Represents a single file from `metadata/md5-cache/<category>/<pf>`:
/// the ebuild metadata plus cache bookkeeping (`_md5_`, `_eclasses_`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// The ebuild metadata.
    pub metadata: EbuildMetadata,

    /// MD5 checksum of the ebuild file (from `_md5_`).
    pub md5: Option<String>,

    /// Layout `_eclasses_` was written in, if present and well formed.
    pub eclass_format: Option<EclassFormat>,

    /// Eclass inheritance list with checksums (from `_eclasses_`).
    pub eclasses: Vec<CachedEclass>,
}

impl CacheEntry {
    /// Parse a cache file's contents into a `CacheEntry`.
    ///
    /// Lines are `KEY=VALUE` pairs in arbitrary order; unknown keys are
    /// ignored. Parsing is lenient: a malformed `EAPI` or `_eclasses_`
    /// falls back to the default for that field only, and dependency
    /// strings the atom parser rejects are kept verbatim with a warning.
    /// Only input holding no `KEY=VALUE` line at all is an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_explorer::CacheEntry;
    ///
    /// let input = "\
    /// EAPI=7
    /// DESCRIPTION=Example package
    /// SLOT=0
    /// IUSE=+ssl -debug
    /// _eclasses_=toolchain-funcs\tabc\tflag-o-matic\tdef
    /// ";
    /// let entry = CacheEntry::parse(input).unwrap();
    /// assert_eq!(entry.metadata.eapi, 7);
    /// assert_eq!(entry.metadata.description, "Example package");
    /// assert_eq!(entry.metadata.eclass_inherits, ["flag-o-matic", "toolchain-funcs"]);
    /// ```
    pub fn parse(input: &str) -> Result<CacheEntry> {
        let mut entry = CacheEntry::default();
        let mut seen_pair = false;
        let m = &mut entry.metadata;

        for line in input.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            seen_pair = true;
            match key {
                "EAPI" => m.eapi = parse_eapi(value),
                "DESCRIPTION" => m.description = value.to_string(),
                "HOMEPAGE" => m.homepage = value.to_string(),
                "LICENSE" => m.license = value.to_string(),
                "SLOT" => m.slot = value.to_string(),
                "SRC_URI" => m.src_uri = value.to_string(),
                "RESTRICT" => m.restrict = value.to_string(),
                "DEPEND" => m.depend = value.to_string(),
                "RDEPEND" => m.rdepend = value.to_string(),
                "BDEPEND" => m.bdepend = value.to_string(),
                "PDEPEND" => m.pdepend = value.to_string(),
                "IUSE" => m.iuse = EbuildUse::parse_line(value),
                "_md5_" => entry.md5 = Some(value.to_string()),
                "_eclasses_" => match parse_eclasses(value) {
                    Some((format, eclasses)) => {
                        entry.eclass_format = format;
                        entry.eclasses = eclasses;
                    }
                    None => warn!("Ignoring malformed _eclasses_ value: {}", value),
                },
                _ => {} // Ignore unknown keys
            }
        }

        if !seen_pair && !input.trim().is_empty() {
            return Err(Error::InvalidCacheEntry(
                "no KEY=VALUE lines found".to_string(),
            ));
        }

        for class in DepClass::ALL {
            if let Err(e) = parse_dep_field(entry.metadata.dependency_string(class)) {
                warn!("Keeping unparsed {}: {}", class.key(), e);
            }
        }

        let mut names: Vec<String> = entry.eclasses.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names.dedup();
        entry.metadata.eclass_inherits = names;

        Ok(entry)
    }
}

/// Parse `EAPI`, defaulting to 0 when missing or not an integer.
fn parse_eapi(value: &str) -> u32 {
    let value = value.trim();
    if value.is_empty() {
        return 0;
    }
    value.parse().unwrap_or_else(|_| {
        warn!("Non-integer EAPI {:?}, using 0", value);
        0
    })
}

/// Parse the `_eclasses_` value in either cache layout.
///
/// Triples are recognised by their absolute path in the middle column;
/// anything else with an even token count is read as pairs. Returns `None`
/// when the token count fits neither layout.
fn parse_eclasses(s: &str) -> Option<(Option<EclassFormat>, Vec<CachedEclass>)> {
    if s.is_empty() {
        return Some((None, Vec::new()));
    }
    let parts: Vec<&str> = s.split('\t').collect();

    let is_flat_hash =
        parts.len() % 3 == 0 && parts.chunks(3).all(|chunk| chunk[1].starts_with('/'));
    if is_flat_hash {
        let eclasses = parts
            .chunks(3)
            .map(|chunk| CachedEclass {
                name: chunk[0].to_string(),
                path: Some(chunk[1].to_string()),
                digest: chunk[2].to_string(),
            })
            .collect();
        return Some((Some(EclassFormat::FlatHash), eclasses));
    }

    if parts.len() % 2 == 0 {
        let eclasses = parts
            .chunks(2)
            .map(|chunk| CachedEclass {
                name: chunk[0].to_string(),
                path: None,
                digest: chunk[1].to_string(),
            })
            .collect();
        return Some((Some(EclassFormat::Md5Cache), eclasses));
    }

    None
}
