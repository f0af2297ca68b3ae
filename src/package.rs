use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use winnow::ascii::digit1;
use winnow::combinator::{alt, opt, preceded, repeat};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::error::{Error, Result};

/// A package identifier decoded from an ebuild's location.
///
/// Corresponds to `${CATEGORY}/${PF}`: category, package name, version and
/// revision. A missing revision is `0` and is omitted when formatting; an
/// explicit `-r0` is kept so the identifier still names the file and its
/// md5-cache record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package category (e.g. `sys-apps`).
    pub category: String,
    /// Package name (e.g. `portage`).
    pub package_name: String,
    /// Version without revision (e.g. `3.0.30`).
    pub version: String,
    /// Revision number from a trailing `-rN`.
    pub revision: u32,
    /// Whether the `-rN` suffix was written out, even as `-r0`.
    #[serde(default)]
    pub explicit_revision: bool,
}

impl PackageInfo {
    /// Parse a `category/name-version[-rN]` string.
    ///
    /// The version is the longest hyphen-separated suffix that is a valid
    /// Portage version, so package names may contain hyphens and digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_explorer::PackageInfo;
    ///
    /// let pkg = PackageInfo::parse("sys-apps/util-linux-2.38.1-r2").unwrap();
    /// assert_eq!(pkg.category, "sys-apps");
    /// assert_eq!(pkg.package_name, "util-linux");
    /// assert_eq!(pkg.version, "2.38.1");
    /// assert_eq!(pkg.revision, 2);
    /// assert_eq!(pkg.cpf(), "sys-apps/util-linux-2.38.1-r2");
    /// ```
    pub fn parse(input: &str) -> Result<PackageInfo> {
        let (category, pf) = input
            .split_once('/')
            .ok_or_else(|| Error::InvalidPackage(input.to_string()))?;
        if !is_valid_name(category) || pf.contains('/') {
            return Err(Error::InvalidPackage(input.to_string()));
        }

        for (idx, _) in pf.match_indices('-') {
            let name = &pf[..idx];
            if !is_valid_name(name) {
                continue;
            }
            if let Ok((ver, rev)) = (version, opt(revision)).parse(&pf[idx + 1..]) {
                return Ok(PackageInfo {
                    category: category.to_string(),
                    package_name: name.to_string(),
                    version: ver.to_string(),
                    revision: rev.unwrap_or_default(),
                    explicit_revision: rev.is_some(),
                });
            }
        }

        Err(Error::InvalidPackage(input.to_string()))
    }

    /// `${CATEGORY}/${PN}`.
    pub fn atom(&self) -> String {
        format!("{}/{}", self.category, self.package_name)
    }

    /// `${PVR}`: version plus revision when non-zero or written out.
    pub fn pvr(&self) -> String {
        if self.revision == 0 && !self.explicit_revision {
            self.version.clone()
        } else {
            format!("{}-r{}", self.version, self.revision)
        }
    }

    /// `${PF}`: name, version and revision. Names the md5-cache record.
    pub fn pf(&self) -> String {
        format!("{}-{}", self.package_name, self.pvr())
    }

    /// `${CATEGORY}/${P}`, without revision.
    pub fn cpv(&self) -> String {
        format!("{}/{}-{}", self.category, self.package_name, self.version)
    }

    /// `${CATEGORY}/${PF}`, the canonical sort key for ebuilds.
    pub fn cpf(&self) -> String {
        format!("{}/{}", self.category, self.pf())
    }
}

impl FromStr for PackageInfo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PackageInfo::parse(s)
    }
}

impl fmt::Display for PackageInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.pf())
    }
}

fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-'))
}

// Winnow parsers

fn version_suffix<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    ('_', alt(("alpha", "beta", "pre", "rc", "p")), opt(digit1))
        .take()
        .parse_next(input)
}

fn version<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        digit1,
        repeat::<_, _, (), _, _>(0.., ('.', digit1)),
        opt(one_of('a'..='z')),
        repeat::<_, _, (), _, _>(0.., version_suffix),
    )
        .take()
        .parse_next(input)
}

fn revision(input: &mut &str) -> ModalResult<u32> {
    preceded("-r", digit1.try_map(str::parse::<u32>)).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(category: &str, name: &str, version: &str, revision: u32) -> PackageInfo {
        PackageInfo {
            category: category.to_string(),
            package_name: name.to_string(),
            version: version.to_string(),
            revision,
            explicit_revision: revision != 0,
        }
    }

    #[test]
    fn parse_simple() {
        assert_eq!(
            PackageInfo::parse("category/name-1").unwrap(),
            pkg("category", "name", "1", 0)
        );
    }

    #[test]
    fn parse_revision() {
        assert_eq!(
            PackageInfo::parse("category/name-1-r4").unwrap(),
            pkg("category", "name", "1", 4)
        );
    }

    #[test]
    fn parse_suffix() {
        assert_eq!(
            PackageInfo::parse("yrogetac/foo-5.4_alpha0").unwrap(),
            pkg("yrogetac", "foo", "5.4_alpha0", 0)
        );
        assert_eq!(
            PackageInfo::parse("dev-libs/bar-1.2b_pre20230101_p3-r1").unwrap(),
            pkg("dev-libs", "bar", "1.2b_pre20230101_p3", 1)
        );
    }

    #[test]
    fn hyphenated_names() {
        assert_eq!(
            PackageInfo::parse("chromeos-base/chromeos-chrome-9999").unwrap(),
            pkg("chromeos-base", "chromeos-chrome", "9999", 0)
        );
        assert_eq!(
            PackageInfo::parse("media-libs/libv4l-2-utils-1.0").unwrap(),
            pkg("media-libs", "libv4l-2-utils", "1.0", 0)
        );
    }

    #[test]
    fn formatting() {
        let p = PackageInfo::parse("sys-libs/glibc-2.35-r7").unwrap();
        assert_eq!(p.atom(), "sys-libs/glibc");
        assert_eq!(p.pvr(), "2.35-r7");
        assert_eq!(p.pf(), "glibc-2.35-r7");
        assert_eq!(p.cpv(), "sys-libs/glibc-2.35");
        assert_eq!(p.cpf(), "sys-libs/glibc-2.35-r7");
        assert_eq!(p.to_string(), p.cpf());

        let p = PackageInfo::parse("sys-libs/zlib-1.3").unwrap();
        assert_eq!(p.pf(), "zlib-1.3");
    }

    #[test]
    fn explicit_r0_kept() {
        let p = PackageInfo::parse("app-misc/foo-1-r0").unwrap();
        assert_eq!(p.revision, 0);
        assert!(p.explicit_revision);
        assert_eq!(p.pvr(), "1-r0");
        assert_eq!(p.cpf(), "app-misc/foo-1-r0");
        assert_eq!(p.cpv(), "app-misc/foo-1");
        assert_ne!(p, PackageInfo::parse("app-misc/foo-1").unwrap());
    }

    #[test]
    fn invalid() {
        for s in [
            "",
            "noslash-1",
            "cat/",
            "/name-1",
            "cat/name",
            "cat/name-",
            "cat/name-r1",
            "cat/name-1-r",
            "cat/-1",
            "cat/sub/name-1",
            "cat/name-1.",
        ] {
            assert!(PackageInfo::parse(s).is_err(), "{s} should be rejected");
        }
    }

    #[test]
    fn from_str() {
        let p: PackageInfo = "app-misc/foo-0.1".parse().unwrap();
        assert_eq!(p.version, "0.1");
    }
}
