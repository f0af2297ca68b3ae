use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// A USE flag declared by an ebuild's `IUSE`.
///
/// `-flag` is disabled by default; `+flag` and a bare `flag` count as
/// enabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EbuildUse {
    /// The USE flag name (without prefix).
    pub name: String,
    /// Default state of the flag.
    pub enabled: bool,
}

impl EbuildUse {
    /// Parse a space-separated `IUSE` line.
    ///
    /// Malformed entries are skipped with a warning. The result holds one
    /// entry per flag name, sorted by name; a later entry for the same name
    /// replaces an earlier one.
    ///
    /// # Examples
    ///
    /// ```
    /// use portage_explorer::EbuildUse;
    ///
    /// let flags = EbuildUse::parse_line("+ssl -debug test");
    /// let names: Vec<_> = flags.iter().map(|f| f.name.as_str()).collect();
    /// assert_eq!(names, ["debug", "ssl", "test"]);
    /// assert!(!flags[0].enabled);
    /// assert!(flags[1].enabled);
    /// assert!(flags[2].enabled);
    /// ```
    pub fn parse_line(input: &str) -> Vec<EbuildUse> {
        let mut flags = BTreeMap::new();
        for token in input.split_whitespace() {
            match token.parse::<EbuildUse>() {
                Ok(flag) => {
                    flags.insert(flag.name, flag.enabled);
                }
                Err(e) => warn!("Skipping IUSE entry: {}", e),
            }
        }
        flags
            .into_iter()
            .map(|(name, enabled)| EbuildUse { name, enabled })
            .collect()
    }
}

impl FromStr for EbuildUse {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, enabled) = match s.strip_prefix('-') {
            Some(name) => (name, false),
            None => (s.strip_prefix('+').unwrap_or(s), true),
        };
        if name.is_empty() {
            return Err(Error::InvalidIUse(s.to_string()));
        }
        Ok(EbuildUse {
            name: name.to_string(),
            enabled,
        })
    }
}

impl fmt::Display for EbuildUse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.enabled {
            write!(f, "{}", self.name)
        } else {
            write!(f, "-{}", self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain() {
        let flag: EbuildUse = "ssl".parse().unwrap();
        assert_eq!(flag.name, "ssl");
        assert!(flag.enabled);
    }

    #[test]
    fn parse_enabled_default() {
        let flag: EbuildUse = "+ssl".parse().unwrap();
        assert_eq!(flag.name, "ssl");
        assert!(flag.enabled);
    }

    #[test]
    fn parse_disabled_default() {
        let flag: EbuildUse = "-debug".parse().unwrap();
        assert_eq!(flag.name, "debug");
        assert!(!flag.enabled);
    }

    #[test]
    fn parse_line_sorts_and_dedupes() {
        let flags = EbuildUse::parse_line("zstd +asan -asan cros_host");
        assert_eq!(
            flags,
            vec![
                EbuildUse {
                    name: "asan".to_string(),
                    enabled: false
                },
                EbuildUse {
                    name: "cros_host".to_string(),
                    enabled: true
                },
                EbuildUse {
                    name: "zstd".to_string(),
                    enabled: true
                },
            ]
        );
    }

    #[test]
    fn parse_line_skips_invalid() {
        let flags = EbuildUse::parse_line("+ - test");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].name, "test");
    }

    #[test]
    fn parse_empty_line() {
        assert!(EbuildUse::parse_line("").is_empty());
    }

    #[test]
    fn invalid_bare_prefix() {
        assert!("".parse::<EbuildUse>().is_err());
        assert!("+".parse::<EbuildUse>().is_err());
        assert!("-".parse::<EbuildUse>().is_err());
    }

    #[test]
    fn display() {
        let flag: EbuildUse = "+ssl".parse().unwrap();
        assert_eq!(flag.to_string(), "ssl");
        let flag: EbuildUse = "-debug".parse().unwrap();
        assert_eq!(flag.to_string(), "-debug");
    }
}
