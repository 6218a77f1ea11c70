use std::fmt;

use semver::Version as SemVersion;
use serde::{Deserialize, Serialize};

use crate::error::{KfError, Result};

/// A formula version plus the Homebrew-style revision suffix used to
/// disambiguate successive bottles of the same upstream version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub semver: SemVersion,
    pub revision: u32,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        let semver = SemVersion::parse(&normalized)
            .map_err(|e| KfError::ParseError("version", format!("'{raw}': {e}")))?;
        Ok(Self {
            semver,
            revision: 0,
        })
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// The string used as the keg directory name: `1.2.3` or `1.2.3_4` when
    /// `revision` is non-zero.
    pub fn to_keg_str(&self) -> String {
        if self.revision == 0 {
            self.semver.to_string()
        } else {
            format!("{}_{}", self.semver, self.revision)
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_keg_str())
    }
}

/// semver requires exactly `major.minor.patch`; most formula versions in
/// the wild only carry `major.minor` or bare `major`. Pad them out rather
/// than rejecting the version outright.
fn normalize(raw: &str) -> String {
    let dots = raw.chars().filter(|c| *c == '.').count();
    match dots {
        0 => format!("{raw}.0.0"),
        1 => format!("{raw}.0"),
        _ => raw.to_string(),
    }
}
