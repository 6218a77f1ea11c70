use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::options::Options;
use super::version::Version;
use crate::config::Config;
use crate::dependency::{Dependency, Requirement};

/// A prebuilt binary artifact descriptor for one formula/platform pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleSpec {
    /// The cellar path the bottle was built against, compared to the
    /// local cellar for compatibility by the bottle-eligibility oracle.
    pub cellar: String,
    pub url: String,
    pub sha256: String,
    pub rebuild: u32,
}

/// A declarative package description: the external collaborator the
/// installer core consumes but never parses from source itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub full_name: String,
    pub version: Version,
    pub desc: String,
    pub homepage: String,
    pub tap: std::option::Option<String>,

    pub deps: Vec<Dependency>,
    pub requirements: Vec<Requirement>,
    pub options: Options,
    pub conflicts: Vec<String>,

    pub bottle: std::option::Option<BottleSpec>,
    pub plist: std::option::Option<String>,
    pub post_install: bool,
    pub keg_only: bool,
    pub head: bool,
    pub devel: bool,

    pub url: String,
    pub sha256: String,
    pub mirrors: Vec<String>,
}

impl Formula {
    pub fn name(&self) -> &str {
        &self.full_name
    }

    /// `<formula>.version_str_full`, version plus `_{revision}` suffix
    /// when the revision is non-zero.
    pub fn version_str_full(&self) -> String {
        self.version.to_keg_str()
    }

    /// `<formula>.rack`.
    pub fn rack(&self, config: &Config) -> PathBuf {
        config.formula_rack_dir(&self.full_name)
    }

    /// `<formula>.prefix`.
    pub fn prefix(&self, config: &Config) -> PathBuf {
        config.formula_keg_path(&self.full_name, &self.version_str_full())
    }

    /// `<formula>.opt_prefix`.
    pub fn opt_prefix(&self, config: &Config) -> PathBuf {
        config.formula_opt_link_path(&self.full_name)
    }

    /// `<formula>.linked_keg`, sentinel symlink marking the active
    /// version. Distinct from `opt_prefix` in Homebrew's own model, but
    /// both point at the same location in this single-platform
    /// reimplementation, so the two are aliased here.
    pub fn linked_keg(&self, config: &Config) -> PathBuf {
        self.opt_prefix(config)
    }

    /// `<formula>.bottle_prefix`, the staging subtree a bottle archive is
    /// extracted into. Kept as a sibling of `prefix`, not an alias of it,
    /// so that removing it after a pour never touches the keg its
    /// contents were merged into.
    pub fn bottle_prefix(&self, config: &Config) -> PathBuf {
        let mut staging = self.prefix(config).into_os_string();
        staging.push(".bottle-stage");
        PathBuf::from(staging)
    }

    pub fn logs(&self, config: &Config) -> PathBuf {
        config.formula_logs_dir(&self.full_name)
    }

    pub fn var(&self, config: &Config) -> PathBuf {
        config.prefix().join("var")
    }

    pub fn etc(&self, config: &Config) -> PathBuf {
        config.prefix().join("etc")
    }
}

#[cfg(test)]
pub fn dummy(name: &str, version: &str) -> Formula {
    Formula {
        full_name: name.to_string(),
        version: Version::parse(version).unwrap(),
        desc: String::new(),
        homepage: String::new(),
        tap: None,
        deps: Vec::new(),
        requirements: Vec::new(),
        options: Options::new(),
        conflicts: Vec::new(),
        bottle: None,
        plist: None,
        post_install: false,
        keg_only: false,
        head: false,
        devel: false,
        url: format!("https://example.invalid/{name}-{version}.tar.gz"),
        sha256: "0".repeat(64),
        mirrors: Vec::new(),
    }
}
