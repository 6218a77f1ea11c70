// Tab sidecar: the `INSTALL_RECEIPT.json` written into each keg at finish
// time, read back by uninstall/upgrade to recover how a formula
// was installed without re-deriving it from the formula definition.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{KfError, Result};
use super::model::options::Options;

pub const TAB_FILE_NAME: &str = "INSTALL_RECEIPT.json";

/// A keg's install receipt: everything needed to reconstruct the
/// circumstances of its install without re-resolving the formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub used_options: Options,
    pub compiler: String,
    pub tap: std::option::Option<String>,
    pub poured_from_bottle: bool,
    pub installed_as_dependency: bool,
    pub installed_on_request: bool,
    pub time: DateTime<Utc>,
    pub source_modified_time: std::option::Option<DateTime<Utc>>,
    pub runtime_dependencies: Vec<String>,
}

impl Tab {
    pub fn new(
        used_options: Options,
        poured_from_bottle: bool,
        installed_as_dependency: bool,
    ) -> Self {
        Self {
            used_options,
            compiler: "cc".to_string(),
            tap: None,
            poured_from_bottle,
            installed_as_dependency,
            installed_on_request: !installed_as_dependency,
            time: Utc::now(),
            source_modified_time: None,
            runtime_dependencies: Vec::new(),
        }
    }

    pub fn path_for(keg_path: &Path) -> std::path::PathBuf {
        keg_path.join(TAB_FILE_NAME)
    }

    pub fn write_to(&self, keg_path: &Path) -> Result<()> {
        let path = Self::path_for(keg_path);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .map_err(|e| KfError::Io(std::sync::Arc::new(e)))?;
        Ok(())
    }

    pub fn read_from(keg_path: &Path) -> Result<Self> {
        let path = Self::path_for(keg_path);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| KfError::Io(std::sync::Arc::new(e)))?;
        let tab = serde_json::from_str(&raw)?;
        Ok(tab)
    }

    pub fn exists_in(keg_path: &Path) -> bool {
        Self::path_for(keg_path).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let tab = Tab::new(Options::new(), true, false);
        tab.write_to(dir.path()).unwrap();
        assert!(Tab::exists_in(dir.path()));
        let loaded = Tab::read_from(dir.path()).unwrap();
        assert_eq!(loaded.poured_from_bottle, tab.poured_from_bottle);
        assert!(loaded.installed_on_request);
    }
}
