use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An item the finisher linked into the shared prefix, recorded so
/// `unlink`/uninstall can reverse it precisely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstalledArtifact {
    /// A command-line binary symlinked into the prefix's bin dir.
    BinaryLink {
        link_path: PathBuf,
        target_path: PathBuf,
    },
    /// A man page symlinked into the prefix's man dir.
    ManpageLink {
        link_path: PathBuf,
        target_path: PathBuf,
    },
    /// A directory entry (lib/include/share subdir item) symlinked
    /// top-level into the prefix.
    DirectoryLink {
        link_path: PathBuf,
        target_path: PathBuf,
    },
    /// The `opt/<name>` symlink itself.
    OptLink {
        link_path: PathBuf,
        target_path: PathBuf,
    },
}
