//! Formula installer core: computes an install plan from a
//! formula's dependency graph, orchestrates recursive dependency
//! installation with locking and transactional upgrade safety, chooses
//! between pouring a bottle and building from source, and links the
//! result into a shared prefix.

pub mod build;
pub mod context;
pub mod error;
pub mod expand;
pub mod finish;
pub mod installer;
pub mod lock;
pub mod oracle;
pub mod pour;
pub mod preflight;
pub mod rollback;
pub mod uninstall;
pub mod upgrade;

pub use context::InstallerContext;
pub use error::{InstallError, Result};
pub use installer::{Collaborators, Installer, InstallOutcome, ModeFlags};
