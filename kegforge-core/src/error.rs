//! Installer-specific error taxonomy. Wraps [`KfError`] for the
//! I/O-shaped failures this crate has no opinion on; everything else is a
//! typed variant the propagation policy below can pattern-match on.

use kegforge_common::error::KfError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum InstallError {
    #[error("{0} is already being installed in this process")]
    AlreadyAttempted(String),

    #[error("{formula} {other_version} is already linked; run unlink before installing {wanted_version}")]
    AlreadyLinkedDifferentVersion {
        formula: String,
        other_version: String,
        wanted_version: String,
    },

    #[error("the following dependencies are installed but not linked: {0:?}")]
    UnlinkedDependencies(Vec<String>),

    #[error("{formula} conflicts with linked formula {conflicting}")]
    Conflict {
        formula: String,
        conflicting: String,
    },

    #[error("{formula} has unsatisfied requirements: {requirements:?}")]
    UnsatisfiedRequirements {
        formula: String,
        requirements: Vec<String>,
    },

    #[error("formula '{0}' is unavailable")]
    FormulaUnavailable(String),

    #[error("formula '{formula}' is unavailable in tap (needed by {dependent})")]
    TapFormulaUnavailable { formula: String, dependent: String },

    #[error("bottle pour failed for {formula}: {reason}")]
    PourFailed { formula: String, reason: String },

    #[error("build failed for {formula}: {reason}")]
    BuildFailed { formula: String, reason: String },

    #[error("link conflict for {formula}: {conflicting_paths:?}")]
    LinkConflict {
        formula: String,
        conflicting_paths: Vec<String>,
    },

    #[error("link error for {formula}: {reason}")]
    LinkError { formula: String, reason: String },

    #[error("plist install failed for {formula}: {reason}")]
    PlistInstallFailed { formula: String, reason: String },

    #[error("install-name relocation failed for {formula}: {reason}")]
    FixInstallNamesFailed { formula: String, reason: String },

    #[error("post-install cleanup failed for {formula}: {reason}")]
    CleanFailed { formula: String, reason: String },

    #[error("post-install hook failed for {formula}: {reason}")]
    PostInstallFailed { formula: String, reason: String },

    #[error("failed to acquire lock for {0}")]
    LockFailed(String),

    #[error(transparent)]
    Collaborator(#[from] KfError),
}

pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    /// Errors in this set leave the system in a known-good state and
    /// propagate unchanged. Everything else is either a mutation-window
    /// failure (rolled back before re-raise) or a post-build finishing
    /// failure (absorbed into a warning).
    pub fn is_preflight_class(&self) -> bool {
        matches!(
            self,
            InstallError::AlreadyAttempted(_)
                | InstallError::AlreadyLinkedDifferentVersion { .. }
                | InstallError::UnlinkedDependencies(_)
                | InstallError::Conflict { .. }
                | InstallError::UnsatisfiedRequirements { .. }
                | InstallError::FormulaUnavailable(_)
                | InstallError::TapFormulaUnavailable { .. }
        )
    }

    /// Non-fatal finishing-step errors: installation is kept,
    /// a warning is shown, and the process-wide failure flag is set.
    pub fn is_non_fatal_finishing(&self) -> bool {
        matches!(
            self,
            InstallError::LinkConflict { .. }
                | InstallError::LinkError { .. }
                | InstallError::PlistInstallFailed { .. }
                | InstallError::FixInstallNamesFailed { .. }
                | InstallError::CleanFailed { .. }
                | InstallError::PostInstallFailed { .. }
        )
    }
}
