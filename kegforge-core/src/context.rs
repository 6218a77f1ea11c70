//! Process-wide installer state, threaded through calls as a single
//! context value: the root installer owns it, and child
//! dependency-installers receive a reference. Cross-formula reentrancy
//! guards and lock ownership live here instead of as global singletons,
//! passed by `&mut` down the recursion.

use std::collections::HashSet;

use crate::error::{InstallError, Result};
use crate::lock::FormulaLock;

/// Threaded through one root install and every dependency install it
/// recurses into. `attempted` prevents cycles and duplicate work;
/// `locks` holds every lock the root acquired at prelude time, released
/// exactly once when the root's finisher returns.
#[derive(Default)]
pub struct InstallerContext {
    attempted: HashSet<String>,
    locks: Vec<FormulaLock>,
    /// `true` only for the installer that first populated `locks`, the
    /// root. Nested dependency installers observe `locks` as already
    /// non-empty and must not release it themselves.
    owns_locks: bool,
}

impl InstallerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails fast if `name` is already in `attempted`;
    /// otherwise records it. A formula is added here regardless of
    /// whether the install goes on to actually build/pour it, so a later
    /// `only_deps` call can't re-attempt something already in progress.
    pub fn enter(&mut self, name: &str) -> Result<()> {
        if self.attempted.contains(name) {
            return Err(InstallError::AlreadyAttempted(name.to_string()));
        }
        self.attempted.insert(name.to_string());
        Ok(())
    }

    pub fn has_attempted(&self, name: &str) -> bool {
        self.attempted.contains(name)
    }

    /// Installs the given locks as this context's held set, iff no locks
    /// are held yet (this is therefore the root installer). Returns
    /// whether this call took ownership of release.
    pub fn adopt_locks(&mut self, locks: Vec<FormulaLock>) -> bool {
        if self.locks.is_empty() && !locks.is_empty() {
            self.locks = locks;
            self.owns_locks = true;
            true
        } else {
            false
        }
    }

    pub fn holds_locks(&self) -> bool {
        !self.locks.is_empty()
    }

    /// Releases every held lock, but only if this context is the root
    /// that originally acquired them, released exactly once, in the
    /// root finisher's scoped-release block.
    pub fn release_locks_if_owner(&mut self) {
        if self.owns_locks {
            self.locks.clear();
            self.owns_locks = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempted_set_rejects_reentry() {
        let mut ctx = InstallerContext::new();
        ctx.enter("foo").unwrap();
        assert!(ctx.enter("foo").is_err());
    }

    #[test]
    fn only_first_adopt_takes_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let config = kegforge_common::config::Config {
            prefix: dir.path().join("p"),
            cellar: dir.path().join("p/Cellar"),
            taps_dir: dir.path().join("p/Taps"),
            cache_dir: dir.path().join("cache"),
            no_emoji: true,
            install_badge: None,
        };
        let mut ctx = InstallerContext::new();
        let locks = crate::lock::acquire_all(&config, &["foo".to_string()]).unwrap();
        assert!(ctx.adopt_locks(locks));
        assert!(ctx.holds_locks());

        let more = crate::lock::acquire_all(&config, &["bar".to_string()]).unwrap();
        assert!(!ctx.adopt_locks(more));
    }
}
