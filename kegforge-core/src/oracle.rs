//! Bottle-eligibility oracle. Pure decision functions so the
//! eight `pour_bottle?` negative gates (testable property #8) can be
//! exercised without constructing a whole installer.

use kegforge_common::model::{BottleSpec, Options};

/// The subset of installer mode flags the oracle consults. Kept separate
/// from `InstallerState` so these functions stay free of the rest of the
/// installer's mutable fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleFlags {
    pub pour_failed: bool,
    pub build_from_source: bool,
    pub build_bottle: bool,
    pub force_bottle: bool,
    pub interactive: bool,
}

/// Whether the local cellar is compatible with the cellar a bottle was
/// built against. A bottle built against a different cellar path embeds
/// absolute paths that won't resolve locally.
pub fn cellar_compatible(bottle: &BottleSpec, local_cellar: &str) -> bool {
    bottle.cellar == local_cellar || bottle.cellar == "any" || bottle.cellar == "any_skip_relocation"
}

/// `pour_bottle?(warn)`. `formula_modified` is whether the
/// formula file on disk differs from what was fetched; `local_bottle_path`
/// bypasses that gate. `warn` controls whether a cellar-incompatibility
/// warning is surfaced via the returned `Option<String>` (present = the
/// warning text to show; the decision itself is the `bool`).
pub fn pour_bottle(
    flags: &OracleFlags,
    options: &Options,
    bottle: Option<&BottleSpec>,
    local_cellar: &str,
    formula_modified: bool,
    local_bottle_path: bool,
    external_hook_claims_bottle: bool,
    warn: bool,
) -> (bool, Option<String>) {
    if external_hook_claims_bottle {
        return (true, None);
    }
    if flags.force_bottle && bottle.is_some() {
        return (true, None);
    }

    if flags.pour_failed
        || flags.build_from_source
        || flags.build_bottle
        || flags.interactive
        || !options.is_empty()
        || (formula_modified && !local_bottle_path)
    {
        return (false, None);
    }

    let Some(bottle) = bottle else {
        return (false, None);
    };

    if cellar_compatible(bottle, local_cellar) {
        (true, None)
    } else if warn {
        (
            false,
            Some(format!(
                "bottle cellar '{}' incompatible with local cellar '{local_cellar}'; building from source",
                bottle.cellar
            )),
        )
    } else {
        (false, None)
    }
}

/// `install_bottle_for?(dep, build)`, the same question for a
/// transitive dependency. `dep_options_used` is whether the dependent's
/// effective build applied any non-empty options to this dep's edge.
pub fn install_bottle_for_dependency(
    bottle: Option<&BottleSpec>,
    local_cellar: &str,
    dep_options_used: bool,
) -> bool {
    match bottle {
        Some(b) => !dep_options_used && cellar_compatible(b, local_cellar),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bottle(cellar: &str) -> BottleSpec {
        BottleSpec {
            cellar: cellar.to_string(),
            url: "https://example.invalid/x.tar.gz".into(),
            sha256: "0".repeat(64),
            rebuild: 0,
        }
    }

    #[test]
    fn pours_when_bottle_matches_local_cellar() {
        let flags = OracleFlags::default();
        let (decision, warning) = pour_bottle(
            &flags,
            &Options::new(),
            Some(&bottle("/usr/local/Cellar")),
            "/usr/local/Cellar",
            false,
            false,
            false,
            true,
        );
        assert!(decision);
        assert!(warning.is_none());
    }

    #[test]
    fn every_negative_gate_forces_source_build() {
        let base = OracleFlags::default();
        let cases = [
            OracleFlags {
                pour_failed: true,
                ..base
            },
            OracleFlags {
                build_from_source: true,
                ..base
            },
            OracleFlags {
                build_bottle: true,
                ..base
            },
            OracleFlags {
                interactive: true,
                ..base
            },
        ];
        for flags in cases {
            let (decision, _) = pour_bottle(
                &flags,
                &Options::new(),
                Some(&bottle("/usr/local/Cellar")),
                "/usr/local/Cellar",
                false,
                false,
                false,
                false,
            );
            assert!(!decision, "expected source build for {flags:?}");
        }
    }

    #[test]
    fn nonempty_options_force_source_build_absent_force_bottle() {
        let flags = OracleFlags::default();
        let mut options = Options::new();
        options.push(kegforge_common::model::Option::flag("with-foo"));
        let (decision, _) = pour_bottle(
            &flags,
            &options,
            Some(&bottle("/usr/local/Cellar")),
            "/usr/local/Cellar",
            false,
            false,
            false,
            false,
        );
        assert!(!decision);
    }

    #[test]
    fn force_bottle_overrides_negative_gates() {
        let flags = OracleFlags {
            force_bottle: true,
            build_from_source: true,
            ..OracleFlags::default()
        };
        let (decision, _) = pour_bottle(
            &flags,
            &Options::new(),
            Some(&bottle("/usr/local/Cellar")),
            "/usr/local/Cellar",
            false,
            false,
            false,
            false,
        );
        assert!(decision);
    }

    #[test]
    fn modified_formula_blocks_unless_local_bottle_path() {
        let flags = OracleFlags::default();
        let (blocked, _) = pour_bottle(
            &flags,
            &Options::new(),
            Some(&bottle("/usr/local/Cellar")),
            "/usr/local/Cellar",
            true,
            false,
            false,
            false,
        );
        assert!(!blocked);

        let (allowed, _) = pour_bottle(
            &flags,
            &Options::new(),
            Some(&bottle("/usr/local/Cellar")),
            "/usr/local/Cellar",
            true,
            true,
            false,
            false,
        );
        assert!(allowed);
    }

    #[test]
    fn cellar_mismatch_warns_when_requested() {
        let flags = OracleFlags::default();
        let (decision, warning) = pour_bottle(
            &flags,
            &Options::new(),
            Some(&bottle("/opt/other/Cellar")),
            "/usr/local/Cellar",
            false,
            false,
            false,
            true,
        );
        assert!(!decision);
        assert!(warning.is_some());
    }
}
