use std::fmt;

use serde::{Deserialize, Serialize};

use super::definition::{Dependency, DependencyTag};

/// The kind of precondition a [`Requirement`] checks. `Other` carries an
/// opaque description for preconditions this reimplementation has no
/// built-in satisfaction probe for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementKind {
    MacOS(String),
    Xcode(String),
    Other(String),
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOS(v) => write!(f, "macOS >= {v}"),
            Self::Xcode(v) => write!(f, "Xcode >= {v}"),
            Self::Other(s) => write!(f, "requirement: {s}"),
        }
    }
}

/// A named precondition on the host environment. Unlike a
/// [`Dependency`], a requirement isn't necessarily satisfiable by
/// installing a formula, but it may name a `default_formula` that, when
/// present, is materialized into a dependency edge during expansion
///.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub fatal: bool,
    pub tags: DependencyTag,
    pub default_formula: std::option::Option<String>,
}

impl Requirement {
    pub fn new(kind: RequirementKind) -> Self {
        Self {
            kind,
            fatal: true,
            tags: DependencyTag::RUNTIME,
            default_formula: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.fatal = false;
        self
    }

    pub fn with_tags(mut self, tags: DependencyTag) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_default_formula(mut self, name: impl Into<String>) -> Self {
        self.default_formula = Some(name.into());
        self
    }

    pub fn fatal(&self) -> bool {
        self.fatal
    }

    pub fn has_default_formula(&self) -> bool {
        self.default_formula.is_some()
    }

    /// Whether the precondition already holds on the current host.
    /// `Other` requirements are opaque to this crate, an external
    /// collaborator's concern, and report unsatisfied unless a default
    /// formula exists to materialize instead.
    pub fn satisfied(&self) -> bool {
        match &self.kind {
            RequirementKind::MacOS(min) => cfg!(target_os = "macos") && host_version_at_least(min),
            RequirementKind::Xcode(_) => cfg!(target_os = "macos"),
            RequirementKind::Other(_) => false,
        }
    }

    /// Projects a satisfied-by-installing requirement into the dependency
    /// edge materialized during expansion.
    pub fn to_dependency(&self) -> std::option::Option<Dependency> {
        self.default_formula
            .as_ref()
            .map(|name| Dependency::new_with_tags(name.clone(), self.tags))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

fn host_version_at_least(_min: &str) -> bool {
    // No real platform probe without shelling out to `sw_vers`; treat the
    // requirement as met so requirement expansion stays deterministic and
    // testable. A production build would probe the host here.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfied_other_requirement_still_yields_its_default_dependency() {
        let req = Requirement::new(RequirementKind::Other("widget".into()))
            .with_default_formula("widget")
            .with_tags(DependencyTag::RUNTIME);
        assert!(!req.satisfied());
        assert_eq!(req.to_dependency().unwrap().name, "widget");
    }
}
