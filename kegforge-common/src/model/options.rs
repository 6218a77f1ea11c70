use std::fmt;

use serde::{Deserialize, Serialize};

/// A named build toggle, optionally carrying a value (`name=value`).
/// Equality and hashing are by name only; two options with the same name
/// but different values are "the same option" for union purposes, matching
/// the last-writer-wins semantics Homebrew-style option merging uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Option {
    pub name: String,
    pub value: std::option::Option<String>,
}

impl Option {
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl PartialEq for Option {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Option {}

impl fmt::Display for Option {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An insertion-ordered set of [`Option`]s. Ordering matters because the
/// build driver reconstructs a reproducible argv from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options(pub Vec<Option>);

impl PartialEq for Options {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Options {}
impl std::hash::Hash for Options {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for o in &self.0 {
            o.name.hash(state);
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|o| o.name == name)
    }

    pub fn get(&self, name: &str) -> std::option::Option<&Option> {
        self.0.iter().find(|o| o.name == name)
    }

    pub fn push(&mut self, opt: Option) {
        if !self.contains(&opt.name) {
            self.0.push(opt);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union of `self` and `other`, `self`'s entries taking precedence on
    /// name collision, preserving `self`'s order and appending any new
    /// names from `other`.
    pub fn union(&self, other: &Options) -> Options {
        let mut merged = self.clone();
        for opt in &other.0 {
            merged.push(opt.clone());
        }
        merged
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Option> {
        self.0.iter()
    }
}

impl FromIterator<Option> for Options {
    fn from_iter<T: IntoIterator<Item = Option>>(iter: T) -> Self {
        let mut opts = Options::new();
        for o in iter {
            opts.push(o);
        }
        opts
    }
}

/// The effective build configuration for one dependent: the args actually
/// in force (root-supplied, inherited from a parent, or recovered from a
/// previous install's tab) plus the formula's own declared options, which
/// together answer `with?`/`without?` for pruning optional and recommended
/// dependency edges.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub args: Options,
    pub declared: Options,
}

impl BuildOptions {
    pub fn new(args: Options, declared: Options) -> Self {
        Self { args, declared }
    }

    /// True when `name` was explicitly requested, either as `--with-name`
    /// or as a bare declared boolean flag (e.g. `--universal`).
    pub fn with(&self, name: &str) -> bool {
        self.args.contains(&format!("with-{name}")) || self.args.contains(name)
    }

    pub fn without(&self, name: &str) -> bool {
        !self.with(name)
    }

    /// Merge this set of effective args with another, used when a child
    /// installer inherits its parent's resolved options.
    pub fn merged_with(&self, inherited: &Options) -> BuildOptions {
        BuildOptions {
            args: self.args.union(inherited),
            declared: self.declared.clone(),
        }
    }
}
