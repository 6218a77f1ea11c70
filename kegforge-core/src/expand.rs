//! Requirement and dependency expansion. The original uses
//! control-flow exceptions inside a traversal callback to signal pruning;
//! per the Design Notes this is modeled as a return-valued `Decision`
//! instead (`Keep | Prune | Skip`), so expansion can be driven by a
//! plain recursive walk and unit-tested against synthetic formula graphs
//! without constructing a whole installer.

use std::collections::{HashMap, HashSet};

use kegforge_common::model::{BuildOptions, Formula, Option as KfOption, Options};
use kegforge_common::{Dependency, DependencyTag, Requirement};

use crate::error::Result;

/// What the dependency-expansion visitor does with one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Install this node (after first visiting its own subtree, so the
    /// result stays leaves-first).
    Keep,
    /// Drop this edge and its subtree entirely.
    Prune,
    /// Don't install this node, but keep walking its subtree for
    /// indirect dependencies.
    Skip,
}

/// External collaborators expansion needs: a formula loader, and three
/// installer-computed predicates it has no business owning itself
/// (whether a name is effectively the root, whether a dependent will be
/// poured from a bottle, and that dependent's effective build options).
pub struct ExpansionContext<'a> {
    pub load: &'a dyn Fn(&str) -> Option<Formula>,
    pub will_be_poured: &'a dyn Fn(&str) -> bool,
    pub build_options_for: &'a dyn Fn(&str) -> BuildOptions,
    pub is_satisfied: &'a dyn Fn(&str, &Options) -> bool,
    pub root_universal: bool,
    pub building_bottle: bool,
}

/// "Requirement expansion". Returns unsatisfied requirements
/// keyed by dependent formula name, and the dependency edges materialized
/// from requirements with a `default_formula`, in the order they should
/// be prepended to the formula's own declared deps.
pub fn expand_requirements(
    root: &Formula,
    ctx: &ExpansionContext,
) -> (HashMap<String, Vec<Requirement>>, Vec<Dependency>) {
    let mut unsatisfied: HashMap<String, Vec<Requirement>> = HashMap::new();
    let mut materialized: Vec<Dependency> = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(formula) = stack.pop() {
        if !seen.insert(formula.full_name.clone()) {
            continue;
        }
        let dependent = formula.full_name.clone();
        let build = (ctx.build_options_for)(&dependent);
        let poured = (ctx.will_be_poured)(&dependent);

        for req in &formula.requirements {
            if req.tags.intersects(DependencyTag::OPTIONAL | DependencyTag::RECOMMENDED)
                && build.without(&dependent)
            {
                continue;
            }
            if req.tags.contains(DependencyTag::BUILD) && poured {
                continue;
            }

            let satisfied_and_runtime_only =
                req.satisfied() && req.tags.contains(DependencyTag::RUNTIME);

            if req.has_default_formula()
                && (!req.satisfied() || !satisfied_and_runtime_only)
                && (poured || ctx.building_bottle)
            {
                if let Some(dep) = req.to_dependency() {
                    if let Some(dep_formula) = (ctx.load)(&dep.name) {
                        stack.push(dep_formula);
                    }
                    materialized.insert(0, dep);
                }
                continue;
            }

            if req.satisfied() {
                continue;
            }

            unsatisfied.entry(dependent.clone()).or_default().push(req.clone());
        }
    }

    (unsatisfied, materialized)
}

/// "Dependency expansion". `extra_deps` are the requirement-
/// materialized edges, already ordered to be prepended ahead of the
/// formula's own declared deps. Returns an ordered `[(dep, inherited
/// options)]` list, leaves first (testable property #2).
pub fn expand_dependencies(
    root: &Formula,
    extra_deps: &[Dependency],
    ctx: &ExpansionContext,
) -> Result<Vec<(Dependency, Options)>> {
    let mut ordered = Vec::new();
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();

    let mut all_deps = extra_deps.to_vec();
    all_deps.extend(root.deps.iter().cloned());

    visit(
        &root.full_name,
        &all_deps,
        ctx,
        &mut ordered,
        &mut visited,
        &mut visiting,
    );
    Ok(ordered)
}

fn visit(
    dependent_name: &str,
    deps: &[Dependency],
    ctx: &ExpansionContext,
    ordered: &mut Vec<(Dependency, Options)>,
    visited: &mut HashSet<String>,
    visiting: &mut HashSet<String>,
) {
    for dep in deps {
        if visiting.contains(&dep.name) {
            // Cycle: this edge's target is an ancestor in the current
            // traversal path. Drop it rather than recursing forever.
            continue;
        }

        let build = (ctx.build_options_for)(dependent_name);
        let inherited = inherited_options(ctx, dep);
        let decision = decide(dep, dependent_name, &build, ctx, &inherited);

        match decision {
            Decision::Prune => continue,
            Decision::Skip => {
                recurse_into(dep, ctx, ordered, visited, visiting);
            }
            Decision::Keep => {
                if visited.contains(&dep.name) {
                    continue;
                }
                recurse_into(dep, ctx, ordered, visited, visiting);
                if visited.insert(dep.name.clone()) {
                    ordered.push((dep.clone(), inherited));
                }
            }
        }
    }
}

fn recurse_into(
    dep: &Dependency,
    ctx: &ExpansionContext,
    ordered: &mut Vec<(Dependency, Options)>,
    visited: &mut HashSet<String>,
    visiting: &mut HashSet<String>,
) {
    if let Some(dep_formula) = (ctx.load)(&dep.name) {
        visiting.insert(dep.name.clone());
        visit(
            &dep.name,
            &dep_formula.deps,
            ctx,
            ordered,
            visited,
            visiting,
        );
        visiting.remove(&dep.name);
    }
}

fn decide(
    dep: &Dependency,
    dependent_name: &str,
    build: &BuildOptions,
    ctx: &ExpansionContext,
    inherited: &Options,
) -> Decision {
    if dep.tags.intersects(DependencyTag::OPTIONAL | DependencyTag::RECOMMENDED)
        && build.without(&dep.name)
    {
        return Decision::Prune;
    }
    if dep.tags.contains(DependencyTag::BUILD) && (ctx.will_be_poured)(dependent_name) {
        return Decision::Prune;
    }
    if (ctx.is_satisfied)(&dep.name, inherited) {
        return Decision::Skip;
    }
    Decision::Keep
}

fn inherited_options(ctx: &ExpansionContext, dep: &Dependency) -> Options {
    let mut opts = Options::new();
    if !ctx.root_universal || dep.tags.contains(DependencyTag::BUILD) {
        return opts;
    }
    if let Some(dep_formula) = (ctx.load)(&dep.name) {
        if dep_formula.options.contains("universal") {
            opts.push(KfOption::flag("universal"));
        }
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegforge_common::model::version::Version;

    fn dummy(name: &str, version: &str) -> Formula {
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

    fn graph() -> HashMap<String, Formula> {
        let mut leaf = dummy("leaf", "1.0");
        leaf.deps = vec![];

        let mut mid = dummy("mid", "1.0");
        mid.deps = vec![Dependency::new_runtime("leaf")];

        let mut root = dummy("root", "1.0");
        root.deps = vec![Dependency::new_runtime("mid")];

        [("leaf", leaf), ("mid", mid), ("root", root)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn default_ctx<'a>(graph: &'a HashMap<String, Formula>) -> ExpansionContext<'a> {
        ExpansionContext {
            load: &move |name| graph.get(name).cloned(),
            will_be_poured: &|_| false,
            build_options_for: &|_| BuildOptions::default(),
            is_satisfied: &|_, _| false,
            root_universal: false,
            building_bottle: false,
        }
    }

    #[test]
    fn leaves_come_before_dependents() {
        let graph = graph();
        let ctx = default_ctx(&graph);
        let root = graph.get("root").unwrap();
        let order = expand_dependencies(root, &[], &ctx).unwrap();
        let names: Vec<_> = order.iter().map(|(d, _)| d.name.clone()).collect();
        assert_eq!(names, vec!["leaf".to_string(), "mid".to_string()]);
    }

    #[test]
    fn build_tagged_edge_pruned_when_dependent_is_poured() {
        let mut root = dummy("root", "1.0");
        root.deps = vec![Dependency::new_with_tags(
            "builder",
            DependencyTag::BUILD,
        )];
        let mut graph = HashMap::new();
        graph.insert("root".to_string(), root.clone());
        graph.insert("builder".to_string(), dummy("builder", "1.0"));

        let ctx = ExpansionContext {
            load: &|name| graph.get(name).cloned(),
            will_be_poured: &|_| true,
            build_options_for: &|_| BuildOptions::default(),
            is_satisfied: &|_, _| false,
            root_universal: false,
            building_bottle: false,
        };
        let order = expand_dependencies(&root, &[], &ctx).unwrap();
        assert!(order.is_empty());
    }

    #[test]
    fn unsatisfiable_requirement_materializes_default_when_building_bottle() {
        let req = Requirement::new(kegforge_common::RequirementKind::Other("thing".into()))
            .with_default_formula("thing")
            .with_tags(DependencyTag::RUNTIME);
        let mut root = dummy("root", "1.0");
        root.requirements = vec![req];
        let mut graph = HashMap::new();
        graph.insert("root".to_string(), root.clone());
        graph.insert("thing".to_string(), dummy("thing", "1.0"));

        let ctx = ExpansionContext {
            load: &|name| graph.get(name).cloned(),
            will_be_poured: &|_| false,
            build_options_for: &|_| BuildOptions::default(),
            is_satisfied: &|_, _| false,
            root_universal: false,
            building_bottle: true,
        };
        let (unsatisfied, materialized) = expand_requirements(&root, &ctx);
        assert!(unsatisfied.is_empty());
        assert_eq!(materialized.len(), 1);
        assert_eq!(materialized[0].name, "thing");
    }

    #[test]
    fn unmaterializable_requirement_is_recorded_unsatisfied() {
        let req = Requirement::new(kegforge_common::RequirementKind::Other("widget".into()));
        let mut root = dummy("root", "1.0");
        root.requirements = vec![req];
        let graph: HashMap<String, Formula> = [("root".to_string(), root.clone())]
            .into_iter()
            .collect();
        let ctx = default_ctx(&graph);
        let (unsatisfied, materialized) = expand_requirements(&root, &ctx);
        assert!(materialized.is_empty());
        assert_eq!(unsatisfied.get("root").map(|v| v.len()), Some(1));
    }

    #[test]
    fn optional_edge_pruned_when_without() {
        let mut root = dummy("root", "1.0");
        root.deps = vec![Dependency::new_with_tags(
            "opt_dep",
            DependencyTag::OPTIONAL,
        )];
        let mut graph = HashMap::new();
        graph.insert("root".to_string(), root.clone());
        graph.insert("opt_dep".to_string(), dummy("opt_dep", "1.0"));

        let ctx = ExpansionContext {
            load: &|name| graph.get(name).cloned(),
            will_be_poured: &|_| false,
            build_options_for: &|_| BuildOptions::default(),
            is_satisfied: &|_, _| false,
            root_universal: false,
            building_bottle: false,
        };
        // BuildOptions::without defaults to true (nothing requested with
        // this name), so the optional edge should prune.
        let order = expand_dependencies(&root, &[], &ctx).unwrap();
        assert!(order.is_empty());
    }
}
