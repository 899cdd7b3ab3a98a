//! Dependency resolution over the registry.
//!
//! Only *hard* requirements (unqualified names, or `type:name` where the type
//! is the add-on's own) are resolved and cascaded. `__app__` is checked
//! against the host version; cross-type qualified keys are advisory.

use std::collections::{HashMap, HashSet};

use semver::{Version, VersionReq};
use tracing::{debug, error, warn};

use crate::descriptor::{ANY_VERSION, AddonDescriptor, AddonKey, Requirement};
use crate::error::{AddonError, AddonResult, DependencyIssue};
use crate::registry::AddonRegistry;

/// Knobs for [`check_dependencies`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyPolicy {
    /// Accept blacklisted dependencies.
    pub ignore_blacklist: bool,
}

impl DependencyPolicy {
    /// Policy that lets blacklisted add-ons through.
    pub fn ignoring_blacklist() -> Self {
        Self {
            ignore_blacklist: true,
        }
    }
}

/// Keys of every hard dependency, in declaration order.
pub fn hard_dependencies(descriptor: &AddonDescriptor) -> Vec<AddonKey> {
    descriptor
        .requirements()
        .filter_map(|req| match req {
            Requirement::Hard { name, .. } => Some(AddonKey::new(descriptor.addon_type(), name)),
            _ => None,
        })
        .collect()
}

/// Verifies that every requirement of `descriptor` can be satisfied.
///
/// Pure: the registry is never mutated.
pub fn check_dependencies(
    registry: &AddonRegistry,
    descriptor: &AddonDescriptor,
    policy: DependencyPolicy,
) -> AddonResult<()> {
    let addon = descriptor.key();

    for req in descriptor.requirements() {
        match req {
            Requirement::App { spec } => {
                let Some(app_version) = registry.app_version() else {
                    continue;
                };
                if let Err(issue) = satisfies(spec, Some(app_version)) {
                    return Err(AddonError::dependency(addon.clone(), "__app__", issue));
                }
            }
            Requirement::Soft {
                addon_type, name, ..
            } => {
                debug!(
                    addon = %addon,
                    dependency_type = %addon_type,
                    dependency = %name,
                    "Cross-type requirement is advisory, not checked"
                );
            }
            Requirement::Hard { name, spec } => {
                let dep = AddonKey::new(addon.addon_type(), name);
                let Ok(found) = registry.get_key(&dep) else {
                    return Err(AddonError::dependency(
                        addon.clone(),
                        name,
                        DependencyIssue::Missing,
                    ));
                };
                if registry.is_blacklisted(&dep) && !policy.ignore_blacklist {
                    return Err(AddonError::dependency(
                        addon.clone(),
                        name,
                        DependencyIssue::Blacklisted,
                    ));
                }
                if let Err(issue) = satisfies(spec, found.version()) {
                    return Err(AddonError::dependency(addon.clone(), name, issue));
                }
            }
        }
    }
    Ok(())
}

/// Walks hard dependencies from `root` and fails if any path returns to a
/// node already on it.
///
/// Missing dependencies are ignored here; [`check_dependencies`] reports them.
pub fn check_cycles(registry: &AddonRegistry, root: &AddonKey) -> AddonResult<()> {
    let mut done: HashSet<AddonKey> = HashSet::new();
    let mut path: Vec<AddonKey> = vec![root.clone()];
    let mut stack: Vec<std::vec::IntoIter<AddonKey>> = vec![registered_deps(registry, root).into_iter()];

    while let Some(frontier) = stack.last_mut() {
        match frontier.next() {
            Some(dep) => {
                if path.contains(&dep) {
                    let via = path.last().cloned().unwrap_or_else(|| root.clone());
                    return Err(AddonError::dependency(
                        root.clone(),
                        dep.name(),
                        DependencyIssue::Cycle { via },
                    ));
                }
                if done.contains(&dep) {
                    continue;
                }
                let next = registered_deps(registry, &dep);
                path.push(dep);
                stack.push(next.into_iter());
            }
            None => {
                stack.pop();
                if let Some(finished) = path.pop() {
                    done.insert(finished);
                }
            }
        }
    }
    Ok(())
}

fn registered_deps(registry: &AddonRegistry, key: &AddonKey) -> Vec<AddonKey> {
    registry
        .get_key(key)
        .map(hard_dependencies)
        .unwrap_or_default()
        .into_iter()
        .filter(|dep| registry.get_key(dep).is_ok())
        .collect()
}

/// Orders every add-on of a kind so that dependencies precede dependents.
///
/// Uses Kahn's algorithm; add-ons of one layer keep registration order. If a
/// cycle exists it is logged and the remaining add-ons are appended in
/// registration order.
pub fn load_order(registry: &AddonRegistry, addon_type: &str) -> Vec<AddonKey> {
    let nodes: Vec<&AddonDescriptor> = registry.all(addon_type).collect();
    match topological_layers(&nodes) {
        Ok(layers) => layers
            .into_iter()
            .flatten()
            .map(|i| nodes[i].key().clone())
            .collect(),
        Err((layers, stuck)) => {
            error!(
                addon_type = %addon_type,
                addons = %stuck.iter().map(|&i| nodes[i].name()).collect::<Vec<_>>().join(", "),
                "Dependency cycle detected; order among these add-ons is not guaranteed"
            );
            layers
                .into_iter()
                .flatten()
                .chain(stuck)
                .map(|i| nodes[i].key().clone())
                .collect()
        }
    }
}

type Layers = Vec<Vec<usize>>;

fn topological_layers(nodes: &[&AddonDescriptor]) -> Result<Layers, (Layers, Vec<usize>)> {
    let n = nodes.len();
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name(), i))
        .collect();

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, desc) in nodes.iter().enumerate() {
        for dep in hard_dependencies(desc) {
            match index.get(dep.name()) {
                Some(&provider) if provider != i => {
                    dependents[provider].push(i);
                    in_degree[i] += 1;
                }
                Some(_) => {
                    warn!(addon = %desc.key(), "Add-on requires itself; ignored");
                }
                None => {
                    debug!(addon = %desc.key(), dependency = %dep.name(), "Unresolved dependency");
                }
            }
        }
    }

    let mut layers: Layers = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while !current.is_empty() {
        processed += current.len();
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        layers.push(current);
        current = next;
    }

    if processed != n {
        let stuck = (0..n).filter(|&i| in_degree[i] > 0).collect();
        return Err((layers, stuck));
    }
    Ok(layers)
}

// ─── Versions ────────────────────────────────────────────────────────────────

/// Checks `version` against a requirement string.
///
/// `*` and empty requirements accept anything. Requirements or versions that
/// do not parse as semver are accepted with a warning; short versions such as
/// `1.2` are padded.
fn satisfies(spec: &str, version: Option<&str>) -> Result<(), DependencyIssue> {
    let spec = spec.trim();
    if spec.is_empty() || spec == ANY_VERSION {
        return Ok(());
    }
    let Some(version) = version else {
        debug!(required = %spec, "Dependency declares no version; accepted");
        return Ok(());
    };

    let req = match VersionReq::parse(spec) {
        Ok(req) => req,
        Err(e) => {
            warn!(required = %spec, error = %e, "Unparsable version requirement; accepted");
            return Ok(());
        }
    };
    let Some(parsed) = parse_version(version) else {
        warn!(version = %version, "Unparsable version; accepted");
        return Ok(());
    };

    if req.matches(&parsed) {
        Ok(())
    } else {
        Err(DependencyIssue::VersionMismatch {
            required: spec.to_string(),
            found: version.to_string(),
        })
    }
}

fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(version) {
        return Some(v);
    }
    let mut parts: Vec<&str> = version.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return None;
    }
    parts.resize(3, "0");
    Version::parse(&parts.join(".")).ok()
}
