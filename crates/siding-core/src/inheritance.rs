//! Inheritance chains: validation and fallback lookup.
//!
//! An add-on's `inherits` list names parents of the same kind, highest
//! priority first. Lookups that fail on an add-on fall back to its parents,
//! depth-first and left to right. Every fallback lookup (icons, stylesheet
//! imports, `url()` targets, metadata defaults) goes through [`resolve`].

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::descriptor::{AddonDescriptor, AddonKey};
use crate::error::AddonResult;
use crate::registry::AddonRegistry;

/// What is wrong with an inheritance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InheritanceIssueKind {
    /// A parent is the add-on itself (case-insensitive).
    SelfReference,
    /// Following parents leads back to `via`.
    Cycle {
        /// The name that was reached a second time.
        via: String,
    },
}

/// A rejected inheritance chain. Reported, never fatal: the add-on keeps
/// working without inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceIssue {
    pub addon: AddonKey,
    /// The direct parent through which the problem was found.
    pub parent: String,
    pub kind: InheritanceIssueKind,
}

impl std::fmt::Display for InheritanceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            InheritanceIssueKind::SelfReference => write!(f, "{} inherits itself", self.addon),
            InheritanceIssueKind::Cycle { via } => write!(
                f,
                "{} has an inheritance cycle through '{}' (via parent '{}')",
                self.addon, via, self.parent
            ),
        }
    }
}

/// Validates the chain of `key`, clearing its `inherits` on failure.
///
/// Returns the issue that caused truncation, or `None` if the chain is sound.
/// Parents that are not registered are skipped, not rejected.
pub fn validate_inheritance(
    registry: &mut AddonRegistry,
    key: &AddonKey,
) -> AddonResult<Option<InheritanceIssue>> {
    let issue = find_issue(registry, registry.get_key(key)?);

    if let Some(issue) = &issue {
        warn!(addon = %key, parent = %issue.parent, "{issue}");
        debug!(addon = %key, "Disabling inheritance");
        registry.descriptor_mut(key)?.clear_inherits();
    }
    Ok(issue)
}

/// Validates every add-on of a kind in registration order.
pub fn validate_all(registry: &mut AddonRegistry, addon_type: &str) -> Vec<InheritanceIssue> {
    let keys: Vec<AddonKey> = registry.all(addon_type).map(|d| d.key().clone()).collect();
    keys.iter()
        .filter_map(|key| validate_inheritance(registry, key).ok().flatten())
        .collect()
}

fn find_issue(registry: &AddonRegistry, descriptor: &AddonDescriptor) -> Option<InheritanceIssue> {
    let own = descriptor.name().to_lowercase();
    let issue = |parent: &str, kind| InheritanceIssue {
        addon: descriptor.key().clone(),
        parent: parent.to_string(),
        kind,
    };

    for parent in descriptor.inherits_from() {
        if parent.to_lowercase() == own {
            return Some(issue(parent.as_str(), InheritanceIssueKind::SelfReference));
        }
    }

    // Iterative DFS per direct parent. A name on the current path is a cycle;
    // a name merely seen before (a diamond) is skipped.
    let mut explored: HashSet<String> = HashSet::new();
    for parent in descriptor.inherits_from() {
        let mut path: Vec<String> = vec![own.clone()];
        let mut stack: Vec<std::vec::IntoIter<String>> = vec![vec![parent.clone()].into_iter()];

        while let Some(frontier) = stack.last_mut() {
            let Some(name) = frontier.next() else {
                stack.pop();
                if let Some(done) = path.pop() {
                    explored.insert(done);
                }
                continue;
            };
            let lower = name.to_lowercase();
            if path.contains(&lower) {
                return Some(issue(parent.as_str(), InheritanceIssueKind::Cycle { via: name }));
            }
            if explored.contains(&lower) {
                continue;
            }
            let Ok(next) = registry.get(descriptor.addon_type(), &name) else {
                explored.insert(lower);
                continue;
            };
            path.push(lower);
            stack.push(next.inherits_from().to_vec().into_iter());
        }
    }
    None
}

/// The fallback order of `descriptor`: itself, then its ancestors depth-first,
/// left to right, each at most once. Missing parents are skipped.
pub fn lineage<'a>(registry: &'a AddonRegistry, descriptor: &'a AddonDescriptor) -> Vec<&'a AddonDescriptor> {
    let mut seen: HashSet<&AddonKey> = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![descriptor];

    while let Some(current) = stack.pop() {
        if !seen.insert(current.key()) {
            continue;
        }
        order.push(current);
        for parent in current.inherits_from().iter().rev() {
            match registry.get(current.addon_type(), parent) {
                Ok(p) => stack.push(p),
                Err(_) => debug!(addon = %current.key(), parent = %parent, "Skipping missing parent"),
            }
        }
    }
    order
}

/// Evaluates `probe` along the lineage of `descriptor` and returns the first
/// hit. The probe may return the descriptor it was given.
pub fn resolve<'a, T, F>(
    registry: &'a AddonRegistry,
    descriptor: &'a AddonDescriptor,
    probe: F,
) -> Option<T>
where
    F: FnMut(&'a AddonDescriptor) -> Option<T>,
{
    lineage(registry, descriptor).into_iter().find_map(probe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn style(name: &str, parents: &[&str]) -> AddonDescriptor {
        parents
            .iter()
            .fold(AddonDescriptor::new("style", name), |d, p| d.inherits(*p))
    }

    fn registry(descs: Vec<AddonDescriptor>) -> AddonRegistry {
        let mut registry = AddonRegistry::new();
        for d in descs {
            registry.register(d).unwrap();
        }
        registry
    }

    #[test]
    fn test_self_reference_is_truncated() {
        let mut reg = registry(vec![style("Dark", &["dark"])]);
        let key = AddonKey::new("style", "Dark");

        let issue = validate_inheritance(&mut reg, &key).unwrap().unwrap();
        assert_eq!(issue.kind, InheritanceIssueKind::SelfReference);
        assert!(reg.get_key(&key).unwrap().inherits_from().is_empty());
    }

    #[test]
    fn test_direct_cycle_leaves_no_cycle() {
        let mut reg = registry(vec![style("D", &["A"]), style("A", &["D"])]);
        let issues = validate_all(&mut reg, "style");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].addon, AddonKey::new("style", "D"));
        assert!(reg.get("style", "D").unwrap().inherits_from().is_empty());
        assert_eq!(reg.get("style", "A").unwrap().inherits_from().to_vec(), vec!["D"]);
    }

    #[test]
    fn test_diamond_and_missing_parents_are_fine() {
        let mut reg = registry(vec![
            style("Top", &["Left", "Right", "Ghost"]),
            style("Left", &["Base"]),
            style("Right", &["Base"]),
            style("Base", &[]),
        ]);
        assert!(validate_all(&mut reg, "style").is_empty());
    }

    #[test]
    fn test_resolve_is_depth_first_left_to_right() {
        let reg = registry(vec![
            style("Top", &["Left", "Right"]),
            style("Left", &["Base"]),
            style("Right", &[]),
            style("Base", &[]).with_field("accent", "base"),
        ]);
        let top = reg.get("style", "Top").unwrap();

        let order: Vec<&str> = lineage(&reg, top).into_iter().map(|d| d.name()).collect();
        assert_eq!(order, vec!["Top", "Left", "Base", "Right"]);

        let hit = resolve(&reg, top, |d| d.field("accent").map(str::to_string));
        assert_eq!(hit.as_deref(), Some("base"));
        assert_eq!(resolve(&reg, top, |d| d.field("missing").map(str::to_string)), None);
    }

    #[test]
    fn test_resolve_tolerates_unvalidated_cycles() {
        let reg = registry(vec![style("A", &["B"]), style("B", &["A"])]);
        let a = reg.get("style", "A").unwrap();
        let visited: Vec<&str> = lineage(&reg, a).into_iter().map(|d| d.name()).collect();
        assert_eq!(visited, vec!["A", "B"]);
    }
}
