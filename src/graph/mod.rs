//! Raw dependency graph between dotted names.
//!
//! The graph is the read-only input of the layering pipeline. It stores
//! out-edges only (`source -> {targets}`) with set semantics, so duplicate
//! links collapse. Ordered collections keep every iteration deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{CityError, Result};

mod cycles;

pub use cycles::{CycleDetector, NamedGraph};

static NO_TARGETS: BTreeSet<String> = BTreeSet::new();

/// Deepest accepted name, in dot-separated segments. The nested output
/// (and its serialization) follows the hierarchy, so depth is bounded.
pub const MAX_NAME_DEPTH: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    src2dest: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a link `source -> target`.
    /// Returns `false` if the link was already present.
    pub fn add_link(&mut self, source: &str, target: &str) -> Result<bool> {
        validate_name(source)?;
        validate_name(target)?;
        Ok(self
            .src2dest
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string()))
    }

    /// Targets of `name`, empty if `name` has no outgoing link.
    pub fn targets(&self, name: &str) -> &BTreeSet<String> {
        self.src2dest.get(name).unwrap_or(&NO_TARGETS)
    }

    /// All names with at least one outgoing link.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.src2dest.keys().map(String::as_str)
    }

    /// Fan-in of `target`: every source linking to it. Scans all adjacency lists.
    pub fn sources_of(&self, target: &str) -> BTreeSet<&str> {
        self.src2dest
            .iter()
            .filter(|(_, targets)| targets.contains(target))
            .map(|(source, _)| source.as_str())
            .collect()
    }

    /// Fan-in counts for every target, computed in one pass.
    pub fn fan_in_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for targets in self.src2dest.values() {
            for target in targets {
                *counts.entry(target.as_str()).or_default() += 1;
            }
        }
        counts
    }

    /// Union of all sources and targets, sorted.
    pub fn names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.sources().collect();
        for targets in self.src2dest.values() {
            names.extend(targets.iter().map(String::as_str));
        }
        names
    }

    pub fn link_count(&self) -> usize {
        self.src2dest.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.src2dest.is_empty()
    }

    /// Fails on the first name (in name order) deeper than `max` segments.
    pub fn check_depth(&self, max: usize) -> Result<()> {
        match self.names().into_iter().find(|n| name_depth(n) > max) {
            Some(name) => Err(CityError::NameTooDeep {
                name: name.to_string(),
                depth: name_depth(name),
                max,
            }),
            None => Ok(()),
        }
    }
}

impl NamedGraph for DependencyGraph {
    fn node_names(&self) -> Vec<&str> {
        self.names().into_iter().collect()
    }

    fn successors(&self, name: &str) -> Vec<&str> {
        self.targets(name).iter().map(String::as_str).collect()
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (source, targets) in &self.src2dest {
            let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
            writeln!(f, "{}: [{}]", source, targets.join(", "))?;
        }
        Ok(())
    }
}

/// Checks that `name` is a usable dotted name: non-empty, no empty segment.
/// Number of dot-separated segments in `name`.
pub fn name_depth(name: &str) -> usize {
    name.split('.').count()
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CityError::invalid_name(name, "name is empty"));
    }
    if name.split('.').any(str::is_empty) {
        return Err(CityError::invalid_name(name, "name has an empty segment"));
    }
    Ok(())
}
