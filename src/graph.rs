//! Dynamic dependency edges between properties.

use crate::scene::PropertyId;
use std::collections::{BTreeSet, HashMap};

/// "Reader depends on dependency" edges, stored in both directions.
///
/// Edges are dynamic: a property's reads are cleared right before it recomputes and recorded again
/// as its expression runs, so a branch that stops reading something stops depending on it.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    /// reader -> the properties it read during its last evaluation
    reads: HashMap<PropertyId, BTreeSet<PropertyId>>,
    /// dependency -> the properties that read it
    users: HashMap<PropertyId, BTreeSet<PropertyId>>,
}

impl DependencyGraph {
    pub(crate) fn add_read(&mut self, reader: PropertyId, dependency: PropertyId) {
        self.reads.entry(reader).or_default().insert(dependency);
        self.users.entry(dependency).or_default().insert(reader);
    }

    /// Forgets everything `reader` read.
    pub(crate) fn clear_reads(&mut self, reader: PropertyId) {
        if let Some(reads) = self.reads.remove(&reader) {
            for dependency in reads {
                if let Some(users) = self.users.get_mut(&dependency) {
                    users.remove(&reader);
                    if users.is_empty() {
                        self.users.remove(&dependency);
                    }
                }
            }
        }
    }

    /// Removes a property from both sides of the graph.
    pub(crate) fn remove(&mut self, property: PropertyId) {
        self.clear_reads(property);
        if let Some(users) = self.users.remove(&property) {
            for user in users {
                if let Some(reads) = self.reads.get_mut(&user) {
                    reads.remove(&property);
                }
            }
        }
    }

    pub(crate) fn users(&self, dependency: PropertyId) -> impl Iterator<Item = PropertyId> + '_ {
        self.users
            .get(&dependency)
            .into_iter()
            .flat_map(|users| users.iter().copied())
    }

    pub(crate) fn reads(&self, reader: PropertyId) -> impl Iterator<Item = PropertyId> + '_ {
        self.reads
            .get(&reader)
            .into_iter()
            .flat_map(|reads| reads.iter().copied())
    }
}
