//! Bidirectional station name/id index and conflict detection
//!
//! An [`IdentityIndex`] groups one role's station columns into name→ids and
//! id→names mappings. Both directions are checked independently: a name can
//! map 1:1 to an id while that id still maps to several names.
//!
//! A merged index over both roles catches ids that are consistent within
//! each role but carry a different name as origin than as destination.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::models::{KeyKind, Role, TripRecord};

/// Station columns an index was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexScope {
    Origin,
    Destination,
    /// Origin and destination columns together
    Merged,
}

impl From<Role> for IndexScope {
    fn from(role: Role) -> Self {
        match role {
            Role::Origin => IndexScope::Origin,
            Role::Destination => IndexScope::Destination,
        }
    }
}

impl fmt::Display for IndexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexScope::Origin => write!(f, "origin"),
            IndexScope::Destination => write!(f, "destination"),
            IndexScope::Merged => write!(f, "any role"),
        }
    }
}

/// One key associated with more than one counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub scope: IndexScope,
    pub kind: KeyKind,
    pub key: String,
    /// Counterparts in ascending order
    pub counterparts: Vec<String>,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}' -> {:?} (instances: {})",
            self.scope,
            self.kind,
            self.key,
            self.counterparts,
            self.counterparts.len()
        )
    }
}

/// Name↔id grouping for one station role, or both roles merged
#[derive(Debug, Clone)]
pub struct IdentityIndex {
    scope: IndexScope,
    name_to_ids: BTreeMap<String, BTreeSet<String>>,
    id_to_names: BTreeMap<String, BTreeSet<String>>,
}

impl IdentityIndex {
    /// Build the index for `role` in a single scan
    pub fn build(records: &[TripRecord], role: Role) -> Self {
        let mut index = Self::empty(role.into());
        for record in records {
            index.insert(record.station_id(role), record.station_name(role));
        }
        index
    }

    /// Build one index over the origin and destination columns together
    pub fn build_merged(records: &[TripRecord]) -> Self {
        let mut index = Self::empty(IndexScope::Merged);
        for record in records {
            for role in Role::ALL {
                index.insert(record.station_id(role), record.station_name(role));
            }
        }
        index
    }

    fn empty(scope: IndexScope) -> Self {
        Self {
            scope,
            name_to_ids: BTreeMap::new(),
            id_to_names: BTreeMap::new(),
        }
    }

    fn insert(&mut self, id: &str, name: &str) {
        self.name_to_ids
            .entry(name.to_string())
            .or_default()
            .insert(id.to_string());
        self.id_to_names
            .entry(id.to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub fn scope(&self) -> IndexScope {
        self.scope
    }

    pub fn ids_for_name(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.name_to_ids.get(name)
    }

    pub fn names_for_id(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.id_to_names.get(id)
    }

    pub fn distinct_ids(&self) -> usize {
        self.id_to_names.len()
    }

    pub fn distinct_names(&self) -> usize {
        self.name_to_ids.len()
    }

    /// Every key whose counterpart set has more than one member, in ascending key order
    pub fn detect_conflicts(&self) -> Vec<ConflictRecord> {
        let by_id = self
            .id_to_names
            .iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(id, names)| self.conflict(KeyKind::StationId, id, names));

        let by_name = self
            .name_to_ids
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| self.conflict(KeyKind::StationName, name, ids));

        let mut conflicts: Vec<ConflictRecord> = by_id.chain(by_name).collect();
        conflicts.sort_by(|a, b| a.key.cmp(&b.key).then(a.kind.cmp(&b.kind)));
        conflicts
    }

    /// True when both directions map one-to-one
    pub fn is_bijective(&self) -> bool {
        self.id_to_names.values().all(|names| names.len() == 1)
            && self.name_to_ids.values().all(|ids| ids.len() == 1)
    }

    fn conflict(&self, kind: KeyKind, key: &str, counterparts: &BTreeSet<String>) -> ConflictRecord {
        ConflictRecord {
            scope: self.scope,
            kind,
            key: key.to_string(),
            counterparts: counterparts.iter().cloned().collect(),
        }
    }
}

/// Conflicts for both roles, origin first, then destination, then any key
/// that only conflicts once both roles are merged
pub fn detect_all_conflicts(records: &[TripRecord]) -> Vec<ConflictRecord> {
    let mut conflicts: Vec<ConflictRecord> = Role::ALL
        .iter()
        .flat_map(|role| IdentityIndex::build(records, *role).detect_conflicts())
        .collect();

    let per_role: BTreeSet<(KeyKind, String)> = conflicts
        .iter()
        .map(|conflict| (conflict.kind, conflict.key.clone()))
        .collect();

    let cross_role: Vec<ConflictRecord> = IdentityIndex::build_merged(records)
        .detect_conflicts()
        .into_iter()
        .filter(|conflict| !per_role.contains(&(conflict.kind, conflict.key.clone())))
        .collect();

    conflicts.extend(cross_role);
    conflicts
}
