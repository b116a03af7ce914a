use crate::error::ClusterError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Stable identity of a storage node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle of a node as seen by this replica.
///
/// Ordinals are part of the journal wire format and must not be renumbered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "StateRepr")]
#[repr(u32)]
pub enum NodeState {
    /// No information yet. May move to any other state.
    #[default]
    Unknown = 0,
    /// Unreachable from this replica.
    Offline = 1,
    /// Waiting for an administrator to approve it joining the cluster.
    Pending = 2,
    /// Reachable but degraded (slow, low on disk or memory, lagging replication).
    Unhealthy = 3,
    /// Online and serving.
    Operational = 4,
    /// Join request denied by an administrator.
    Blocked = 5,
}

impl NodeState {
    pub const ALL: [NodeState; 6] = [
        NodeState::Unknown,
        NodeState::Offline,
        NodeState::Pending,
        NodeState::Unhealthy,
        NodeState::Operational,
        NodeState::Blocked,
    ];

    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying in the current state is always allowed, which keeps repeated
    /// state reports idempotent.
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;

        if self == next {
            return true;
        }

        match self {
            Unknown => true,
            Offline => matches!(next, Pending | Unhealthy | Operational | Blocked),
            Pending => matches!(next, Offline | Unhealthy | Operational | Blocked),
            Unhealthy => matches!(next, Operational | Offline),
            Operational => matches!(next, Unhealthy | Offline),
            Blocked => matches!(next, Offline),
        }
    }
}

/// Journal payloads may carry a state either as its ordinal or as its name.
#[derive(Deserialize)]
#[serde(untagged)]
enum StateRepr {
    Ordinal(u32),
    Name(String),
}

impl TryFrom<StateRepr> for NodeState {
    type Error = String;

    fn try_from(repr: StateRepr) -> Result<Self, Self::Error> {
        match repr {
            StateRepr::Ordinal(ordinal) => NodeState::from_ordinal(ordinal)
                .ok_or_else(|| format!("unknown node state ordinal {}", ordinal)),
            StateRepr::Name(name) => NodeState::ALL
                .into_iter()
                .find(|state| format!("{:?}", state).eq_ignore_ascii_case(&name))
                .ok_or_else(|| format!("unknown node state {:?}", name)),
        }
    }
}

/// A storage node participating in the cluster.
///
/// Only the state machine mutates these records, and only through the
/// methods below. Every mutation is idempotent: repeating it with the same
/// arguments leaves the record as it was after the first call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeInfo {
    id: NodeId,
    name: String,
    #[serde(with = "uri_set")]
    uris: BTreeSet<Url>,
    buckets: BTreeSet<u32>,
    /// Buckets this node reported as fully replicated.
    synchronized: BTreeSet<u32>,
    state: NodeState,
}

impl NodeInfo {
    pub fn new(id: NodeId, name: impl Into<String>, uris: impl IntoIterator<Item = Url>) -> Self {
        Self {
            id,
            name: name.into(),
            uris: uris.into_iter().collect(),
            buckets: BTreeSet::new(),
            synchronized: BTreeSet::new(),
            state: NodeState::Unknown,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uris(&self) -> &BTreeSet<Url> {
        &self.uris
    }

    pub fn buckets(&self) -> &BTreeSet<u32> {
        &self.buckets
    }

    pub fn synchronized_buckets(&self) -> &BTreeSet<u32> {
        &self.synchronized
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn owns_bucket(&self, bucket: u32) -> bool {
        self.buckets.contains(&bucket)
    }

    /// Adds buckets to the node, returning the ones that were not already owned.
    pub fn add_buckets(&mut self, buckets: impl IntoIterator<Item = u32>) -> Vec<u32> {
        buckets
            .into_iter()
            .filter(|bucket| self.buckets.insert(*bucket))
            .collect()
    }

    /// Removes buckets from the node, returning the ones that were actually owned.
    /// A removed bucket also loses its synchronized mark.
    pub fn remove_buckets(&mut self, buckets: impl IntoIterator<Item = u32>) -> Vec<u32> {
        let removed: Vec<u32> = buckets
            .into_iter()
            .filter(|bucket| self.buckets.remove(bucket))
            .collect();
        for bucket in &removed {
            self.synchronized.remove(bucket);
        }
        removed
    }

    /// Drops every bucket, returning what was owned.
    pub fn clear_buckets(&mut self) -> Vec<u32> {
        self.synchronized.clear();
        std::mem::take(&mut self.buckets).into_iter().collect()
    }

    /// Replaces the contact URIs wholesale. Returns `true` if they changed.
    pub fn set_uris(&mut self, uris: impl IntoIterator<Item = Url>) -> bool {
        let uris: BTreeSet<Url> = uris.into_iter().collect();
        if uris == self.uris {
            return false;
        }
        self.uris = uris;
        true
    }

    /// Moves the node to `next` if the lifecycle allows it.
    ///
    /// Returns `Ok(true)` if the state changed, `Ok(false)` if it already was `next`.
    pub fn set_state(&mut self, next: NodeState) -> Result<bool, ClusterError> {
        if !self.state.can_transition_to(next) {
            return Err(ClusterError::IllegalTransition {
                node: self.id,
                from: self.state,
                to: next,
            });
        }
        let changed = self.state != next;
        self.state = next;
        Ok(changed)
    }

    /// Records that `bucket` is fully replicated on this node. Returns `true` if newly recorded.
    pub fn mark_synchronized(&mut self, bucket: u32) -> bool {
        self.synchronized.insert(bucket)
    }
}

/// Serializes URI sets as plain string lists.
pub(crate) mod uri_set {
    use reqwest::Url;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeSet;

    pub fn serialize<S: Serializer>(uris: &BTreeSet<Url>, serializer: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<&str> = uris.iter().map(Url::as_str).collect();
        raw.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<Url>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|uri| Url::parse(uri).map_err(|e| D::Error::custom(format!("invalid uri {:?}: {}", uri, e))))
            .collect()
    }
}
