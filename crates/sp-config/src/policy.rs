//! The compiled scheduling policy.
//!
//! A [`Policy`] is rebuilt from scratch on every parse. Settings that can
//! differ between prime and non-prime time live in a [`WindowPolicy`], one per
//! window; everything else is global.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::preempt::PreemptClass;

/// Maximum number of sort keys per list (job/node, prime/non-prime).
pub const MAX_SORTS: usize = 10;

/// Size of the server dynamic resource table. One slot is reserved, so at
/// most `MAX_SERVER_DYN_RES - 1` entries are accepted.
pub const MAX_SERVER_DYN_RES: usize = 201;

/// Maximum number of peer queue mappings.
pub const NUM_PEERS: usize = 50;

/// Longest accepted queue-name prefix.
pub const MAX_QUEUE_NAME_LEN: usize = 15;

/// Default fairshare decay period: 24 hours.
pub const DEFAULT_DECAY_TIME_SECS: i64 = 24 * 60 * 60;

/// Pseudo-resources ignored when a job leaves them unset.
pub const DEFAULT_IGNORED_RESOURCES: &[&str] = &["mpiprocs", "ompthreads"];

/// Returned when a [`BoundedList`] is already at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("list is full ({capacity} entries)")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// Ordered sequence with a hard maximum length checked on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedList<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T> BoundedList<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.items.len() < self.capacity
    }

    /// Append an item, refusing it once the list is full.
    pub fn try_push(&mut self, item: T) -> Result<(), CapacityExceeded> {
        if !self.has_room() {
            return Err(CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a BoundedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Which amount of a node resource a node sort looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceField {
    /// Total amount available on the node.
    #[default]
    Total,
    Assigned,
    Unused,
}

/// One sort criterion. `field` is only meaningful for node sorts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub resource: String,
    pub order: SortOrder,
    pub field: ResourceField,
}

pub type SortKeyList = BoundedList<SortKey>;

/// How multi-chunk work is spread over SMP cluster nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmpClusterDist {
    #[default]
    Pack,
    RoundRobin,
    LowestLoad,
}

impl SmpClusterDist {
    pub const NAMES: &'static str = "pack, round_robin, lowest_load";

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pack" => Some(SmpClusterDist::Pack),
            "round_robin" => Some(SmpClusterDist::RoundRobin),
            "lowest_load" => Some(SmpClusterDist::LowestLoad),
            _ => None,
        }
    }
}

/// Whether nodes needing re-provisioning are avoided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPolicy {
    #[default]
    Aggressive,
    Avoid,
}

/// A count that may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    #[default]
    Unbounded,
    At(u64),
}

/// A server-level resource whose value comes from running a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicResource {
    pub resource: String,
    pub command_line: String,
    pub script: PathBuf,
}

/// Routes jobs from a local queue to a queue on a peer server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerQueue {
    pub local_queue: String,
    pub remote_queue: String,
    pub remote_server: Option<String>,
}

/// Which of the two daily windows a setting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Prime,
    NonPrime,
}

/// Settings kept separately for prime and non-prime time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPolicy {
    pub round_robin: bool,
    pub by_queue: bool,
    pub strict_fifo: bool,
    pub strict_ordering: bool,
    pub fair_share: bool,
    pub help_starving_jobs: bool,
    pub backfill: bool,
    pub backfill_prime: bool,
    pub preemptive_sched: bool,
    pub smp_cluster_dist: SmpClusterDist,
    /// How far (seconds) a job may spill over into the other window.
    pub spill_secs: i64,
    pub job_sort: SortKeyList,
    pub node_sort: SortKeyList,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            round_robin: false,
            by_queue: false,
            strict_fifo: false,
            strict_ordering: false,
            fair_share: false,
            help_starving_jobs: false,
            backfill: true,
            backfill_prime: false,
            preemptive_sched: false,
            smp_cluster_dist: SmpClusterDist::Pack,
            spill_secs: 0,
            job_sort: SortKeyList::new(MAX_SORTS),
            node_sort: SortKeyList::new(MAX_SORTS),
        }
    }
}

/// The complete compiled scheduler policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub prime: WindowPolicy,
    pub non_prime: WindowPolicy,

    pub update_comments: bool,
    pub prime_exempt_anytime_queues: bool,
    pub preempt_starving: bool,
    pub preempt_fairshare: bool,
    pub assign_ssinodes: bool,
    pub dont_preempt_starving: bool,
    pub enforce_no_shares: bool,
    pub allow_aoe_calendar: bool,

    pub max_starve_secs: i64,
    pub decay_time_secs: i64,
    pub unknown_shares: i64,
    /// Always strictly between 0 and 1.
    pub fairshare_decay_factor: f64,
    pub fairshare_res: String,
    pub fairshare_entity: String,

    pub ignore_res: Vec<String>,
    /// Reservation confirmation ignores dedicated time.
    pub resv_confirm_ignore_dedicated: bool,
    pub res_to_check: Option<Vec<String>>,
    pub dyn_res_to_get: Option<Vec<String>>,

    pub dedicated_prefix: String,
    pub primetime_prefix: String,
    pub nonprimetime_prefix: String,

    /// Some node sort uses assigned or unused amounts.
    pub node_sort_unused: bool,

    pub dynamic_res: BoundedList<DynamicResource>,
    pub peer_queues: BoundedList<PeerQueue>,

    pub max_preempt_attempts: Limit,
    pub max_jobs_to_check: Limit,
    pub provision_policy: ProvisionPolicy,

    /// Preemption classes, ranked most preemptive first.
    pub preempt_prio: Vec<PreemptClass>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            prime: WindowPolicy::default(),
            non_prime: WindowPolicy::default(),
            update_comments: true,
            prime_exempt_anytime_queues: false,
            preempt_starving: true,
            preempt_fairshare: true,
            assign_ssinodes: true,
            dont_preempt_starving: false,
            enforce_no_shares: true,
            allow_aoe_calendar: false,
            max_starve_secs: 0,
            decay_time_secs: DEFAULT_DECAY_TIME_SECS,
            unknown_shares: 0,
            fairshare_decay_factor: 0.5,
            fairshare_res: "cput".to_string(),
            fairshare_entity: "euser".to_string(),
            ignore_res: DEFAULT_IGNORED_RESOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            resv_confirm_ignore_dedicated: false,
            res_to_check: None,
            dyn_res_to_get: None,
            dedicated_prefix: String::new(),
            primetime_prefix: String::new(),
            nonprimetime_prefix: String::new(),
            node_sort_unused: false,
            dynamic_res: BoundedList::new(MAX_SERVER_DYN_RES - 1),
            peer_queues: BoundedList::new(NUM_PEERS),
            max_preempt_attempts: Limit::Unbounded,
            max_jobs_to_check: Limit::Unbounded,
            provision_policy: ProvisionPolicy::Aggressive,
            preempt_prio: Vec::new(),
        }
    }
}

impl Policy {
    /// Discard everything held and reinstall defaults.
    pub fn reset(&mut self) {
        *self = Policy::default();
    }

    pub fn window(&self, window: Window) -> &WindowPolicy {
        match window {
            Window::Prime => &self.prime,
            Window::NonPrime => &self.non_prime,
        }
    }

    pub fn window_mut(&mut self, window: Window) -> &mut WindowPolicy {
        match window {
            Window::Prime => &mut self.prime,
            Window::NonPrime => &mut self.non_prime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scheduler_expectations() {
        let policy = Policy::default();
        assert!(policy.update_comments);
        assert_eq!(policy.decay_time_secs, 86_400);
        assert_eq!(policy.fairshare_res, "cput");
        assert_eq!(policy.fairshare_entity, "euser");
        assert_eq!(policy.fairshare_decay_factor, 0.5);
        assert!(policy.prime.backfill && policy.non_prime.backfill);
        assert!(policy.preempt_starving && policy.preempt_fairshare && policy.assign_ssinodes);
        assert_eq!(policy.max_preempt_attempts, Limit::Unbounded);
        assert_eq!(policy.max_jobs_to_check, Limit::Unbounded);
        assert_eq!(policy.ignore_res, vec!["mpiprocs", "ompthreads"]);
        assert_eq!(policy.dynamic_res.capacity(), MAX_SERVER_DYN_RES - 1);
        assert_eq!(policy.prime.job_sort.capacity(), MAX_SORTS);
    }

    #[test]
    fn reset_twice_is_identical() {
        let mut policy = Policy::default();
        policy.prime.round_robin = true;
        policy
            .peer_queues
            .try_push(PeerQueue {
                local_queue: "a".into(),
                remote_queue: "b".into(),
                remote_server: None,
            })
            .unwrap();
        policy.reset();
        let first = policy.clone();
        policy.reset();
        assert_eq!(first, policy);
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn bounded_list_refuses_past_capacity() {
        let mut list = BoundedList::new(2);
        list.try_push(1).unwrap();
        list.try_push(2).unwrap();
        assert_eq!(list.try_push(3), Err(CapacityExceeded { capacity: 2 }));
        assert_eq!(list.as_slice(), &[1, 2]);
    }

    #[test]
    fn smp_names() {
        assert_eq!(SmpClusterDist::from_name("round_robin"), Some(SmpClusterDist::RoundRobin));
        assert_eq!(SmpClusterDist::from_name("PACK"), None);
    }
}
