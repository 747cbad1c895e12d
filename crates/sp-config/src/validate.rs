//! Cross-option consistency checks run once the whole file has been read.
//!
//! Conflicting settings are corrected in place where possible. A rule may
//! also declare the policy unusable, which fails the compile.

use crate::policy::{Policy, SmpClusterDist};

/// Result of one consistency rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Consistent,
    /// The policy was adjusted; the message explains how.
    Corrected(String),
    Invalid(String),
}

type Rule = fn(&mut Policy) -> RuleOutcome;

const RULES: &[Rule] = &[smp_dist_vs_unused_node_sort];

/// Aggregate result of all rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub corrections: Vec<String>,
    pub problems: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Run every rule against a fully parsed policy.
pub fn validate(policy: &mut Policy) -> ValidationResult {
    let mut result = ValidationResult::default();
    for rule in RULES {
        match rule(&mut *policy) {
            RuleOutcome::Consistent => {}
            RuleOutcome::Corrected(message) => result.corrections.push(message),
            RuleOutcome::Invalid(message) => result.problems.push(message),
        }
    }
    result
}

/// Node sorts on unused/assigned amounts only make sense when packing.
fn smp_dist_vs_unused_node_sort(policy: &mut Policy) -> RuleOutcome {
    let spreading = policy.prime.smp_cluster_dist != SmpClusterDist::Pack
        || policy.non_prime.smp_cluster_dist != SmpClusterDist::Pack;
    if !(spreading && policy.node_sort_unused) {
        return RuleOutcome::Consistent;
    }
    policy.prime.smp_cluster_dist = SmpClusterDist::Pack;
    policy.non_prime.smp_cluster_dist = SmpClusterDist::Pack;
    RuleOutcome::Corrected(
        "smp_cluster_dist and node sorting by unused/assigned resources are not compatible.  \
         The smp_cluster_dist option is being set to pack."
            .to_string(),
    )
}
