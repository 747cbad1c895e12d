//! Hashed snapshots of a compiled policy.
//!
//! A snapshot records which policy a scheduling cycle ran with. The SHA-256
//! of the policy's JSON form makes it cheap to tell whether two cycles used
//! the same configuration and detects edits to a stored snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sp_common::schema::{is_compatible, SCHEMA_VERSION};
use sp_common::{Error, Result};

use crate::policy::Policy;

/// A compiled policy with provenance and an integrity hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub schema_version: String,

    /// Path or label of the configuration the policy was compiled from.
    pub source: String,

    pub compiled_at: DateTime<Utc>,

    /// SHA-256 hex digest of the JSON-serialized `policy`.
    pub policy_hash: String,

    pub policy: Policy,
}

impl PolicySnapshot {
    pub fn new(policy: Policy, source: impl Into<String>) -> Result<Self> {
        let policy_hash = policy_hash(&policy)?;
        Ok(Self {
            schema_version: SCHEMA_VERSION.to_string(),
            source: source.into(),
            compiled_at: Utc::now(),
            policy_hash,
            policy,
        })
    }

    /// Parse a snapshot from JSON, verifying integrity.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: PolicySnapshot = serde_json::from_str(json)?;
        snapshot.verify_integrity()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the schema version and that the hash still matches the policy.
    pub fn verify_integrity(&self) -> Result<()> {
        if !is_compatible(&self.schema_version) {
            return Err(Error::SnapshotIntegrity(format!(
                "unsupported schema version {}",
                self.schema_version
            )));
        }
        let actual = policy_hash(&self.policy)?;
        if actual != self.policy_hash {
            return Err(Error::SnapshotIntegrity(format!(
                "policy hash mismatch: expected {}, got {}",
                self.policy_hash, actual
            )));
        }
        Ok(())
    }

    /// Whether two snapshots describe the same policy.
    pub fn same_policy(&self, other: &PolicySnapshot) -> bool {
        self.policy_hash == other.policy_hash
    }
}

/// SHA-256 hex digest of a policy's JSON form.
pub fn policy_hash(policy: &Policy) -> Result<String> {
    let json = serde_json::to_vec(policy)?;
    Ok(hex::encode(Sha256::digest(&json)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_verifies() {
        let snapshot = PolicySnapshot::new(Policy::default(), "test").unwrap();
        assert_eq!(snapshot.policy_hash.len(), 64);
        assert!(snapshot.verify_integrity().is_ok());
    }

    #[test]
    fn json_roundtrip_keeps_hash_valid() {
        let mut policy = Policy::default();
        policy.fairshare_decay_factor = 0.3;
        policy.prime.round_robin = true;
        let snapshot = PolicySnapshot::new(policy, "sched_config").unwrap();
        let back = PolicySnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(back.policy, snapshot.policy);
        assert!(back.same_policy(&snapshot));
    }

    #[test]
    fn tampered_policy_detected() {
        let mut snapshot = PolicySnapshot::new(Policy::default(), "test").unwrap();
        snapshot.policy.unknown_shares = 99;
        assert!(matches!(
            snapshot.verify_integrity(),
            Err(Error::SnapshotIntegrity(_))
        ));
    }

    #[test]
    fn incompatible_schema_rejected() {
        let mut snapshot = PolicySnapshot::new(Policy::default(), "test").unwrap();
        snapshot.schema_version = "99.0.0".to_string();
        assert!(snapshot.verify_integrity().is_err());
    }

    #[test]
    fn different_policies_hash_differently() {
        let mut other = Policy::default();
        other.prime.backfill = false;
        assert_ne!(
            policy_hash(&Policy::default()).unwrap(),
            policy_hash(&other).unwrap()
        );
    }
}
