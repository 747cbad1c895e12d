//! Scheduler configuration compilation.
//!
//! This crate turns a line-oriented sched_config file into a typed [`Policy`]:
//! - Line scanning and classification (name, value, time-window qualifier)
//! - A table of recognized options and how each one applies
//! - Sort key lists for jobs and nodes, per prime/non-prime window
//! - Preemption level bitfields and their ranking
//! - Post-parse validation that repairs conflicting settings
//! - Config path resolution and hashed policy snapshots

pub mod classify;
pub mod lexer;
pub mod options;
pub mod parse;
pub mod policy;
pub mod preempt;
pub mod report;
pub mod resolve;
pub mod security;
pub mod snapshot;
pub mod sort_keys;
pub mod units;
pub mod validate;

pub use classify::{classify, ConfigLine, TimeWindow};
pub use lexer::LineScanner;
pub use parse::{parse_config, CompiledPolicy, PolicyCompiler};
pub use policy::{
    BoundedList, DynamicResource, Limit, PeerQueue, Policy, ProvisionPolicy, ResourceField,
    SmpClusterDist, SortKey, SortOrder, Window, WindowPolicy, MAX_SERVER_DYN_RES, MAX_SORTS,
    NUM_PEERS,
};
pub use preempt::{PreemptBits, PreemptClass, PreemptLevel};
pub use report::{Diagnostic, DiagnosticKind, LineError, ObsoleteNotice, ParseReport};
pub use resolve::{ConfigPaths, ConfigSource};
pub use security::{FilePermissionCheck, ScriptSecurity, SecurityViolation};
pub use snapshot::PolicySnapshot;
pub use units::{ResourceValue, ResourceValueParser, UnitParser, ValueKind};
pub use validate::{validate, ValidationResult};
