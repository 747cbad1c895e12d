//! The option table: every recognized sched_config name and how it applies.

use std::path::{Path, PathBuf};

use crate::classify::ConfigLine;
use crate::lexer::split_comma_list;
use crate::policy::{
    DynamicResource, Limit, PeerQueue, Policy, ProvisionPolicy, ResourceField, SmpClusterDist,
    SortKey, SortOrder, WindowPolicy, DEFAULT_IGNORED_RESOURCES, MAX_QUEUE_NAME_LEN,
    MAX_SERVER_DYN_RES, NUM_PEERS,
};
use crate::preempt::{self, PreemptClass, PreemptLevel};
use crate::report::{LineError, ObsoleteNotice};
use crate::security::ScriptSecurity;
use crate::sort_keys::{self, SortAppend, SortObject, SORT_PRIORITY};
use crate::units::ResourceValueParser;

/// `fairshare_entity` values the scheduler can group usage by.
pub const FAIRSHARE_ENTITIES: &[&str] = &["euser", "egroup", "Account_Name", "queue", "egroup:euser"];

/// Everything an option handler may touch while applying one line.
pub struct LineContext<'a> {
    pub policy: &'a mut Policy,
    pub units: &'a dyn ResourceValueParser,
    pub scripts: &'a dyn ScriptSecurity,
    /// Directory relative script paths are resolved against.
    pub script_dir: Option<&'a Path>,
    /// Notices raised by the handler itself, beyond the option's own.
    pub notices: Vec<ObsoleteNotice>,
    /// The line was accepted but had no effect.
    pub ignored: Vec<String>,
}

impl<'a> LineContext<'a> {
    pub fn new(
        policy: &'a mut Policy,
        units: &'a dyn ResourceValueParser,
        scripts: &'a dyn ScriptSecurity,
        script_dir: Option<&'a Path>,
    ) -> Self {
        Self {
            policy,
            units,
            scripts,
            script_dir,
            notices: Vec::new(),
            ignored: Vec::new(),
        }
    }
}

type Handler = fn(&mut LineContext<'_>, &ConfigLine<'_>) -> Result<(), LineError>;

/// How an option turns its value into policy.
#[derive(Clone, Copy)]
pub enum OptionKind {
    /// Boolean written to each window the qualifier selects.
    WindowFlag(fn(&mut WindowPolicy, bool)),
    /// Boolean with a single global value.
    Flag(fn(&mut Policy, bool)),
    /// Time value (seconds) written to each selected window.
    WindowTime(fn(&mut WindowPolicy, i64)),
    /// Time value (seconds) with a single global value.
    Time(fn(&mut Policy, i64)),
    /// Anything with option-specific parsing.
    Custom(Handler),
    /// Accepted only to report that it is obsolete.
    NoticeOnly,
}

/// One row of the option table.
#[derive(Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    /// Set for deprecated names: `Some(replacement)`, where the replacement
    /// itself may be absent.
    pub obsolete: Option<Option<&'static str>>,
}

impl OptionSpec {
    const fn new(name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            kind,
            obsolete: None,
        }
    }

    const fn obsolete(name: &'static str, kind: OptionKind, replacement: Option<&'static str>) -> Self {
        Self {
            name,
            kind,
            obsolete: Some(replacement),
        }
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete.is_some()
    }

    pub fn obsolete_notice(&self) -> Option<ObsoleteNotice> {
        self.obsolete
            .map(|replacement| ObsoleteNotice::new(self.name, replacement))
    }

    /// Apply one classified line. On error the policy is left untouched.
    pub fn apply(&self, ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
        match self.kind {
            OptionKind::WindowFlag(set) => {
                let flag = require_flag(line)?;
                for w in line.window.windows() {
                    set(ctx.policy.window_mut(w), flag);
                }
            }
            OptionKind::Flag(set) => set(ctx.policy, require_flag(line)?),
            OptionKind::WindowTime(set) => {
                let secs = require_time(ctx, line)?;
                for w in line.window.windows() {
                    set(ctx.policy.window_mut(w), secs);
                }
            }
            OptionKind::Time(set) => {
                let secs = require_time(ctx, line)?;
                set(ctx.policy, secs);
            }
            OptionKind::Custom(handler) => handler(ctx, line)?,
            OptionKind::NoticeOnly => {}
        }
        Ok(())
    }
}

const NOTHING_QMGR: Option<&str> = Some("nothing - set via qmgr");

static OPTIONS: &[OptionSpec] = &[
    // Per-window switches
    OptionSpec::new("round_robin", OptionKind::WindowFlag(|w, v| w.round_robin = v)),
    OptionSpec::new("by_queue", OptionKind::WindowFlag(|w, v| w.by_queue = v)),
    OptionSpec::obsolete(
        "strict_fifo",
        OptionKind::WindowFlag(|w, v| w.strict_fifo = v),
        Some("strict_ordering"),
    ),
    OptionSpec::new("strict_ordering", OptionKind::WindowFlag(|w, v| w.strict_ordering = v)),
    OptionSpec::new("fair_share", OptionKind::WindowFlag(|w, v| w.fair_share = v)),
    OptionSpec::new(
        "help_starving_jobs",
        OptionKind::WindowFlag(|w, v| w.help_starving_jobs = v),
    ),
    OptionSpec::obsolete(
        "backfill",
        OptionKind::WindowFlag(|w, v| w.backfill = v),
        Some("server's backfill_depth=0"),
    ),
    OptionSpec::new("backfill_prime", OptionKind::WindowFlag(|w, v| w.backfill_prime = v)),
    OptionSpec::new("preemptive_sched", OptionKind::WindowFlag(|w, v| w.preemptive_sched = v)),
    OptionSpec::new("smp_cluster_dist", OptionKind::Custom(apply_smp_cluster_dist)),
    OptionSpec::new("prime_spill", OptionKind::WindowTime(|w, v| w.spill_secs = v)),
    // Global switches
    OptionSpec::new("update_comments", OptionKind::Flag(|p, v| p.update_comments = v)),
    OptionSpec::new(
        "prime_exempt_anytime_queues",
        OptionKind::Flag(|p, v| p.prime_exempt_anytime_queues = v),
    ),
    OptionSpec::new("preempt_starving", OptionKind::Flag(|p, v| p.preempt_starving = v)),
    OptionSpec::new("preempt_fairshare", OptionKind::Flag(|p, v| p.preempt_fairshare = v)),
    OptionSpec::new("assign_ssinodes", OptionKind::Flag(|p, v| p.assign_ssinodes = v)),
    OptionSpec::new(
        "dont_preempt_starving",
        OptionKind::Flag(|p, v| p.dont_preempt_starving = v),
    ),
    OptionSpec::new(
        "fairshare_enforce_no_shares",
        OptionKind::Flag(|p, v| p.enforce_no_shares = v),
    ),
    OptionSpec::new(
        "allow_aoe_calendar",
        OptionKind::Custom(|ctx, _| {
            ctx.policy.allow_aoe_calendar = true;
            Ok(())
        }),
    ),
    // Fairshare
    OptionSpec::new("max_starve", OptionKind::Time(|p, v| p.max_starve_secs = v)),
    OptionSpec::new("fairshare_decay_time", OptionKind::Time(|p, v| p.decay_time_secs = v)),
    OptionSpec::obsolete(
        "half_life",
        OptionKind::Time(|p, v| p.decay_time_secs = v),
        Some("fairshare_decay_time and fairshare_decay_factor"),
    ),
    OptionSpec::new("unknown_shares", OptionKind::Custom(apply_unknown_shares)),
    OptionSpec::new("fairshare_decay_factor", OptionKind::Custom(apply_decay_factor)),
    OptionSpec::new("fairshare_usage_res", OptionKind::Custom(apply_fairshare_res)),
    OptionSpec::new("fairshare_entity", OptionKind::Custom(apply_fairshare_entity)),
    // Resources
    OptionSpec::new("resources", OptionKind::Custom(apply_resources)),
    OptionSpec::new("mom_resources", OptionKind::Custom(apply_mom_resources)),
    OptionSpec::new("resources_unset_infinite", OptionKind::Custom(apply_unset_infinite)),
    OptionSpec::new("server_dyn_res", OptionKind::Custom(apply_server_dyn_res)),
    // Queues and reservations
    OptionSpec::new("dedicated_prefix", OptionKind::Custom(apply_dedicated_prefix)),
    OptionSpec::new("primetime_prefix", OptionKind::Custom(apply_primetime_prefix)),
    OptionSpec::new("nonprimetime_prefix", OptionKind::Custom(apply_nonprimetime_prefix)),
    OptionSpec::new("resv_confirm_ignore", OptionKind::Custom(apply_resv_confirm_ignore)),
    OptionSpec::new("peer_queue", OptionKind::Custom(apply_peer_queue)),
    // Sorting
    OptionSpec::new("job_sort_key", OptionKind::Custom(apply_job_sort_key)),
    OptionSpec::new("node_sort_key", OptionKind::Custom(apply_node_sort_key)),
    OptionSpec::obsolete(
        "sort_nodes",
        OptionKind::Custom(apply_sort_nodes),
        Some("node_sort_key"),
    ),
    OptionSpec::obsolete("sort_by", OptionKind::Custom(apply_job_sort_key), Some("job_sort_key")),
    // Preemption and limits
    OptionSpec::obsolete(
        "preempt_prio",
        OptionKind::Custom(apply_preempt_prio),
        NOTHING_QMGR,
    ),
    OptionSpec::new("max_preempt_attempts", OptionKind::Custom(apply_max_preempt_attempts)),
    OptionSpec::new("max_jobs_to_check", OptionKind::Custom(apply_max_jobs_to_check)),
    OptionSpec::new("provision_policy", OptionKind::Custom(apply_provision_policy)),
    // Obsolete, no effect
    OptionSpec::obsolete("sort_queues", OptionKind::NoticeOnly, None),
    OptionSpec::obsolete("node_group_key", OptionKind::NoticeOnly, NOTHING_QMGR),
    OptionSpec::obsolete(
        "log_filter",
        OptionKind::NoticeOnly,
        Some("nothing - set log_events via qmgr"),
    ),
    OptionSpec::obsolete("preempt_queue_prio", OptionKind::NoticeOnly, NOTHING_QMGR),
    OptionSpec::obsolete("preempt_order", OptionKind::NoticeOnly, NOTHING_QMGR),
    OptionSpec::obsolete("preempt_sort", OptionKind::NoticeOnly, NOTHING_QMGR),
    OptionSpec::obsolete("cpus_per_ssinode", OptionKind::NoticeOnly, Some("nothing")),
    OptionSpec::obsolete("mem_per_ssinode", OptionKind::NoticeOnly, Some("nothing")),
];

/// Find the table entry for an option name (case-sensitive).
pub fn lookup(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|spec| spec.name == name)
}

/// All recognized option names, in table order. For tooling that lists or
/// completes option names.
pub fn option_names() -> impl Iterator<Item = &'static str> {
    OPTIONS.iter().map(|spec| spec.name)
}

fn require_flag(line: &ConfigLine<'_>) -> Result<bool, LineError> {
    line.flag().ok_or_else(|| LineError::NotBoolean {
        option: line.name.to_string(),
        value: line.value.to_string(),
    })
}

fn require_number(line: &ConfigLine<'_>) -> Result<i64, LineError> {
    line.number.ok_or_else(|| not_numeric(line))
}

fn not_numeric(line: &ConfigLine<'_>) -> LineError {
    LineError::NotNumeric {
        option: line.name.to_string(),
        value: line.value.to_string(),
    }
}

fn require_time(ctx: &LineContext<'_>, line: &ConfigLine<'_>) -> Result<i64, LineError> {
    match ctx.units.parse(line.value) {
        Some(parsed) if parsed.is_time() => Ok(parsed.amount.round() as i64),
        _ => Err(LineError::NotTime {
            option: line.name.to_string(),
            value: line.value.to_string(),
        }),
    }
}

fn apply_smp_cluster_dist(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let dist = SmpClusterDist::from_name(line.value).ok_or_else(|| LineError::InvalidChoice {
        option: line.name.to_string(),
        value: line.value.to_string(),
        expected: SmpClusterDist::NAMES,
    })?;
    for w in line.window.windows() {
        ctx.policy.window_mut(w).smp_cluster_dist = dist;
    }
    Ok(())
}

fn apply_unknown_shares(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    ctx.policy.unknown_shares = require_number(line)?;
    Ok(())
}

fn apply_decay_factor(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let factor: f64 = line.value.parse().map_err(|_| not_numeric(line))?;
    if !(factor > 0.0 && factor < 1.0) {
        return Err(LineError::DecayFactorOutOfRange(factor));
    }
    ctx.policy.fairshare_decay_factor = factor;
    Ok(())
}

fn apply_fairshare_res(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    ctx.policy.fairshare_res = line.value.to_string();
    Ok(())
}

fn apply_fairshare_entity(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    if !FAIRSHARE_ENTITIES.contains(&line.value) {
        return Err(LineError::InvalidFairshareEntity(line.value.to_string()));
    }
    ctx.policy.fairshare_entity = line.value.to_string();
    Ok(())
}

fn apply_resources(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let mut resources = split_comma_list(line.value);
    for implied in ["host", "vnode"] {
        if !resources.iter().any(|r| r == implied) {
            resources.push(implied.to_string());
        }
    }
    ctx.policy.res_to_check = Some(resources);
    Ok(())
}

fn apply_mom_resources(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    ctx.policy.dyn_res_to_get = Some(split_comma_list(line.value));
    Ok(())
}

fn apply_unset_infinite(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let mut ignored = split_comma_list(line.value);
    ignored.extend(DEFAULT_IGNORED_RESOURCES.iter().map(|r| r.to_string()));
    ctx.policy.ignore_res = ignored;
    Ok(())
}

fn apply_server_dyn_res(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    if !ctx.policy.dynamic_res.has_room() {
        return Err(LineError::TooManyDynamicResources {
            max: MAX_SERVER_DYN_RES,
        });
    }

    let value = line.value.trim_start();
    let split = value
        .find(|c: char| c.is_ascii_whitespace() || c == '!')
        .unwrap_or(value.len());
    let (resource, rest) = value.split_at(split);
    if resource.is_empty() {
        return Err(LineError::InvalidDynamicResource("missing resource name".into()));
    }
    let command = rest
        .trim_start()
        .strip_prefix('!')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            LineError::InvalidDynamicResource(format!("missing '!command' for {resource}"))
        })?;

    let script = script_path(command, ctx.script_dir).ok_or_else(|| {
        LineError::InvalidDynamicResource(format!("no script in command '{command}'"))
    })?;
    ctx.scripts.check(&script).map_err(LineError::insecure)?;

    ctx.policy
        .dynamic_res
        .try_push(DynamicResource {
            resource: resource.to_string(),
            command_line: command.to_string(),
            script,
        })
        .map_err(|_| LineError::TooManyDynamicResources {
            max: MAX_SERVER_DYN_RES,
        })
}

/// First word of a command line, resolved against `base` when relative.
fn script_path(command: &str, base: Option<&Path>) -> Option<PathBuf> {
    let first = command.split_ascii_whitespace().next()?;
    let path = PathBuf::from(first);
    Some(match base {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    })
}

fn set_prefix(target: &mut String, line: &ConfigLine<'_>) -> Result<(), LineError> {
    if line.value.len() > MAX_QUEUE_NAME_LEN {
        return Err(LineError::PrefixTooLong {
            option: line.name.to_string(),
            value: line.value.to_string(),
            max: MAX_QUEUE_NAME_LEN,
        });
    }
    *target = line.value.to_string();
    Ok(())
}

fn apply_dedicated_prefix(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    set_prefix(&mut ctx.policy.dedicated_prefix, line)
}

fn apply_primetime_prefix(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    set_prefix(&mut ctx.policy.primetime_prefix, line)
}

fn apply_nonprimetime_prefix(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    set_prefix(&mut ctx.policy.nonprimetime_prefix, line)
}

fn apply_resv_confirm_ignore(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    ctx.policy.resv_confirm_ignore_dedicated = match line.value {
        "dedicated_time" => true,
        "none" => false,
        _ => {
            return Err(LineError::InvalidChoice {
                option: line.name.to_string(),
                value: line.value.to_string(),
                expected: "dedicated_time or none",
            })
        }
    };
    Ok(())
}

fn apply_peer_queue(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    if !ctx.policy.peer_queues.has_room() {
        return Err(LineError::TooManyPeerQueues { max: NUM_PEERS });
    }

    let value = line.value.trim();
    let (local, rest) = value
        .split_once(|c: char| c.is_ascii_whitespace())
        .ok_or(LineError::InvalidPeerQueue)?;
    let (remote, server) = match rest.split_once('@') {
        Some((queue, server)) => (queue.trim(), server.split_ascii_whitespace().next()),
        None => (rest.split_ascii_whitespace().next().unwrap_or(""), None),
    };
    if local.is_empty() || remote.is_empty() {
        return Err(LineError::InvalidPeerQueue);
    }

    ctx.policy
        .peer_queues
        .try_push(PeerQueue {
            local_queue: local.to_string(),
            remote_queue: remote.to_string(),
            remote_server: server.map(str::to_string),
        })
        .map_err(|_| LineError::TooManyPeerQueues { max: NUM_PEERS })
}

fn add_sort_key(
    ctx: &mut LineContext<'_>,
    line: &ConfigLine<'_>,
    object: SortObject,
    key: &SortKey,
) {
    if let SortAppend::Dropped(message) =
        sort_keys::append_sort_key(ctx.policy, line.window, object, key, line.value)
    {
        ctx.ignored.push(message);
    }
}

fn apply_sort_key(
    ctx: &mut LineContext<'_>,
    line: &ConfigLine<'_>,
    object: SortObject,
) -> Result<(), LineError> {
    if !sort_keys::has_room(ctx.policy, line.window, object) {
        ctx.ignored
            .push(sort_keys::too_many_sorts(line.window, object, line.value));
        return Ok(());
    }
    let compiled = sort_keys::compile_sort_key(line.value, object)?;
    ctx.notices.extend(compiled.renamed);
    add_sort_key(ctx, line, object, &compiled.key);
    Ok(())
}

fn apply_job_sort_key(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    apply_sort_key(ctx, line, SortObject::Job)
}

fn apply_node_sort_key(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    apply_sort_key(ctx, line, SortObject::Node)
}

fn apply_sort_nodes(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let key = SortKey {
        resource: SORT_PRIORITY.to_string(),
        order: SortOrder::Descending,
        field: ResourceField::Total,
    };
    add_sort_key(ctx, line, SortObject::Node, &key);
    Ok(())
}

/// Listed classes rank by position, first highest. The implicit
/// `normal_jobs` class always sits at priority 0.
fn apply_preempt_prio(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let listed = line
        .value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|plist| preempt::encode(plist).map_err(|e| LineError::InvalidPreemptLevel(e.0)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut classes = vec![PreemptClass {
        bits: PreemptLevel::NormalJobs.into(),
        priority: 0,
    }];
    classes.extend(
        listed
            .into_iter()
            .rev()
            .zip(1..)
            .map(|(bits, priority)| PreemptClass { bits, priority }),
    );
    preempt::sort_classes(&mut classes);
    ctx.policy.preempt_prio = classes;
    Ok(())
}

fn apply_max_preempt_attempts(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    let attempts = u64::try_from(require_number(line)?).map_err(|_| not_numeric(line))?;
    ctx.policy.max_preempt_attempts = Limit::At(attempts);
    Ok(())
}

fn apply_max_jobs_to_check(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    ctx.policy.max_jobs_to_check = if line.value == "ALL_JOBS" {
        Limit::Unbounded
    } else {
        let jobs = u64::try_from(require_number(line)?).map_err(|_| not_numeric(line))?;
        Limit::At(jobs)
    };
    Ok(())
}

fn apply_provision_policy(ctx: &mut LineContext<'_>, line: &ConfigLine<'_>) -> Result<(), LineError> {
    ctx.policy.provision_policy = match line.value {
        "avoid_provision" => ProvisionPolicy::Avoid,
        "aggressive_provision" => ProvisionPolicy::Aggressive,
        _ => {
            return Err(LineError::InvalidChoice {
                option: line.name.to_string(),
                value: line.value.to_string(),
                expected: "avoid_provision or aggressive_provision",
            })
        }
    };
    Ok(())
}
