//! Compiles `job_sort_key` / `node_sort_key` values into sort key lists.

use crate::classify::TimeWindow;
use crate::policy::{Policy, ResourceField, SortKey, SortOrder, MAX_SORTS};
use crate::report::{LineError, ObsoleteNotice};

/// Node sort on the node's priority attribute.
pub const SORT_PRIORITY: &str = "sort_priority";
/// Job sort on the job's priority attribute.
pub const SORT_JOB_PRIORITY: &str = "job_priority";
/// Node sort on the fairshare percentage of the node's jobs.
pub const SORT_FAIR_SHARE: &str = "fair_share_perc";
/// Node sort on the preemption priority of the node's jobs.
pub const SORT_PREEMPT: &str = "preempt_priority";

/// What a sort list orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortObject {
    Job,
    Node,
}

impl SortObject {
    fn label(self) -> &'static str {
        match self {
            SortObject::Job => "",
            SortObject::Node => " node",
        }
    }
}

/// Sort names that are not resources but are understood by the scheduler.
///
/// The compiler stores these keys unchanged. The scheduling cycle asks this
/// when it resolves each key against its resource catalog.
pub fn is_special_case_sort(name: &str, object: SortObject) -> bool {
    match object {
        SortObject::Job => name == SORT_JOB_PRIORITY,
        SortObject::Node => matches!(name, SORT_PRIORITY | SORT_FAIR_SHARE | SORT_PREEMPT),
    }
}

/// A parsed sort key plus the rename notice when a legacy name was used.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSortKey {
    pub key: SortKey,
    pub renamed: Option<ObsoleteNotice>,
}

/// Parse `resource (high|low)` for jobs or `resource (high|low) [total|assigned|unused]` for nodes.
pub fn compile_sort_key(value: &str, object: SortObject) -> Result<CompiledSortKey, LineError> {
    let mut tokens = value.split_ascii_whitespace();
    let resource = tokens.next().ok_or(LineError::MissingSortResource)?;
    let order = match tokens.next() {
        Some(tok) => parse_order(tok)?,
        None => return Err(LineError::MissingOrderToken(resource.to_string())),
    };

    let field = match (object, tokens.next()) {
        (SortObject::Job, _) | (SortObject::Node, None) => ResourceField::Total,
        (SortObject::Node, Some(tok)) => parse_field(tok)?,
    };

    let mut renamed = None;
    let mut resource = resource.to_string();
    if object == SortObject::Job && resource == SORT_PRIORITY {
        renamed = Some(ObsoleteNotice::new(
            format!("{SORT_PRIORITY} in job_sort_key"),
            Some(SORT_JOB_PRIORITY),
        ));
        resource = SORT_JOB_PRIORITY.to_string();
    }

    Ok(CompiledSortKey {
        key: SortKey {
            resource,
            order,
            field,
        },
        renamed,
    })
}

fn parse_order(token: &str) -> Result<SortOrder, LineError> {
    if token.eq_ignore_ascii_case("high") {
        Ok(SortOrder::Descending)
    } else if token.eq_ignore_ascii_case("low") {
        Ok(SortOrder::Ascending)
    } else {
        Err(LineError::InvalidOrderToken(token.to_string()))
    }
}

fn parse_field(token: &str) -> Result<ResourceField, LineError> {
    match token {
        "total" => Ok(ResourceField::Total),
        "assigned" => Ok(ResourceField::Assigned),
        "unused" => Ok(ResourceField::Unused),
        other => Err(LineError::InvalidSortField(other.to_string())),
    }
}

/// Outcome of appending a key to the lists selected by a qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortAppend {
    Appended,
    /// A target list was already full; nothing was appended anywhere.
    Dropped(String),
}

/// True when every list the qualifier selects can take another key.
pub fn has_room(policy: &Policy, window: TimeWindow, object: SortObject) -> bool {
    window.windows().all(|w| {
        let settings = policy.window(w);
        match object {
            SortObject::Job => settings.job_sort.has_room(),
            SortObject::Node => settings.node_sort.has_room(),
        }
    })
}

/// Message logged when a sort key is dropped for lack of room.
pub fn too_many_sorts(window: TimeWindow, object: SortObject, value: &str) -> String {
    format!(
        "Too many {}{} sorts.  {} sort ignored.  {} max sorts",
        window.label(),
        object.label(),
        value,
        MAX_SORTS
    )
}

/// Append `key` to each list the qualifier selects, each list getting its own copy.
pub fn append_sort_key(
    policy: &mut Policy,
    window: TimeWindow,
    object: SortObject,
    key: &SortKey,
    value: &str,
) -> SortAppend {
    if !has_room(policy, window, object) {
        return SortAppend::Dropped(too_many_sorts(window, object, value));
    }

    let mut appended = false;
    for w in window.windows() {
        let settings = policy.window_mut(w);
        let list = match object {
            SortObject::Job => &mut settings.job_sort,
            SortObject::Node => &mut settings.node_sort,
        };
        // Room was checked for every target above.
        if list.try_push(key.clone()).is_ok() {
            appended = true;
        }
    }

    if appended && object == SortObject::Node && key.field != ResourceField::Total {
        policy.node_sort_unused = true;
    }
    SortAppend::Appended
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(resource: &str, order: SortOrder, field: ResourceField) -> SortKey {
        SortKey {
            resource: resource.to_string(),
            order,
            field,
        }
    }

    #[test]
    fn job_sort_directions_any_case() {
        let high = compile_sort_key("ncpus HIGH", SortObject::Job).unwrap();
        assert_eq!(high.key, key("ncpus", SortOrder::Descending, ResourceField::Total));
        let low = compile_sort_key("walltime Low", SortObject::Job).unwrap();
        assert_eq!(low.key.order, SortOrder::Ascending);
        assert!(low.renamed.is_none());
    }

    #[test]
    fn missing_or_bad_order() {
        assert_eq!(
            compile_sort_key("shortest_job_first", SortObject::Job),
            Err(LineError::MissingOrderToken("shortest_job_first".into()))
        );
        assert_eq!(
            compile_sort_key("ncpus sideways", SortObject::Job),
            Err(LineError::InvalidOrderToken("sideways".into()))
        );
        assert_eq!(
            compile_sort_key("  ", SortObject::Node),
            Err(LineError::MissingSortResource)
        );
    }

    #[test]
    fn node_fields() {
        let plain = compile_sort_key("ncpus high", SortObject::Node).unwrap();
        assert_eq!(plain.key.field, ResourceField::Total);
        let unused = compile_sort_key("mem low unused", SortObject::Node).unwrap();
        assert_eq!(unused.key.field, ResourceField::Unused);
        assert_eq!(
            compile_sort_key("mem low spare", SortObject::Node),
            Err(LineError::InvalidSortField("spare".into()))
        );
    }

    #[test]
    fn sort_priority_is_renamed_for_jobs_only() {
        let job = compile_sort_key("sort_priority high", SortObject::Job).unwrap();
        assert_eq!(job.key.resource, SORT_JOB_PRIORITY);
        let notice = job.renamed.unwrap();
        assert_eq!(notice.replacement.as_deref(), Some(SORT_JOB_PRIORITY));

        let node = compile_sort_key("sort_priority high", SortObject::Node).unwrap();
        assert_eq!(node.key.resource, SORT_PRIORITY);
        assert!(node.renamed.is_none());
    }

    #[test]
    fn append_copies_into_each_window() {
        let mut policy = Policy::default();
        let k = key("mem", SortOrder::Ascending, ResourceField::Assigned);
        assert_eq!(
            append_sort_key(&mut policy, TimeWindow::All, SortObject::Node, &k, "mem low assigned"),
            SortAppend::Appended
        );
        assert_eq!(policy.prime.node_sort.as_slice(), &[k.clone()]);
        assert_eq!(policy.non_prime.node_sort.as_slice(), &[k]);
        assert!(policy.node_sort_unused);
        assert!(policy.prime.job_sort.is_empty());
    }

    #[test]
    fn full_list_drops_for_both_windows() {
        let mut policy = Policy::default();
        let k = key("ncpus", SortOrder::Descending, ResourceField::Total);
        for _ in 0..MAX_SORTS {
            append_sort_key(&mut policy, TimeWindow::Prime, SortObject::Job, &k, "ncpus high");
        }
        let outcome = append_sort_key(&mut policy, TimeWindow::All, SortObject::Job, &k, "ncpus high");
        assert!(matches!(outcome, SortAppend::Dropped(_)));
        assert_eq!(policy.prime.job_sort.len(), MAX_SORTS);
        assert!(policy.non_prime.job_sort.is_empty());
    }

    #[test]
    fn special_cases() {
        assert!(is_special_case_sort("job_priority", SortObject::Job));
        assert!(!is_special_case_sort("sort_priority", SortObject::Job));
        assert!(is_special_case_sort("fair_share_perc", SortObject::Node));
        assert!(is_special_case_sort("preempt_priority", SortObject::Node));
        assert!(!is_special_case_sort("ncpus", SortObject::Node));
    }
}
