//! Per-line diagnostics collected while compiling a configuration.
//!
//! Every diagnostic is emitted as a `tracing` event when it is recorded and
//! kept in the [`ParseReport`] handed back with the compiled policy.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::security::SecurityViolation;

/// Why a single configuration line was rejected.
///
/// A rejected line leaves the policy exactly as it was before the line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineError {
    #[error("missing option name or value")]
    Incomplete,

    #[error("unrecognized option '{0}'")]
    UnknownOption(String),

    #[error("invalid time qualifier '{0}': use prime, non_prime, all or none")]
    InvalidQualifier(String),

    #[error("{option} expects true or false, got '{value}'")]
    NotBoolean { option: String, value: String },

    #[error("{option} expects a number, got '{value}'")]
    NotNumeric { option: String, value: String },

    #[error("{option} expects a time value such as HH:MM:SS, got '{value}'")]
    NotTime { option: String, value: String },

    #[error("fairshare_decay_factor: Invalid value: {0}.  Valid values are between 0 and 1.")]
    DecayFactorOutOfRange(f64),

    #[error("fairshare_entity {0} is erroneous (or deprecated).")]
    InvalidFairshareEntity(String),

    #[error("{option} valid values: {expected}")]
    InvalidChoice {
        option: String,
        value: String,
        expected: &'static str,
    },

    #[error("{option} value '{value}' is longer than {max} characters")]
    PrefixTooLong {
        option: String,
        value: String,
        max: usize,
    },

    #[error("missing sort resource name")]
    MissingSortResource,

    #[error("missing order token for sort key '{0}': use high or low")]
    MissingOrderToken(String),

    #[error("invalid sort order '{0}': use high or low")]
    InvalidOrderToken(String),

    #[error("invalid node sort field '{0}': use total, assigned or unused")]
    InvalidSortField(String),

    #[error("invalid preemption list: unknown level '{0}'")]
    InvalidPreemptLevel(String),

    #[error("invalid server_dyn_res: {0}")]
    InvalidDynamicResource(String),

    #[error("error: {} file has a non-secure file access: {reason}", script.display())]
    InsecureScript { script: PathBuf, reason: String },

    #[error("too many server_dyn_res lines, max: {max}")]
    TooManyDynamicResources { max: usize },

    #[error("invalid peer queue")]
    InvalidPeerQueue,

    #[error("too many peer queues - max: {max}")]
    TooManyPeerQueues { max: usize },
}

impl LineError {
    pub(crate) fn insecure(violation: SecurityViolation) -> Self {
        LineError::InsecureScript {
            script: violation.path().to_path_buf(),
            reason: violation.to_string(),
        }
    }
}

/// Use of a deprecated option name. Never an error on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObsoleteNotice {
    pub old_name: String,
    pub replacement: Option<String>,
}

impl ObsoleteNotice {
    pub fn new(old_name: impl Into<String>, replacement: Option<&str>) -> Self {
        Self {
            old_name: old_name.into(),
            replacement: replacement.map(str::to_string),
        }
    }
}

impl fmt::Display for ObsoleteNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.replacement {
            Some(replacement) => write!(
                f,
                "Obsolete config name {}, instead use {}",
                self.old_name, replacement
            ),
            None => write!(f, "Obsolete config name {}", self.old_name),
        }
    }
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// The line was rejected.
    Error(LineError),
    /// A deprecated option was used.
    Obsolete(ObsoleteNotice),
    /// The line was valid but had no effect, e.g. a sort list was full.
    Ignored(String),
    /// The validator changed a setting after the whole file was read.
    Corrected(String),
}

/// One recorded diagnostic. `line` is `None` for post-parse findings.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: Option<usize>,
    pub kind: DiagnosticKind,
}

/// Everything noteworthy that happened while compiling one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    /// Where the configuration came from, for log context.
    pub source: String,
    pub lines_read: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub(crate) fn line_error(&mut self, line: usize, error: LineError) {
        warn!(
            source = %self.source,
            line,
            error = %error,
            "Error reading line {}: {}", line, error
        );
        self.push(Some(line), DiagnosticKind::Error(error));
    }

    pub(crate) fn obsolete(&mut self, line: usize, notice: ObsoleteNotice) {
        warn!(source = %self.source, line, option = %notice.old_name, "{}", notice);
        self.push(Some(line), DiagnosticKind::Obsolete(notice));
    }

    pub(crate) fn record_ignored(&mut self, line: usize, message: String) {
        warn!(source = %self.source, line, "{}", message);
        self.push(Some(line), DiagnosticKind::Ignored(message));
    }

    pub(crate) fn corrected(&mut self, message: String) {
        warn!(source = %self.source, "{}", message);
        self.push(None, DiagnosticKind::Corrected(message));
    }

    fn push(&mut self, line: Option<usize>, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic { line, kind });
    }

    /// Rejected lines, in file order.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &LineError)> {
        self.diagnostics.iter().filter_map(|d| match (&d.kind, d.line) {
            (DiagnosticKind::Error(e), Some(line)) => Some((line, e)),
            _ => None,
        })
    }

    pub fn obsolete_notices(&self) -> impl Iterator<Item = &ObsoleteNotice> {
        self.diagnostics.iter().filter_map(|d| match &d.kind {
            DiagnosticKind::Obsolete(n) => Some(n),
            _ => None,
        })
    }

    pub fn ignored(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().filter_map(|d| match &d.kind {
            DiagnosticKind::Ignored(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn corrections(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().filter_map(|d| match &d.kind {
            DiagnosticKind::Corrected(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}
