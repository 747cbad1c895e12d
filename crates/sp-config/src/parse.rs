//! Compiling a sched_config file into a [`Policy`].
//!
//! Each compile starts from a freshly reset policy, applies the file line by
//! line, then runs the validator. Only an unreadable file or a policy the
//! validator cannot repair fails the compile; bad lines are reported and
//! skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sp_common::{Error, Result};
use tracing::{debug, info};

use crate::classify::classify;
use crate::options::{self, LineContext};
use crate::policy::Policy;
use crate::report::{LineError, ParseReport};
use crate::security::{FilePermissionCheck, ScriptSecurity};
use crate::units::{ResourceValueParser, UnitParser};
use crate::validate::validate;

/// A compiled policy together with what was reported while building it.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub policy: Policy,
    pub report: ParseReport,
}

/// Compiles sched_config text using pluggable value parsing and script checks.
pub struct PolicyCompiler {
    units: Box<dyn ResourceValueParser>,
    scripts: Box<dyn ScriptSecurity>,
}

impl Default for PolicyCompiler {
    fn default() -> Self {
        Self {
            units: Box::new(UnitParser),
            scripts: Box::new(FilePermissionCheck::for_current_user()),
        }
    }
}

impl PolicyCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the resource value parser.
    pub fn with_units(mut self, units: impl ResourceValueParser + 'static) -> Self {
        self.units = Box::new(units);
        self
    }

    /// Replace the dynamic resource script check.
    pub fn with_script_security(mut self, scripts: impl ScriptSecurity + 'static) -> Self {
        self.scripts = Box::new(scripts);
        self
    }

    /// Compile a configuration file into a new policy.
    pub fn compile_file(&self, path: &Path) -> Result<CompiledPolicy> {
        let mut policy = Policy::default();
        let report = self.compile_file_into(&mut policy, path)?;
        Ok(CompiledPolicy { policy, report })
    }

    /// Reset `policy` and rebuild it from a configuration file.
    ///
    /// Relative dynamic resource scripts resolve against the file's directory.
    pub fn compile_file_into(&self, policy: &mut Policy, path: &Path) -> Result<ParseReport> {
        let file = File::open(path).map_err(|source| Error::ConfigOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let source = path.display().to_string();
        self.compile_reader_into(policy, BufReader::new(file), &source, path.parent())
    }

    /// Compile configuration text held in memory.
    pub fn compile_str(&self, text: &str) -> Result<CompiledPolicy> {
        let mut policy = Policy::default();
        let report = self.compile_reader_into(&mut policy, text.as_bytes(), "<string>", None)?;
        Ok(CompiledPolicy { policy, report })
    }

    /// Reset `policy` and rebuild it from any line source.
    pub fn compile_reader_into<R: BufRead>(
        &self,
        policy: &mut Policy,
        mut reader: R,
        source: &str,
        script_dir: Option<&Path>,
    ) -> Result<ParseReport> {
        info!(source, "compiling scheduler configuration");
        policy.reset();
        let mut report = ParseReport::new(source);

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            report.lines_read += 1;
            let raw = String::from_utf8_lossy(&buf);
            let raw = raw.trim_end_matches(['\n', '\r']);
            self.compile_line(policy, &mut report, raw, script_dir);
        }

        let validation = validate(policy);
        for correction in validation.corrections {
            report.corrected(correction);
        }
        if !validation.problems.is_empty() {
            return Err(Error::InvalidPolicy(validation.problems.join("; ")));
        }

        debug!(
            source,
            lines = report.lines_read,
            errors = report.errors().count(),
            obsolete = report.obsolete_notices().count(),
            "scheduler configuration compiled"
        );
        Ok(report)
    }

    fn compile_line(
        &self,
        policy: &mut Policy,
        report: &mut ParseReport,
        raw: &str,
        script_dir: Option<&Path>,
    ) {
        let line_no = report.lines_read;
        let line = match classify(raw) {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => return report.line_error(line_no, err),
        };
        let Some(spec) = options::lookup(line.name) else {
            return report.line_error(line_no, LineError::UnknownOption(line.name.to_string()));
        };

        let mut ctx = LineContext::new(policy, self.units.as_ref(), self.scripts.as_ref(), script_dir);
        let outcome = spec.apply(&mut ctx, &line);
        let LineContext {
            notices, ignored, ..
        } = ctx;

        if let Err(err) = outcome {
            report.line_error(line_no, err);
        }
        for message in ignored {
            report.record_ignored(line_no, message);
        }
        for notice in spec.obsolete_notice().into_iter().chain(notices) {
            report.obsolete(line_no, notice);
        }
    }
}

/// Compile a configuration file with the default collaborators.
pub fn parse_config(path: &Path) -> Result<CompiledPolicy> {
    PolicyCompiler::new().compile_file(path)
}
