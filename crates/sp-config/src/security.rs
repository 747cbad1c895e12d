//! Ownership and permission checks for dynamic resource scripts.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::trace;

const GROUP_OTHER_WRITE: u32 = 0o022;
const STICKY: u32 = 0o1000;

/// Reasons a script is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    #[error("{} can not be accessed: {reason}", path.display())]
    Inaccessible { path: PathBuf, reason: String },

    #[error("{} is not a regular file", path.display())]
    NotRegularFile { path: PathBuf },

    #[error("{} is writable by group or other (mode {mode:o})", path.display())]
    Writable { path: PathBuf, mode: u32 },

    #[error("{} is owned by untrusted uid {uid}", path.display())]
    UntrustedOwner { path: PathBuf, uid: u32 },
}

impl SecurityViolation {
    pub fn path(&self) -> &Path {
        match self {
            SecurityViolation::Inaccessible { path, .. }
            | SecurityViolation::NotRegularFile { path }
            | SecurityViolation::Writable { path, .. }
            | SecurityViolation::UntrustedOwner { path, .. } => path,
        }
    }
}

/// Decides whether a script may be run by the scheduler.
pub trait ScriptSecurity {
    fn check(&self, script: &Path) -> Result<(), SecurityViolation>;
}

/// Rejects scripts that someone other than the trusted user could modify.
///
/// The script must be a regular file owned by the trusted user or root, and
/// neither it nor any ancestor directory may be group- or other-writable.
/// Sticky directories such as `/tmp` are allowed.
#[derive(Debug, Clone, Copy)]
pub struct FilePermissionCheck {
    trusted_uid: u32,
}

impl FilePermissionCheck {
    pub fn new(trusted_uid: u32) -> Self {
        Self { trusted_uid }
    }

    pub fn for_current_user() -> Self {
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        Self::new(uid)
    }
}

impl Default for FilePermissionCheck {
    fn default() -> Self {
        Self::for_current_user()
    }
}

impl ScriptSecurity for FilePermissionCheck {
    fn check(&self, script: &Path) -> Result<(), SecurityViolation> {
        let meta = metadata(script)?;
        if !meta.is_file() {
            return Err(SecurityViolation::NotRegularFile {
                path: script.to_path_buf(),
            });
        }
        if meta.uid() != self.trusted_uid && meta.uid() != 0 {
            return Err(SecurityViolation::UntrustedOwner {
                path: script.to_path_buf(),
                uid: meta.uid(),
            });
        }
        let mode = meta.permissions().mode();
        if mode & GROUP_OTHER_WRITE != 0 {
            return Err(SecurityViolation::Writable {
                path: script.to_path_buf(),
                mode: mode & 0o7777,
            });
        }

        for dir in script.ancestors().skip(1) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let mode = metadata(dir)?.permissions().mode();
            if mode & GROUP_OTHER_WRITE != 0 && mode & STICKY == 0 {
                return Err(SecurityViolation::Writable {
                    path: dir.to_path_buf(),
                    mode: mode & 0o7777,
                });
            }
        }

        trace!(script = %script.display(), "script passed permission check");
        Ok(())
    }
}

fn metadata(path: &Path) -> Result<fs::Metadata, SecurityViolation> {
    fs::metadata(path).map_err(|e| SecurityViolation::Inaccessible {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
