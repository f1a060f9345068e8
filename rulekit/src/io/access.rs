//! Pre-spawn readiness checks for external programs.
//!
//! Two checks, as `access(2)` would make them: first existence,
//! then execute permission. Both run on every evaluation because the file may
//! change after the rule was loaded.

use std::fs;
use std::io;
use std::path::Path;

/// Why a program cannot be executed right now.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("File not found.")]
    NotFound,
    #[error("Permission denied.")]
    PermissionDenied,
    #[error("{0}")]
    Other(#[source] io::Error),
}

impl From<io::Error> for AccessError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Other(err),
        }
    }
}

/// Check that `path` exists and that the calling process may execute it.
///
/// On Unix the permission half is `access(X_OK)` against the real user and
/// group, so owner-only programs are refused when someone else runs the engine.
pub fn check_executable(path: &Path) -> Result<(), AccessError> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(AccessError::PermissionDenied);
    }
    caller_may_execute(path)
}

#[cfg(unix)]
fn caller_may_execute(path: &Path) -> Result<(), AccessError> {
    use nix::unistd::{AccessFlags, access};
    access(path, AccessFlags::X_OK).map_err(AccessError::from)
}

#[cfg(not(unix))]
fn caller_may_execute(_path: &Path) -> Result<(), AccessError> {
    Ok(())
}

#[cfg(unix)]
impl From<nix::errno::Errno> for AccessError {
    fn from(errno: nix::errno::Errno) -> Self {
        use nix::errno::Errno;
        match errno {
            Errno::ENOENT | Errno::ENOTDIR => Self::NotFound,
            Errno::EACCES | Errno::EPERM => Self::PermissionDenied,
            other => Self::Other(io::Error::from(other)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = check_executable(&temp.path().join("gone.sh")).unwrap_err();
        assert!(matches!(err, AccessError::NotFound));
        assert_eq!(err.to_string(), "File not found.");
    }

    #[test]
    fn file_without_execute_bit_is_denied() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plain.sh");
        fs::write(&path, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        let err = check_executable(&path).unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied));
    }

    #[test]
    fn directory_is_denied() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = check_executable(temp.path()).unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied));
    }

    #[test]
    fn executable_file_is_ready() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("run.sh");
        fs::write(&path, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");

        check_executable(&path).expect("ready");
    }

    #[test]
    fn execute_bits_for_others_do_not_grant_the_owner() {
        // root passes access(X_OK) whenever any execute bit is set
        if nix::unistd::getuid().is_root() {
            return;
        }
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("others-only.sh");
        fs::write(&path, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o411)).expect("chmod");

        let err = check_executable(&path).unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied));
    }

    #[test]
    fn errno_maps_to_stable_reasons() {
        assert!(matches!(AccessError::from(Errno::EACCES), AccessError::PermissionDenied));
        assert!(matches!(AccessError::from(Errno::EPERM), AccessError::PermissionDenied));
        assert!(matches!(AccessError::from(Errno::ENOENT), AccessError::NotFound));
        assert!(matches!(AccessError::from(Errno::ENOTDIR), AccessError::NotFound));
        assert!(matches!(AccessError::from(Errno::ELOOP), AccessError::Other(_)));
    }
}
