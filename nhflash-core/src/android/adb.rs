use super::{parse_device_listing, run_checked};
use crate::control::{ControlError, DeviceStatus, RebootTarget, UserModeControl};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Connection states in which adb accepts commands.
const READY_STATES: &[&str] = &["device", "recovery", "sideload"];

/// The user-mode control-plane, driven through the `adb` executable.
#[derive(Clone, Debug)]
pub struct Adb {
    program: PathBuf,
}

impl Adb {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl UserModeControl for Adb {
    fn status(&self) -> Result<DeviceStatus, ControlError> {
        let listing = run_checked(&self.program, ["devices"])?;
        Ok(parse_device_listing(&listing, READY_STATES))
    }

    fn run_shell_command(&self, command: &str) -> Result<(), ControlError> {
        let output = run_checked(&self.program, ["shell", command])?;
        // Older adb daemons do not forward the remote exit status, but TWRP
        // still prints its failures.
        if output.lines().any(|l| l.trim_start().starts_with("E:")) {
            return Err(ControlError::Command {
                command: format!("adb shell {command}"),
                output: output.trim().to_string(),
            });
        }
        Ok(())
    }

    fn push_file(&self, local: &Path, remote_dir: &str) -> Result<(), ControlError> {
        let args: [OsString; 3] = ["push".into(), local.into(), remote_dir.into()];
        run_checked(&self.program, args).map(drop)
    }

    fn reboot(&self, target: RebootTarget) -> Result<(), ControlError> {
        let mut args = vec!["reboot"];
        args.extend(target.as_arg());
        run_checked(&self.program, args).map(drop)
    }

    fn sideload_package(&self, package: &Path) -> Result<(), ControlError> {
        let args: [OsString; 2] = ["sideload".into(), package.into()];
        run_checked(&self.program, args).map(drop)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Writes an executable shell script standing in for `adb`.
    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("adb");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn status_reads_device_listing() {
        let dir = tempfile::tempdir().unwrap();
        let adb = Adb::new(fake_tool(
            dir.path(),
            "printf 'List of devices attached\\nabc123\\tunauthorized\\n'",
        ));
        assert_eq!(adb.status().unwrap(), DeviceStatus::Unauthorized);
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let adb = Adb::new(dir.path().join("no-such-adb"));
        assert!(matches!(adb.status(), Err(ControlError::Spawn { .. })));
    }

    #[test]
    fn recovery_error_lines_fail_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let adb = Adb::new(fake_tool(dir.path(), "echo 'E:Unable to mount /data'"));
        let err = adb.run_shell_command("twrp wipe data").unwrap_err();
        assert!(err.to_string().contains("Unable to mount"));
    }

    #[test]
    fn non_zero_exit_fails_push() {
        let dir = tempfile::tempdir().unwrap();
        let adb = Adb::new(fake_tool(dir.path(), "echo 'adb: error: failed to copy' >&2; exit 1"));
        let err = adb
            .push_file(Path::new("os.zip"), "/sdcard")
            .unwrap_err();
        assert!(matches!(err, ControlError::Command { .. }));
        assert!(err.to_string().contains("failed to copy"));
    }
}
