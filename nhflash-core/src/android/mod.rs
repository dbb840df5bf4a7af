//! Control-planes backed by the Android platform tools.
//!
//! [`Adb`] and [`Fastboot`] implement the traits in [`crate::control`] by
//! running the `adb` and `fastboot` executables and interpreting what they
//! print. Parsing is kept in free functions so it can be tested without a
//! device attached.

mod adb;
mod fastboot;

pub use adb::Adb;
pub use fastboot::Fastboot;

use crate::control::{ControlError, DeviceStatus};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

/// Captured result of one tool invocation.
struct ToolOutput {
    success: bool,
    /// stdout followed by stderr; fastboot reports most things on stderr.
    text: String,
}

/// Runs `program` with `args` to completion and captures its output.
fn run_tool<I, S>(program: &Path, args: I) -> Result<(String, ToolOutput), ControlError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    let rendered = render(&command);
    tracing::debug!("running `{rendered}`");

    let output = command.output().map_err(|source| ControlError::Spawn {
        tool: program.display().to_string(),
        source,
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    tracing::debug!("`{rendered}` exited with {}: {}", output.status, text.trim());

    Ok((
        rendered,
        ToolOutput {
            success: output.status.success(),
            text,
        },
    ))
}

/// Like [`run_tool`], but a non-zero exit becomes [`ControlError::Command`].
fn run_checked<I, S>(program: &Path, args: I) -> Result<String, ControlError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let (command, output) = run_tool(program, args)?;
    if output.success {
        Ok(output.text)
    } else {
        Err(ControlError::Command {
            command,
            output: output.text.trim().to_string(),
        })
    }
}

fn render(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Interprets a `devices` listing as printed by both adb and fastboot.
///
/// Only the first attached device is considered; the installer addresses a
/// single phone at a time. `ready_states` lists the connection states that
/// mean the device can accept commands.
fn parse_device_listing(listing: &str, ready_states: &[&str]) -> DeviceStatus {
    let row = listing
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("List of devices") && !l.starts_with('*'));

    let Some(row) = row else {
        return DeviceStatus::NoDeviceFound;
    };

    if row.contains("no permissions") {
        return DeviceStatus::NoUsbPermissions;
    }

    let state = row.split_whitespace().nth(1).unwrap_or_default();
    if ready_states.contains(&state) {
        DeviceStatus::Ready
    } else {
        DeviceStatus::Unauthorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADB_READY: &[&str] = &["device", "recovery", "sideload"];

    #[test]
    fn empty_listing_means_no_device() {
        assert_eq!(
            parse_device_listing("List of devices attached\n\n", ADB_READY),
            DeviceStatus::NoDeviceFound
        );
        assert_eq!(parse_device_listing("", &["fastboot"]), DeviceStatus::NoDeviceFound);
    }

    #[test]
    fn daemon_banner_is_skipped() {
        let listing = "* daemon not running; starting now at tcp:5037\n\
                       * daemon started successfully\n\
                       List of devices attached\n\
                       8a7f1c2e\tdevice\n";
        assert_eq!(parse_device_listing(listing, ADB_READY), DeviceStatus::Ready);
    }

    #[test]
    fn recognises_unauthorized_and_permissions() {
        assert_eq!(
            parse_device_listing("List of devices attached\n8a7f1c2e\tunauthorized\n", ADB_READY),
            DeviceStatus::Unauthorized
        );
        assert_eq!(
            parse_device_listing("List of devices attached\n8a7f1c2e\toffline\n", ADB_READY),
            DeviceStatus::Unauthorized
        );
        assert_eq!(
            parse_device_listing(
                "List of devices attached\n8a7f1c2e\tno permissions (user in plugdev group; are your udev rules wrong?)\n",
                ADB_READY
            ),
            DeviceStatus::NoUsbPermissions
        );
        assert_eq!(
            parse_device_listing("????????????\tno permissions fastboot\n", &["fastboot"]),
            DeviceStatus::NoUsbPermissions
        );
    }

    #[test]
    fn recovery_counts_as_ready_for_adb() {
        assert_eq!(
            parse_device_listing("List of devices attached\n8a7f1c2e\trecovery\n", ADB_READY),
            DeviceStatus::Ready
        );
        assert_eq!(
            parse_device_listing("8a7f1c2e\tfastboot\n", &["fastboot"]),
            DeviceStatus::Ready
        );
    }
}
