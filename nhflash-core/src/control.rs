//! Capability interfaces for the two device control-planes.
//!
//! A phone is addressable through exactly one of these at a time: the
//! bootloader (fastboot) before an operating system has started, or the
//! user-mode interface (adb) once Android or a recovery environment is up.
//! Every mutating operation here touches real hardware and is never safe to
//! retry blindly; callers re-query [`BootloaderControl::status`] or
//! [`UserModeControl::status`] instead.

use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

/// What a control-plane can currently see on the USB bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    NoDeviceFound,
    /// The device is attached but has not approved this host (or is offline).
    Unauthorized,
    /// The device is attached but the host lacks permission to open it.
    NoUsbPermissions,
    Ready,
}

impl DeviceStatus {
    pub fn is_ready(self) -> bool {
        self == DeviceStatus::Ready
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceStatus::NoDeviceFound => "no device found",
            DeviceStatus::Unauthorized => "device unauthorized",
            DeviceStatus::NoUsbPermissions => "insufficient USB permissions",
            DeviceStatus::Ready => "ready",
        };
        f.write_str(text)
    }
}

/// Target passed to [`UserModeControl::reboot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebootTarget {
    System,
    Bootloader,
    Recovery,
    Sideload,
}

impl RebootTarget {
    /// The argument understood by `adb reboot`, `None` for a plain reboot.
    pub fn as_arg(self) -> Option<&'static str> {
        match self {
            RebootTarget::System => None,
            RebootTarget::Bootloader => Some("bootloader"),
            RebootTarget::Recovery => Some("recovery"),
            RebootTarget::Sideload => Some("sideload"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    /// The control-plane executable could not be started at all.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    /// The tool ran but reported failure.
    #[error("`{command}` failed: {output}")]
    Command { command: String, output: String },
    /// The tool succeeded but its output could not be interpreted.
    #[error("unexpected output from `{command}`: {output}")]
    Unparseable { command: String, output: String },
}

/// Operations available while the device sits in its bootloader.
pub trait BootloaderControl {
    fn status(&self) -> Result<DeviceStatus, ControlError>;

    /// The hardware identifier the bootloader reports (`getvar product`).
    fn product_identifier(&self) -> Result<String, ControlError>;

    /// Whether the bootloader is unlocked.
    fn unlocked(&self) -> Result<bool, ControlError>;

    fn unlock(&self) -> Result<(), ControlError>;

    fn flash_recovery(&self, image: &Path) -> Result<(), ControlError>;

    fn boot_image(&self, image: &Path) -> Result<(), ControlError>;

    fn reboot(&self) -> Result<(), ControlError>;
}

/// Operations available while Android or a recovery is running.
pub trait UserModeControl {
    fn status(&self) -> Result<DeviceStatus, ControlError>;

    fn run_shell_command(&self, command: &str) -> Result<(), ControlError>;

    fn push_file(&self, local: &Path, remote_dir: &str) -> Result<(), ControlError>;

    fn reboot(&self, target: RebootTarget) -> Result<(), ControlError>;

    /// Streams an update package to a recovery waiting in sideload mode.
    fn sideload_package(&self, package: &Path) -> Result<(), ControlError>;
}
