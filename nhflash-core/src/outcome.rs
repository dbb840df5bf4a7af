//! How a run ended, and the process exit code for each ending.
//!
//! Success codes live in `32..64` and error codes in `64..128`, so calling
//! scripts can branch on the range without knowing every value.
use crate::control::ControlError;
use crate::fetch::FetchError;
use crate::profile::ArtifactKind;
use crate::registry::RegistryError;
use std::fmt;
use thiserror::Error;

const SUCCESS_BASE: u8 = 1 << 5;
const ERROR_BASE: u8 = 1 << 6;

/// A run that ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every stage completed.
    Installed,
    /// The operator chose not to start.
    Declined,
    /// The bootloader was just unlocked; the device wipes itself and the
    /// installer must be run again afterwards.
    BootloaderUnlocked,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Installed => 0,
            Outcome::Declined => SUCCESS_BASE + 1,
            Outcome::BootloaderUnlocked => SUCCESS_BASE + 2,
        }
    }
}

/// The error categories surfaced to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A platform tool or the device registry is missing or unusable.
    Prerequisites,
    UserInput,
    UsbPermissions,
    UserMode,
    Bootloader,
    Remote,
    /// Flashing, booting or installing through the recovery failed.
    Recovery,
    /// The attached hardware is not in the device registry.
    UnsupportedDevice,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        let offset = match self {
            ErrorKind::Prerequisites => 1,
            ErrorKind::UserInput => 2,
            ErrorKind::UsbPermissions => 3,
            ErrorKind::UserMode => 4,
            ErrorKind::Bootloader => 5,
            ErrorKind::Remote => 6,
            ErrorKind::Recovery => 7,
            ErrorKind::UnsupportedDevice => 8,
        };
        ERROR_BASE + offset
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::Prerequisites => "missing prerequisites",
            ErrorKind::UserInput => "invalid input",
            ErrorKind::UsbPermissions => "USB permission problem",
            ErrorKind::UserMode => "adb error",
            ErrorKind::Bootloader => "fastboot error",
            ErrorKind::Remote => "download error",
            ErrorKind::Recovery => "recovery error",
            ErrorKind::UnsupportedDevice => "unsupported device",
        };
        f.write_str(text)
    }
}

/// A classified failure that ended the run.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{context}: {source}")]
    Control {
        kind: ErrorKind,
        context: String,
        #[source]
        source: ControlError,
    },
    #[error("{kind}: {message}")]
    Device { kind: ErrorKind, message: String },
    #[error("failed to download the {artifact}: {source}")]
    Fetch {
        artifact: ArtifactKind,
        #[source]
        source: FetchError,
    },
    #[error("the {artifact} is missing and has no download URL")]
    NoSource { artifact: ArtifactKind },
    #[error("the selected device has no {artifact} configured")]
    NotConfigured { artifact: ArtifactKind },
    #[error("device '{0}' is not supported by this installer")]
    UnknownDevice(String),
    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl InstallError {
    pub fn control(kind: ErrorKind, context: impl Into<String>, source: ControlError) -> Self {
        InstallError::Control {
            kind,
            context: context.into(),
            source,
        }
    }

    pub fn device(kind: ErrorKind, message: impl Into<String>) -> Self {
        InstallError::Device {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::Control { kind, .. } | InstallError::Device { kind, .. } => *kind,
            InstallError::Fetch { .. }
            | InstallError::NoSource { .. }
            | InstallError::NotConfigured { .. } => ErrorKind::Remote,
            InstallError::UnknownDevice(_) => ErrorKind::UnsupportedDevice,
            InstallError::Input(_) => ErrorKind::UserInput,
            InstallError::Registry(_) => ErrorKind::Prerequisites,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}
