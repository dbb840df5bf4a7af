//! Run-time settings for an installation.
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Fixed waits standing in for readiness signals the host cannot observe.
///
/// Phone boot times vary by model and by how much is on the data partition,
/// so every value can be overridden.
#[derive(Clone, Debug, PartialEq)]
pub struct SettleTimes {
    /// After asking a booted device to restart into its bootloader, before
    /// checking that fastboot can see it.
    pub bootloader_reboot: Duration,
    /// Between consecutive recovery wipe commands.
    pub wipe_gap: Duration,
    /// After the install commands, before wiping caches.
    pub post_install: Duration,
    /// After the recovery of the second cycle reports ready.
    pub recovery_ready: Duration,
    /// After installing the filesystem payload, before the final reboot.
    pub post_filesystem_install: Duration,
    /// After rebooting into the freshly installed system, before adb is
    /// queried again. The first boot after a flash is the slowest one.
    pub system_boot: Duration,
    /// Like `bootloader_reboot`, for the second cycle, when the device is
    /// leaving a freshly installed system rather than a recovery.
    pub second_bootloader_reboot: Duration,
}

impl Default for SettleTimes {
    fn default() -> Self {
        Self {
            bootloader_reboot: Duration::from_secs(7),
            wipe_gap: Duration::from_secs(1),
            post_install: Duration::from_secs(10),
            recovery_ready: Duration::from_secs(20),
            post_filesystem_install: Duration::from_secs(30),
            system_boot: Duration::from_secs(60),
            second_bootloader_reboot: Duration::from_secs(30),
        }
    }
}

impl SettleTimes {
    /// No waiting at all, for tests and scripted runs.
    pub fn none() -> Self {
        Self {
            bootloader_reboot: Duration::ZERO,
            wipe_gap: Duration::ZERO,
            post_install: Duration::ZERO,
            recovery_ready: Duration::ZERO,
            post_filesystem_install: Duration::ZERO,
            system_boot: Duration::ZERO,
            second_bootloader_reboot: Duration::ZERO,
        }
    }

    /// Multiplies every duration by `factor` (clamped at zero).
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |d: Duration| d.mul_f64(factor.max(0.0));
        Self {
            bootloader_reboot: scale(self.bootloader_reboot),
            wipe_gap: scale(self.wipe_gap),
            post_install: scale(self.post_install),
            recovery_ready: scale(self.recovery_ready),
            post_filesystem_install: scale(self.post_filesystem_install),
            system_boot: scale(self.system_boot),
            second_bootloader_reboot: scale(self.second_bootloader_reboot),
        }
    }
}

/// Whether the companion app bundle is installed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompanionPolicy {
    /// Ask the operator each run.
    #[default]
    Ask,
    Always,
    Never,
}

impl FromStr for CompanionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "unknown companion policy '{other}' (expected ask, always or never)"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InstallerConfig {
    /// Where artifacts are looked for and downloaded to.
    pub workdir: PathBuf,
    /// Device-side directory that payloads are pushed to.
    pub remote_dir: String,
    pub settle: SettleTimes,
    pub companion: CompanionPolicy,
    /// Ask the operator to confirm before stages that depend on the device
    /// having finished a mode change.
    pub acknowledge_transitions: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            remote_dir: "/sdcard".to_string(),
            settle: SettleTimes::default(),
            companion: CompanionPolicy::default(),
            acknowledge_transitions: true,
        }
    }
}
