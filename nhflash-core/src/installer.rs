//! The installation orchestrator.
//!
//! [`Installer::run`] walks a single device through detection,
//! identification, bootloader unlock, artifact staging and the stage list
//! built by [`crate::plan`]. It owns the run state exclusively and stops at
//! the first failure: nothing is retried and no further device command is
//! issued once an operation has failed, because mutating a phone after a
//! failed flash is how phones get bricked. The only repeated queries are
//! status checks, and those are bounded to one re-check per mode change.
use crate::config::{CompanionPolicy, InstallerConfig};
use crate::console::Console;
use crate::control::{BootloaderControl, ControlError, DeviceStatus, RebootTarget, UserModeControl};
use crate::fetch::Fetcher;
use crate::outcome::{ErrorKind, InstallError, Outcome};
use crate::plan::{Ack, Flow, Plane, Step, Wait};
use crate::profile::{ArtifactKind, DeviceProfile};
use crate::registry::{Registry, Resolution};
use crate::staging::{self, StagedArtifacts};
use std::path::Path;
use std::time::Duration;

const MSG_ADB_ISSUE: &str = "No device found over ADB. Make sure the device is connected, \
USB debugging is enabled, and this computer has been authorized on the device.";
const MSG_FIX_PERMS: &str = "This computer lacks permission to access the device over USB. \
Install the Android udev rules (or run as administrator) and reconnect the device.";
const MSG_FASTBOOT_NO_DEVICE: &str = "No device found in fastboot mode. Make sure the device \
is connected and sitting in its bootloader.";
const MSG_UNLOCK_SUCCESS: &str = "Bootloader unlocked! The device will now wipe itself and \
reboot. Once it has finished, enable USB debugging again and re-run the installer.";
const MSG_MANUAL_REBOOT: &str =
    "Please reboot your device manually by going to Reboot > System > Do Not Install";

/// Where the run has got to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ToolsVerified,
    ModeDetected,
    DeviceIdentified,
    BootloaderUnlocked,
    ArtifactsStaged,
    /// Executing the step at this index of the plan.
    Step(usize),
    Done,
}

/// Which control-plane the device is believed to be answering on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Unknown,
    UserMode,
    Bootloader,
}

/// Working state of one invocation. Never persisted.
#[derive(Clone, Debug)]
pub struct InstallationRun {
    pub phase: Phase,
    pub mode: Mode,
    pub profile: Option<DeviceProfile>,
    pub staged: StagedArtifacts,
}

impl Default for InstallationRun {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            mode: Mode::Unknown,
            profile: None,
            staged: StagedArtifacts::default(),
        }
    }
}

pub struct Installer<'a> {
    registry: &'a Registry,
    bootloader: &'a dyn BootloaderControl,
    user_mode: &'a dyn UserModeControl,
    fetcher: &'a dyn Fetcher,
    console: &'a mut dyn Console,
    config: InstallerConfig,
    run: InstallationRun,
}

impl<'a> Installer<'a> {
    pub fn new(
        registry: &'a Registry,
        bootloader: &'a dyn BootloaderControl,
        user_mode: &'a dyn UserModeControl,
        fetcher: &'a dyn Fetcher,
        console: &'a mut dyn Console,
        config: InstallerConfig,
    ) -> Self {
        Self {
            registry,
            bootloader,
            user_mode,
            fetcher,
            console,
            config,
            run: InstallationRun::default(),
        }
    }

    /// The state reached so far; after a failure, where it stopped.
    pub fn state(&self) -> &InstallationRun {
        &self.run
    }

    pub fn run(&mut self, flow: Flow) -> Result<Outcome, InstallError> {
        let question = match flow {
            Flow::Install => "Are you ready to install NetHunter?",
            Flow::Restore => "Are you ready to restore the factory image?",
        };
        if !self.console.confirm(question).map_err(InstallError::Input)? {
            self.console.say("Aborting installation.");
            return Ok(Outcome::Declined);
        }

        self.verify_tools()?;
        self.detect_mode()?;
        let profile = self.identify()?;
        for &kind in flow.required_artifacts() {
            if profile.artifact(kind).is_none() {
                return Err(InstallError::NotConfigured { artifact: kind });
            }
        }
        self.run.profile = Some(profile.clone());

        if self.ensure_unlocked()? {
            return Ok(Outcome::BootloaderUnlocked);
        }

        self.run.staged = staging::stage(
            &profile,
            &flow.staged_artifacts(self.config.companion),
            &self.config.workdir,
            self.fetcher,
            &mut *self.console,
        )?;
        self.advance(Phase::ArtifactsStaged);

        let steps = flow.steps(&profile, self.config.companion);
        for (index, step) in steps.iter().enumerate() {
            self.advance(Phase::Step(index));
            tracing::info!("step {}/{}: {step}", index + 1, steps.len());
            if let Some(plane) = step.precondition() {
                self.require_ready(plane)?;
            }
            self.execute(*step, &profile)?;
        }

        self.advance(Phase::Done);
        self.console.say(match flow {
            Flow::Install => "Installation complete! Enjoy NetHunter.",
            Flow::Restore => "Factory image restored.",
        });
        Ok(Outcome::Installed)
    }

    fn advance(&mut self, phase: Phase) {
        tracing::debug!("phase {:?} -> {phase:?}", self.run.phase);
        self.run.phase = phase;
    }

    fn verify_tools(&mut self) -> Result<(), InstallError> {
        self.console.say("Verifying installer tools...");
        let incomplete = |tool: &str, source| {
            InstallError::control(
                ErrorKind::Prerequisites,
                format!("Failed to run {tool}; the installer bundle may be incomplete"),
                source,
            )
        };
        self.user_mode.status().map_err(|e| incomplete("adb", e))?;
        self.bootloader.status().map_err(|e| incomplete("fastboot", e))?;
        self.advance(Phase::ToolsVerified);
        Ok(())
    }

    /// Works out which control-plane is live and gets the device into its
    /// bootloader.
    fn detect_mode(&mut self) -> Result<(), InstallError> {
        self.console.say("Checking USB permissions...");
        let status = self.bootloader.status().map_err(|e| {
            InstallError::control(ErrorKind::Bootloader, "Failed to get fastboot status", e)
        })?;

        if status == DeviceStatus::NoDeviceFound {
            // Not in the bootloader, so it should be booted (system or
            // recovery) and reachable over adb.
            self.run.mode = Mode::UserMode;
            self.verify_user_mode()?;
            self.enter_bootloader(self.config.settle.bootloader_reboot)?;
        } else {
            bootloader_ready(status)?;
        }

        self.run.mode = Mode::Bootloader;
        self.advance(Phase::ModeDetected);
        Ok(())
    }

    fn verify_user_mode(&mut self) -> Result<(), InstallError> {
        let status = self.user_mode.status().map_err(|e| {
            InstallError::control(ErrorKind::UserMode, "Failed to get adb status", e)
        })?;
        match status {
            DeviceStatus::Ready => Ok(()),
            DeviceStatus::NoUsbPermissions => {
                Err(InstallError::device(ErrorKind::UsbPermissions, MSG_FIX_PERMS))
            }
            DeviceStatus::NoDeviceFound | DeviceStatus::Unauthorized => {
                Err(InstallError::device(ErrorKind::UserMode, MSG_ADB_ISSUE))
            }
        }
    }

    fn verify_bootloader(&mut self) -> Result<(), InstallError> {
        let status = self.bootloader.status().map_err(|e| {
            InstallError::control(ErrorKind::Bootloader, "Failed to get fastboot status", e)
        })?;
        bootloader_ready(status)
    }

    /// Reboots from user mode into the bootloader, waits the settle time and
    /// checks exactly once that fastboot can see the device.
    fn enter_bootloader(&mut self, settle_time: Duration) -> Result<(), InstallError> {
        self.console.say("Rebooting your device into bootloader...");
        self.user_mode
            .reboot(RebootTarget::Bootloader)
            .map_err(|e| {
                InstallError::control(ErrorKind::UserMode, "Failed to reboot into bootloader", e)
            })?;
        self.run.mode = Mode::Unknown;

        settle(settle_time);

        match self.bootloader.status() {
            Ok(status) if status.is_ready() => {
                self.run.mode = Mode::Bootloader;
                Ok(())
            }
            Ok(DeviceStatus::NoUsbPermissions) => {
                Err(InstallError::device(ErrorKind::UsbPermissions, MSG_FIX_PERMS))
            }
            Ok(status) => Err(InstallError::device(
                ErrorKind::UserMode,
                format!("Failed to reboot device into bootloader ({status})"),
            )),
            Err(e) => Err(InstallError::control(
                ErrorKind::UserMode,
                "Failed to reboot device into bootloader",
                e,
            )),
        }
    }

    fn identify(&mut self) -> Result<DeviceProfile, InstallError> {
        self.console.say("Identifying your device...");
        let identifier = self.bootloader.product_identifier().map_err(|e| {
            InstallError::control(ErrorKind::Bootloader, "Failed to get device product info", e)
        })?;
        tracing::info!("bootloader reports product '{identifier}'");

        let registry = self.registry;
        let profile = match registry.resolve(&identifier) {
            Resolution::Found(profile) => profile,
            Resolution::NotFound => return Err(InstallError::UnknownDevice(identifier)),
            Resolution::Ambiguous(candidates) => {
                let names: Vec<String> = candidates.iter().map(|p| p.name.clone()).collect();
                let prompt = format!("Detected {identifier}. Select which device:");
                let choice = self
                    .console
                    .choose(&prompt, &names)
                    .map_err(InstallError::Input)?;
                // Commit the candidate at the chosen position; names are only
                // labels for the menu.
                candidates.get(choice).copied().ok_or_else(|| {
                    InstallError::device(ErrorKind::UserInput, format!("no option {choice}"))
                })?
            }
        };

        self.console.say(&format!(
            "Device and config found, using {profile} configuration and endpoints"
        ));
        self.advance(Phase::DeviceIdentified);
        Ok(profile.clone())
    }

    /// Returns `true` if the bootloader was unlocked just now, which ends
    /// the run.
    fn ensure_unlocked(&mut self) -> Result<bool, InstallError> {
        if self.config.acknowledge_transitions {
            self.console
                .acknowledge(
                    "Press enter to continue with the bootloader unlock check. \
                     Unlocking wipes the device and requires a restart.",
                )
                .map_err(InstallError::Input)?;
        }

        let unlocked = match self.bootloader.unlocked() {
            Ok(unlocked) => unlocked,
            Err(e) => {
                // Assume locked: unlocking an unlocked device fails loudly,
                // flashing a locked one fails half-way.
                tracing::warn!("lock state unknown: {e}");
                self.console
                    .warn(&format!("unable to determine bootloader lock state: {e}"));
                false
            }
        };

        if unlocked {
            tracing::debug!("bootloader already unlocked");
            self.advance(Phase::BootloaderUnlocked);
            return Ok(false);
        }

        self.console
            .say("Unlocking bootloader, you will need to confirm this on your device...");
        self.bootloader.unlock().map_err(|e| {
            InstallError::control(ErrorKind::Bootloader, "Failed to unlock bootloader", e)
        })?;
        if let Err(e) = self.bootloader.reboot() {
            tracing::warn!("reboot after unlock failed: {e}");
        }
        self.console.say(MSG_UNLOCK_SUCCESS);
        Ok(true)
    }

    /// Checks a step's precondition against the live device status.
    fn require_ready(&mut self, plane: Plane) -> Result<(), InstallError> {
        match plane {
            Plane::Bootloader => self.verify_bootloader(),
            Plane::UserMode => self.verify_user_mode(),
        }
    }

    fn execute(&mut self, step: Step, profile: &DeviceProfile) -> Result<(), InstallError> {
        let failed = move |context: String| {
            move |e: ControlError| InstallError::control(step.failure(), context, e)
        };

        match step {
            Step::Acknowledge(ack) => {
                if ack.is_transition() && !self.config.acknowledge_transitions {
                    return Ok(());
                }
                if ack == Ack::UserModeReenabled {
                    self.console.say(
                        "Once the device has booted, enable USB debugging again \
                         (Settings > Developer options).",
                    );
                }
                self.console
                    .acknowledge(ack.prompt())
                    .map_err(InstallError::Input)?;
            }
            Step::Settle(wait) => settle(self.wait_duration(wait)),
            Step::FlashRecovery(kind) => {
                self.console.say(&format!("Flashing the {kind}..."));
                let image = self.artifact_path(kind)?;
                self.bootloader
                    .flash_recovery(image)
                    .map_err(failed(format!("Failed to flash the {kind}")))?;
            }
            Step::BootRecovery(kind) => {
                self.console.say(&format!(
                    "Booting the {kind}. Swipe to allow system modification and wait."
                ));
                let image = self.artifact_path(kind)?;
                self.bootloader
                    .boot_image(image)
                    .map_err(failed(format!("Failed to boot the {kind}")))?;
                self.run.mode = Mode::UserMode;
            }
            Step::Wipe(partition) => {
                self.console.say(&format!("Wiping {}...", partition.name()));
                self.user_mode
                    .run_shell_command(&format!("twrp wipe {}", partition.name()))
                    .map_err(failed(format!("Failed to wipe {}", partition.name())))?;
            }
            Step::Push(kind) => {
                self.console
                    .say(&format!("Transferring the {kind} to your device..."));
                let local = self.artifact_path(kind)?;
                self.user_mode
                    .push_file(local, &self.config.remote_dir)
                    .map_err(failed(format!("Failed to push the {kind} to the device")))?;
            }
            Step::Install(kind) => self.install(kind, profile)?,
            Step::OfferInstall(kind) => {
                let wanted = match self.config.companion {
                    CompanionPolicy::Ask => self
                        .console
                        .confirm(&format!("Install the {kind}?"))
                        .map_err(InstallError::Input)?,
                    CompanionPolicy::Always => true,
                    CompanionPolicy::Never => false,
                };
                if wanted {
                    self.install(kind, profile)?;
                } else {
                    self.console.say(&format!("Skipping the {kind}."));
                }
            }
            Step::Sideload(kind) => {
                self.console.say(&format!(
                    "Sideloading the {kind}, please keep your device connected..."
                ));
                let package = self.artifact_path(kind)?;
                self.user_mode
                    .sideload_package(package)
                    .map_err(failed(format!("Failed to sideload the {kind}")))?;
            }
            Step::Reboot => {
                self.console.say("Rebooting your device...");
                if let Err(e) = self.user_mode.reboot(RebootTarget::System) {
                    self.console.say(MSG_MANUAL_REBOOT);
                    return Err(failed("Failed to reboot".into())(e));
                }
                self.run.mode = Mode::UserMode;
            }
            Step::LeaveRecovery => {
                self.console.say("Rebooting your device...");
                if let Err(e) = self.user_mode.reboot(RebootTarget::System) {
                    // The payload is already applied; only the reboot is left.
                    tracing::warn!("reboot out of recovery failed: {e}");
                    self.console.say(MSG_MANUAL_REBOOT);
                }
                self.run.mode = Mode::Unknown;
            }
            Step::EnterBootloader => {
                self.enter_bootloader(self.config.settle.second_bootloader_reboot)?
            }
        }

        Ok(())
    }

    fn install(&mut self, kind: ArtifactKind, profile: &DeviceProfile) -> Result<(), InstallError> {
        let artifact = profile
            .artifact(kind)
            .ok_or(InstallError::NotConfigured { artifact: kind })?;
        self.console.say(&format!(
            "Installing the {kind}, please keep your device connected..."
        ));
        let remote = format!(
            "{}/{}",
            self.config.remote_dir.trim_end_matches('/'),
            artifact.file
        );
        self.user_mode
            .run_shell_command(&format!("twrp install {remote}"))
            .map_err(|e| {
                InstallError::control(ErrorKind::Recovery, format!("Failed to install the {kind}"), e)
            })
    }

    fn artifact_path(&self, kind: ArtifactKind) -> Result<&Path, InstallError> {
        self.run
            .staged
            .path(kind)
            .ok_or(InstallError::NotConfigured { artifact: kind })
    }

    fn wait_duration(&self, wait: Wait) -> Duration {
        let settle = &self.config.settle;
        match wait {
            Wait::WipeGap => settle.wipe_gap,
            Wait::PostInstall => settle.post_install,
            Wait::RecoveryReady => settle.recovery_ready,
            Wait::PostFilesystemInstall => settle.post_filesystem_install,
            Wait::SystemBoot => settle.system_boot,
        }
    }
}

fn bootloader_ready(status: DeviceStatus) -> Result<(), InstallError> {
    if status.is_ready() {
        return Ok(());
    }
    match status {
        DeviceStatus::NoUsbPermissions => {
            Err(InstallError::device(ErrorKind::UsbPermissions, MSG_FIX_PERMS))
        }
        _ => Err(InstallError::device(
            ErrorKind::Bootloader,
            MSG_FASTBOOT_NO_DEVICE,
        )),
    }
}

fn settle(duration: Duration) {
    if !duration.is_zero() {
        tracing::debug!("settling for {duration:?}");
        std::thread::sleep(duration);
    }
}
