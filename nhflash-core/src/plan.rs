//! The fixed stage lists the orchestrator walks through.
//!
//! A plan is built once per run from the resolved profile. The only
//! variation between devices is whether the optional payloads (vendor extra,
//! companion bundle) appear; the order of everything else never changes.
use crate::config::CompanionPolicy;
use crate::outcome::ErrorKind;
use crate::profile::{ArtifactKind, DeviceProfile};
use std::fmt;

/// Which procedure is being run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Flash TWRP, wipe, and install the NetHunter payloads.
    Install,
    /// Flash the stock recovery and sideload the vendor factory image.
    Restore,
}

impl Flow {
    /// Artifacts that must be declared by the profile for this flow.
    pub fn required_artifacts(self) -> &'static [ArtifactKind] {
        match self {
            Flow::Install => &[ArtifactKind::Os, ArtifactKind::Filesystem, ArtifactKind::Recovery],
            Flow::Restore => &[ArtifactKind::StockRecovery, ArtifactKind::Factory],
        }
    }

    /// Artifacts to stage, in install precedence order. Optional ones are
    /// included and skipped by staging if the profile lacks them.
    pub fn staged_artifacts(self, companion: CompanionPolicy) -> Vec<ArtifactKind> {
        match self {
            Flow::Install => {
                let mut kinds = vec![ArtifactKind::Extra, ArtifactKind::Os, ArtifactKind::Filesystem];
                if companion != CompanionPolicy::Never {
                    kinds.push(ArtifactKind::Companion);
                }
                kinds.push(ArtifactKind::Recovery);
                kinds
            }
            Flow::Restore => vec![ArtifactKind::Factory, ArtifactKind::StockRecovery],
        }
    }

    pub fn steps(self, profile: &DeviceProfile, companion: CompanionPolicy) -> Vec<Step> {
        match self {
            Flow::Install => install_steps(profile, companion),
            Flow::Restore => restore_steps(),
        }
    }
}

/// A point at which the operator has to confirm before the run continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ack {
    StartInstall,
    RecoveryLoaded,
    /// The phone has rebooted into Android and USB debugging is back on.
    UserModeReenabled,
    SideloadReady,
}

impl Ack {
    pub fn prompt(self) -> &'static str {
        match self {
            Ack::StartInstall => "Press enter to start the installation",
            Ack::RecoveryLoaded => "Press enter when the recovery is fully loaded & ready",
            Ack::UserModeReenabled => "Press enter when ADB is re-enabled",
            Ack::SideloadReady => {
                "Select \"Install from USB\" in the recovery, then press enter"
            }
        }
    }

    /// Acknowledgements that only mask boot-time uncertainty, and can be
    /// turned off when the settle waits are trusted.
    pub fn is_transition(self) -> bool {
        self == Ack::UserModeReenabled
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    WipeGap,
    PostInstall,
    RecoveryReady,
    PostFilesystemInstall,
    /// The freshly installed system coming up after a reboot.
    SystemBoot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    Cache,
    Dalvik,
    Data,
    System,
}

impl Partition {
    pub fn name(self) -> &'static str {
        match self {
            Partition::Cache => "cache",
            Partition::Dalvik => "dalvik",
            Partition::Data => "data",
            Partition::System => "system",
        }
    }
}

/// Which control-plane must report ready before a step may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    Bootloader,
    UserMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Acknowledge(Ack),
    Settle(Wait),
    FlashRecovery(ArtifactKind),
    BootRecovery(ArtifactKind),
    Wipe(Partition),
    Push(ArtifactKind),
    Install(ArtifactKind),
    /// Install only if the operator agrees.
    OfferInstall(ArtifactKind),
    Sideload(ArtifactKind),
    /// Reboot from user mode into the system.
    Reboot,
    /// Reboot out of a recovery that may already have dropped adb, such as a
    /// stock recovery after a sideload. Failing only asks for a manual reboot.
    LeaveRecovery,
    /// Reboot from user mode into the bootloader and wait for it.
    EnterBootloader,
}

impl Step {
    pub fn precondition(self) -> Option<Plane> {
        match self {
            Step::Acknowledge(_) | Step::Settle(_) | Step::LeaveRecovery => None,
            Step::FlashRecovery(_) | Step::BootRecovery(_) => Some(Plane::Bootloader),
            Step::Wipe(_)
            | Step::Push(_)
            | Step::Install(_)
            | Step::OfferInstall(_)
            | Step::Sideload(_)
            | Step::Reboot
            | Step::EnterBootloader => Some(Plane::UserMode),
        }
    }

    /// The classification used if this step's operation fails.
    pub fn failure(self) -> ErrorKind {
        match self {
            Step::Acknowledge(_) | Step::Settle(_) => ErrorKind::UserInput,
            Step::FlashRecovery(_)
            | Step::BootRecovery(_)
            | Step::Wipe(_)
            | Step::Install(_)
            | Step::OfferInstall(_)
            | Step::Sideload(_) => ErrorKind::Recovery,
            Step::Push(_) | Step::Reboot | Step::LeaveRecovery | Step::EnterBootloader => {
                ErrorKind::UserMode
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Acknowledge(ack) => write!(f, "wait for operator: {ack:?}"),
            Step::Settle(wait) => write!(f, "settle: {wait:?}"),
            Step::FlashRecovery(kind) => write!(f, "flash {kind}"),
            Step::BootRecovery(kind) => write!(f, "boot {kind}"),
            Step::Wipe(partition) => write!(f, "wipe {}", partition.name()),
            Step::Push(kind) => write!(f, "push {kind}"),
            Step::Install(kind) => write!(f, "install {kind}"),
            Step::OfferInstall(kind) => write!(f, "offer to install {kind}"),
            Step::Sideload(kind) => write!(f, "sideload {kind}"),
            Step::Reboot => f.write_str("reboot"),
            Step::LeaveRecovery => f.write_str("reboot out of recovery"),
            Step::EnterBootloader => f.write_str("reboot into bootloader"),
        }
    }
}

fn install_steps(profile: &DeviceProfile, companion: CompanionPolicy) -> Vec<Step> {
    use ArtifactKind::*;

    let extra = profile.has_extra();
    let companion_kind =
        (companion != CompanionPolicy::Never && profile.artifact(Companion).is_some()).then_some(Companion);

    let mut steps = vec![
        Step::Acknowledge(Ack::StartInstall),
        Step::FlashRecovery(Recovery),
        Step::BootRecovery(Recovery),
        Step::Acknowledge(Ack::RecoveryLoaded),
    ];

    for partition in [Partition::Dalvik, Partition::Data, Partition::System] {
        steps.push(Step::Settle(Wait::WipeGap));
        steps.push(Step::Wipe(partition));
    }

    if extra {
        steps.push(Step::Push(Extra));
    }
    steps.push(Step::Push(Os));
    steps.push(Step::Push(Filesystem));
    steps.extend(companion_kind.map(Step::Push));

    // The vendor extra (firmware/baseband) must land before the OS or the
    // OS install fails.
    if extra {
        steps.push(Step::Install(Extra));
    }
    steps.push(Step::Install(Os));
    match (companion_kind, companion) {
        (Some(kind), CompanionPolicy::Ask) => steps.push(Step::OfferInstall(kind)),
        (Some(kind), _) => steps.push(Step::Install(kind)),
        (None, _) => {}
    }

    steps.extend([
        Step::Settle(Wait::PostInstall),
        Step::Wipe(Partition::Cache),
        Step::Settle(Wait::WipeGap),
        Step::Wipe(Partition::Dalvik),
        Step::Reboot,
        Step::Settle(Wait::SystemBoot),
    ]);

    // The filesystem payload only installs once the new OS has booted at
    // least once, which takes a second trip through the recovery.
    steps.extend([
        Step::Acknowledge(Ack::UserModeReenabled),
        Step::EnterBootloader,
        Step::BootRecovery(Recovery),
        Step::Acknowledge(Ack::RecoveryLoaded),
        Step::Settle(Wait::RecoveryReady),
        Step::Install(Filesystem),
        Step::Settle(Wait::PostFilesystemInstall),
        Step::Reboot,
    ]);

    steps
}

fn restore_steps() -> Vec<Step> {
    use ArtifactKind::*;

    vec![
        Step::Acknowledge(Ack::StartInstall),
        Step::FlashRecovery(StockRecovery),
        Step::BootRecovery(StockRecovery),
        Step::Acknowledge(Ack::SideloadReady),
        Step::Sideload(Factory),
        Step::LeaveRecovery,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Artifact, sample};

    fn position(steps: &[Step], step: Step) -> usize {
        steps
            .iter()
            .position(|s| *s == step)
            .unwrap_or_else(|| panic!("{step} missing from plan"))
    }

    #[test]
    fn profile_without_extra_has_no_extra_steps() {
        let profile = sample("Nexus 5", "hammerhead");
        let steps = Flow::Install.steps(&profile, CompanionPolicy::Ask);

        assert!(!steps.iter().any(|s| matches!(
            s,
            Step::Push(ArtifactKind::Extra) | Step::Install(ArtifactKind::Extra)
        )));
        assert_eq!(steps[1], Step::FlashRecovery(ArtifactKind::Recovery));
    }

    #[test]
    fn extra_installs_before_os() {
        let mut profile = sample("OnePlus 5", "QC_Reference_Phone");
        profile.extra = Some(Artifact::new("fw.zip", "https://example.invalid/fw.zip"));
        let steps = Flow::Install.steps(&profile, CompanionPolicy::Always);

        let push_extra = position(&steps, Step::Push(ArtifactKind::Extra));
        let push_os = position(&steps, Step::Push(ArtifactKind::Os));
        let install_extra = position(&steps, Step::Install(ArtifactKind::Extra));
        let install_os = position(&steps, Step::Install(ArtifactKind::Os));
        let install_gapps = position(&steps, Step::Install(ArtifactKind::Companion));

        assert!(push_extra < push_os);
        assert!(push_os < install_extra);
        assert!(install_extra < install_os);
        assert!(install_os < install_gapps);
    }

    #[test]
    fn filesystem_installs_in_second_cycle() {
        let profile = sample("Nexus 5", "hammerhead");
        let steps = Flow::Install.steps(&profile, CompanionPolicy::Ask);

        let first_reboot = position(&steps, Step::Reboot);
        let bootloader = position(&steps, Step::EnterBootloader);
        let install_fs = position(&steps, Step::Install(ArtifactKind::Filesystem));
        assert!(first_reboot < bootloader);
        assert!(bootloader < install_fs);
        assert_eq!(steps.last(), Some(&Step::Reboot));
        assert!(steps.contains(&Step::OfferInstall(ArtifactKind::Companion)));
    }

    #[test]
    fn system_boot_is_awaited_before_the_second_cycle() {
        let profile = sample("Nexus 5", "hammerhead");
        let steps = Flow::Install.steps(&profile, CompanionPolicy::Ask);

        let first_reboot = position(&steps, Step::Reboot);
        assert_eq!(steps[first_reboot + 1], Step::Settle(Wait::SystemBoot));
        assert!(first_reboot + 1 < position(&steps, Step::EnterBootloader));
    }

    #[test]
    fn restore_leaves_recovery_without_requiring_adb() {
        let steps = Flow::Restore.steps(&sample("OnePlus 5", "QC_Reference_Phone"), CompanionPolicy::Ask);
        assert_eq!(steps.last(), Some(&Step::LeaveRecovery));
        assert_eq!(Step::LeaveRecovery.precondition(), None);
        assert!(!steps.contains(&Step::Reboot));
    }

    #[test]
    fn companion_policy_never_drops_bundle() {
        let profile = sample("Nexus 5", "hammerhead");
        let steps = Flow::Install.steps(&profile, CompanionPolicy::Never);
        assert!(!steps.iter().any(|s| matches!(
            s,
            Step::Push(ArtifactKind::Companion)
                | Step::Install(ArtifactKind::Companion)
                | Step::OfferInstall(ArtifactKind::Companion)
        )));
        assert!(
            !Flow::Install
                .staged_artifacts(CompanionPolicy::Never)
                .contains(&ArtifactKind::Companion)
        );
    }

    #[test]
    fn failures_are_classified_by_plane() {
        assert_eq!(Step::Push(ArtifactKind::Os).failure(), ErrorKind::UserMode);
        assert_eq!(Step::Install(ArtifactKind::Os).failure(), ErrorKind::Recovery);
        assert_eq!(
            Step::FlashRecovery(ArtifactKind::Recovery).precondition(),
            Some(Plane::Bootloader)
        );
        assert_eq!(Step::Settle(Wait::WipeGap).precondition(), None);
    }
}
