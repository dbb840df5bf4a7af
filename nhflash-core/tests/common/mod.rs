#![allow(dead_code)]

use nhflash_core::config::{CompanionPolicy, InstallerConfig, SettleTimes};
use nhflash_core::console::Console;
use nhflash_core::control::{
    BootloaderControl, ControlError, DeviceStatus, RebootTarget, UserModeControl,
};
use nhflash_core::fetch::{FetchError, FetchProgress, Fetcher, NoProgress};
use nhflash_core::profile::{Artifact, DeviceProfile};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Every device-facing call, in the order it was made, shared by all fakes.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn failure(command: &str) -> ControlError {
    ControlError::Command {
        command: command.to_string(),
        output: "injected failure".to_string(),
    }
}

pub fn profile(name: &str, product: &str) -> DeviceProfile {
    let slug = name.to_lowercase().replace(' ', "");
    let url = |file: &str| format!("https://dl.example.invalid/{slug}/{file}");
    DeviceProfile {
        name: name.to_string(),
        product: product.to_string(),
        os: Artifact::new(format!("{slug}-os.zip"), url("os.zip")),
        filesystem: Artifact::new("kalifs-full.zip", url("kalifs-full.zip")),
        recovery: Artifact::new(format!("{slug}-twrp.img"), url("twrp.img")),
        companion: Some(Artifact::new("gapps.zip", url("gapps.zip"))),
        extra: None,
        factory: None,
        stock_recovery: None,
    }
}

pub fn config(workdir: &Path) -> InstallerConfig {
    InstallerConfig {
        workdir: workdir.to_path_buf(),
        remote_dir: "/sdcard".to_string(),
        settle: SettleTimes::none(),
        companion: CompanionPolicy::Ask,
        acknowledge_transitions: true,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct FakeBootloader {
    log: CallLog,
    /// Statuses returned in order; once exhausted, `status` is returned.
    pub scripted: RefCell<VecDeque<Result<DeviceStatus, ControlError>>>,
    pub status: DeviceStatus,
    pub product: String,
    pub unlocked: Option<bool>,
    /// Any call whose log entry starts with this fails.
    pub fail_on: Option<String>,
    pub status_calls: Cell<usize>,
}

impl FakeBootloader {
    pub fn new(log: &CallLog, product: &str) -> Self {
        Self {
            log: log.clone(),
            scripted: RefCell::new(VecDeque::new()),
            status: DeviceStatus::Ready,
            product: product.to_string(),
            unlocked: Some(true),
            fail_on: None,
            status_calls: Cell::new(0),
        }
    }

    pub fn script(&self, statuses: impl IntoIterator<Item = DeviceStatus>) {
        self.scripted.borrow_mut().extend(statuses.into_iter().map(Ok));
    }

    fn call(&self, entry: String) -> Result<(), ControlError> {
        let fails = self.fail_on.as_ref().is_some_and(|f| entry.starts_with(f));
        self.log.borrow_mut().push(entry.clone());
        if fails { Err(failure(&entry)) } else { Ok(()) }
    }
}

impl BootloaderControl for FakeBootloader {
    fn status(&self) -> Result<DeviceStatus, ControlError> {
        self.status_calls.set(self.status_calls.get() + 1);
        match self.scripted.borrow_mut().pop_front() {
            Some(next) => next,
            None => Ok(self.status),
        }
    }

    fn product_identifier(&self) -> Result<String, ControlError> {
        self.call("fastboot getvar product".into())?;
        Ok(self.product.clone())
    }

    fn unlocked(&self) -> Result<bool, ControlError> {
        self.call("fastboot getvar unlocked".into())?;
        self.unlocked
            .ok_or_else(|| failure("fastboot getvar unlocked"))
    }

    fn unlock(&self) -> Result<(), ControlError> {
        self.call("fastboot oem unlock".into())
    }

    fn flash_recovery(&self, image: &Path) -> Result<(), ControlError> {
        self.call(format!("fastboot flash recovery {}", file_name(image)))
    }

    fn boot_image(&self, image: &Path) -> Result<(), ControlError> {
        self.call(format!("fastboot boot {}", file_name(image)))
    }

    fn reboot(&self) -> Result<(), ControlError> {
        self.call("fastboot reboot".into())
    }
}

pub struct FakeUserMode {
    log: CallLog,
    pub scripted: RefCell<VecDeque<Result<DeviceStatus, ControlError>>>,
    pub status: DeviceStatus,
    pub fail_on: Option<String>,
    /// How long adb stays silent after a reboot into the system.
    pub boot_time: Duration,
    booting_until: Cell<Option<Instant>>,
}

impl FakeUserMode {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            scripted: RefCell::new(VecDeque::new()),
            status: DeviceStatus::Ready,
            fail_on: None,
            boot_time: Duration::ZERO,
            booting_until: Cell::new(None),
        }
    }

    pub fn script(&self, statuses: impl IntoIterator<Item = DeviceStatus>) {
        self.scripted.borrow_mut().extend(statuses.into_iter().map(Ok));
    }

    fn call(&self, entry: String) -> Result<(), ControlError> {
        let fails = self.fail_on.as_ref().is_some_and(|f| entry.starts_with(f));
        self.log.borrow_mut().push(entry.clone());
        if fails { Err(failure(&entry)) } else { Ok(()) }
    }
}

impl UserModeControl for FakeUserMode {
    fn status(&self) -> Result<DeviceStatus, ControlError> {
        if self.booting_until.get().is_some_and(|until| Instant::now() < until) {
            return Ok(DeviceStatus::NoDeviceFound);
        }
        match self.scripted.borrow_mut().pop_front() {
            Some(next) => next,
            None => Ok(self.status),
        }
    }

    fn run_shell_command(&self, command: &str) -> Result<(), ControlError> {
        self.call(format!("adb shell {command}"))
    }

    fn push_file(&self, local: &Path, remote_dir: &str) -> Result<(), ControlError> {
        self.call(format!("adb push {} {remote_dir}", file_name(local)))
    }

    fn reboot(&self, target: RebootTarget) -> Result<(), ControlError> {
        match target.as_arg() {
            Some(arg) => self.call(format!("adb reboot {arg}")),
            None => {
                self.call("adb reboot".into())?;
                self.booting_until.set(Some(Instant::now() + self.boot_time));
                Ok(())
            }
        }
    }

    fn sideload_package(&self, package: &Path) -> Result<(), ControlError> {
        self.call(format!("adb sideload {}", file_name(package)))
    }
}

/// Writes a small file for every URL instead of downloading it.
pub struct FakeFetcher {
    pub fetched: RefCell<Vec<String>>,
    pub fail_on: Option<String>,
    /// Report success without writing anything.
    pub write_nothing: bool,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            fetched: RefCell::new(Vec::new()),
            fail_on: None,
            write_nothing: false,
        }
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        _sha256: Option<&str>,
        progress: &mut dyn FetchProgress,
    ) -> Result<(), FetchError> {
        self.fetched.borrow_mut().push(url.to_string());
        if self.fail_on.as_deref().is_some_and(|f| url.ends_with(f)) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        progress.start(Some(7));
        if !self.write_nothing {
            std::fs::write(destination, b"payload").map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
        }
        progress.advance(7);
        Ok(())
    }
}

/// Answers prompts from a script and records everything it is told.
#[derive(Default)]
pub struct ScriptedConsole {
    pub confirms: VecDeque<bool>,
    pub choices: VecDeque<usize>,
    pub said: Vec<String>,
    pub asked: Vec<String>,
    pub offered: Vec<Vec<String>>,
    pub acknowledged: Vec<String>,
}

impl ScriptedConsole {
    pub fn answering(confirms: impl IntoIterator<Item = bool>) -> Self {
        Self {
            confirms: confirms.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn said_containing(&self, needle: &str) -> bool {
        self.said.iter().any(|m| m.contains(needle))
    }
}

fn exhausted(prompt: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("no scripted answer for '{prompt}'"))
}

impl Console for ScriptedConsole {
    fn say(&mut self, message: &str) {
        self.said.push(message.to_string());
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        self.asked.push(prompt.to_string());
        self.confirms.pop_front().ok_or_else(|| exhausted(prompt))
    }

    fn choose(&mut self, prompt: &str, options: &[String]) -> io::Result<usize> {
        self.asked.push(prompt.to_string());
        self.offered.push(options.to_vec());
        self.choices.pop_front().ok_or_else(|| exhausted(prompt))
    }

    fn acknowledge(&mut self, prompt: &str) -> io::Result<()> {
        self.acknowledged.push(prompt.to_string());
        Ok(())
    }

    fn transfer(&mut self, _label: &str) -> Box<dyn FetchProgress + '_> {
        Box::new(NoProgress)
    }
}
