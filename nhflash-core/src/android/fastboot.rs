use super::{parse_device_listing, run_checked};
use crate::control::{BootloaderControl, ControlError, DeviceStatus};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The bootloader control-plane, driven through the `fastboot` executable.
#[derive(Clone, Debug)]
pub struct Fastboot {
    program: PathBuf,
}

impl Fastboot {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn getvar(&self, name: &str) -> Result<String, ControlError> {
        let output = run_checked(&self.program, ["getvar", name])?;
        parse_getvar(&output, name).ok_or_else(|| ControlError::Unparseable {
            command: format!("fastboot getvar {name}"),
            output: output.trim().to_string(),
        })
    }
}

impl BootloaderControl for Fastboot {
    fn status(&self) -> Result<DeviceStatus, ControlError> {
        let listing = run_checked(&self.program, ["devices"])?;
        Ok(parse_device_listing(&listing, &["fastboot"]))
    }

    fn product_identifier(&self) -> Result<String, ControlError> {
        self.getvar("product")
    }

    fn unlocked(&self) -> Result<bool, ControlError> {
        let value = self.getvar("unlocked")?;
        match value.as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            _ => Err(ControlError::Unparseable {
                command: "fastboot getvar unlocked".into(),
                output: value,
            }),
        }
    }

    fn unlock(&self) -> Result<(), ControlError> {
        run_checked(&self.program, ["oem", "unlock"]).map(drop)
    }

    fn flash_recovery(&self, image: &Path) -> Result<(), ControlError> {
        let args: [OsString; 3] = ["flash".into(), "recovery".into(), image.into()];
        run_checked(&self.program, args).map(drop)
    }

    fn boot_image(&self, image: &Path) -> Result<(), ControlError> {
        let args: [OsString; 2] = ["boot".into(), image.into()];
        run_checked(&self.program, args).map(drop)
    }

    fn reboot(&self) -> Result<(), ControlError> {
        run_checked(&self.program, ["reboot"]).map(drop)
    }
}

/// Extracts `value` from the `name: value` line of `fastboot getvar` output.
fn parse_getvar(output: &str, name: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim() == name && !value.is_empty()).then(|| value.to_string())
    })
}
