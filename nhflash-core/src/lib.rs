//! The core, UI-agnostic library for the `nhflash` installer.
//!
//! `nhflash-core` is designed to be used as a library by any front-end, whether it's
//! a command-line interface (like `nhflash`) or a graphical user interface. It
//! identifies the attached phone, unlocks its bootloader, downloads the firmware
//! artifacts the phone needs, and sequences the flash, wipe and install stages
//! across the phone's two control-planes (adb and fastboot).
//!
//! The library is structured into several key modules:
//! - [`registry`] and [`profile`]: the supported devices and their artifacts.
//! - [`control`]: the capability traits for the two control-planes, with
//!   tool-backed implementations in [`android`].
//! - [`fetch`] and [`staging`]: getting artifacts onto local disk.
//! - [`plan`]: the fixed stage lists.
//! - [`installer`]: the orchestrator that runs a plan against a device.
//! - [`outcome`]: how a run ended, and the exit code for each ending.
//!
//! The orchestrator talks to the operator only through a [`console::Console`],
//! so the calling application decides how prompts and progress are shown.
//!
//! ## Example: Running an Installation
//!
//! ```rust,no_run
//! use nhflash_core::android::{Adb, Fastboot};
//! use nhflash_core::config::InstallerConfig;
//! use nhflash_core::console::Console;
//! use nhflash_core::fetch::HttpFetcher;
//! use nhflash_core::installer::Installer;
//! use nhflash_core::plan::Flow;
//! use nhflash_core::registry::Registry;
//! use std::path::Path;
//! use std::sync::{Arc, atomic::AtomicBool};
//!
//! fn install(console: &mut dyn Console) -> Result<u8, Box<dyn std::error::Error>> {
//!     let registry = Registry::load(Path::new("devices.toml"))?;
//!     let adb = Adb::new("adb");
//!     let fastboot = Fastboot::new("fastboot");
//!     let fetcher = HttpFetcher::new(Arc::new(AtomicBool::new(true)))?;
//!
//!     let mut installer = Installer::new(
//!         &registry,
//!         &fastboot,
//!         &adb,
//!         &fetcher,
//!         console,
//!         InstallerConfig::default(),
//!     );
//!
//!     Ok(match installer.run(Flow::Install) {
//!         Ok(outcome) => outcome.exit_code(),
//!         Err(e) => {
//!             eprintln!("{e}");
//!             e.exit_code()
//!         }
//!     })
//! }
//! ```

pub mod android;
pub mod config;
pub mod console;
pub mod control;
pub mod fetch;
pub mod installer;
pub mod outcome;
pub mod plan;
pub mod platform;
pub mod profile;
pub mod registry;
pub mod staging;
