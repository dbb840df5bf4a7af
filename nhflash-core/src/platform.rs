//! Provides platform-specific functionality.
//!
//! The installer shells out to the Android platform tools, whose executable
//! names differ between operating systems, and on Windows it is usually
//! launched by double-clicking, which closes the console window as soon as
//! the process exits.
//!
//! It uses conditional compilation (`#[cfg]`) to expose the correct implementation
//! for the target OS. Each submodule exposes the same public API, so that the
//! rest of the library can use it without worrying about the underlying platform.

use std::path::{Path, PathBuf};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::*;

/// Locates a platform tool, preferring a copy bundled in `dir`.
///
/// Falls back to the bare executable name so that the normal `PATH` lookup
/// applies when nothing is bundled.
pub fn find_tool(dir: &Path, name: &str) -> PathBuf {
    let file_name = executable_name(name);
    let bundled = dir.join(&file_name);
    if bundled.is_file() {
        bundled
    } else {
        PathBuf::from(file_name)
    }
}
