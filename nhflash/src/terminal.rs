//! The interactive terminal implementation of the installer's [`Console`].
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use nhflash_core::console::Console;
use nhflash_core::fetch::FetchProgress;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct TerminalConsole {
    theme: ColorfulTheme,
    /// Set while a download bar is on screen, so Ctrl-C cancels the download
    /// instead of killing the process.
    in_transfer: Arc<AtomicBool>,
}

impl TerminalConsole {
    pub fn new(in_transfer: Arc<AtomicBool>) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            in_transfer,
        }
    }
}

fn prompt_error(e: dialoguer::Error) -> io::Error {
    io::Error::other(e)
}

/// Blocks until a line is read from stdin. End of input is an error, so a
/// closed stdin never counts as the operator saying yes.
pub fn wait_for_enter() -> io::Result<()> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stdin closed while waiting for the operator",
        ));
    }
    Ok(())
}

impl Console for TerminalConsole {
    fn say(&mut self, message: &str) {
        println!("{message}");
    }

    fn warn(&mut self, message: &str) {
        println!("{} {message}", style("WARNING:").yellow().bold());
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(prompt_error)
    }

    fn choose(&mut self, prompt: &str, options: &[String]) -> io::Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()
            .map_err(prompt_error)
    }

    fn acknowledge(&mut self, prompt: &str) -> io::Result<()> {
        print!("{} {} ", style("?").yellow().bold(), style(prompt).bold());
        io::stdout().flush()?;
        wait_for_enter()
    }

    fn transfer(&mut self, label: &str) -> Box<dyn FetchProgress + '_> {
        Box::new(TransferBar::new(label, self.in_transfer.clone()))
    }
}

/// A download progress bar that lives for exactly one transfer.
struct TransferBar {
    bar: ProgressBar,
    in_transfer: Arc<AtomicBool>,
}

impl TransferBar {
    fn new(label: &str, in_transfer: Arc<AtomicBool>) -> Self {
        in_transfer.store(true, Ordering::SeqCst);
        let bar = ProgressBar::new(0);
        bar.set_prefix(label.to_string());
        Self { bar, in_transfer }
    }
}

impl FetchProgress for TransferBar {
    fn start(&mut self, total: Option<u64>) {
        match total {
            Some(len) => {
                self.bar.set_length(len);
                self.bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{prefix:24} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                        )
                        .unwrap()
                        .progress_chars("■ "),
                );
            }
            // No Content-Length; show a counter instead of a bar.
            None => {
                self.bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{prefix:24} [{elapsed_precise}] {spinner} {bytes} ({bytes_per_sec})")
                        .unwrap(),
                );
            }
        }
    }

    fn advance(&mut self, received: u64) {
        self.bar.set_position(received);
    }
}

impl Drop for TransferBar {
    fn drop(&mut self) {
        self.bar.finish();
        self.in_transfer.store(false, Ordering::SeqCst);
    }
}
