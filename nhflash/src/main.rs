mod terminal;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use nhflash_core::android::{Adb, Fastboot};
use nhflash_core::config::{CompanionPolicy, InstallerConfig, SettleTimes};
use nhflash_core::fetch::HttpFetcher;
use nhflash_core::installer::Installer;
use nhflash_core::outcome::{ErrorKind, InstallError};
use nhflash_core::plan::Flow;
use nhflash_core::platform;
use nhflash_core::profile::ArtifactKind;
use nhflash_core::registry::Registry;
use std::io::{IsTerminal, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use terminal::TerminalConsole;

#[cfg(unix)]
use libc::ECHOCTL;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use termios::{TCSANOW, Termios, tcsetattr};

/// Exit code used when Ctrl-C interrupts anything other than a download.
const INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "nhflash")]
#[command(about = "An interactive Kali NetHunter installer for supported phones", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Device profile registry (defaults to devices.toml in the working directory)
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    /// Directory holding the artifacts and bundled platform tools
    /// (defaults to the directory of this executable)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    /// Whether to install the companion app bundle: ask, always or never
    #[arg(long, global = true, default_value = "ask")]
    companion: CompanionPolicy,

    /// Don't wait for confirmation after the device changes mode
    #[arg(long = "no-acknowledge", global = true)]
    no_acknowledge: bool,

    /// Multiply every settle wait by this factor
    #[arg(long, global = true, default_value_t = 1.0)]
    settle_scale: f64,

    /// Log level used when NHFLASH_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<tracing::Level>,
}

#[derive(Clone, Copy, Subcommand)]
enum Commands {
    /// Install NetHunter onto the attached device (the default)
    Install,
    /// Restore the vendor factory image through the stock recovery
    Restore,
    /// List the devices in the profile registry
    Devices,
}

/// The terminal settings to put back on exit.
#[derive(Clone, Copy)]
struct TermState {
    #[cfg(unix)]
    original_termios: Option<Termios>,
}

impl TermState {
    /// Restores the saved terminal settings and shows the cursor again,
    /// which a dialoguer prompt hides while it is open.
    fn restore(&self) {
        #[cfg(unix)]
        if let Some(ref original_termios) = self.original_termios {
            let fd = stdout().as_raw_fd();
            tcsetattr(fd, TCSANOW, original_termios).ok();
        }
        console::Term::stdout().show_cursor().ok();
        console::Term::stderr().show_cursor().ok();
    }
}

/// A helper struct that, on Unix, disables `ECHOCTL` for the terminal.
///
/// `ECHOCTL` is the terminal flag that causes Ctrl+C to be printed as `^C`.
/// With it off, the Ctrl-C handler's own message is all the operator sees.
/// The original terminal state is restored when this struct is dropped.
struct TermRestorer {
    state: TermState,
}

impl TermRestorer {
    fn new() -> Self {
        #[cfg(unix)]
        {
            if !stdout().is_terminal() {
                return Self {
                    state: TermState {
                        original_termios: None,
                    },
                };
            }

            let fd = stdout().as_raw_fd();
            let original_termios = Termios::from_fd(fd).ok().filter(|original| {
                let mut quiet = *original;
                quiet.c_lflag &= !ECHOCTL;
                tcsetattr(fd, TCSANOW, &quiet).is_ok()
            });
            Self {
                state: TermState { original_termios },
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                state: TermState {},
            }
        }
    }

    /// A copy of the saved state, for paths that exit without unwinding.
    fn state(&self) -> TermState {
        self.state
    }
}

impl Drop for TermRestorer {
    fn drop(&mut self) {
        self.state.restore();
    }
}

fn init_tracing(level: Option<tracing::Level>) {
    match tracing_subscriber::EnvFilter::builder()
        .with_env_var("NHFLASH_LOG")
        .try_from_env()
    {
        Ok(filter) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_max_level(level.unwrap_or(tracing::Level::WARN))
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn default_workdir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Prints a classified failure and returns its exit code.
fn report(error: &InstallError) -> u8 {
    println!(
        "\n{} {error}",
        style(format!("ERROR ({}):", error.kind())).red().bold()
    );
    error.exit_code()
}

fn list_devices(registry: &Registry) {
    let profiles = registry.profiles();
    println!("{} supported devices:", profiles.len());
    println!("\n  {:<24} {:<22} {}", "NAME", "PRODUCT", "WORKFLOWS");
    println!("  {:-<24} {:-<22} {:-<16}", "", "", "");
    for profile in profiles {
        let restorable = profile.artifact(ArtifactKind::Factory).is_some()
            && profile.artifact(ArtifactKind::StockRecovery).is_some();
        let workflows = if restorable { "install, restore" } else { "install" };
        println!("  {:<24} {:<22} {}", profile.name, profile.product, workflows);
    }
}

fn print_banner(registry: &Registry) {
    println!(
        "{}",
        style(format!("NetHunter installer {}", env!("CARGO_PKG_VERSION"))).bold()
    );
    println!("Supported devices:");
    for profile in registry.profiles() {
        println!("  - {}", style(&profile.name).cyan());
    }
    println!();
}

fn run(cli: Cli, term: TermState) -> Result<u8> {
    let workdir = cli.workdir.unwrap_or_else(default_workdir);
    let profiles = cli
        .profiles
        .unwrap_or_else(|| workdir.join("devices.toml"));

    let registry = match Registry::load(&profiles) {
        Ok(registry) => registry,
        Err(e) => return Ok(report(&InstallError::from(e))),
    };

    let flow = match cli.command.unwrap_or(Commands::Install) {
        Commands::Devices => {
            list_devices(&registry);
            return Ok(0);
        }
        Commands::Install => Flow::Install,
        Commands::Restore => Flow::Restore,
    };

    // `running` is cleared on Ctrl-C so an ongoing download can stop and
    // clean up; outside a download the process exits immediately.
    let running = Arc::new(AtomicBool::new(true));
    let in_transfer = Arc::new(AtomicBool::new(false));
    let r = running.clone();
    let t = in_transfer.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        if !t.load(Ordering::SeqCst) {
            // `process::exit` skips destructors, so put the terminal back
            // by hand first.
            term.restore();
            println!("\nInterrupted.");
            std::process::exit(INTERRUPTED);
        }
    })?;

    print_banner(&registry);

    let adb = Adb::new(platform::find_tool(&workdir, "adb"));
    let fastboot = Fastboot::new(platform::find_tool(&workdir, "fastboot"));
    let fetcher = HttpFetcher::new(running)?;
    let mut console = TerminalConsole::new(in_transfer);

    let config = InstallerConfig {
        workdir,
        settle: SettleTimes::default().scaled(cli.settle_scale),
        companion: cli.companion,
        acknowledge_transitions: !cli.no_acknowledge,
        ..InstallerConfig::default()
    };
    tracing::debug!("running {flow:?} with {config:?}");

    let mut installer = Installer::new(&registry, &fastboot, &adb, &fetcher, &mut console, config);
    Ok(match installer.run(flow) {
        Ok(outcome) => {
            tracing::info!("run ended with {outcome:?}");
            outcome.exit_code()
        }
        Err(e) => report(&e),
    })
}

fn main() -> ExitCode {
    // This guard will be dropped when main() exits, restoring the terminal.
    let term_restorer = TermRestorer::new();

    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let code = match run(cli, term_restorer.state()) {
        Ok(code) => code,
        Err(e) => {
            println!("{} {e:#}", style("ERROR:").red().bold());
            ErrorKind::Prerequisites.exit_code()
        }
    };

    if platform::pause_before_exit() {
        println!("\nPress enter to exit.");
        terminal::wait_for_enter().ok();
    }

    ExitCode::from(code)
}
