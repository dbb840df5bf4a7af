/// The file name of a platform tool executable.
pub fn executable_name(tool: &str) -> String {
    format!("{tool}.exe")
}

/// Whether the process should wait for the operator before exiting.
///
/// When started by double-clicking, the console window closes the moment the
/// process exits and the last message would be lost.
pub fn pause_before_exit() -> bool {
    true
}
