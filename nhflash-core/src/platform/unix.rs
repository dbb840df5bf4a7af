/// The file name of a platform tool executable.
pub fn executable_name(tool: &str) -> String {
    tool.to_string()
}

/// Whether the process should wait for the operator before exiting.
///
/// Unix terminals outlive the installer, so the final message stays visible.
pub fn pause_before_exit() -> bool {
    false
}
