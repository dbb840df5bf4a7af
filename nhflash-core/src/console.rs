//! The installer's view of the person running it.
//!
//! The orchestrator never touches stdin or stdout directly. Everything it
//! says, and every question it asks, goes through a [`Console`], so a
//! terminal front-end and a scripted test double drive the same logic.
use crate::fetch::FetchProgress;
use std::io;

pub trait Console {
    /// Prints one line of progress text.
    fn say(&mut self, message: &str);

    /// Prints a warning that does not stop the run.
    fn warn(&mut self, message: &str) {
        self.say(&format!("Warning: {message}"));
    }

    /// Asks a yes/no question.
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;

    /// Asks the operator to pick one of `options`; returns its index.
    fn choose(&mut self, prompt: &str, options: &[String]) -> io::Result<usize>;

    /// Blocks until the operator says they are ready to continue.
    fn acknowledge(&mut self, prompt: &str) -> io::Result<()>;

    /// A progress sink for downloading the artifact called `label`.
    fn transfer(&mut self, label: &str) -> Box<dyn FetchProgress + '_>;
}
