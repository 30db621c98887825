//! Local terminal detection and raw-mode control.
//!
//! Raw mode is process-wide state. [`TerminalManager`] never holds it
//! implicitly: [`TerminalManager::set_raw_mode`] hands the saved modes back
//! to the caller, and [`RawModeGuard`] owns them for the lifetime of an
//! attach session so they are restored exactly once on every exit path.

mod system;

use tracing::{debug, warn};

pub use system::SystemTerminal;

use crate::error::TerminalError;

/// A standard stream of the local process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    /// Standard input.
    Stdin,
    /// Standard output.
    Stdout,
}

impl StdStream {
    /// Return the stream's name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
        }
    }
}

/// Terminal primitives for the local standard streams.
pub trait TerminalControl {
    /// Opaque saved mode returned by [`TerminalControl::make_raw`].
    type State: Send + 'static;

    /// Return whether `stream` is an interactive terminal.
    fn is_terminal(&self, stream: StdStream) -> bool;

    /// Switch `stream` to raw mode, returning its previous mode.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::RawModeFailed`] if the mode cannot be read or
    /// changed.
    fn make_raw(&self, stream: StdStream) -> Result<Self::State, TerminalError>;

    /// Put `stream` back into `state`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::RestoreFailed`] if the mode cannot be applied.
    fn restore(&self, stream: StdStream, state: &Self::State) -> Result<(), TerminalError>;
}

/// Modes saved by [`TerminalManager::set_raw_mode`].
#[derive(Debug)]
pub struct SavedModes<S> {
    stdin: Option<S>,
    stdout: Option<S>,
}

impl<S> Default for SavedModes<S> {
    fn default() -> Self {
        Self {
            stdin: None,
            stdout: None,
        }
    }
}

impl<S> SavedModes<S> {
    /// Return the saved stdin mode, if stdin was switched.
    #[must_use]
    pub const fn stdin(&self) -> Option<&S> {
        self.stdin.as_ref()
    }

    /// Return the saved stdout mode, if stdout was switched.
    #[must_use]
    pub const fn stdout(&self) -> Option<&S> {
        self.stdout.as_ref()
    }

    /// Return whether nothing was switched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stdin.is_none() && self.stdout.is_none()
    }
}

/// Checks and switches the local terminal for an attach session.
#[derive(Debug, Default)]
pub struct TerminalManager<T> {
    control: T,
}

impl<T: TerminalControl> TerminalManager<T> {
    /// Create a manager over `control`.
    #[must_use]
    pub const fn new(control: T) -> Self {
        Self { control }
    }

    /// Return whether `stream` is an interactive terminal.
    #[must_use]
    pub fn is_terminal(&self, stream: StdStream) -> bool {
        self.control.is_terminal(stream)
    }

    /// Check that local stdin can feed a container expecting a terminal.
    ///
    /// Must run before any mode change.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotATerminal`] when `container_tty` and
    /// `attach_stdin` are both set and local stdin is not a terminal.
    pub fn check_tty(&self, attach_stdin: bool, container_tty: bool) -> Result<(), TerminalError> {
        if container_tty && attach_stdin && !self.control.is_terminal(StdStream::Stdin) {
            return Err(TerminalError::NotATerminal);
        }
        Ok(())
    }

    /// Switch the requested streams to raw mode.
    ///
    /// The saved modes are returned alongside the outcome: when stdin is
    /// switched and stdout then fails, the stdin mode is still returned so
    /// the caller can restore it.
    #[must_use]
    pub fn set_raw_mode(
        &self,
        stdin: bool,
        stdout: bool,
    ) -> (SavedModes<T::State>, Result<(), TerminalError>) {
        let mut saved = SavedModes::default();
        if stdin {
            match self.control.make_raw(StdStream::Stdin) {
                Ok(state) => saved.stdin = Some(state),
                Err(error) => return (saved, Err(error)),
            }
        }
        if stdout {
            match self.control.make_raw(StdStream::Stdout) {
                Ok(state) => saved.stdout = Some(state),
                Err(error) => return (saved, Err(error)),
            }
        }
        (saved, Ok(()))
    }

    /// Restore whichever modes were saved. Absent modes are skipped.
    ///
    /// Both streams are attempted even if the first restore fails.
    ///
    /// # Errors
    ///
    /// Returns the first restore failure.
    pub fn restore_mode(&self, saved: SavedModes<T::State>) -> Result<(), TerminalError> {
        let stdin_result = saved.stdin.map_or(Ok(()), |state| {
            self.control.restore(StdStream::Stdin, &state)
        });
        let stdout_result = saved.stdout.map_or(Ok(()), |state| {
            self.control.restore(StdStream::Stdout, &state)
        });
        stdin_result.and(stdout_result)
    }

    /// Switch the requested streams to raw mode under a guard.
    ///
    /// # Errors
    ///
    /// Returns the switching failure after restoring any stream that was
    /// already switched.
    pub fn enter_raw_mode(
        &self,
        stdin: bool,
        stdout: bool,
    ) -> Result<RawModeGuard<'_, T>, TerminalError> {
        let (saved, outcome) = self.set_raw_mode(stdin, stdout);
        let guard = RawModeGuard {
            manager: self,
            saved: Some(saved),
        };
        outcome.map(|()| {
            debug!(stdin, stdout, "local terminal switched to raw mode");
            guard
        })
    }
}

/// Owns saved terminal modes and restores them exactly once.
///
/// Call [`RawModeGuard::restore`] to observe the outcome; dropping the guard
/// restores on a best-effort basis and logs failures.
pub struct RawModeGuard<'a, T: TerminalControl> {
    manager: &'a TerminalManager<T>,
    saved: Option<SavedModes<T::State>>,
}

impl<T: TerminalControl> RawModeGuard<'_, T> {
    /// Restore the saved modes now.
    ///
    /// # Errors
    ///
    /// Returns the first restore failure.
    pub fn restore(mut self) -> Result<(), TerminalError> {
        self.saved
            .take()
            .map_or(Ok(()), |saved| self.manager.restore_mode(saved))
    }
}

impl<T: TerminalControl> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take()
            && let Err(error) = self.manager.restore_mode(saved)
        {
            warn!(%error, "failed to restore local terminal mode");
        }
    }
}
