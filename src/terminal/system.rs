//! Terminal primitives backed by the process's real standard streams.

use super::{StdStream, TerminalControl};
use crate::error::TerminalError;

/// Controls the process's own stdin and stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTerminal;

#[cfg(unix)]
mod unix {
    use std::io::{self, IsTerminal};
    use std::os::fd::{AsFd, BorrowedFd};

    use nix::sys::termios::{self, SetArg, Termios};

    use super::{StdStream, SystemTerminal, TerminalControl, TerminalError};

    fn with_fd<R>(stream: StdStream, action: impl FnOnce(BorrowedFd<'_>) -> R) -> R {
        match stream {
            StdStream::Stdin => action(io::stdin().as_fd()),
            StdStream::Stdout => action(io::stdout().as_fd()),
        }
    }

    impl TerminalControl for SystemTerminal {
        type State = Termios;

        fn is_terminal(&self, stream: StdStream) -> bool {
            match stream {
                StdStream::Stdin => io::stdin().is_terminal(),
                StdStream::Stdout => io::stdout().is_terminal(),
            }
        }

        fn make_raw(&self, stream: StdStream) -> Result<Termios, TerminalError> {
            let raw_failed = |error: nix::Error| TerminalError::RawModeFailed {
                stream: stream.name(),
                message: error.to_string(),
            };
            let original = with_fd(stream, |fd| termios::tcgetattr(fd)).map_err(raw_failed)?;
            let mut raw = original.clone();
            termios::cfmakeraw(&mut raw);
            with_fd(stream, |fd| termios::tcsetattr(fd, SetArg::TCSANOW, &raw))
                .map_err(raw_failed)?;
            Ok(original)
        }

        fn restore(&self, stream: StdStream, state: &Termios) -> Result<(), TerminalError> {
            with_fd(stream, |fd| termios::tcsetattr(fd, SetArg::TCSANOW, state)).map_err(|error| {
                TerminalError::RestoreFailed {
                    stream: stream.name(),
                    message: error.to_string(),
                }
            })
        }
    }
}

#[cfg(not(unix))]
impl TerminalControl for SystemTerminal {
    type State = ();

    fn is_terminal(&self, stream: StdStream) -> bool {
        use std::io::IsTerminal;

        match stream {
            StdStream::Stdin => std::io::stdin().is_terminal(),
            StdStream::Stdout => std::io::stdout().is_terminal(),
        }
    }

    fn make_raw(&self, _stream: StdStream) -> Result<(), TerminalError> {
        Err(TerminalError::Unsupported)
    }

    fn restore(&self, _stream: StdStream, _state: &()) -> Result<(), TerminalError> {
        Ok(())
    }
}
