//! Scripted engine and terminal doubles served over a real socket.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use corral::engine::{AttachIo, ContainerInfo, ContainerState, EngineFuture, LifecycleManager};
use corral::error::{EngineError, TerminalError};
use corral::terminal::{StdStream, TerminalControl};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;

/// Container that prints a fixed output once running and attached, then
/// exits with a fixed code.
pub(crate) struct ScriptedManager {
    info: Mutex<ContainerInfo>,
    stdin_received: Mutex<Vec<u8>>,
    running: watch::Sender<bool>,
    output: Vec<u8>,
    exit_code: i64,
}

impl ScriptedManager {
    pub(crate) fn new(
        id: &str,
        state: ContainerState,
        output: &str,
        exit_code: i64,
        open_stdin: bool,
    ) -> Self {
        Self {
            info: Mutex::new(ContainerInfo {
                id: String::from(id),
                state,
                tty: false,
                open_stdin,
                exit_code: None,
            }),
            stdin_received: Mutex::new(Vec::new()),
            running: watch::Sender::new(state == ContainerState::Running),
            output: output.as_bytes().to_vec(),
            exit_code,
        }
    }

    pub(crate) fn stdin_received(&self) -> String {
        String::from_utf8_lossy(&lock(&self.stdin_received)).into_owned()
    }

    fn set_state(&self, state: ContainerState, exit_code: Option<i64>) {
        let mut info = lock(&self.info);
        info.state = state;
        info.exit_code = exit_code;
    }

    async fn run_attached(&self, io: AttachIo<'_>) -> std::io::Result<()> {
        let mut running = self.running.subscribe();
        if running.wait_for(|is_running| *is_running).await.is_err() {
            return Ok(());
        }
        io.output.write_all(&self.output).await?;
        if let Some(stdin) = io.stdin {
            let mut received = Vec::new();
            stdin.read_to_end(&mut received).await?;
            io.output.write_all(&received).await?;
            *lock(&self.stdin_received) = received;
        }
        io.output.flush().await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LifecycleManager for ScriptedManager {
    fn inspect(&self, _container_id: &str) -> EngineFuture<'_, ContainerInfo> {
        Box::pin(async move { Ok(lock(&self.info).clone()) })
    }

    fn start(&self, _container_id: &str) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            self.set_state(ContainerState::Running, None);
            self.running.send_replace(true);
            Ok(())
        })
    }

    fn stop(&self, _container_id: &str, _timeout: Duration) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            self.set_state(ContainerState::Stopped, Some(137));
            self.running.send_replace(false);
            Ok(())
        })
    }

    fn attach<'a>(&'a self, container_id: &'a str, io: AttachIo<'a>) -> EngineFuture<'a, ()> {
        Box::pin(async move {
            self.run_attached(io)
                .await
                .map_err(|error| EngineError::AttachFailed {
                    container_id: container_id.to_owned(),
                    message: error.to_string(),
                })?;
            self.set_state(ContainerState::Stopped, Some(self.exit_code));
            self.running.send_replace(false);
            Ok(())
        })
    }
}

/// Terminal control for a session whose streams are pipes.
pub(crate) struct Piped;

impl TerminalControl for Piped {
    type State = ();

    fn is_terminal(&self, _stream: StdStream) -> bool {
        false
    }

    fn make_raw(&self, _stream: StdStream) -> Result<(), TerminalError> {
        Ok(())
    }

    fn restore(&self, _stream: StdStream, _state: &()) -> Result<(), TerminalError> {
        Ok(())
    }
}
