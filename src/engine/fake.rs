//! In-memory engine used by unit tests across the crate.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{
    AttachIo, ContainerInfo, ContainerState, EngineClient, EngineFuture, LifecycleManager,
};
use crate::error::EngineError;
use crate::server::{AttachService, DEFAULT_DRAIN_TIMEOUT};
use crate::stream::{ClientChannel, channel_pair};

struct FakeState {
    info: ContainerInfo,
    starts: usize,
    stops: usize,
    stdin_received: Vec<u8>,
}

/// Lifecycle manager whose container writes a fixed output once it is
/// running and attached, and exits once that output has been written.
pub(crate) struct FakeManager {
    state: Mutex<FakeState>,
    running: watch::Sender<bool>,
    output: Vec<u8>,
    echo_stdin: bool,
    start_failure: Option<String>,
    exit_code: i64,
}

impl FakeManager {
    pub(crate) fn new(id: &str, state: ContainerState) -> Self {
        Self {
            state: Mutex::new(FakeState {
                info: ContainerInfo {
                    id: String::from(id),
                    state,
                    tty: false,
                    open_stdin: false,
                    exit_code: None,
                },
                starts: 0,
                stops: 0,
                stdin_received: Vec::new(),
            }),
            running: watch::Sender::new(state == ContainerState::Running),
            output: Vec::new(),
            echo_stdin: false,
            start_failure: None,
            exit_code: 0,
        }
    }

    pub(crate) fn with_output(mut self, output: &[u8]) -> Self {
        self.output = output.to_vec();
        self
    }

    /// Keep stdin open and copy everything read from it to the output
    /// after the fixed output.
    pub(crate) fn echoing_stdin(mut self) -> Self {
        self.echo_stdin = true;
        self.lock().info.open_stdin = true;
        self
    }

    pub(crate) fn with_tty(self) -> Self {
        self.lock().info.tty = true;
        self
    }

    pub(crate) fn failing_start(mut self, message: &str) -> Self {
        self.start_failure = Some(String::from(message));
        self
    }

    pub(crate) const fn exiting_with(mut self, code: i64) -> Self {
        self.exit_code = code;
        self
    }

    pub(crate) fn starts(&self) -> usize {
        self.lock().starts
    }

    pub(crate) fn stops(&self) -> usize {
        self.lock().stops
    }

    pub(crate) fn stdin_received(&self) -> Vec<u8> {
        self.lock().stdin_received.clone()
    }

    pub(crate) fn current(&self) -> ContainerInfo {
        self.lock().info.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake manager lock poisoned")
    }

    async fn run_attached(&self, mut io: AttachIo<'_>) -> std::io::Result<()> {
        let mut running = self.running.subscribe();
        if running.wait_for(|is_running| *is_running).await.is_err() {
            return Ok(());
        }
        io.output.write_all(&self.output).await?;
        if self.echo_stdin
            && let Some(stdin) = io.stdin
        {
            let mut received = Vec::new();
            stdin.read_to_end(&mut received).await?;
            io.output.write_all(&received).await?;
            self.lock().stdin_received = received;
        }
        io.output.flush().await
    }
}

impl LifecycleManager for FakeManager {
    fn inspect(&self, _container_id: &str) -> EngineFuture<'_, ContainerInfo> {
        Box::pin(async move { Ok(self.current()) })
    }

    fn start(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let id = container_id.to_owned();
        Box::pin(async move {
            if let Some(message) = &self.start_failure {
                return Err(EngineError::StartFailed {
                    container_id: id,
                    message: message.clone(),
                });
            }
            {
                let mut state = self.lock();
                state.starts += 1;
                state.info.state = ContainerState::Running;
                state.info.exit_code = None;
            }
            self.running.send_replace(true);
            Ok(())
        })
    }

    fn stop(&self, _container_id: &str, _timeout: Duration) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            {
                let mut state = self.lock();
                state.stops += 1;
                state.info.state = ContainerState::Stopped;
                state.info.exit_code = Some(137);
            }
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
            {
                let mut state = self.lock();
                state.info.state = ContainerState::Stopped;
                state.info.exit_code = Some(self.exit_code);
            }
            self.running.send_replace(false);
            Ok(())
        })
    }
}

/// Engine client wired straight to an [`AttachService`] over in-process
/// channels.
pub(crate) struct FakeEngine {
    service: Arc<AttachService<FakeManager>>,
}

impl FakeEngine {
    pub(crate) fn new(manager: FakeManager) -> Self {
        Self {
            service: Arc::new(AttachService::new(Arc::new(manager), DEFAULT_DRAIN_TIMEOUT)),
        }
    }

    pub(crate) fn manager(&self) -> &FakeManager {
        self.service.manager()
    }
}

impl EngineClient for FakeEngine {
    type Endpoint = ClientChannel;

    fn inspect(&self, container_id: &str) -> EngineFuture<'_, ContainerInfo> {
        self.manager().inspect(container_id)
    }

    fn start(&self, container_id: &str) -> EngineFuture<'_, ()> {
        self.manager().start(container_id)
    }

    fn stop(&self, container_id: &str, timeout: Duration) -> EngineFuture<'_, ()> {
        self.manager().stop(container_id, timeout)
    }

    fn open_attach(&self, _container_id: &str) -> EngineFuture<'_, ClientChannel> {
        let service = Arc::clone(&self.service);
        Box::pin(async move {
            let (client, server) = channel_pair(8);
            tokio::spawn(async move {
                service
                    .serve_attach(server, CancellationToken::new())
                    .await
                    .expect("fake attach stream served");
            });
            Ok(client)
        })
    }
}
