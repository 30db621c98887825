//! Given/When steps for attach stream scenarios.

use std::sync::Arc;
use std::time::Duration;

use corral::api::{self, CommandContext, CommandOutcome, LocalStreams, StartMode};
use corral::config::AppConfig;
use corral::engine::{ContainerState, EngineConnector};
use corral::rpc::{SocketEngineClient, serve};
use corral::server::AttachService;
use corral::terminal::TerminalManager;
use rstest_bdd_macros::{given, when};
use tokio::io::AsyncReadExt;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

use super::engine::{Piped, ScriptedManager};
use super::state::{AttachStreamState, CommandResult};

pub type StepResult<T> = Result<T, String>;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which command a scenario runs against the engine.
#[derive(Clone, Copy)]
enum Command {
    Start(StartMode),
    Attach,
}

#[given("a created container that prints {text}")]
fn created_container_prints(attach_stream_state: &AttachStreamState, text: String) {
    attach_stream_state
        .container_state
        .set(ContainerState::Created);
    attach_stream_state.output.set(text);
}

#[given("a running container that prints {text}")]
fn running_container_prints(attach_stream_state: &AttachStreamState, text: String) {
    attach_stream_state
        .container_state
        .set(ContainerState::Running);
    attach_stream_state.output.set(text);
}

#[given("a stopped container")]
fn stopped_container(attach_stream_state: &AttachStreamState) {
    attach_stream_state
        .container_state
        .set(ContainerState::Stopped);
}

#[given("the container exits with code {code}")]
fn container_exits_with(attach_stream_state: &AttachStreamState, code: i64) {
    attach_stream_state.exit_code.set(code);
}

#[given("the container echoes its stdin")]
fn container_echoes_stdin(attach_stream_state: &AttachStreamState) {
    attach_stream_state.echo_stdin.set(true);
}

#[given("the local input is {text}")]
fn local_input_is(attach_stream_state: &AttachStreamState, text: String) {
    attach_stream_state.local_input.set(text);
}

#[when("the container is started with output attached")]
fn started_attached(attach_stream_state: &AttachStreamState) -> StepResult<()> {
    run_scenario(attach_stream_state, Command::Start(StartMode::Attached))
}

#[when("the container is started interactively")]
fn started_interactively(attach_stream_state: &AttachStreamState) -> StepResult<()> {
    run_scenario(attach_stream_state, Command::Start(StartMode::Interactive))
}

#[when("the container is attached")]
fn container_attached(attach_stream_state: &AttachStreamState) -> StepResult<()> {
    run_scenario(attach_stream_state, Command::Attach)
}

#[when("a command connects to a missing engine socket")]
fn connect_to_missing_socket(attach_stream_state: &AttachStreamState) -> StepResult<()> {
    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let socket = dir.path().join("absent.sock");
    let endpoint = socket
        .to_str()
        .ok_or_else(|| String::from("socket path should be UTF-8"))?
        .to_owned();
    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    let result = match runtime.block_on(EngineConnector::connect(&endpoint)) {
        Ok(_) => CommandResult::Success {
            exit_code: 0,
            output: String::new(),
        },
        Err(error) => CommandResult::Failure {
            message: error.to_string(),
        },
    };
    attach_stream_state.result.set(result);
    Ok(())
}

fn scripted_manager(state: &AttachStreamState) -> StepResult<ScriptedManager> {
    let container_id = state
        .container_id
        .get()
        .ok_or_else(|| String::from("container ID should be configured"))?;
    let container_state = state
        .container_state
        .get()
        .ok_or_else(|| String::from("container state should be configured"))?;
    let output = state.output.get().unwrap_or_default();
    let exit_code = state.exit_code.get().unwrap_or(0);
    let echo_stdin = state.echo_stdin.get().unwrap_or(false);
    Ok(ScriptedManager::new(
        &container_id,
        container_state,
        &output,
        exit_code,
        echo_stdin,
    ))
}

/// Serve a scripted engine on a socket in a temporary directory, run one
/// command against it, and record the outcome.
fn run_scenario(state: &AttachStreamState, command: Command) -> StepResult<()> {
    let manager = Arc::new(scripted_manager(state)?);
    let container_id = state.container_id.get().unwrap_or_default();
    let local_input = state.local_input.get().unwrap_or_default();

    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let socket = dir.path().join("corral.sock");
    let endpoint = socket
        .to_str()
        .ok_or_else(|| String::from("socket path should be UTF-8"))?
        .to_owned();

    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    let result = runtime.block_on(async {
        let listener = UnixListener::bind(&socket).map_err(|e| e.to_string())?;
        let shutdown = CancellationToken::new();
        let service = Arc::new(AttachService::new(Arc::clone(&manager), DRAIN_TIMEOUT));
        let server = tokio::spawn(serve(listener, service, shutdown.clone()));

        let result = run_command(&endpoint, &container_id, command, local_input).await;

        shutdown.cancel();
        server
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        Ok::<_, String>(result)
    })?;

    state.stdin_received.set(manager.stdin_received());
    state.result.set(result);
    Ok(())
}

async fn run_command(
    endpoint: &str,
    container_id: &str,
    command: Command,
    local_input: String,
) -> CommandResult {
    let engine: SocketEngineClient = match EngineConnector::connect(endpoint).await {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::Failure {
                message: error.to_string(),
            };
        }
    };
    let terminal = TerminalManager::new(Piped);
    let config = AppConfig::default();
    let ctx = CommandContext {
        engine: &engine,
        terminal: &terminal,
        config: &config,
    };

    let (stdout, mut captured) = tokio::io::duplex(64 * 1024);
    let streams = LocalStreams {
        stdin: std::io::Cursor::new(local_input.into_bytes()),
        stdout,
    };
    let outcome = match command {
        Command::Start(mode) => api::start(&ctx, container_id, mode, streams).await,
        Command::Attach => api::attach(&ctx, container_id, true, streams).await,
    };

    match outcome {
        Ok(outcome) => {
            let mut output = Vec::new();
            if let Err(error) = captured.read_to_end(&mut output).await {
                return CommandResult::Failure {
                    message: error.to_string(),
                };
            }
            let exit_code = match outcome {
                CommandOutcome::Success => 0,
                CommandOutcome::CommandExit { code } => code,
            };
            CommandResult::Success {
                exit_code,
                output: String::from_utf8_lossy(&output).into_owned(),
            }
        }
        Err(error) => CommandResult::Failure {
            message: error.to_string(),
        },
    }
}
