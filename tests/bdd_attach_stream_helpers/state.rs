//! Scenario state for attach stream behavioural tests.

use corral::engine::ContainerState;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

#[derive(Debug, Clone)]
pub(crate) enum CommandResult {
    Success { exit_code: i64, output: String },
    Failure { message: String },
}

#[derive(Default, ScenarioState)]
pub(crate) struct AttachStreamState {
    pub(crate) container_id: Slot<String>,
    pub(crate) container_state: Slot<ContainerState>,
    pub(crate) output: Slot<String>,
    pub(crate) exit_code: Slot<i64>,
    pub(crate) echo_stdin: Slot<bool>,
    pub(crate) local_input: Slot<String>,
    pub(crate) result: Slot<CommandResult>,
    pub(crate) stdin_received: Slot<String>,
}

#[fixture]
pub(crate) fn attach_stream_state() -> AttachStreamState {
    let state = AttachStreamState::default();
    state.container_id.set(String::from("web"));
    state.container_state.set(ContainerState::Created);
    state.output.set(String::new());
    state.exit_code.set(0);
    state.echo_stdin.set(false);
    state.local_input.set(String::new());
    state
}
