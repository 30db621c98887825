//! Then-step assertions for attach stream scenarios.

use rstest_bdd_macros::then;

use super::state::{AttachStreamState, CommandResult};
use super::steps::StepResult;

fn recorded_result(state: &AttachStreamState) -> StepResult<CommandResult> {
    state
        .result
        .get()
        .ok_or_else(|| String::from("command result should be recorded"))
}

fn recorded_success(state: &AttachStreamState) -> StepResult<(i64, String)> {
    match recorded_result(state)? {
        CommandResult::Success { exit_code, output } => Ok((exit_code, output)),
        CommandResult::Failure { message } => {
            Err(format!("expected success, got failure: {message}"))
        }
    }
}

#[then("the local output is {expected}")]
fn local_output_is(attach_stream_state: &AttachStreamState, expected: String) -> StepResult<()> {
    let (_, output) = recorded_success(attach_stream_state)?;
    if output == expected {
        Ok(())
    } else {
        Err(format!("expected output '{expected}', got '{output}'"))
    }
}

#[then("the reported exit code is {code}")]
fn reported_exit_code_is(attach_stream_state: &AttachStreamState, code: i64) -> StepResult<()> {
    let (exit_code, _) = recorded_success(attach_stream_state)?;
    if exit_code == code {
        Ok(())
    } else {
        Err(format!("expected exit code {code}, got {exit_code}"))
    }
}

#[then("the container received {expected}")]
fn container_received(attach_stream_state: &AttachStreamState, expected: String) -> StepResult<()> {
    let received = attach_stream_state
        .stdin_received
        .get()
        .ok_or_else(|| String::from("received stdin should be recorded"))?;
    if received == expected {
        Ok(())
    } else {
        Err(format!("expected container stdin '{expected}', got '{received}'"))
    }
}

#[then("the command fails mentioning {text}")]
fn command_fails_mentioning(attach_stream_state: &AttachStreamState, text: String) -> StepResult<()> {
    match recorded_result(attach_stream_state)? {
        CommandResult::Failure { message } if message.contains(&text) => Ok(()),
        CommandResult::Failure { message } => Err(format!(
            "expected failure mentioning '{text}', got: {message}"
        )),
        CommandResult::Success { .. } => Err(format!(
            "expected failure mentioning '{text}', got success"
        )),
    }
}
