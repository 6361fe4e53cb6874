// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    install_start = { LifecycleState::Installed, LifecycleState::Starting },
    starting_running = { LifecycleState::Starting, LifecycleState::Running },
    starting_failed_back = { LifecycleState::Starting, LifecycleState::Installed },
    running_stopping = { LifecycleState::Running, LifecycleState::Stopping },
    running_exited = { LifecycleState::Running, LifecycleState::Stopped },
    running_restart = { LifecycleState::Running, LifecycleState::Starting },
    running_pause = { LifecycleState::Running, LifecycleState::Paused },
    paused_resume = { LifecycleState::Paused, LifecycleState::Running },
    stopping_stopped = { LifecycleState::Stopping, LifecycleState::Stopped },
    stopped_restart = { LifecycleState::Stopped, LifecycleState::Starting },
    error_restart = { LifecycleState::Error, LifecycleState::Starting },
)]
fn legal_transitions(from: LifecycleState, to: LifecycleState) {
    assert!(from.can_transition(to), "{from} -> {to} should be legal");
}

#[parameterized(
    installed_running = { LifecycleState::Installed, LifecycleState::Running },
    stopped_running = { LifecycleState::Stopped, LifecycleState::Running },
    stopping_running = { LifecycleState::Stopping, LifecycleState::Running },
    paused_stopped = { LifecycleState::Paused, LifecycleState::Stopped },
    installed_paused = { LifecycleState::Installed, LifecycleState::Paused },
)]
fn illegal_transitions(from: LifecycleState, to: LifecycleState) {
    assert!(!from.can_transition(to), "{from} -> {to} should be illegal");
}

#[test]
fn error_reachable_from_everywhere() {
    for from in [
        LifecycleState::Installed,
        LifecycleState::Starting,
        LifecycleState::Running,
        LifecycleState::Stopping,
        LifecycleState::Stopped,
        LifecycleState::Paused,
        LifecycleState::Error,
    ] {
        assert!(from.can_transition(LifecycleState::Error));
    }
}

#[test]
fn terminal_states() {
    assert!(LifecycleState::Stopped.is_terminal());
    assert!(LifecycleState::Error.is_terminal());
    assert!(!LifecycleState::Running.is_terminal());
    assert!(!LifecycleState::Paused.is_terminal());
}

#[test]
fn state_round_trips_through_str() {
    for s in ["installed", "starting", "running", "stopping", "stopped", "paused", "error"] {
        let state: LifecycleState = s.parse().unwrap();
        assert_eq!(state.as_str(), s);
    }
    assert!("bogus".parse::<LifecycleState>().is_err());
}

#[test]
fn installed_runtime_state_is_empty() {
    let state = RuntimeState::installed(AppId::parse("a1").unwrap());
    assert_eq!(state.current_state, LifecycleState::Installed);
    assert!(state.execution_id.is_none());
    assert!(state.container_id.is_none());
    assert_eq!(state.total_runtime_secs, 0);
}
