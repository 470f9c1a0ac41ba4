// ABOUTME: Explicit state machine for release operations.
// ABOUTME: A pure transition table maps (state, event) to the next state and its actions.

use std::fmt;

use crate::steps::HealthOutcome;

/// Where an operation currently is. `Initial` is both the start and the resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Initial,
    Install(InstallState),
    Upgrade(UpgradeState),
    Rollback(RollbackState),
    Delete(DeleteState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Start,
    DeployApps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Start,
    DeployTargetApps,
    WaitTargetApps,
    CheckTargetApps,
    DeployTargetAppsFailed,
    Cancel,
    Promote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackState {
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteState {
    Delete,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Initial => "INITIAL",
            State::Install(InstallState::Start) => "INSTALL_START",
            State::Install(InstallState::DeployApps) => "INSTALL_DEPLOY_APPS",
            State::Upgrade(UpgradeState::Start) => "UPGRADE_START",
            State::Upgrade(UpgradeState::DeployTargetApps) => "UPGRADE_DEPLOY_TARGET_APPS",
            State::Upgrade(UpgradeState::WaitTargetApps) => "UPGRADE_WAIT_TARGET_APPS",
            State::Upgrade(UpgradeState::CheckTargetApps) => "UPGRADE_CHECK_TARGET_APPS",
            State::Upgrade(UpgradeState::DeployTargetAppsFailed) => {
                "UPGRADE_DEPLOY_TARGET_APPS_FAILED"
            }
            State::Upgrade(UpgradeState::Cancel) => "UPGRADE_CANCEL",
            State::Upgrade(UpgradeState::Promote) => "UPGRADE_PROMOTE",
            State::Rollback(RollbackState::Start) => "ROLLBACK_START",
            State::Delete(DeleteState::Delete) => "DELETE_DELETE",
        };
        f.write_str(name)
    }
}

/// Inputs to the machine: requests from callers and results of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Install,
    Upgrade,
    Rollback,
    Delete,
    ReleaseCreated,
    AppsDeployed,
    DeployFailed,
    NoChanges,
    ChangesFound,
    HealthCheckCompleted(HealthOutcome),
    TargetHealthy,
    TargetUnhealthy,
    CancelRequested,
    TargetCancelled,
    TargetPromoted,
    RollbackViaInstall,
    RollbackViaUpgrade,
    Deleted,
}

/// Work the driver performs on entering a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateInstallRelease,
    DeployAllApps,
    MarkInstalled,
    MarkInstallFailed,
    AnalyzeUpgrade,
    CreateTargetRelease,
    DeployTargetApps,
    WaitForTargetApps,
    EvaluateHealth(HealthOutcome),
    PromoteTarget,
    CancelTarget,
    ResolveRollbackTarget,
    DeleteRelease,
}

/// The event is not accepted in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event {event:?} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: State,
    pub event: Event,
}

/// Apply `event` to `state`.
pub fn transition(state: State, event: Event) -> Result<(State, Vec<Action>), InvalidTransition> {
    use Action as A;
    use Event as E;
    use State as S;
    use UpgradeState as U;

    let next = match (state, event) {
        (S::Initial, E::Install) => (S::Install(InstallState::Start), vec![A::CreateInstallRelease]),
        (S::Install(InstallState::Start), E::ReleaseCreated) => {
            (S::Install(InstallState::DeployApps), vec![A::DeployAllApps])
        }
        (S::Install(InstallState::DeployApps), E::AppsDeployed) => {
            (S::Initial, vec![A::MarkInstalled])
        }
        (S::Install(InstallState::DeployApps), E::DeployFailed) => {
            (S::Initial, vec![A::MarkInstallFailed])
        }

        (S::Initial, E::Upgrade) => (S::Upgrade(U::Start), vec![A::AnalyzeUpgrade]),
        (S::Upgrade(U::Start), E::NoChanges) => (S::Initial, vec![]),
        (S::Upgrade(U::Start), E::ChangesFound) => (
            S::Upgrade(U::DeployTargetApps),
            vec![A::CreateTargetRelease, A::DeployTargetApps],
        ),
        (S::Upgrade(U::DeployTargetApps), E::AppsDeployed) => {
            (S::Upgrade(U::WaitTargetApps), vec![A::WaitForTargetApps])
        }
        (S::Upgrade(U::DeployTargetApps), E::DeployFailed) => {
            (S::Upgrade(U::DeployTargetAppsFailed), vec![A::CancelTarget])
        }
        (S::Upgrade(U::WaitTargetApps), E::HealthCheckCompleted(outcome)) => {
            (S::Upgrade(U::CheckTargetApps), vec![A::EvaluateHealth(outcome)])
        }
        (S::Upgrade(U::CheckTargetApps), E::TargetHealthy) => {
            (S::Upgrade(U::Promote), vec![A::PromoteTarget])
        }
        (S::Upgrade(U::CheckTargetApps), E::TargetUnhealthy) => {
            (S::Upgrade(U::DeployTargetAppsFailed), vec![A::CancelTarget])
        }
        (S::Upgrade(U::CheckTargetApps), E::CancelRequested) => {
            (S::Upgrade(U::Cancel), vec![A::CancelTarget])
        }
        (S::Upgrade(U::DeployTargetAppsFailed | U::Cancel), E::TargetCancelled) => {
            (S::Initial, vec![])
        }
        (S::Upgrade(U::Promote), E::TargetPromoted) => (S::Initial, vec![]),

        (S::Initial, E::Rollback) => (
            S::Rollback(RollbackState::Start),
            vec![A::ResolveRollbackTarget],
        ),
        (S::Rollback(RollbackState::Start), E::RollbackViaInstall) => {
            (S::Install(InstallState::Start), vec![A::CreateInstallRelease])
        }
        (S::Rollback(RollbackState::Start), E::RollbackViaUpgrade) => {
            (S::Upgrade(U::Start), vec![A::AnalyzeUpgrade])
        }

        (S::Initial, E::Delete) => (S::Delete(DeleteState::Delete), vec![A::DeleteRelease]),
        (S::Delete(DeleteState::Delete), E::Deleted) => (S::Initial, vec![]),

        (state, event) => return Err(InvalidTransition { state, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run(events: &[Event]) -> Result<State, InvalidTransition> {
        events
            .iter()
            .try_fold(State::Initial, |state, event| transition(state, *event).map(|(s, _)| s))
    }

    #[test]
    fn install_cycle_returns_to_initial() {
        let end = run(&[Event::Install, Event::ReleaseCreated, Event::AppsDeployed]).unwrap();
        assert_eq!(end, State::Initial);
    }

    #[test]
    fn failed_install_returns_to_initial_with_failure_action() {
        let (state, _) = transition(State::Initial, Event::Install).unwrap();
        let (state, _) = transition(state, Event::ReleaseCreated).unwrap();
        let (state, actions) = transition(state, Event::DeployFailed).unwrap();
        assert_eq!(state, State::Initial);
        assert_eq!(actions, vec![Action::MarkInstallFailed]);
    }

    #[test]
    fn healthy_upgrade_promotes() {
        let (state, actions) = transition(
            State::Upgrade(UpgradeState::WaitTargetApps),
            Event::HealthCheckCompleted(HealthOutcome::Healthy),
        )
        .unwrap();
        assert_eq!(state, State::Upgrade(UpgradeState::CheckTargetApps));
        assert_eq!(actions, vec![Action::EvaluateHealth(HealthOutcome::Healthy)]);

        let end = run(&[
            Event::Upgrade,
            Event::ChangesFound,
            Event::AppsDeployed,
            Event::HealthCheckCompleted(HealthOutcome::Healthy),
            Event::TargetHealthy,
            Event::TargetPromoted,
        ])
        .unwrap();
        assert_eq!(end, State::Initial);
    }

    #[test]
    fn unhealthy_upgrade_goes_through_failed_state() {
        let outcome = HealthOutcome::TimedOut {
            elapsed: Duration::from_secs(1),
        };
        let state = run(&[
            Event::Upgrade,
            Event::ChangesFound,
            Event::AppsDeployed,
            Event::HealthCheckCompleted(outcome),
            Event::TargetUnhealthy,
        ])
        .unwrap();
        assert_eq!(state, State::Upgrade(UpgradeState::DeployTargetAppsFailed));
        let (end, _) = transition(state, Event::TargetCancelled).unwrap();
        assert_eq!(end, State::Initial);
    }

    #[test]
    fn deploy_failure_cancels_target() {
        let (state, actions) =
            transition(State::Upgrade(UpgradeState::DeployTargetApps), Event::DeployFailed).unwrap();
        assert_eq!(state, State::Upgrade(UpgradeState::DeployTargetAppsFailed));
        assert_eq!(actions, vec![Action::CancelTarget]);
    }

    #[test]
    fn cancel_request_routes_to_cancel() {
        let (state, actions) = transition(
            State::Upgrade(UpgradeState::CheckTargetApps),
            Event::CancelRequested,
        )
        .unwrap();
        assert_eq!(state, State::Upgrade(UpgradeState::Cancel));
        assert_eq!(actions, vec![Action::CancelTarget]);
    }

    #[test]
    fn no_change_upgrade_short_circuits() {
        let end = run(&[Event::Upgrade, Event::NoChanges]).unwrap();
        assert_eq!(end, State::Initial);
    }

    #[test]
    fn rollback_delegates_to_install_or_upgrade() {
        let (state, actions) = transition(
            State::Rollback(RollbackState::Start),
            Event::RollbackViaInstall,
        )
        .unwrap();
        assert_eq!(state, State::Install(InstallState::Start));
        assert_eq!(actions, vec![Action::CreateInstallRelease]);

        let (state, _) = transition(
            State::Rollback(RollbackState::Start),
            Event::RollbackViaUpgrade,
        )
        .unwrap();
        assert_eq!(state, State::Upgrade(UpgradeState::Start));
    }

    #[test]
    fn delete_cycle() {
        let end = run(&[Event::Delete, Event::Deleted]).unwrap();
        assert_eq!(end, State::Initial);
    }

    #[test]
    fn unexpected_events_are_rejected() {
        let err = transition(State::Initial, Event::AppsDeployed).unwrap_err();
        assert_eq!(err.state, State::Initial);

        assert!(transition(State::Install(InstallState::Start), Event::Upgrade).is_err());
        assert!(transition(State::Upgrade(UpgradeState::WaitTargetApps), Event::CancelRequested).is_err());
    }

    #[test]
    fn states_display_as_upper_snake() {
        assert_eq!(
            State::Upgrade(UpgradeState::WaitTargetApps).to_string(),
            "UPGRADE_WAIT_TARGET_APPS"
        );
    }
}
