//! The FlashCopy state machine. Every transition the array supports is
//! listed explicitly; a trigger not listed for the current state fails
//! with the "in another state" policy error, exactly as the array CLI
//! refuses it.

use agents::errors::SvcError;
use stor_port::types::v0::transport::{FcConsistGrpStatus, FcMapStatus};
use strum_macros::Display;

/// The state of a mapping or consistency group, including nonexistence on
/// either side of its lifetime.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum FcState {
    /// The object does not exist yet.
    Begin,
    /// A consistency group with no member mappings.
    Empty,
    /// No copy in progress, or the copy has completed.
    IdleOrCopied,
    /// Flushing ahead of a start.
    Preparing,
    /// Ready to be started.
    Prepared,
    /// Background copy in progress.
    Copying,
    /// Stop requested, flushing in-flight data.
    Stopping,
    /// Stopped.
    Stopped,
    /// The object has been deleted.
    End,
}

impl From<FcMapStatus> for FcState {
    fn from(status: FcMapStatus) -> Self {
        match status {
            FcMapStatus::IdleOrCopied => Self::IdleOrCopied,
            FcMapStatus::Preparing => Self::Preparing,
            FcMapStatus::Prepared => Self::Prepared,
            FcMapStatus::Copying => Self::Copying,
            FcMapStatus::Stopping => Self::Stopping,
            FcMapStatus::Stopped | FcMapStatus::Suspended => Self::Stopped,
        }
    }
}

impl From<FcConsistGrpStatus> for FcState {
    fn from(status: FcConsistGrpStatus) -> Self {
        match status {
            FcConsistGrpStatus::Empty => Self::Empty,
            FcConsistGrpStatus::IdleOrCopied => Self::IdleOrCopied,
            FcConsistGrpStatus::Preparing => Self::Preparing,
            FcConsistGrpStatus::Prepared => Self::Prepared,
            FcConsistGrpStatus::Copying => Self::Copying,
            FcConsistGrpStatus::Stopping => Self::Stopping,
            FcConsistGrpStatus::Stopped | FcConsistGrpStatus::Suspended => Self::Stopped,
        }
    }
}

/// A trigger applied to a mapping or consistency group.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum FcTrigger {
    /// Create the object.
    Make,
    /// Add a member mapping to a consistency group.
    Add,
    /// Flush the target(s) ahead of a start.
    Prepare,
    /// Let the array settle the in-flight phase.
    Wait,
    /// The flush failed while preparing.
    FlushFailed,
    /// Start copying.
    Start,
    /// Stop copying.
    Stop,
    /// Delete the object.
    Delete,
    /// Delete the object regardless of its state.
    DeleteForce,
}

/// Apply `trigger` to `state`, for a standalone mapping or a consistency
/// group (`consistgrp`). There are no implicit defaults: any pair not
/// listed fails.
pub(crate) fn transition(
    name: &str,
    state: FcState,
    trigger: FcTrigger,
    consistgrp: bool,
) -> Result<FcState, SvcError> {
    let next = match (state, trigger) {
        (FcState::Begin, FcTrigger::Make) if consistgrp => Some(FcState::Empty),
        (FcState::Begin, FcTrigger::Make) => Some(FcState::IdleOrCopied),
        (FcState::Empty, FcTrigger::Add) if consistgrp => Some(FcState::IdleOrCopied),
        (FcState::Empty, FcTrigger::Delete | FcTrigger::DeleteForce) if consistgrp => {
            Some(FcState::End)
        }
        (FcState::IdleOrCopied, FcTrigger::Prepare) => Some(FcState::Preparing),
        (FcState::IdleOrCopied, FcTrigger::Delete | FcTrigger::DeleteForce) => Some(FcState::End),
        (FcState::Preparing, FcTrigger::FlushFailed) => Some(FcState::Stopped),
        (FcState::Preparing, FcTrigger::Wait) => Some(FcState::Prepared),
        (FcState::Stopped, FcTrigger::Prepare) => Some(FcState::Preparing),
        (FcState::Stopped, FcTrigger::DeleteForce) => Some(FcState::End),
        (FcState::Prepared, FcTrigger::Stop) => Some(FcState::Stopped),
        (FcState::Prepared, FcTrigger::Start) => Some(FcState::Copying),
        (FcState::Copying, FcTrigger::Wait) => Some(FcState::IdleOrCopied),
        (FcState::Copying, FcTrigger::Stop) => Some(FcState::Stopping),
        (FcState::Stopping, FcTrigger::Wait) => Some(FcState::Stopped),
        _ => None,
    };
    next.ok_or_else(|| SvcError::FcMapTransition {
        name: name.to_string(),
        state: state.to_string(),
        trigger: trigger.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: &[FcState] = &[
        FcState::Begin,
        FcState::Empty,
        FcState::IdleOrCopied,
        FcState::Preparing,
        FcState::Prepared,
        FcState::Copying,
        FcState::Stopping,
        FcState::Stopped,
        FcState::End,
    ];
    const TRIGGERS: &[FcTrigger] = &[
        FcTrigger::Make,
        FcTrigger::Add,
        FcTrigger::Prepare,
        FcTrigger::Wait,
        FcTrigger::FlushFailed,
        FcTrigger::Start,
        FcTrigger::Stop,
        FcTrigger::Delete,
        FcTrigger::DeleteForce,
    ];

    /// Every listed pair lands exactly where the table says; every other
    /// pair is refused with the "in another state" error.
    #[test]
    fn mapping_transition_table_is_exhaustive() {
        let table = [
            (FcState::Begin, FcTrigger::Make, FcState::IdleOrCopied),
            (FcState::IdleOrCopied, FcTrigger::Prepare, FcState::Preparing),
            (FcState::IdleOrCopied, FcTrigger::Delete, FcState::End),
            (FcState::IdleOrCopied, FcTrigger::DeleteForce, FcState::End),
            (FcState::Preparing, FcTrigger::FlushFailed, FcState::Stopped),
            (FcState::Preparing, FcTrigger::Wait, FcState::Prepared),
            (FcState::Stopped, FcTrigger::Prepare, FcState::Preparing),
            (FcState::Stopped, FcTrigger::DeleteForce, FcState::End),
            (FcState::Prepared, FcTrigger::Stop, FcState::Stopped),
            (FcState::Prepared, FcTrigger::Start, FcState::Copying),
            (FcState::Copying, FcTrigger::Wait, FcState::IdleOrCopied),
            (FcState::Copying, FcTrigger::Stop, FcState::Stopping),
            (FcState::Stopping, FcTrigger::Wait, FcState::Stopped),
        ];
        for state in STATES {
            for trigger in TRIGGERS {
                let expected = table
                    .iter()
                    .find(|(from, via, _)| from == state && via == trigger)
                    .map(|(_, _, to)| *to);
                let result = transition("fcmap0", *state, *trigger, false);
                match expected {
                    Some(to) => assert_eq!(result.unwrap(), to, "{state} + {trigger}"),
                    None => assert!(
                        matches!(result, Err(SvcError::FcMapTransition { .. })),
                        "{state} + {trigger} should be refused"
                    ),
                }
            }
        }
    }

    #[test]
    fn consistgrp_starts_empty() {
        assert_eq!(
            transition("cg0", FcState::Begin, FcTrigger::Make, true).unwrap(),
            FcState::Empty
        );
        assert_eq!(
            transition("cg0", FcState::Empty, FcTrigger::Add, true).unwrap(),
            FcState::IdleOrCopied
        );
        assert_eq!(
            transition("cg0", FcState::Empty, FcTrigger::Delete, true).unwrap(),
            FcState::End
        );
        // a standalone mapping has no empty state
        assert!(transition("fcmap0", FcState::Empty, FcTrigger::Add, false).is_err());
    }
}
