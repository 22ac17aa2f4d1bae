//! Token lifecycle state machine
//!
//! The lifecycle is a pure transition table. Operations are the only
//! drivers; pairs that are not listed below leave the state untouched.
//!
//! ```text
//! Idle/Moving    --move_to / move_along_path--> Moving
//! Moving         --arrive-->                    Idle
//! Idle/Moving    --add_to_queue-->              Queued
//! Queued         --process-->                   Processing
//! Processing     --start_processing-->          Processing
//! Processing     --complete-->                  Completed
//! any but Destroyed --destroy-->                Destroyed
//! Destroyed      --recycle-->                   Idle
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Idle,
    Moving,
    Queued,
    Processing,
    Completed,
    Destroyed,
}

/// Operations that drive [`TokenState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    MoveTo,
    MoveAlongPath,
    /// A free move reached its destination
    Arrive,
    AddToQueue,
    Process,
    StartProcessing,
    Complete,
    Destroy,
    /// Pool return
    Recycle,
}

impl TokenState {
    pub const ALL: [TokenState; 6] = [
        TokenState::Idle,
        TokenState::Moving,
        TokenState::Queued,
        TokenState::Processing,
        TokenState::Completed,
        TokenState::Destroyed,
    ];

    /// The state after `op`, or `None` when the pair is not a legal transition
    pub fn apply(self, op: Operation) -> Option<TokenState> {
        use Operation as Op;
        use TokenState::*;

        match (self, op) {
            (Idle | Moving, Op::MoveTo | Op::MoveAlongPath) => Some(Moving),
            (Moving, Op::Arrive) => Some(Idle),
            (Idle | Moving, Op::AddToQueue) => Some(Queued),
            (Queued, Op::Process) => Some(Processing),
            (Processing, Op::StartProcessing) => Some(Processing),
            (Processing, Op::Complete) => Some(Completed),
            (Idle | Moving | Queued | Processing | Completed, Op::Destroy) => Some(Destroyed),
            (Destroyed, Op::Recycle) => Some(Idle),
            _ => None,
        }
    }

    pub fn accepts(self, op: Operation) -> bool {
        self.apply(op).is_some()
    }

    pub fn is_terminal(self) -> bool {
        self == TokenState::Destroyed
    }
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::MoveTo,
        Operation::MoveAlongPath,
        Operation::Arrive,
        Operation::AddToQueue,
        Operation::Process,
        Operation::StartProcessing,
        Operation::Complete,
        Operation::Destroy,
        Operation::Recycle,
    ];
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenState::Idle => "idle",
            TokenState::Moving => "moving",
            TokenState::Queued => "queued",
            TokenState::Processing => "processing",
            TokenState::Completed => "completed",
            TokenState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Operation as Op;
    use TokenState::*;

    #[test]
    fn test_full_transition_table() {
        let legal: &[(TokenState, Operation, TokenState)] = &[
            (Idle, Op::MoveTo, Moving),
            (Moving, Op::MoveTo, Moving),
            (Idle, Op::MoveAlongPath, Moving),
            (Moving, Op::MoveAlongPath, Moving),
            (Moving, Op::Arrive, Idle),
            (Idle, Op::AddToQueue, Queued),
            (Moving, Op::AddToQueue, Queued),
            (Queued, Op::Process, Processing),
            (Processing, Op::StartProcessing, Processing),
            (Processing, Op::Complete, Completed),
            (Idle, Op::Destroy, Destroyed),
            (Moving, Op::Destroy, Destroyed),
            (Queued, Op::Destroy, Destroyed),
            (Processing, Op::Destroy, Destroyed),
            (Completed, Op::Destroy, Destroyed),
            (Destroyed, Op::Recycle, Idle),
        ];

        let mut checked = 0;
        for state in TokenState::ALL {
            for op in Operation::ALL {
                let expected = legal
                    .iter()
                    .find(|(s, o, _)| *s == state && *o == op)
                    .map(|(_, _, next)| *next);
                assert_eq!(state.apply(op), expected, "{state} x {op:?}");
                checked += 1;
            }
        }
        assert_eq!(checked, 54);
    }

    #[test]
    fn test_destroy_is_not_reentrant() {
        assert!(Idle.accepts(Op::Destroy));
        assert!(!Destroyed.accepts(Op::Destroy));
        assert!(Destroyed.is_terminal());
    }
}
