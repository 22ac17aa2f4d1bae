//! Inbound runtime-model events
//!
//! These mirror the JSON event feed produced by the scenario stepper:
//!
//! ```json
//! {"type": "enqueue-micro", "token": {"id": "t1", "type": "promise", "label": "Promise"}}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokenflow_core::TokenCategory;

/// A unit of work as the runtime model names it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    /// Identifier assigned by the event source
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
}

impl TaskRef {
    pub fn new(id: impl Into<String>, kind: TaskKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }
}

/// Task type tag from the event feed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Log,
    Timer,
    Promise,
    Fetch,
    Microtask,
    Macrotask,
    Async,
    #[serde(other)]
    Unknown,
}

impl TaskKind {
    /// Token category used to visualize this kind of task
    pub fn category(&self) -> TokenCategory {
        match self {
            TaskKind::Log => TokenCategory::Immediate,
            TaskKind::Timer => TokenCategory::Timer,
            TaskKind::Promise => TokenCategory::Deferred,
            TaskKind::Fetch => TokenCategory::Network,
            TaskKind::Microtask => TokenCategory::Deferred,
            TaskKind::Macrotask => TokenCategory::Timer,
            TaskKind::Async => TokenCategory::Deferred,
            TaskKind::Unknown => TokenCategory::Immediate,
        }
    }
}

/// Event-loop phase announced by `tick` events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    RunSync,
    DrainMicro,
    RunMacro,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::RunSync => "run-sync",
            Phase::DrainMicro => "drain-micro",
            Phase::RunMacro => "run-macro",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event from the runtime model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SimEvent {
    Sync {
        #[serde(default)]
        description: String,
    },
    MicrotaskDrain {
        #[serde(default)]
        description: String,
    },
    MacrotaskRun {
        #[serde(default)]
        description: String,
    },
    TokenMove {
        token: TaskRef,
        from: String,
        to: String,
    },
    TokenRemove {
        #[serde(rename = "tokenId")]
        token_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    StackPush {
        frame: String,
    },
    StackPop {
        frame: String,
    },
    EnqueueMicro {
        token: TaskRef,
    },
    EnqueueMacro {
        token: TaskRef,
    },
    DequeueMicro {
        token: TaskRef,
    },
    DequeueMacro {
        token: TaskRef,
    },
    WebapiAdd {
        token: TaskRef,
    },
    WebapiComplete {
        token: TaskRef,
    },
    Tick {
        phase: Phase,
    },
    ScenarioEnd,
}

impl SimEvent {
    /// The `type` tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            SimEvent::Sync { .. } => "sync",
            SimEvent::MicrotaskDrain { .. } => "microtask-drain",
            SimEvent::MacrotaskRun { .. } => "macrotask-run",
            SimEvent::TokenMove { .. } => "token-move",
            SimEvent::TokenRemove { .. } => "token-remove",
            SimEvent::StackPush { .. } => "stack-push",
            SimEvent::StackPop { .. } => "stack-pop",
            SimEvent::EnqueueMicro { .. } => "enqueue-micro",
            SimEvent::EnqueueMacro { .. } => "enqueue-macro",
            SimEvent::DequeueMicro { .. } => "dequeue-micro",
            SimEvent::DequeueMacro { .. } => "dequeue-macro",
            SimEvent::WebapiAdd { .. } => "webapi-add",
            SimEvent::WebapiComplete { .. } => "webapi-complete",
            SimEvent::Tick { .. } => "tick",
            SimEvent::ScenarioEnd => "scenario-end",
        }
    }

    /// The task this event carries, if any
    pub fn task(&self) -> Option<&TaskRef> {
        match self {
            SimEvent::TokenMove { token, .. }
            | SimEvent::EnqueueMicro { token }
            | SimEvent::EnqueueMacro { token }
            | SimEvent::DequeueMicro { token }
            | SimEvent::DequeueMacro { token }
            | SimEvent::WebapiAdd { token }
            | SimEvent::WebapiComplete { token } => Some(token),
            _ => None,
        }
    }

    /// Parse a JSON array of events
    pub fn parse_feed(json: &str) -> serde_json::Result<Vec<SimEvent>> {
        serde_json::from_str(json)
    }
}
