//! Narration text and host callbacks

use super::event::{Phase, SimEvent};

/// Receives one narration line per processed event
pub trait NarrationSink {
    fn narrate(&mut self, line: &str) -> anyhow::Result<()>;
}

impl<F> NarrationSink for F
where
    F: FnMut(&str) -> anyhow::Result<()>,
{
    fn narrate(&mut self, line: &str) -> anyhow::Result<()> {
        self(line)
    }
}

/// Stage-level notifications for hosts that animate the zones themselves.
/// Every method defaults to doing nothing.
pub trait StageObserver {
    /// The dispatcher switched phase; `None` when the scenario ended
    fn phase_changed(&mut self, _phase: Option<Phase>) {}

    fn frame_pushed(&mut self, _frame: &str) {}

    fn frame_popped(&mut self, _frame: &str) {}

    /// Synchronous code ran on the stack
    fn sync_ran(&mut self, _description: &str) {}

    /// A queue started or stopped draining
    fn queue_processing(&mut self, _microtasks: bool, _active: bool) {}

    /// Called last for every handled event
    fn event_processed(&mut self, _event: &SimEvent) {}
}

fn zone_phrase(name: &str) -> &str {
    match name {
        "call-stack" => "the Call Stack",
        "web-api" => "the Web APIs area",
        "microtask-queue" => "the microtask VIP lane",
        "macrotask-queue" => "the macrotask conveyor belt",
        "event-loop" => "the event loop",
        other => other,
    }
}

fn or_default<'a>(description: &'a str, fallback: &'a str) -> &'a str {
    if description.trim().is_empty() {
        fallback
    } else {
        description
    }
}

/// The fixed narration line for `event`
pub fn narrate(event: &SimEvent) -> String {
    match event {
        SimEvent::Sync { description } => or_default(
            description,
            "JavaScript is executing synchronous code on the Call Stack.",
        )
        .to_string(),
        SimEvent::TokenMove { token, to, .. } => {
            format!("{} moves to {}.", token.label, zone_phrase(to))
        }
        SimEvent::TokenRemove { token_id, description } => match description {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => format!("{token_id} leaves the stage."),
        },
        SimEvent::StackPush { frame } => format!("📚 Pushing \"{frame}\" onto the Call Stack."),
        SimEvent::StackPop { frame } => format!("📤 Popping \"{frame}\" from the Call Stack."),
        SimEvent::EnqueueMicro { token } => {
            format!("🚀 Adding {} to the microtask VIP lane.", token.label)
        }
        SimEvent::EnqueueMacro { token } => {
            format!("🏭 Adding {} to the macrotask conveyor belt.", token.label)
        }
        SimEvent::DequeueMicro { token } => {
            format!("⚡ Processing {} from the microtask queue.", token.label)
        }
        SimEvent::DequeueMacro { token } => {
            format!("🏃 Processing {} from the macrotask queue.", token.label)
        }
        SimEvent::WebapiAdd { token } => {
            format!("🌐 {} is being handled by Web APIs.", token.label)
        }
        SimEvent::WebapiComplete { token } => {
            format!("✅ Web API finished processing {}.", token.label)
        }
        SimEvent::MicrotaskDrain { description } => or_default(
            description,
            "Promises zoom through the VIP lane (microtasks drain)!",
        )
        .to_string(),
        SimEvent::MacrotaskRun { description } => or_default(
            description,
            "A timer moves off the conveyor belt (macrotask runs).",
        )
        .to_string(),
        SimEvent::Tick { phase } => {
            let doing = match phase {
                Phase::RunSync => "executing synchronous code",
                Phase::DrainMicro => "draining the microtask queue",
                Phase::RunMacro => "running a macrotask",
            };
            format!("⏰ Event loop is {doing}.")
        }
        SimEvent::ScenarioEnd => {
            "🎉 All done! The JavaScript event loop has processed everything.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::event::{TaskKind, TaskRef};

    #[test]
    fn test_token_move_narration() {
        let event = SimEvent::TokenMove {
            token: TaskRef::new("t1", TaskKind::Promise, "Promise"),
            from: "code".into(),
            to: "microtask-queue".into(),
        };
        assert_eq!(narrate(&event), "Promise moves to the microtask VIP lane.");

        let elsewhere = SimEvent::TokenMove {
            token: TaskRef::new("t1", TaskKind::Promise, "Promise"),
            from: "code".into(),
            to: "nowhere".into(),
        };
        assert_eq!(narrate(&elsewhere), "Promise moves to nowhere.");
    }

    #[test]
    fn test_description_fallbacks() {
        let sync = SimEvent::Sync {
            description: "console.log('Hello')".into(),
        };
        assert_eq!(narrate(&sync), "console.log('Hello')");

        let blank = SimEvent::MicrotaskDrain {
            description: String::new(),
        };
        assert!(narrate(&blank).contains("microtasks drain"));
    }

    #[test]
    fn test_closure_sink() {
        let mut lines = Vec::new();
        {
            let mut sink = |line: &str| -> anyhow::Result<()> {
                lines.push(line.to_string());
                Ok(())
            };
            sink.narrate("hello").unwrap();
        }
        assert_eq!(lines, vec!["hello".to_string()]);
    }
}
