//! Scripted journeys through the stage, one per token category
//!
//! | category  | route                                                       |
//! |-----------|-------------------------------------------------------------|
//! | immediate | stack, dwell, dispatch                                      |
//! | deferred  | stack, service, wait, microtask queue, dispatch             |
//! | timer     | service, countdown, macrotask queue, dispatch               |
//! | network   | stack, service, wait, microtask queue, dispatch             |
//! | ui-event  | macrotask queue, dispatch                                   |
//! | io        | service, wait, macrotask queue, dispatch                    |
//!
//! Every flow ends with a grace period and a destroy. Steps that are
//! ignored or superseded do not stop the flow; later steps simply find the
//! token in whatever state it reached.

use crate::manager::TokenManager;
use crate::zone::ZoneKind;
use tokenflow_core::{TokenCategory, TokenId, TokenSpec, TokenState};

/// Spawn a token for `spec`, walk it through its category's route, then
/// destroy it. Resolves to the token's id once the destroy has finished.
pub async fn execute_token_flow(manager: TokenManager, spec: TokenSpec) -> TokenId {
    let spawn = manager.config().spawn_position;
    let id = manager.create_token(spec, spawn);
    tracing::debug!("flow: {id} started");

    run_route(&manager, id).await;

    let grace = manager.config().timings.flow.grace;
    manager.delay(grace).await;
    manager.destroy_token(id).await;
    tracing::debug!("flow: {id} finished");
    id
}

async fn run_route(manager: &TokenManager, id: TokenId) {
    let Some(category) = manager.with_token(id, |t| t.category()) else {
        return;
    };
    let timings = manager.config().timings.flow;

    match category {
        TokenCategory::Immediate => {
            manager.move_to_zone(id, ZoneKind::CallStack).await;
            manager.delay(timings.stack_dwell).await;
        }
        TokenCategory::Deferred => {
            manager.move_to_zone(id, ZoneKind::CallStack).await;
            manager.move_to_zone(id, ZoneKind::ExternalService).await;
            manager.delay(timings.promise_wait).await;
            manager.move_to_zone(id, ZoneKind::MicrotaskQueue).await;
        }
        TokenCategory::Timer => {
            manager.move_to_zone(id, ZoneKind::ExternalService).await;
            let countdown = manager
                .with_token(id, |t| t.delay)
                .flatten()
                .unwrap_or(timings.timer_wait);
            manager.delay(countdown).await;
            manager.move_to_zone(id, ZoneKind::MacrotaskQueue).await;
        }
        TokenCategory::Network => {
            manager.move_to_zone(id, ZoneKind::CallStack).await;
            manager.move_to_zone(id, ZoneKind::ExternalService).await;
            manager.delay(timings.network_wait).await;
            manager.move_to_zone(id, ZoneKind::MicrotaskQueue).await;
        }
        TokenCategory::UiEvent => {
            manager.move_to_zone(id, ZoneKind::MacrotaskQueue).await;
        }
        TokenCategory::Io => {
            manager.move_to_zone(id, ZoneKind::ExternalService).await;
            manager.delay(timings.io_wait).await;
            manager.move_to_zone(id, ZoneKind::MacrotaskQueue).await;
        }
    }

    dispatch(manager, id).await;
}

/// Run the token through the dispatcher, lining it up first when it is not
/// already waiting in a queue
async fn dispatch(manager: &TokenManager, id: TokenId) {
    if manager.state(id) != Some(TokenState::Queued) {
        let dispatcher = manager.config().dispatcher_position;
        manager.add_to_queue(id, dispatcher, 0).await;
    }
    manager.process_with_event_loop(id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::executor::Choreographer;
    use crate::zone::{QueueZone, StaticZone, Station};
    use tokenflow_core::Vec3;

    fn stage(manager: &TokenManager) {
        manager.register_zone(ZoneKind::CallStack, StaticZone::new(Vec3::new(-8.0, 0.0, 2.0)));
        manager.register_zone(
            ZoneKind::ExternalService,
            StaticZone::new(Vec3::new(0.0, 4.0, 0.0))
                .with_station(Station::new("timer", TokenCategory::Timer, Vec3::new(-2.0, 4.0, 0.0))),
        );
        manager.register_zone(ZoneKind::MicrotaskQueue, QueueZone::new(Vec3::new(0.0, 0.0, 10.0)));
        manager.register_zone(ZoneKind::MacrotaskQueue, QueueZone::new(Vec3::new(6.0, -1.0, 0.0)));
    }

    fn run_flow(spec: TokenSpec, seconds: f32) -> (TokenManager, Option<TokenId>) {
        let manager = TokenManager::new(EngineConfig::default().with_seed(5));
        stage(&manager);
        let pool = Choreographer::new();
        let handle = pool.spawn_with_handle(execute_token_flow(manager.clone(), spec));

        pool.run_until_stalled();
        let frames = (seconds / 0.016).ceil() as usize;
        for _ in 0..frames {
            manager.tick(0.016);
            pool.run_until_stalled();
        }
        (manager, handle.try_get())
    }

    #[test]
    fn test_immediate_flow_recycles_token() {
        let (manager, finished) = run_flow(TokenSpec::new(TokenCategory::Immediate, "log"), 8.0);
        let id = finished.unwrap();
        assert!(!manager.contains(id));
        assert_eq!(manager.pool_len(TokenCategory::Immediate), 1);
    }

    #[test]
    fn test_timer_flow_uses_token_delay() {
        let spec = TokenSpec::new(TokenCategory::Timer, "setTimeout").with_delay(0.25);
        let (_, quick) = run_flow(spec, 7.0);
        assert!(quick.is_some());

        let spec = TokenSpec::new(TokenCategory::Timer, "setTimeout").with_delay(30.0);
        let (manager, slow) = run_flow(spec, 7.0);
        assert!(slow.is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_flow_survives_missing_zones() {
        let manager = TokenManager::new(EngineConfig::default().with_seed(2));
        let pool = Choreographer::new();
        let handle = pool.spawn_with_handle(execute_token_flow(
            manager.clone(),
            TokenSpec::new(TokenCategory::Io, "read"),
        ));
        pool.run_until_stalled();
        for _ in 0..600 {
            manager.tick(0.016);
            pool.run_until_stalled();
        }
        assert!(handle.is_ready());
        assert!(manager.is_empty());
    }
}
