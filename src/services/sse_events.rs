use serde::Serialize;
use tracing::warn;

use crate::{
    dao::changes::ChangeEvent,
    dto::sse::{ChangeNotification, ServerEvent, SystemStatus},
    state::SharedState,
};

const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast a row-change notification to both streams.
///
/// The public copy is scoped to the change's tournament so filtered
/// subscriptions only see their own bracket; the admin copy is unscoped.
pub fn broadcast_change(state: &SharedState, change: ChangeEvent) {
    let payload = ChangeNotification::from(&change);
    let name = change.event_name();

    match ServerEvent::json(Some(name.clone()), &payload) {
        Ok(mut event) => {
            if let Some(tournament_id) = change.tournament_id {
                event = event.for_tournament(tournament_id);
            }
            state.public_sse().broadcast(event);
        }
        Err(err) => warn!(event = %name, error = %err, "failed to serialize public SSE payload"),
    }

    send_admin_event(state, &name, &payload);
}

/// Broadcast a degraded-mode flip to every connected client.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    match ServerEvent::json(Some(EVENT_SYSTEM_STATUS.to_string()), &payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => {
            warn!(event = EVENT_SYSTEM_STATUS, error = %err, "failed to serialize public SSE payload")
        }
    }
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
