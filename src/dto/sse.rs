use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::changes::{ChangeEvent, ChangeOp, Table};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// Tournament the event belongs to; `None` for global events that every
    /// subscriber receives.
    pub tournament_id: Option<Uuid>,
}

impl ServerEvent {
    /// Build an event from a preformatted data string.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
            tournament_id: None,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
            tournament_id: None,
        })
    }

    /// Scope the event to a single tournament stream.
    pub fn for_tournament(mut self, tournament_id: Uuid) -> Self {
        self.tournament_id = Some(tournament_id);
        self
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Token refresh payload pushed onto the admin stream.
pub struct AdminHandshake {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Notification that a row changed; clients re-fetch the tournament rather
/// than patching local state from the payload.
pub struct ChangeNotification {
    /// Logical table the change happened in.
    pub table: Table,
    /// Kind of change.
    pub op: ChangeOp,
    /// Identifier of the changed row.
    pub row_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<Uuid>,
}

impl From<&ChangeEvent> for ChangeNotification {
    fn from(change: &ChangeEvent) -> Self {
        Self {
            table: change.table,
            op: change.op,
            row_id: change.row_id,
            tournament_id: change.tournament_id,
            match_id: change.match_id,
        }
    }
}
