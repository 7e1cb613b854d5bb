//! Row-change notifications forming the live synchronization contract.
//!
//! Every successful store mutation broadcasts one [`ChangeEvent`]. Clients
//! treat the payload as a hint to re-fetch the affected collection rather
//! than as the source of truth, so the event only carries identifiers.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Logical table a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Tournaments,
    Participants,
    Matches,
    Submissions,
    Votes,
}

/// Kind of mutation that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A single row-change notification, filterable by tournament or match id.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    /// Identifier of the changed row.
    pub row_id: Uuid,
    /// Tournament scope used by filtered subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<Uuid>,
    /// Match scope, set for submission and vote changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<Uuid>,
}

impl ChangeEvent {
    /// Build a change event with no scope; scopes are attached with the
    /// `in_tournament`/`in_match` builders.
    pub fn new(table: Table, op: ChangeOp, row_id: Uuid) -> Self {
        Self {
            table,
            op,
            row_id,
            tournament_id: None,
            match_id: None,
        }
    }

    /// Scope this event to a tournament so filtered streams can match it.
    pub fn in_tournament(mut self, tournament_id: Uuid) -> Self {
        self.tournament_id = Some(tournament_id);
        self
    }

    /// Scope this event to a match.
    pub fn in_match(mut self, match_id: Uuid) -> Self {
        self.match_id = Some(match_id);
        self
    }

    /// SSE event name, e.g. `matches.update`.
    pub fn event_name(&self) -> String {
        let table = match self.table {
            Table::Users => "users",
            Table::Tournaments => "tournaments",
            Table::Participants => "participants",
            Table::Matches => "matches",
            Table::Submissions => "submissions",
            Table::Votes => "votes",
        };
        let op = match self.op {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        };
        format!("{table}.{op}")
    }
}
