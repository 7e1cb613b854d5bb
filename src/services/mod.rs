/// Bracket generation and advancement logic.
pub mod bracket;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match lifecycle: submissions, votes, winner commits.
pub mod match_service;
/// Profile bootstrap, creation and bot management.
pub mod profile_service;
/// Read-only tournament snapshots for clients.
pub mod public_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage reconnection supervisor.
pub mod storage_supervisor;
/// Tournament lifecycle: create, join, finish, reset.
pub mod tournament_service;
