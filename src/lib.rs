//! ImaginArena backend library wiring REST, SSE and storage layers for
//! bracket-based image tournaments.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
